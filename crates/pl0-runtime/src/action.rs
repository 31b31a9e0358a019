//! Semantic actions invoked by the parse engine.

use std::{fmt, hash::Hash};

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// The signature of a semantic action.
///
/// An action receives its operands in the order they were collected on the
/// analysis stack and returns exactly one value.
pub type ActionFn = dyn Fn(&[i64]) -> Result<i64, ActionError>;

/// The mapping from action identifiers to their implementations.
pub struct ActionRegistry<A> {
    actions: indexmap::IndexMap<A, Box<ActionFn>, BuildHasher>,
}

impl<A> Default for ActionRegistry<A> {
    fn default() -> Self {
        Self {
            actions: indexmap::IndexMap::default(),
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for ActionRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A> ActionRegistry<A>
where
    A: Copy + Eq + Hash + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation of an action.
    ///
    /// Registering the same identifier twice is a wiring mistake and is
    /// reported as an error.
    pub fn register<F>(&mut self, id: A, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&[i64]) -> Result<i64, ActionError> + 'static,
    {
        if self.actions.contains_key(&id) {
            return Err(RegistryError::Duplicate {
                action: format!("{:?}", id),
            });
        }
        self.actions.insert(id, Box::new(f));
        Ok(())
    }

    pub fn contains(&self, id: A) -> bool {
        self.actions.contains_key(&id)
    }

    pub fn get(&self, id: A) -> Option<&ActionFn> {
        self.actions.get(&id).map(|f| &**f)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("action {action} has already been registered")]
    Duplicate { action: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("too few operands for {action}: expected {expected}, found {found}")]
    TooFewOperands {
        action: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("too many operands for {action}: expected {expected}, found {found}")]
    TooManyOperands {
        action: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {action}")]
    Overflow { action: &'static str },
}

/// The arithmetic operators shared by the actions and by constant folding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Add => "addition",
            Self::Sub => "subtraction",
            Self::Mul => "multiplication",
            Self::Div => "division",
        }
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64, ActionError> {
        let res = match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
            Self::Mul => lhs.checked_mul(rhs),
            Self::Div => {
                if rhs == 0 {
                    return Err(ActionError::DivisionByZero);
                }
                lhs.checked_div(rhs)
            }
        };
        res.ok_or(ActionError::Overflow {
            action: self.name(),
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn expect_operands<const N: usize>(
    action: &'static str,
    operands: &[i64],
) -> Result<[i64; N], ActionError> {
    match operands.len() {
        n if n < N => Err(ActionError::TooFewOperands {
            action,
            expected: N,
            found: n,
        }),
        n if n > N => Err(ActionError::TooManyOperands {
            action,
            expected: N,
            found: n,
        }),
        _ => {
            let mut res = [0; N];
            res.copy_from_slice(operands);
            Ok(res)
        }
    }
}

/// Built-in actions used by the arithmetic grammars.
pub mod builtin {
    use super::*;

    /// Emit the final result of an evaluation.
    pub fn emit(operands: &[i64]) -> Result<i64, ActionError> {
        let [ans] = expect_operands("emit", operands)?;
        tracing::info!("Ans = {}", ans);
        Ok(ans)
    }

    /// Copy the only operand.
    pub fn assign(operands: &[i64]) -> Result<i64, ActionError> {
        let [value] = expect_operands("assignment", operands)?;
        Ok(value)
    }

    pub fn negate(operands: &[i64]) -> Result<i64, ActionError> {
        let [value] = expect_operands("negation", operands)?;
        value
            .checked_neg()
            .ok_or(ActionError::Overflow { action: "negation" })
    }

    pub fn add(operands: &[i64]) -> Result<i64, ActionError> {
        binary(BinaryOp::Add, operands)
    }

    pub fn sub(operands: &[i64]) -> Result<i64, ActionError> {
        binary(BinaryOp::Sub, operands)
    }

    pub fn mul(operands: &[i64]) -> Result<i64, ActionError> {
        binary(BinaryOp::Mul, operands)
    }

    pub fn div(operands: &[i64]) -> Result<i64, ActionError> {
        binary(BinaryOp::Div, operands)
    }

    fn binary(op: BinaryOp, operands: &[i64]) -> Result<i64, ActionError> {
        let [lhs, rhs] = expect_operands(op.name(), operands)?;
        op.apply(lhs, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            builtin::add(&[1]),
            Err(ActionError::TooFewOperands {
                action: "addition",
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            builtin::assign(&[1, 2]),
            Err(ActionError::TooManyOperands {
                action: "assignment",
                expected: 1,
                found: 2
            })
        );
        assert!(builtin::emit(&[]).is_err());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(builtin::add(&[1, 2]), Ok(3));
        assert_eq!(builtin::sub(&[1, 2]), Ok(-1));
        assert_eq!(builtin::mul(&[4, -2]), Ok(-8));
        assert_eq!(builtin::div(&[7, 2]), Ok(3));
        assert_eq!(builtin::div(&[-7, 2]), Ok(-3));
        assert_eq!(builtin::negate(&[5]), Ok(-5));
        assert_eq!(builtin::div(&[1, 0]), Err(ActionError::DivisionByZero));
        assert!(matches!(
            builtin::mul(&[i64::MAX, 2]),
            Err(ActionError::Overflow { .. })
        ));
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = ActionRegistry::new();
        registry.register(0u16, builtin::assign).unwrap();
        assert!(matches!(
            registry.register(0u16, builtin::emit),
            Err(RegistryError::Duplicate { .. })
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).map(|f| f(&[42])), Some(Ok(42)));
    }
}
