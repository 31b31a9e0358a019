//! Local optimization of a basic block of quadruples via DAG construction.
//!
//! The block is turned into a DAG in which identical computations share a
//! node (common subexpressions) and computations over constants are folded.
//! The DAG is then written back as quadruples in the order the nodes were
//! first assigned.

use crate::{quad::Quadruple, types::Map};
use bit_vec::BitVec;
use pl0_runtime::action::{ActionError, BinaryOp};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeID(usize);

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    /// A literal integer, or the result of folding.
    Constant(i64),
    /// The initial value of an identifier on entry to the block.
    Identifier(String),
    /// An operator applied to two nodes.
    Operator {
        op: String,
        left: NodeID,
        right: NodeID,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    /// The identifiers currently holding the value of this node.
    pub names: Vec<String>,
    pub value: NodeValue,
    /// The source text of a literal, kept so that it is emitted unchanged.
    literal: Option<String>,
}

impl Node {
    pub fn constant(&self) -> Option<i64> {
        match self.value {
            NodeValue::Constant(n) => Some(n),
            _ => None,
        }
    }

    fn repr(&self) -> String {
        match &self.value {
            NodeValue::Constant(n) => self.literal.clone().unwrap_or_else(|| n.to_string()),
            NodeValue::Identifier(name) => name.clone(),
            NodeValue::Operator { op, .. } => op.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("quadruple #{index} ({quad}): cannot fold constants: {source}")]
    Fold {
        index: usize,
        quad: Quadruple,
        #[source]
        source: ActionError,
    },

    #[error("quadruple #{index} ({quad}): {reason}")]
    Malformed {
        index: usize,
        quad: Quadruple,
        reason: &'static str,
    },
}

/// The DAG of a basic block.
#[derive(Debug, Default)]
pub struct Dag {
    nodes: Vec<Node>,
    /// The node currently bound to each identifier.
    bindings: Map<String, NodeID>,
    constants: Map<i64, NodeID>,
    operators: Map<(String, NodeID, NodeID), NodeID>,
    /// The nodes in the order they were first assigned to a result.
    order: Vec<NodeID>,
}

impl Dag {
    /// Build the DAG of the specified quadruples.
    pub fn build(quads: &[Quadruple]) -> Result<Self, OptimizeError> {
        let mut dag = Self::default();
        for (index, quad) in quads.iter().enumerate() {
            dag.add(index, quad)?;
        }
        Ok(dag)
    }

    pub fn node(&self, id: NodeID) -> &Node {
        &self.nodes[id.0]
    }

    /// Return the node that currently holds the value of the identifier.
    pub fn lookup(&self, name: &str) -> Option<NodeID> {
        self.bindings.get(name).copied()
    }

    fn add(&mut self, index: usize, quad: &Quadruple) -> Result<(), OptimizeError> {
        let malformed = |reason| OptimizeError::Malformed {
            index,
            quad: quad.clone(),
            reason,
        };

        if quad.op.is_empty() {
            return Err(malformed("missing operator"));
        }
        if quad.operand1.is_empty() {
            return Err(malformed("missing first operand"));
        }
        if quad.result.is_empty() {
            return Err(malformed("missing result"));
        }
        if parse_literal(&quad.result).is_some() {
            return Err(malformed("a literal cannot be assigned"));
        }

        let node = if quad.operand2.is_empty() {
            if quad.op != "=" {
                return Err(malformed("unary operators are not supported"));
            }
            let (source, fresh) = self.operand(&quad.operand1);
            if fresh {
                // `T := a` reads `a` without renaming it.
                self.nodes[source.0].names.clear();
            }
            source
        } else {
            if quad.op == "=" {
                return Err(malformed("a copy takes one operand"));
            }
            let (left, _) = self.operand(&quad.operand1);
            let (right, _) = self.operand(&quad.operand2);
            let op = BinaryOp::from_symbol(&quad.op);
            match (op, self.node(left).constant(), self.node(right).constant()) {
                (Some(op), Some(lhs), Some(rhs)) => {
                    let value = op.apply(lhs, rhs).map_err(|source| OptimizeError::Fold {
                        index,
                        quad: quad.clone(),
                        source,
                    })?;
                    tracing::debug!("fold {} {} {} = {}", lhs, op, rhs, value);
                    self.constant(value, None)
                }
                _ => self.operator(&quad.op, left, right),
            }
        };

        self.assign(&quad.result, node);
        Ok(())
    }

    /// Resolve an operand to a node, creating a leaf if needed.
    ///
    /// The flag reports whether a new identifier leaf has been created.
    fn operand(&mut self, text: &str) -> (NodeID, bool) {
        if let Some(id) = self.lookup(text) {
            return (id, false);
        }
        if let Some(value) = parse_literal(text) {
            return (self.constant(value, Some(text)), false);
        }
        let id = self.push(Node {
            names: vec![text.to_owned()],
            value: NodeValue::Identifier(text.to_owned()),
            literal: None,
        });
        self.bindings.insert(text.to_owned(), id);
        (id, true)
    }

    fn constant(&mut self, value: i64, literal: Option<&str>) -> NodeID {
        if let Some(id) = self.constants.get(&value) {
            return *id;
        }
        let id = self.push(Node {
            names: vec![],
            value: NodeValue::Constant(value),
            literal: literal.map(ToOwned::to_owned),
        });
        self.constants.insert(value, id);
        id
    }

    fn operator(&mut self, op: &str, left: NodeID, right: NodeID) -> NodeID {
        let key = (op.to_owned(), left, right);
        if let Some(id) = self.operators.get(&key) {
            tracing::debug!("reuse {} for {} {} {}", id, left, op, right);
            return *id;
        }
        let id = self.push(Node {
            names: vec![],
            value: NodeValue::Operator {
                op: op.to_owned(),
                left,
                right,
            },
            literal: None,
        });
        self.operators.insert(key, id);
        id
    }

    fn push(&mut self, node: Node) -> NodeID {
        let id = NodeID(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Bind the identifier to the node, unbinding it from its previous node.
    fn assign(&mut self, name: &str, node: NodeID) {
        if let Some(old) = self.bindings.get(name).copied() {
            self.nodes[old.0].names.retain(|n| n != name);
        }
        self.nodes[node.0].names.push(name.to_owned());
        self.bindings.insert(name.to_owned(), node);
        if !self.order.contains(&node) {
            self.order.push(node);
        }
    }

    /// Write the DAG back as quadruples.
    ///
    /// An identifier leaf whose name is rebound later in the block is copied
    /// into a snapshot at the top of the block, and every read of the leaf
    /// goes through the snapshot.
    pub fn linearize(&self) -> Vec<Quadruple> {
        let mut needed = BitVec::from_elem(self.nodes.len(), false);
        for id in self.order.iter().rev() {
            let node = self.node(*id);
            if node.names.is_empty() && !needed[id.0] {
                continue;
            }
            if let NodeValue::Operator { left, right, .. } = node.value {
                needed.set(left.0, true);
                needed.set(right.0, true);
            }
        }

        let mut quads = vec![];

        // Names given to the nodes that have no surviving name of their own.
        let mut synthetic: Map<NodeID, String> = Map::default();
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeID(i);
            match &node.value {
                NodeValue::Identifier(name) => {
                    let read = needed[i] || !node.names.is_empty();
                    if !read || self.lookup(name) == Some(id) {
                        continue;
                    }
                    let snapshot = match node.names.first() {
                        Some(first) if !self.is_initially_read(first) => first.clone(),
                        _ => self.fresh_name(id),
                    };
                    tracing::debug!("snapshot {} as {}", name, snapshot);
                    quads.push(Quadruple::copy(name, &snapshot));
                    synthetic.insert(id, snapshot);
                }
                NodeValue::Operator { .. } if node.names.is_empty() && needed[i] => {
                    synthetic.insert(id, self.fresh_name(id));
                }
                _ => (),
            }
        }

        let name_of = |id: NodeID| -> String {
            if let Some(name) = synthetic.get(&id) {
                return name.clone();
            }
            let node = self.node(id);
            match &node.value {
                NodeValue::Operator { .. } => node.names.first().cloned().unwrap_or_else(|| id.to_string()),
                _ => node.repr(),
            }
        };

        for id in &self.order {
            let node = self.node(*id);
            let first = match &node.value {
                NodeValue::Operator { op, left, right } => {
                    let first = match node.names.first() {
                        Some(name) => name.clone(),
                        None => match synthetic.get(id) {
                            Some(name) => name.clone(),
                            None => continue,
                        },
                    };
                    quads.push(Quadruple::new(op, name_of(*left), name_of(*right), &first));
                    first
                }
                _ => {
                    let Some(first) = node.names.first() else {
                        continue;
                    };
                    let source = name_of(*id);
                    if source != *first {
                        quads.push(Quadruple::copy(source, first));
                    }
                    first.clone()
                }
            };

            for name in node.names.iter().skip(1) {
                quads.push(Quadruple::copy(&first, name));
            }
        }

        quads
    }

    /// Whether the initial value of the identifier is read in the block.
    fn is_initially_read(&self, name: &str) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(&node.value, NodeValue::Identifier(n) if n == name))
    }

    /// A name of the form `$n` not used anywhere in the block.
    fn fresh_name(&self, id: NodeID) -> String {
        let mut name = id.to_string();
        while self.bindings.contains_key(&name) {
            name.push('\'');
        }
        name
    }
}

/// The optimizer of basic blocks.
#[derive(Debug, Default)]
pub struct Optimizer;

impl Optimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(&self, quads: &[Quadruple]) -> Result<Vec<Quadruple>, OptimizeError> {
        let span = tracing::debug_span!("optimize");
        let _entered = span.enter();

        let dag = Dag::build(quads)?;
        let optimized = dag.linearize();
        tracing::debug!("{} quadruples -> {}", quads.len(), optimized.len());
        Ok(optimized)
    }
}

fn parse_literal(s: &str) -> Option<i64> {
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::{self, Quadruple as Q};

    fn optimize(source: &str) -> Vec<Quadruple> {
        let quads = quad::parse(source).unwrap();
        Optimizer::new().optimize(&quads).unwrap()
    }

    #[test]
    fn common_subexpression() {
        assert_eq!(
            optimize("+,a,b,T1\n+,a,b,T2\n"),
            [Q::new("+", "a", "b", "T1"), Q::copy("T1", "T2")]
        );
    }

    #[test]
    fn operand_order_matters() {
        assert_eq!(
            optimize("+,a,b,T1\n+,b,a,T2\n"),
            [Q::new("+", "a", "b", "T1"), Q::new("+", "b", "a", "T2")]
        );
    }

    #[test]
    fn constant_folding() {
        assert_eq!(optimize("+,2,3,T1\n"), [Q::copy("5", "T1")]);
        assert_eq!(
            optimize("*,2,3,T1\n-,T1,1,T2\n+,a,T2,T3\n"),
            [Q::copy("6", "T1"), Q::copy("5", "T2"), Q::new("+", "a", "5", "T3")]
        );
    }

    #[test]
    fn folded_constants_are_shared() {
        assert_eq!(
            optimize("=,5,,T1\n+,2,3,T2\n"),
            [Q::copy("5", "T1"), Q::copy("T1", "T2")]
        );
    }

    #[test]
    fn redefinition() {
        assert_eq!(
            optimize("=,3,,T1\n+,a,T1,T2\n=,4,,T1\n"),
            [Q::new("+", "a", "3", "T2"), Q::copy("4", "T1")]
        );
    }

    #[test]
    fn copies() {
        assert_eq!(optimize("=,a,,T1\n"), [Q::copy("a", "T1")]);
        assert_eq!(
            optimize("+,a,b,T1\n=,a,,T2\n"),
            [Q::new("+", "a", "b", "T1"), Q::copy("a", "T2")]
        );
    }

    #[test]
    fn renamed_node_keeps_its_value() {
        assert_eq!(
            optimize("+,a,b,T1\n*,T1,c,T2\n=,5,,T1\n"),
            [
                Q::new("+", "a", "b", "$2"),
                Q::new("*", "$2", "c", "T2"),
                Q::copy("5", "T1"),
            ]
        );
    }

    #[test]
    fn identifier_rebound_through_shared_constant() {
        // `a` is read before it takes the value of an older node.
        assert_eq!(
            optimize("=,9,,x\n+,a,b,T1\n=,9,,a\n"),
            [
                Q::copy("a", "$1"),
                Q::copy("9", "x"),
                Q::copy("x", "a"),
                Q::new("+", "$1", "b", "T1"),
            ]
        );
    }

    #[test]
    fn identifier_updated_in_place() {
        assert_eq!(
            optimize("+,i,1,i\n"),
            [Q::copy("i", "$0"), Q::new("+", "$0", "1", "i")]
        );
    }

    #[test]
    fn copy_of_rebound_identifier() {
        // `T1` holds the initial value of `a` and is hoisted above the write to `a`.
        assert_eq!(
            optimize("=,a,,T1\n=,4,,x\n=,4,,a\n+,T1,x,T2\n"),
            [
                Q::copy("a", "T1"),
                Q::copy("4", "x"),
                Q::copy("x", "a"),
                Q::new("+", "T1", "4", "T2"),
            ]
        );
    }

    #[test]
    fn opaque_operators() {
        assert_eq!(optimize("%,7,2,T1\n"), [Q::new("%", "7", "2", "T1")]);
    }

    #[test]
    fn idempotent() {
        let sources = [
            "+,a,b,T1\n+,a,b,T2\n",
            "+,2,3,T1\n",
            "=,3,,T1\n+,a,T1,T2\n=,4,,T1\n",
            "*,a,b,T1\n+,T1,c,T2\n*,a,b,T3\n-,T3,T2,T4\n=,T4,,x\n",
            "=,a,,T1\n+,T1,1,T2\n",
            "=,9,,x\n+,a,b,T1\n=,9,,a\n",
            "+,i,1,i\n",
        ];
        for source in sources {
            let once = optimize(source);
            let twice = Optimizer::new().optimize(&once).unwrap();
            assert_eq!(once, twice, "{}", source);
        }
    }

    #[test]
    fn errors() {
        let optimizer = Optimizer::new();
        assert!(matches!(
            optimizer.optimize(&[Q::new("/", "1", "0", "T1")]),
            Err(OptimizeError::Fold { index: 0, .. })
        ));
        assert!(matches!(
            optimizer.optimize(&[Q::new("+", "a", "b", "3")]),
            Err(OptimizeError::Malformed { .. })
        ));
        assert!(matches!(
            optimizer.optimize(&[Q::new("-", "a", "", "T1")]),
            Err(OptimizeError::Malformed { .. })
        ));
        assert!(matches!(
            optimizer.optimize(&[Q::new("=", "a", "b", "T1")]),
            Err(OptimizeError::Malformed { .. })
        ));
        assert!(matches!(
            optimizer.optimize(&[Q::new("", "a", "b", "T1")]),
            Err(OptimizeError::Malformed { .. })
        ));
        assert!(matches!(
            optimizer.optimize(&[Q::new("+", "a", "b", "")]),
            Err(OptimizeError::Malformed { .. })
        ));
    }
}
