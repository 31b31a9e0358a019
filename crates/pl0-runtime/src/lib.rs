//! Runtime implementation of the attributed LL(1) parser used by `pl0`.

pub mod action;
pub mod definition;
pub mod engine;

pub use crate::{
    action::{ActionError, ActionRegistry, BinaryOp, RegistryError},
    definition::{ParseTable, Prediction, Symbol, TokenValue},
    engine::{ErrorKind, ParseEngine, ParseError, Token},
};
