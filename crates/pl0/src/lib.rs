//! A front end for the arithmetic subset of PL/0.
//!
//! * grammar analysis (FIRST, FOLLOW and SELECT sets) and LL(1) prediction tables,
//! * evaluation of expressions by an attributed table-driven parser,
//! * local optimization of quadruples by DAG construction.

pub mod analysis;
pub mod expr;
pub mod grammar;
pub mod lexer;
pub mod optimizer;
pub mod quad;
pub mod recursive;
pub mod syntax;
pub mod table;
pub mod types;
pub mod util;
