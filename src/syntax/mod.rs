//! Reference front end: lexer and parser for the declarative configuration language.

pub mod lexer;
pub mod parser;

pub use parser::{parse, parse_nodes, parse_value};
