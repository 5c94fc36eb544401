//! Formula language: tokens, tree, resolution and checks.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod simplify;
pub mod validate;

pub use ast::{BinOp, EventRef, Expr, Sigil, Symbol};
pub use parser::parse_formula;
pub use resolver::{with_companion_slots, Resolver};
pub use simplify::simplify;
pub use validate::unresolved_tokens;
