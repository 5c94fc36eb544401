//! Per-architecture formula tables.

pub mod builder;
pub mod symbols;

pub use builder::{build_table, locate_hint, BuiltTable};
pub use symbols::SymbolTable;
