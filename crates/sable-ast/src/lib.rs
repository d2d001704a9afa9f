//! Parser-boundary data for the Sable semantic pass.
//!
//! The semantic core consumes an already-built AST; this crate defines that
//! AST (closed enums per node category), source spans, and the string
//! interner that maps identifier text to `Symbol` handles.

pub mod ast;
pub mod intern;
pub mod span;

pub use ast::*;
pub use intern::Interner;
pub use span::Span;
