//! Semantic-analysis core for Sable.
//!
//! Consumes a parsed AST (`sable-ast`) and, in one coordinated pass, resolves
//! every name to a symbol-table slot, assigns a static type to every
//! expression, validates declarations (accessors, constructors, interfaces,
//! overrides), folds literal arithmetic across the four numeric
//! representations, and tracks reaching definitions for uninitialized-use
//! detection. Diagnostics accumulate; nothing user-facing is thrown.

pub mod bitset;
pub mod errors;
pub mod eval;
pub mod flow;
pub mod reference;
pub mod scope;
pub mod slot;
pub mod types;
pub mod value;

pub use errors::{SemanticError, SemanticWarning, TypeError, TypeWarning};
pub use eval::{Analysis, Evaluator, SessionOptions};
pub use flow::{BlockId, DefId, FlowGraph};
pub use reference::{Binding, Reference, Resolution};
pub use scope::{AccessKind, BuilderKind, Namespace, ScopeId, SymbolTable};
pub use slot::{CallSequence, MethodId, ParamStyle, Slot, SlotId, SlotShape};
pub use types::{Nullability, TypeId, TypeInfo, TypeRegistry};
pub use value::{NumericUsage, Value};
