//! Semantic diagnostics (E3xxx).
//!
//! User-facing errors are values accumulated against the evaluation; they
//! never unwind the tree walk. Internal invariant violations (unrecognized
//! operator tokens, slot-index contract breaks) are panics, not diagnostics:
//! they indicate a defect in an earlier pass.

use miette::{Diagnostic, SourceSpan};
use sable_ast::Span;
use thiserror::Error;

/// Convert an AST span into a miette source span for labels
pub(crate) fn label(span: Span) -> SourceSpan {
    (span.start, span.len()).into()
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum SemanticError {
    // Resolution errors
    #[error("access of possibly undefined property '{name}'")]
    #[diagnostic(code(E3001))]
    UndefinedProperty {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("attempted access of inaccessible property '{name}'")]
    #[diagnostic(code(E3002), help("the property exists but is not visible here"))]
    InaccessibleProperty {
        name: String,
        #[label("cannot be accessed")]
        span: SourceSpan,
    },

    #[error("ambiguous reference to '{name}'")]
    #[diagnostic(code(E3003))]
    AmbiguousReference {
        name: String,
        #[label("found in more than one open namespace")]
        span: SourceSpan,
    },

    #[error("type '{name}' was not found or was not a compile-time constant")]
    #[diagnostic(code(E3004))]
    UnknownType {
        name: String,
        #[label("unknown type")]
        span: SourceSpan,
    },

    #[error("could not find '{name}' in package '{package}'")]
    #[diagnostic(code(E3005))]
    UnfoundPackageProperty {
        name: String,
        package: String,
        #[label("not found")]
        span: SourceSpan,
    },

    #[error("circular type reference involving '{name}'")]
    #[diagnostic(code(E3006))]
    CircularInheritance {
        name: String,
        #[label("cycle in base classes")]
        span: SourceSpan,
    },

    // Type errors
    #[error("comparison between unrelated types {lhs} and {rhs}")]
    #[diagnostic(code(E3010))]
    IncompatibleComparison {
        lhs: String,
        rhs: String,
        #[label("operands can never be equal")]
        span: SourceSpan,
    },

    #[error("cannot compare {ty} with null")]
    #[diagnostic(code(E3011), help("only nullable and reference types may be compared to null"))]
    NullComparison {
        ty: String,
        #[label("non-nullable operand")]
        span: SourceSpan,
    },

    #[error("incompatible default value of type {found} where {expected} is expected")]
    #[diagnostic(code(E3012))]
    IncompatibleDefaultValue {
        expected: String,
        found: String,
        #[label("incompatible default")]
        span: SourceSpan,
    },

    #[error("the return type of an overriding method must match the overridden method")]
    #[diagnostic(code(E3013))]
    IncompatibleOverride {
        name: String,
        #[label("incompatible override")]
        span: SourceSpan,
    },

    #[error("interface method '{name}' in interface {interface} is implemented with an incompatible signature")]
    #[diagnostic(code(E3014))]
    IncompatibleInterfaceMethod {
        name: String,
        interface: String,
        #[label("incompatible implementation")]
        span: SourceSpan,
    },

    #[error("interface method '{name}' in interface {interface} not implemented")]
    #[diagnostic(code(E3015))]
    UnknownInterfaceMethod {
        name: String,
        interface: String,
        #[label("missing implementation")]
        span: SourceSpan,
    },

    #[error("accessor types for '{name}' must match: getter is {getter}, setter takes {setter}")]
    #[diagnostic(code(E3016))]
    AccessorTypeMismatch {
        name: String,
        getter: String,
        setter: String,
        #[label("mismatched accessor pair")]
        span: SourceSpan,
    },

    #[error("literal {value} does not fit in type {target} without loss")]
    #[diagnostic(code(E3017))]
    LossyConversion {
        value: String,
        target: String,
        #[label("lossy conversion")]
        span: SourceSpan,
    },

    #[error("cannot convert {found} to {expected}")]
    #[diagnostic(code(E3018))]
    CoercionFailure {
        expected: String,
        found: String,
        #[label("no implicit conversion")]
        span: SourceSpan,
    },

    // Declaration-shape errors
    #[error("a setter for '{name}' must take exactly one parameter and declare no return type")]
    #[diagnostic(code(E3020))]
    InvalidSetterSignature {
        name: String,
        #[label("malformed setter")]
        span: SourceSpan,
    },

    #[error("a getter for '{name}' must take no parameters and return a value")]
    #[diagnostic(code(E3021))]
    InvalidGetterSignature {
        name: String,
        #[label("malformed getter")]
        span: SourceSpan,
    },

    #[error("function '{name}' must return a value")]
    #[diagnostic(code(E3022))]
    MustReturnValue {
        name: String,
        #[label("control may reach the end without returning")]
        span: SourceSpan,
    },

    #[error("a function declared void may not return a value")]
    #[diagnostic(code(E3023))]
    VoidReturnValue {
        #[label("value returned from void function")]
        span: SourceSpan,
    },

    #[error("cannot assign to constant '{name}' after initialization")]
    #[diagnostic(code(E3024))]
    AssignToConst {
        name: String,
        #[label("constant already initialized")]
        span: SourceSpan,
    },

    #[error("property '{name}' is read-only")]
    #[diagnostic(code(E3025), help("a getter exists but no matching setter is visible"))]
    AssignToReadOnly {
        name: String,
        #[label("no setter")]
        span: SourceSpan,
    },

    #[error("no default constructor found in base class {base}")]
    #[diagnostic(
        code(E3026),
        help("the base constructor takes arguments; declare a constructor with an explicit super call")
    )]
    NoDefaultBaseConstructor {
        base: String,
        #[label("base requires constructor arguments")]
        span: SourceSpan,
    },

    #[error("cannot override a final method '{name}'")]
    #[diagnostic(code(E3027))]
    OverrideFinal {
        name: String,
        #[label("base method is final")]
        span: SourceSpan,
    },

    #[error("method '{name}' marked override must override another method")]
    #[diagnostic(code(E3028))]
    OverrideMissing {
        name: String,
        #[label("no base method to override")]
        span: SourceSpan,
    },

    // Arity errors
    #[error("incorrect number of arguments: expected {expected}, found {found}")]
    #[diagnostic(code(E3030))]
    WrongArgumentCount {
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("too many arguments: expected no more than {expected}, found {found}")]
    #[diagnostic(code(E3031))]
    TooManyArguments {
        expected: usize,
        found: usize,
        #[label("extra arguments")]
        span: SourceSpan,
    },

    #[error("value of type {found} is not callable")]
    #[diagnostic(code(E3032))]
    NotCallable {
        found: String,
        #[label("cannot be called")]
        span: SourceSpan,
    },

    // Version errors
    #[error("'{name}' requires language version {required} but the target is {target}")]
    #[diagnostic(code(E3040))]
    VersionMismatch {
        name: String,
        required: u32,
        target: u32,
        #[label("unavailable at the target version")]
        span: SourceSpan,
    },

    #[error("'this' cannot be used in this context")]
    #[diagnostic(code(E3041))]
    ThisInIllegalContext {
        #[label("no 'this' binding here")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum SemanticWarning {
    #[error("variable '{name}' may be used before it is initialized")]
    #[diagnostic(code(W3001))]
    UsedBeforeInit {
        name: String,
        #[label("no definition reaches this use")]
        span: SourceSpan,
    },
}

/// A positioned semantic error as accumulated by the evaluator
#[derive(Debug, Clone)]
pub struct TypeError {
    pub error: SemanticError,
    pub span: Span,
}

impl TypeError {
    pub fn new(error: SemanticError, span: Span) -> Self {
        Self { error, span }
    }
}

/// A positioned semantic warning
#[derive(Debug, Clone)]
pub struct TypeWarning {
    pub warning: SemanticWarning,
    pub span: Span,
}

impl TypeWarning {
    pub fn new(warning: SemanticWarning, span: Span) -> Self {
        Self { warning, span }
    }
}
