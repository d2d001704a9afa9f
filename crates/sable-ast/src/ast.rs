use crate::Span;

/// Unique identifier for symbols (interned strings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub u32);

/// Unique identifier for AST nodes (expressions, statements, declarations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Hands out fresh NodeIds. The parser owns one while building a program;
/// transforms that synthesize nodes continue from `Program::next_node_id`.
#[derive(Debug, Default)]
pub struct NodeIdGen(u32);

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u32) -> Self {
        Self(next)
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }

    pub fn next_raw(&self) -> u32 {
        self.0
    }
}

/// A complete compilation unit: declarations plus top-level statements
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub stmts: Vec<Stmt>,
    /// One past the highest NodeId used (for transforms that add nodes)
    pub next_node_id: u32,
}

/// Dotted type path, e.g. `flash.display.Sprite` or `Vector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePath {
    pub segments: Vec<Symbol>,
    pub span: Span,
}

/// Type annotation surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// The unconstrained `*` annotation
    Any,
    Void,
    Name(TypePath),
    /// Parameterized application, e.g. `Vector.<int>`
    Applied {
        base: TypePath,
        args: Vec<TypeExpr>,
    },
    /// Explicit `T?`
    Nullable(Box<TypeExpr>),
    /// Explicit `T!`
    NonNullable(Box<TypeExpr>),
}

/// Member visibility as written; the semantic pass maps these onto
/// namespace values owned by the declaring class/package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
    Protected,
    Private,
    /// A user-declared namespace
    Namespace(Symbol),
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Internal
    }
}

/// Attributes shared by class members and top-level declarations
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberAttrs {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_override: bool,
    /// Minimum language version required to see this member, if gated
    pub min_version: Option<u32>,
}

/// Top-level declarations
#[derive(Debug, Clone)]
pub enum Decl {
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Function(FuncDecl),
    Var(VarDecl),
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Symbol,
    pub extends: Option<TypePath>,
    pub implements: Vec<TypePath>,
    pub members: Vec<ClassMember>,
    pub is_dynamic: bool,
    pub is_final: bool,
    pub attrs: MemberAttrs,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: Symbol,
    pub extends: Vec<TypePath>,
    /// Signatures only; bodies are absent
    pub members: Vec<FuncDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Var(VarDecl),
    Function(FuncDecl),
}

/// What flavor of callable a FuncDecl declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Function,
    Getter,
    Setter,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub kind: FuncKind,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeExpr>,
    /// None for interface signatures and native declarations
    pub body: Option<Block>,
    pub attrs: MemberAttrs,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub name: Symbol,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub is_rest: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: Symbol,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub is_const: bool,
    pub attrs: MemberAttrs,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// Numeric representation requested by a `use` pragma or literal suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericUsage {
    Int,
    Uint,
    Double,
    Decimal,
    /// No pragma in effect: operand types select the representation
    Natural,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    If {
        cond: Expr,
        then: Block,
        otherwise: Option<Block>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Throw {
        value: Expr,
        span: Span,
    },
    Block(Block),
    /// `with (obj) { ... }` dynamic scope
    With {
        object: Expr,
        body: Block,
        span: Span,
    },
    /// `use int` / `use decimal` pragma, effective to end of enclosing block
    UseNumeric {
        usage: NumericUsage,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span,
            Stmt::Var(v) => v.span,
            Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::With { span, .. }
            | Stmt::UseNumeric { span, .. } => *span,
            Stmt::Block(b) => b
                .stmts
                .first()
                .map(|s| s.span())
                .unwrap_or_default(),
        }
    }
}

/// Suffix on a numeric literal selecting its representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSuffix {
    None,
    Int,
    Uint,
    Double,
    Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::UShr
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Numeric literal kept as source text; the evaluator parses it under
    /// the active numeric representation
    Number {
        text: String,
        suffix: NumberSuffix,
    },
    Str(String),
    Bool(bool),
    Null,
    This,
    Ident(Symbol),
    /// Namespace-qualified identifier, `ns::name`
    Qualified {
        qualifier: Symbol,
        name: Symbol,
    },
    Member {
        base: Box<Expr>,
        name: Symbol,
    },
    /// Bracket access; always dynamic
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Generic application used as an expression, e.g. `Vector.<int>`
    ApplyType {
        base: Box<Expr>,
        args: Vec<TypeExpr>,
    },
    /// Function expression; anonymous unless the parser supplies a name
    Function(Box<FuncDecl>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        /// Some for compound assignment (`+=` etc.)
        op: Option<BinaryOp>,
    },
}
