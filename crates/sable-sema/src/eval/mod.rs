//! The evaluator: one coordinated walk over a parsed program.
//!
//! Analysis runs in three phases. First every class and interface name is
//! registered so forward references resolve. Second, declarations are
//! visited: bases and interfaces are linked, member slots are declared
//! (statics before instance members), signatures are validated, and method
//! bodies are queued. Third, queued bodies and top-level statements are
//! walked: every expression gets a static type, constants fold, reads are
//! checked against reaching definitions, and diagnostics accumulate.
//!
//! Nothing user-facing panics. A panic in this module means an upstream
//! pass broke an invariant, not that the input program is wrong.

mod decl;
mod expr;
mod fold;
mod interface;
mod stmt;
#[cfg(test)]
mod tests;

use crate::errors::{SemanticError, SemanticWarning, TypeError, TypeWarning, label};
use crate::flow::{BlockId, FlowGraph};
use crate::reference::Binding;
use crate::scope::{BuilderKind, Namespace, ScopeId, SymbolTable};
use crate::slot::SlotId;
use crate::types::{Nullability, TypeId, TypeInfo, TypeRegistry};
use crate::value::{NumericUsage, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use sable_ast::{
    BinaryOp, FuncDecl, Interner, NodeId, Program, Span, Symbol, TypePath, UnaryOp, Visibility,
};
use smallvec::SmallVec;

/// Knobs for one analysis session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Language version the program targets; bindings gated above it are
    /// reported as unavailable
    pub target_version: u32,
    /// Numeric representation in effect at the top level (overridable per
    /// block by `use` pragmas)
    pub numeric_usage: NumericUsage,
    /// Strict mode: report reads of properties that cannot be resolved.
    /// When off, unresolved reads silently type as the any type.
    pub static_semantics: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target_version: u32::MAX,
            numeric_usage: NumericUsage::Natural,
            static_semantics: true,
        }
    }
}

/// What `this` means at the current point of the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThisContext {
    /// Instance method or constructor of the given class
    Instance(TypeId),
    /// Top level and global functions: the global object
    Global,
    /// Function expressions: the receiver is whatever object the function
    /// ends up attached to
    AnonymousFunction,
    /// Static methods: no receiver
    Illegal,
}

/// A method body queued during the declaration phase, with enough captured
/// context to re-enter its scope chain later
struct DeferredBody<'a> {
    func: &'a FuncDecl,
    chain: Vec<ScopeId>,
    this_ctx: ThisContext,
    class: Option<TypeId>,
    slot: SlotId,
    activation: ScopeId,
    param_slots: Vec<SlotId>,
}

/// Everything the analysis produced, keyed by AST node or slot
#[derive(Debug, Default)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub types: TypeRegistry,
    /// Static type assigned to each expression
    pub expr_types: FxHashMap<NodeId, TypeInfo>,
    /// Folded compile-time constants
    pub constants: FxHashMap<NodeId, Value>,
    /// Resolved name bindings (identifier, member and assignment targets)
    pub bindings: FxHashMap<NodeId, Binding>,
    /// Implicit conversions a code generator must materialize
    pub coercions: FxHashMap<NodeId, TypeInfo>,
    /// Dispatched callee slot per call site
    pub call_slots: FxHashMap<NodeId, SlotId>,
    /// Slot declared by each variable declaration node
    pub var_slots: FxHashMap<NodeId, SlotId>,
    /// Locals some use of which no definition reaches; code generation must
    /// default-initialize these at entry
    pub needs_default_init: FxHashSet<SlotId>,
    pub errors: Vec<TypeError>,
    pub warnings: Vec<TypeWarning>,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct Evaluator<'a> {
    interner: &'a Interner,
    options: SessionOptions,
    types: TypeRegistry,
    symbols: SymbolTable,
    /// Scope holding intrinsic operator slots; never name-searched
    builtins: ScopeId,
    global: ScopeId,
    /// Lexical scope chain, innermost last
    chain: Vec<ScopeId>,
    /// Scopes below this chain index are shadowed by an enclosing `with`
    lowest_searchable: usize,
    this_stack: Vec<ThisContext>,
    /// Numeric representation currently in effect
    usage: NumericUsage,
    /// Declared return type of the function being walked
    return_ty: Option<TypeInfo>,
    current_class: Option<TypeId>,
    current_function: Option<Symbol>,
    with_depth: usize,
    /// Reaching-definition graph for the body being walked
    flow: Option<FlowGraph>,
    /// The activation (or global) scope the current graph covers
    flow_domain: Option<ScopeId>,
    deferred: Vec<DeferredBody<'a>>,
    /// Constructor slot per declared class; None means the implicit
    /// zero-argument constructor
    ctor_slots: FxHashMap<TypeId, Option<SlotId>>,
    binary_ops: FxHashMap<BinaryOp, SlotId>,
    unary_ops: FxHashMap<UnaryOp, SlotId>,
    /// Const slots whose single permitted assignment has happened
    initialized_consts: FxHashSet<SlotId>,
    /// Declaration span per slot, for diagnostics raised away from the
    /// declaration site
    slot_spans: FxHashMap<SlotId, Span>,
    expr_types: FxHashMap<NodeId, TypeInfo>,
    constants: FxHashMap<NodeId, Value>,
    bindings: FxHashMap<NodeId, Binding>,
    coercions: FxHashMap<NodeId, TypeInfo>,
    call_slots: FxHashMap<NodeId, SlotId>,
    var_slots: FxHashMap<NodeId, SlotId>,
    needs_default_init: FxHashSet<SlotId>,
    errors: Vec<TypeError>,
    warnings: Vec<TypeWarning>,
}

impl<'a> Evaluator<'a> {
    pub fn new(interner: &'a Interner, options: SessionOptions) -> Self {
        let types = TypeRegistry::new();
        let mut symbols = SymbolTable::new();
        let builtins = symbols.new_scope(BuilderKind::Global);
        let global = symbols.new_scope(BuilderKind::Global);
        let usage = options.numeric_usage;
        let mut ev = Self {
            interner,
            options,
            types,
            symbols,
            builtins,
            global,
            chain: vec![global],
            lowest_searchable: 0,
            this_stack: Vec::new(),
            usage,
            return_ty: None,
            current_class: None,
            current_function: None,
            with_depth: 0,
            flow: None,
            flow_domain: None,
            deferred: Vec::new(),
            ctor_slots: FxHashMap::default(),
            binary_ops: FxHashMap::default(),
            unary_ops: FxHashMap::default(),
            initialized_consts: FxHashSet::default(),
            slot_spans: FxHashMap::default(),
            expr_types: FxHashMap::default(),
            constants: FxHashMap::default(),
            bindings: FxHashMap::default(),
            coercions: FxHashMap::default(),
            call_slots: FxHashMap::default(),
            var_slots: FxHashMap::default(),
            needs_default_init: FxHashSet::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        ev.seed_operators();
        ev
    }

    /// Run the full analysis and hand back everything it produced
    #[tracing::instrument(skip_all)]
    pub fn analyze(mut self, program: &'a Program) -> Analysis {
        self.declare_shells(program);
        self.declare_signatures(program);
        self.check_classes(program);
        self.evaluate_bodies(program);

        Analysis {
            symbols: self.symbols,
            types: self.types,
            expr_types: self.expr_types,
            constants: self.constants,
            bindings: self.bindings,
            coercions: self.coercions,
            call_slots: self.call_slots,
            var_slots: self.var_slots,
            needs_default_init: self.needs_default_init,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Intrinsic operator slots: a generic slot per operator plus
    /// per-representation specializations in its dispatch table. Code
    /// generation reads the dispatched slot off each operator node.
    fn seed_operators(&mut self) {
        use BinaryOp::*;
        let numerics = [TypeId::INT, TypeId::UINT, TypeId::DOUBLE, TypeId::DECIMAL];
        for op in [Add, Sub, Mul, Div, Rem] {
            let generic = self.symbols.declare_operator(
                self.builtins,
                &[TypeId::ANY, TypeId::ANY],
                TypeInfo::of(TypeId::ANY),
                None,
            );
            for t in numerics {
                self.symbols.declare_operator(
                    self.builtins,
                    &[t, t],
                    TypeInfo::of(t),
                    Some(generic),
                );
            }
            if op == Add {
                self.symbols.declare_operator(
                    self.builtins,
                    &[TypeId::STRING, TypeId::STRING],
                    TypeInfo::of(TypeId::STRING),
                    Some(generic),
                );
            }
            self.binary_ops.insert(op, generic);
        }
        for op in [Eq, Ne, Lt, Gt, Le, Ge, And, Or] {
            let result = if op.is_logical() { TypeId::ANY } else { TypeId::BOOLEAN };
            let generic = self.symbols.declare_operator(
                self.builtins,
                &[TypeId::ANY, TypeId::ANY],
                TypeInfo::of(result),
                None,
            );
            self.binary_ops.insert(op, generic);
        }
        for op in [BitAnd, BitOr, BitXor, Shl, Shr, UShr] {
            let result = if op == UShr { TypeId::UINT } else { TypeId::INT };
            let generic = self.symbols.declare_operator(
                self.builtins,
                &[TypeId::INT, TypeId::INT],
                TypeInfo::of(result),
                None,
            );
            self.binary_ops.insert(op, generic);
        }
        for op in [UnaryOp::Neg, UnaryOp::Pos] {
            let generic = self.symbols.declare_operator(
                self.builtins,
                &[TypeId::ANY],
                TypeInfo::of(TypeId::ANY),
                None,
            );
            for t in numerics {
                self.symbols
                    .declare_operator(self.builtins, &[t], TypeInfo::of(t), Some(generic));
            }
            self.unary_ops.insert(op, generic);
        }
        let not = self.symbols.declare_operator(
            self.builtins,
            &[TypeId::ANY],
            TypeInfo::of(TypeId::BOOLEAN),
            None,
        );
        self.unary_ops.insert(UnaryOp::Not, not);
        let bitnot = self.symbols.declare_operator(
            self.builtins,
            &[TypeId::INT],
            TypeInfo::of(TypeId::INT),
            None,
        );
        self.unary_ops.insert(UnaryOp::BitNot, bitnot);
    }

    // ---- small shared helpers -------------------------------------------

    pub(crate) fn error(&mut self, error: SemanticError, span: Span) {
        self.errors.push(TypeError::new(error, span));
    }

    pub(crate) fn warn(&mut self, warning: SemanticWarning, span: Span) {
        self.warnings.push(TypeWarning::new(warning, span));
    }

    fn name_of(&self, sym: Symbol) -> String {
        self.interner.resolve(sym).to_string()
    }

    fn path_name(&self, path: &TypePath) -> String {
        let mut out = String::new();
        for (i, seg) in path.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(self.interner.resolve(*seg));
        }
        out
    }

    /// Render a type view for diagnostics
    fn type_name(&self, info: TypeInfo) -> String {
        let base = self.types.name(info.type_id);
        match info.nullability {
            Nullability::Default => base.to_string(),
            Nullability::Nullable => format!("{base}?"),
            Nullability::NonNullable => format!("{base}!"),
        }
    }

    /// Map a written visibility onto a namespace owned by the declaring
    /// class (or the file-internal namespace at the top level)
    fn member_namespace(&self, vis: Visibility, owner: Option<TypeId>) -> Namespace {
        match (vis, owner) {
            (Visibility::Public, _) => Namespace::Public,
            (Visibility::Internal, _) => Namespace::Internal,
            (Visibility::Protected, Some(t)) => Namespace::Protected(t),
            (Visibility::Private, Some(t)) => Namespace::Private(t),
            // protected/private outside a class degrade to internal
            (Visibility::Protected | Visibility::Private, None) => Namespace::Internal,
            (Visibility::Namespace(sym), _) => Namespace::User(sym),
        }
    }

    /// Namespaces open at the current point: public and internal always,
    /// plus the private namespace of the enclosing class and the protected
    /// namespaces of it and every base
    fn open_namespaces(&self) -> SmallVec<[Namespace; 4]> {
        let mut out: SmallVec<[Namespace; 4]> =
            smallvec::smallvec![Namespace::Public, Namespace::Internal];
        if let Some(c) = self.current_class {
            out.push(Namespace::Private(c));
            let mut cur = Some(c);
            while let Some(t) = cur {
                out.push(Namespace::Protected(t));
                cur = self.types.def(t).base;
            }
        }
        out
    }

    /// Resolve an optional annotation; absence means the any type
    fn resolve_type_expr(&mut self, te: Option<&sable_ast::TypeExpr>) -> TypeInfo {
        match te {
            None => TypeInfo::of(TypeId::ANY),
            Some(te) => self.type_info_of(te),
        }
    }

    fn type_info_of(&mut self, te: &sable_ast::TypeExpr) -> TypeInfo {
        use sable_ast::TypeExpr;
        match te {
            TypeExpr::Any => TypeInfo::of(TypeId::ANY),
            TypeExpr::Void => TypeInfo::of(TypeId::VOID),
            TypeExpr::Name(path) => {
                let name = self.path_name(path);
                match self.types.lookup(&name) {
                    Some(id) => TypeInfo::of(id),
                    None => {
                        self.error(
                            SemanticError::UnknownType {
                                name,
                                span: label(path.span),
                            },
                            path.span,
                        );
                        TypeInfo::of(TypeId::ANY)
                    }
                }
            }
            TypeExpr::Applied { base, args } => {
                let name = self.path_name(base);
                let Some(family) = self.types.lookup(&name) else {
                    self.error(
                        SemanticError::UnknownType {
                            name,
                            span: label(base.span),
                        },
                        base.span,
                    );
                    return TypeInfo::of(TypeId::ANY);
                };
                let [arg] = args.as_slice() else {
                    self.error(
                        SemanticError::UnknownType {
                            name: format!("{name} applied to {} arguments", args.len()),
                            span: label(base.span),
                        },
                        base.span,
                    );
                    return TypeInfo::of(TypeId::ANY);
                };
                let arg_info = self.type_info_of(arg);
                // a failed argument already produced its own diagnostic
                if arg_info.type_id.is_any() && !matches!(arg, TypeExpr::Any) {
                    return TypeInfo::of(TypeId::ANY);
                }
                let id = self
                    .types
                    .instantiate(family, arg_info.type_id, &mut self.symbols);
                TypeInfo::of(id)
            }
            TypeExpr::Nullable(inner) => {
                let inner = self.type_info_of(inner);
                TypeInfo::nullable(inner.type_id)
            }
            TypeExpr::NonNullable(inner) => {
                let inner = self.type_info_of(inner);
                TypeInfo::non_nullable(inner.type_id)
            }
        }
    }

    /// Two callable slots agree in parameter and return types
    fn signatures_match(&self, a: SlotId, b: SlotId) -> bool {
        let sa = self.symbols.slot(a);
        let sb = self.symbols.slot(b);
        sa.params.len() == sb.params.len()
            && sa.ty.same_type(sb.ty, &self.types)
            && sa
                .params
                .iter()
                .zip(sb.params.iter())
                .all(|(&p, &q)| p.same_type(q, &self.types))
    }

    /// Reject bindings gated above the session's target version
    fn check_version(&mut self, binding: &Binding, name: Symbol, span: Span) {
        let Some(slot_id) = binding.primary() else {
            return;
        };
        let required = self.symbols.slot(slot_id).min_version;
        if required > self.options.target_version {
            let name = self.name_of(name);
            let target = self.options.target_version;
            self.error(
                SemanticError::VersionMismatch {
                    name,
                    required,
                    target,
                    span: label(span),
                },
                span,
            );
        }
    }

    // ---- flow-graph plumbing --------------------------------------------

    fn flow_current(&self) -> Option<BlockId> {
        self.flow.as_ref().map(|f| f.current())
    }

    fn flow_start(&mut self, preds: &[BlockId]) -> Option<BlockId> {
        self.flow.as_mut().map(|f| f.start_block(preds))
    }

    fn flow_mark_terminal(&mut self) {
        if let Some(f) = self.flow.as_mut() {
            f.mark_terminal();
        }
    }

    fn flow_is_terminal(&self) -> bool {
        self.flow
            .as_ref()
            .is_some_and(|f| f.current_is_terminal())
    }

    fn flow_add_pred(&mut self, block: BlockId, pred: BlockId) {
        if let Some(f) = self.flow.as_mut() {
            f.add_pred(block, pred);
        }
    }

    /// Record a definition of `slot` at the current point. Definition ids
    /// are scoped to one graph, so only slots the current graph covers get
    /// bits.
    fn record_def(&mut self, slot: SlotId) {
        if self.flow.is_none() || !self.slot_in_flow_domain(slot) {
            return;
        }
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        let def = flow.new_def(slot);
        flow.record_def(slot, def);
        self.symbols.slot_mut(slot).def_bits.set(def.0 as usize);
    }

    /// Does the current graph's definition id space cover this slot?
    fn slot_in_flow_domain(&self, slot: SlotId) -> bool {
        let owner = self.symbols.slot(slot).owner;
        if Some(owner) == self.flow_domain {
            return true;
        }
        // with-scopes nested in the current body
        matches!(self.symbols.scope(owner).kind, BuilderKind::Block)
            && self.chain.contains(&owner)
    }

    /// After binding a readable slot: warn when no definition reaches and
    /// mark the slot for defensive default-initialization
    fn check_use_def(&mut self, slot_id: SlotId, name: Symbol, span: Span) {
        let Some(flow) = self.flow.as_ref() else {
            return;
        };
        if !self.slot_in_flow_domain(slot_id) {
            return;
        }
        let slot = self.symbols.slot(slot_id);
        // methods and slots holding a declaration-time constant (class
        // bindings, initialized consts) are defined before any statement runs
        if slot.is_method() || slot.value.is_some() {
            return;
        }
        let reaching = flow.reaching_now();
        if crate::reference::calc_use_definitions(&slot.def_bits, &reaching) {
            return;
        }
        let name = self.name_of(name);
        self.warn(
            SemanticWarning::UsedBeforeInit {
                name,
                span: label(span),
            },
            span,
        );
        self.needs_default_init.insert(slot_id);
        self.symbols.slot_mut(slot_id).flags.needs_init = true;
    }

    fn finish_flow(&mut self) {
        if let Some(mut flow) = self.flow.take() {
            flow.solve();
        }
        self.flow_domain = None;
    }
}
