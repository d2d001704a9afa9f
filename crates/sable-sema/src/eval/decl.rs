//! Declaration passes: shells, signatures, member layout and validation.
//!
//! Shells register every class and interface name so forward references
//! resolve to stable ids. The signature pass then links bases and
//! interfaces, lays out member slots (statics before instance members, base
//! classes before derived ones), validates accessor and override shapes,
//! and queues method bodies for the evaluation phase.

use super::{DeferredBody, Evaluator, ThisContext};
use crate::errors::{SemanticError, label};
use crate::scope::{AccessKind, Namespace, ScopeId};
use crate::slot::{CallSequence, ParamStyle, SlotId};
use crate::types::{TypeDecl, TypeId, TypeInfo};
use crate::value::Value;
use rustc_hash::FxHashMap;
use sable_ast::{
    ClassDecl, ClassMember, Decl, FuncDecl, FuncKind, InterfaceDecl, Program, Symbol, TypeExpr,
    TypePath, VarDecl,
};
use smallvec::SmallVec;

impl<'a> Evaluator<'a> {
    /// Pass one: every class and interface name becomes a (yet unresolved)
    /// type id, so annotations and extends clauses can reference
    /// declarations that appear later in the program
    #[tracing::instrument(skip_all)]
    pub(super) fn declare_shells(&mut self, program: &Program) {
        for decl in &program.decls {
            match decl {
                Decl::Class(c) => {
                    let name = self.name_of(c.name);
                    self.types.get_or_create(&name);
                }
                Decl::Interface(i) => {
                    let name = self.name_of(i.name);
                    self.types.get_or_create(&name);
                }
                _ => {}
            }
        }
    }

    /// Pass two: declarations. Interfaces first (classes link against their
    /// member scopes), then classes base-before-derived, then top-level
    /// functions and variables in source order.
    #[tracing::instrument(skip_all)]
    pub(super) fn declare_signatures(&mut self, program: &'a Program) {
        let mut interfaces: Vec<&'a InterfaceDecl> = program
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Interface(i) => Some(i),
                _ => None,
            })
            .collect();
        let by_iface: FxHashMap<Symbol, &'a InterfaceDecl> =
            interfaces.iter().map(|i| (i.name, *i)).collect();
        // extended interfaces first, so their scopes exist to inherit from
        interfaces.sort_by_key(|i| extension_depth(&by_iface, i));
        for i in interfaces {
            self.declare_interface(i);
        }

        let mut classes: Vec<&'a ClassDecl> = program
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Class(c) => Some(c),
                _ => None,
            })
            .collect();
        let by_name: FxHashMap<Symbol, &'a ClassDecl> =
            classes.iter().map(|c| (c.name, *c)).collect();
        // stable: declaration order is kept within one inheritance depth
        classes.sort_by_key(|c| inheritance_depth(&by_name, c));
        for c in classes {
            self.declare_class(c);
        }

        for decl in &program.decls {
            match decl {
                Decl::Function(f) => self.declare_global_function(f),
                Decl::Var(v) => self.declare_global_var(v),
                _ => {}
            }
        }
    }

    /// Pass three of the declaration stage: whole-class validation that
    /// needs every declaration in place first
    #[tracing::instrument(skip_all)]
    pub(super) fn check_classes(&mut self, program: &Program) {
        for decl in &program.decls {
            let Decl::Class(c) = decl else { continue };
            let name = self.name_of(c.name);
            let Some(ty) = self.types.lookup(&name) else {
                continue;
            };
            self.check_interface_conformance(ty, c.span);

            // every constructor, declared or implicit, chains to the base
            // constructor with no arguments, so the base must be
            // constructible without any
            if let Some(base) = self.types.def(ty).base
                && let Some(&Some(base_ctor)) = self.ctor_slots.get(&base)
                && self.symbols.slot(base_ctor).required_params() > 0
            {
                let base_name = self.types.name(base).to_string();
                self.error(
                    SemanticError::NoDefaultBaseConstructor {
                        base: base_name,
                        span: label(c.span),
                    },
                    c.span,
                );
            }
        }
    }

    // ---- classes ---------------------------------------------------------

    fn declare_class(&mut self, c: &'a ClassDecl) {
        let name = self.name_of(c.name);
        let ty = self.types.get_or_create(&name);

        let mut base = match &c.extends {
            Some(path) => self.resolve_type_ref(path).or(Some(TypeId::OBJECT)),
            None => Some(TypeId::OBJECT),
        };
        // a base chain that leads back here would never terminate
        let mut probe = base;
        while let Some(b) = probe {
            if b == ty {
                self.error(
                    SemanticError::CircularInheritance {
                        name: name.clone(),
                        span: label(c.span),
                    },
                    c.span,
                );
                base = Some(TypeId::OBJECT);
                break;
            }
            probe = self.types.def(b).base;
        }

        let mut interfaces: SmallVec<[TypeId; 4]> = SmallVec::new();
        for path in &c.implements {
            if let Some(i) = self.resolve_type_ref(path) {
                interfaces.push(i);
            }
        }

        self.types.resolve(
            ty,
            TypeDecl {
                base,
                interfaces: interfaces.clone(),
                is_interface: false,
                is_dynamic: c.is_dynamic,
                is_final: c.is_final,
            },
        );

        let base_instance = base.and_then(|b| self.types.def(b).instance_scope);
        let instance = self.symbols.new_instance_scope(ty, base_instance);
        let statics = self.symbols.new_static_scope(ty);
        self.symbols.scope_mut(instance).is_dynamic = c.is_dynamic;
        for &i in &interfaces {
            if let Some(s) = self.types.def(i).instance_scope {
                self.symbols.scope_mut(instance).interfaces.push(s);
            }
        }
        {
            let def = self.types.def_mut(ty);
            def.instance_scope = Some(instance);
            def.static_scope = Some(statics);
        }

        self.declare_type_binding(c.name, ty, c.attrs.min_version, c.span);

        self.current_class = Some(ty);

        // statics land first so instance initializers can read them
        for m in &c.members {
            match m {
                ClassMember::Var(v) if v.attrs.is_static => {
                    let ns = self.member_namespace(v.attrs.visibility, Some(ty));
                    self.declare_var_member(v, statics, ns);
                }
                ClassMember::Function(f)
                    if f.attrs.is_static && f.kind != FuncKind::Constructor =>
                {
                    self.declare_func_member(f, ty, statics, statics, None, true);
                }
                _ => {}
            }
        }
        let mut ctor: Option<SlotId> = None;
        for m in &c.members {
            match m {
                ClassMember::Var(v) if !v.attrs.is_static => {
                    let ns = self.member_namespace(v.attrs.visibility, Some(ty));
                    self.declare_var_member(v, instance, ns);
                }
                ClassMember::Function(f) if f.kind == FuncKind::Constructor => {
                    ctor = Some(self.declare_ctor(f, ty, statics, instance));
                }
                ClassMember::Function(f) if !f.attrs.is_static => {
                    self.declare_func_member(f, ty, instance, statics, base_instance, false);
                }
                _ => {}
            }
        }
        self.ctor_slots.insert(ty, ctor);

        self.check_accessor_pairs(statics);
        self.check_accessor_pairs(instance);

        // member initializers run with the class frames in scope
        self.chain.push(statics);
        self.this_stack.push(ThisContext::Illegal);
        for m in &c.members {
            if let ClassMember::Var(v) = m
                && v.attrs.is_static
            {
                self.eval_member_init(v);
            }
        }
        self.this_stack.pop();
        self.chain.push(instance);
        self.this_stack.push(ThisContext::Instance(ty));
        for m in &c.members {
            if let ClassMember::Var(v) = m
                && !v.attrs.is_static
            {
                self.eval_member_init(v);
            }
        }
        self.this_stack.pop();
        self.chain.pop();
        self.chain.pop();
        self.current_class = None;
    }

    fn declare_interface(&mut self, i: &'a InterfaceDecl) {
        let name = self.name_of(i.name);
        let ty = self.types.get_or_create(&name);

        let mut extends: SmallVec<[TypeId; 4]> = SmallVec::new();
        for path in &i.extends {
            if let Some(e) = self.resolve_type_ref(path) {
                extends.push(e);
            }
        }
        self.types.resolve(
            ty,
            TypeDecl {
                base: None,
                interfaces: extends,
                is_interface: true,
                is_dynamic: false,
                is_final: false,
            },
        );
        let scope = self.symbols.new_instance_scope(ty, None);
        self.types.def_mut(ty).instance_scope = Some(scope);
        self.declare_type_binding(i.name, ty, None, i.span);

        // an extending interface carries the extended signatures in its own
        // name table, re-bound rather than re-declared; local declarations
        // below shadow them
        let exts: SmallVec<[TypeId; 4]> = self.types.def(ty).interfaces.clone();
        for &ext in &exts {
            let Some(ext_scope) = self.types.def(ext).instance_scope else {
                continue;
            };
            let entries: Vec<_> = self.symbols.names_in(ext_scope).collect();
            for ((name, ns, kind), slot) in entries {
                if kind == AccessKind::Construct {
                    continue;
                }
                self.symbols.inherit(scope, name, ns, kind, slot);
            }
        }

        // interface members are public signatures without bodies
        for f in &i.members {
            let (ret, params, styles) = self.resolve_signature(f);
            let slot = match f.kind {
                FuncKind::Getter => self.symbols.declare_accessor(
                    scope,
                    f.name,
                    Namespace::Public,
                    AccessKind::Get,
                    ret,
                    SmallVec::new(),
                    CallSequence::ThisArgs,
                ),
                FuncKind::Setter => {
                    let pty = params
                        .first()
                        .copied()
                        .unwrap_or(TypeInfo::of(TypeId::ANY));
                    self.symbols.declare_accessor(
                        scope,
                        f.name,
                        Namespace::Public,
                        AccessKind::Set,
                        TypeInfo::of(TypeId::VOID),
                        smallvec::smallvec![pty],
                        CallSequence::ThisArgs,
                    )
                }
                _ => self.symbols.declare_method(
                    scope,
                    f.name,
                    Namespace::Public,
                    ret,
                    params,
                    styles,
                    CallSequence::ThisArgs,
                ),
            };
            self.slot_spans.insert(slot, f.span);
        }
    }

    /// The class/interface name itself becomes a const binding in the
    /// global frame whose value is the type it materializes
    fn declare_type_binding(
        &mut self,
        name: Symbol,
        ty: TypeId,
        min_version: Option<u32>,
        span: sable_ast::Span,
    ) {
        let slot = self.symbols.declare_variable(
            self.global,
            name,
            Namespace::Public,
            TypeInfo::of(TypeId::CLASS),
            true,
        );
        let s = self.symbols.slot_mut(slot);
        s.value = Some(Value::Type(ty));
        if let Some(v) = min_version {
            s.min_version = v;
        }
        self.initialized_consts.insert(slot);
        self.slot_spans.insert(slot, span);
    }

    // ---- members ---------------------------------------------------------

    fn declare_var_member(&mut self, v: &VarDecl, scope: ScopeId, ns: Namespace) -> SlotId {
        let ty = self.resolve_type_expr(v.ty.as_ref());
        let slot = self.symbols.declare_variable(scope, v.name, ns, ty, v.is_const);
        self.var_slots.insert(v.id, slot);
        self.slot_spans.insert(slot, v.span);
        if let Some(mv) = v.attrs.min_version {
            self.symbols.slot_mut(slot).min_version = mv;
        }
        slot
    }

    fn declare_func_member(
        &mut self,
        f: &'a FuncDecl,
        ty: TypeId,
        scope: ScopeId,
        statics: ScopeId,
        base_instance: Option<ScopeId>,
        is_static: bool,
    ) {
        let ns = self.member_namespace(f.attrs.visibility, Some(ty));
        let (ret, params, styles) = self.resolve_signature(f);
        let call_seq = if is_static {
            CallSequence::Args
        } else {
            CallSequence::ThisArgs
        };
        let slot = match f.kind {
            FuncKind::Getter => self.symbols.declare_accessor(
                scope,
                f.name,
                ns,
                AccessKind::Get,
                ret,
                SmallVec::new(),
                call_seq,
            ),
            FuncKind::Setter => {
                let pty = params.first().copied().unwrap_or(TypeInfo::of(TypeId::ANY));
                self.symbols.declare_accessor(
                    scope,
                    f.name,
                    ns,
                    AccessKind::Set,
                    TypeInfo::of(TypeId::VOID),
                    smallvec::smallvec![pty],
                    call_seq,
                )
            }
            _ => self
                .symbols
                .declare_method(scope, f.name, ns, ret, params, styles, call_seq),
        };
        self.slot_spans.insert(slot, f.span);
        {
            let s = self.symbols.slot_mut(slot);
            s.flags.is_final = f.attrs.is_final;
            if let Some(mv) = f.attrs.min_version {
                s.min_version = mv;
            }
        }

        if !is_static {
            self.check_override(f, slot, base_instance);
        }

        let chain = if is_static {
            vec![self.global, statics]
        } else {
            vec![self.global, statics, scope]
        };
        let this_ctx = if is_static {
            ThisContext::Illegal
        } else {
            ThisContext::Instance(ty)
        };
        self.defer_body(f, slot, chain, this_ctx, Some(ty));
    }

    fn declare_ctor(
        &mut self,
        f: &'a FuncDecl,
        ty: TypeId,
        statics: ScopeId,
        instance: ScopeId,
    ) -> SlotId {
        let (_, params, styles) = self.resolve_signature(f);
        let slot = self
            .symbols
            .declare_constructor(statics, f.name, Namespace::Public, ty, params, styles);
        self.slot_spans.insert(slot, f.span);
        self.defer_body(
            f,
            slot,
            vec![self.global, statics, instance],
            ThisContext::Instance(ty),
            Some(ty),
        );
        slot
    }

    /// An instance member whose name matches a base-chain member of the
    /// same access kind overrides it: the base slot must not be final and
    /// the signatures must agree
    fn check_override(&mut self, f: &'a FuncDecl, slot: SlotId, base_instance: Option<ScopeId>) {
        let Some(base_scope) = base_instance else {
            if f.attrs.is_override {
                let name = self.name_of(f.name);
                self.error(
                    SemanticError::OverrideMissing {
                        name,
                        span: label(f.span),
                    },
                    f.span,
                );
            }
            return;
        };
        let kind = match f.kind {
            FuncKind::Getter => AccessKind::Get,
            FuncKind::Setter => AccessKind::Set,
            _ => AccessKind::Call,
        };
        let mut found = None;
        for ns in self.open_namespaces() {
            if let Some((_, bslot)) = self.symbols.find_in_bases(base_scope, f.name, ns, kind) {
                found = Some(bslot);
                break;
            }
        }
        match found {
            Some(bslot) => {
                let base_final = self.symbols.slot(bslot).flags.is_final;
                if base_final {
                    let name = self.name_of(f.name);
                    self.error(
                        SemanticError::OverrideFinal {
                            name,
                            span: label(f.span),
                        },
                        f.span,
                    );
                } else if !self.signatures_match(slot, bslot) {
                    let name = self.name_of(f.name);
                    self.error(
                        SemanticError::IncompatibleOverride {
                            name,
                            span: label(f.span),
                        },
                        f.span,
                    );
                }
                let s = self.symbols.slot_mut(slot);
                s.flags.is_override = true;
                s.overridden = Some(bslot);
            }
            None if f.attrs.is_override => {
                let name = self.name_of(f.name);
                self.error(
                    SemanticError::OverrideMissing {
                        name,
                        span: label(f.span),
                    },
                    f.span,
                );
            }
            None => {}
        }
    }

    /// Resolve return and parameter types and validate the declaration
    /// shape (getter/setter arity, constant parameter defaults)
    pub(super) fn resolve_signature(
        &mut self,
        f: &FuncDecl,
    ) -> (
        TypeInfo,
        SmallVec<[TypeInfo; 4]>,
        SmallVec<[ParamStyle; 4]>,
    ) {
        let mut params: SmallVec<[TypeInfo; 4]> = SmallVec::new();
        let mut styles: SmallVec<[ParamStyle; 4]> = SmallVec::new();
        for p in &f.params {
            // rest parameters collect the tail dynamically
            let pty = if p.is_rest {
                TypeInfo::of(TypeId::ANY)
            } else {
                self.resolve_type_expr(p.ty.as_ref())
            };
            let style = if p.is_rest {
                ParamStyle::Rest
            } else if p.default.is_some() {
                ParamStyle::Optional
            } else {
                ParamStyle::Required
            };
            if let Some(d) = &p.default {
                let dt = self.eval_expr(d);
                match self.constants.get(&d.id).cloned() {
                    Some(cv) => {
                        self.check_constant_compat(&cv, pty, d.span);
                    }
                    None => {
                        let expected = self.type_name(pty);
                        let found = self.type_name(dt);
                        self.error(
                            SemanticError::IncompatibleDefaultValue {
                                expected,
                                found,
                                span: label(d.span),
                            },
                            d.span,
                        );
                    }
                }
            }
            params.push(pty);
            styles.push(style);
        }

        let ret = match f.kind {
            FuncKind::Setter => {
                let bad_return = !matches!(f.return_ty, None | Some(TypeExpr::Void));
                if f.params.len() != 1 || bad_return {
                    let name = self.name_of(f.name);
                    self.error(
                        SemanticError::InvalidSetterSignature {
                            name,
                            span: label(f.span),
                        },
                        f.span,
                    );
                }
                TypeInfo::of(TypeId::VOID)
            }
            FuncKind::Getter => {
                if !f.params.is_empty() || matches!(f.return_ty, Some(TypeExpr::Void)) {
                    let name = self.name_of(f.name);
                    self.error(
                        SemanticError::InvalidGetterSignature {
                            name,
                            span: label(f.span),
                        },
                        f.span,
                    );
                }
                self.resolve_type_expr(f.return_ty.as_ref())
            }
            FuncKind::Constructor => TypeInfo::of(TypeId::VOID),
            FuncKind::Function => self.resolve_type_expr(f.return_ty.as_ref()),
        };
        (ret, params, styles)
    }

    /// After a scope's members are declared: a getter/setter pair under the
    /// same name and namespace must agree on the property type
    fn check_accessor_pairs(&mut self, scope: ScopeId) {
        let entries: Vec<(Symbol, Namespace, SlotId)> = self
            .symbols
            .names_in(scope)
            .filter(|&((_, _, kind), _)| kind == AccessKind::Get)
            .map(|((name, ns, _), slot)| (name, ns, slot))
            .collect();
        for (name, ns, gslot) in entries {
            let Some(sslot) = self.symbols.find_local(scope, name, ns, AccessKind::Set) else {
                continue;
            };
            let getter = self.symbols.slot(gslot);
            let setter = self.symbols.slot(sslot);
            if !getter.flags.is_accessor || !setter.flags.is_accessor {
                continue;
            }
            let gt = getter.ty;
            let st = setter
                .params
                .first()
                .copied()
                .unwrap_or(TypeInfo::of(TypeId::ANY));
            if gt.type_id.is_any() || st.type_id.is_any() {
                continue;
            }
            if !gt.same_type(st, &self.types) {
                let span = self.slot_spans.get(&gslot).copied().unwrap_or_default();
                let name = self.name_of(name);
                let getter = self.type_name(gt);
                let setter = self.type_name(st);
                self.error(
                    SemanticError::AccessorTypeMismatch {
                        name,
                        getter,
                        setter,
                        span: label(span),
                    },
                    span,
                );
            }
        }
    }

    // ---- top level -------------------------------------------------------

    fn declare_global_function(&mut self, f: &'a FuncDecl) {
        let ns = self.member_namespace(f.attrs.visibility, None);
        let (ret, params, styles) = self.resolve_signature(f);
        let slot = self
            .symbols
            .declare_method(self.global, f.name, ns, ret, params, styles, CallSequence::Args);
        self.slot_spans.insert(slot, f.span);
        if let Some(mv) = f.attrs.min_version {
            self.symbols.slot_mut(slot).min_version = mv;
        }
        self.defer_body(f, slot, vec![self.global], ThisContext::Global, None);
    }

    fn declare_global_var(&mut self, v: &VarDecl) {
        let ns = self.member_namespace(v.attrs.visibility, None);
        self.declare_var_member(v, self.global, ns);
    }

    /// Queue a body for the evaluation phase, capturing the scope chain and
    /// pre-declaring the parameter slots in a fresh activation frame
    fn defer_body(
        &mut self,
        func: &'a FuncDecl,
        slot: SlotId,
        chain: Vec<ScopeId>,
        this_ctx: ThisContext,
        class: Option<TypeId>,
    ) {
        if func.body.is_none() {
            return;
        }
        let activation = self.symbols.new_scope(crate::scope::BuilderKind::Activation);
        let ptys: SmallVec<[TypeInfo; 4]> = self.symbols.slot(slot).params.clone();
        let mut param_slots = Vec::with_capacity(func.params.len());
        for (p, &pty) in func.params.iter().zip(ptys.iter()) {
            let ps = self
                .symbols
                .declare_variable(activation, p.name, Namespace::Public, pty, false);
            self.var_slots.insert(p.id, ps);
            self.slot_spans.insert(ps, p.span);
            param_slots.push(ps);
        }
        self.deferred.push(DeferredBody {
            func,
            chain,
            this_ctx,
            class,
            slot,
            activation,
            param_slots,
        });
    }

    /// Member variable initializers must be compile-time constants when the
    /// member is const; otherwise they coerce like assignments
    fn eval_member_init(&mut self, v: &VarDecl) {
        let Some(slot) = self.var_slots.get(&v.id).copied() else {
            return;
        };
        let Some(init) = &v.init else {
            return;
        };
        let ty = self.symbols.slot(slot).ty;
        let it = self.eval_expr(init);
        match self.constants.get(&init.id).cloned() {
            Some(cv) => {
                if let Some(stored) = self.check_constant_compat(&cv, ty, init.span)
                    && v.is_const
                {
                    self.symbols.slot_mut(slot).value = Some(stored);
                    self.initialized_consts.insert(slot);
                }
            }
            None => {
                self.coerce(init, it, ty);
                if v.is_const {
                    self.initialized_consts.insert(slot);
                }
            }
        }
    }

    /// Resolve a dotted type path to an already-registered type; a miss on
    /// a dotted path reports the unfound package member
    pub(super) fn resolve_type_ref(&mut self, path: &TypePath) -> Option<TypeId> {
        let name = self.path_name(path);
        if let Some(id) = self.types.lookup(&name) {
            return Some(id);
        }
        if path.segments.len() > 1 {
            let last = self.name_of(path.segments[path.segments.len() - 1]);
            let package = name[..name.len() - last.len() - 1].to_string();
            self.error(
                SemanticError::UnfoundPackageProperty {
                    name: last,
                    package,
                    span: label(path.span),
                },
                path.span,
            );
        } else {
            self.error(
                SemanticError::UnknownType {
                    name,
                    span: label(path.span),
                },
                path.span,
            );
        }
        None
    }
}

/// Distance from a class to the top of its local extends chain; used to
/// order class declaration base-before-derived. Cycles stop counting (they
/// are reported when the class itself is declared).
fn extension_depth(by_name: &FxHashMap<Symbol, &InterfaceDecl>, i: &InterfaceDecl) -> usize {
    fn walk<'d>(
        by_name: &FxHashMap<Symbol, &'d InterfaceDecl>,
        i: &'d InterfaceDecl,
        guard: &mut SmallVec<[Symbol; 8]>,
    ) -> usize {
        let mut depth = 0;
        for ext in &i.extends {
            let Some(&seg) = ext.segments.last() else { continue };
            let Some(&next) = by_name.get(&seg) else {
                depth = depth.max(1);
                continue;
            };
            if guard.contains(&next.name) {
                continue;
            }
            guard.push(next.name);
            depth = depth.max(1 + walk(by_name, next, guard));
            guard.pop();
        }
        depth
    }
    let mut guard: SmallVec<[Symbol; 8]> = smallvec::smallvec![i.name];
    walk(by_name, i, &mut guard)
}

fn inheritance_depth(by_name: &FxHashMap<Symbol, &ClassDecl>, c: &ClassDecl) -> usize {
    let mut depth = 0;
    let mut guard: SmallVec<[Symbol; 8]> = smallvec::smallvec![c.name];
    let mut cur = c;
    while let Some(ext) = &cur.extends {
        let Some(&seg) = ext.segments.last() else { break };
        depth += 1;
        let Some(&next) = by_name.get(&seg) else { break };
        if guard.contains(&next.name) {
            break;
        }
        guard.push(next.name);
        cur = next;
    }
    depth
}
