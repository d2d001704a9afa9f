//! Expression evaluation: static types, constant folding, and binding.
//!
//! Every expression node gets a static type. When all operands of an
//! operator are compile-time constants the operator folds and the result is
//! recorded against the node; otherwise the node types by the operand rule
//! for the active numeric representation. Name and member references bind
//! to slots through the reference resolver, and every implicit conversion
//! a code generator must materialize is recorded as a coercion.

use super::fold::{fold_binary, fold_unary};
use super::{Evaluator, ThisContext};
use crate::errors::{SemanticError, label};
use crate::reference::{Binding, Reference, Resolution, resolve};
use crate::scope::{AccessKind, Namespace, ScopeId};
use crate::slot::SlotId;
use crate::types::{TypeId, TypeInfo};
use crate::value::{NumericUsage, Value, parse_number};
use rust_decimal::prelude::ToPrimitive;
use sable_ast::{BinaryOp, Expr, ExprKind, Span, Symbol, TypeExpr, UnaryOp};

impl<'a> Evaluator<'a> {
    pub(super) fn eval_expr(&mut self, e: &Expr) -> TypeInfo {
        let ty = match &e.kind {
            ExprKind::Number { text, suffix } => {
                let v = parse_number(text, *suffix, self.usage);
                let ty = TypeInfo::of(v.type_id());
                self.constants.insert(e.id, v);
                ty
            }
            ExprKind::Str(s) => {
                self.constants.insert(e.id, Value::Str(s.clone()));
                TypeInfo::of(TypeId::STRING)
            }
            ExprKind::Bool(b) => {
                self.constants.insert(e.id, Value::Bool(*b));
                TypeInfo::of(TypeId::BOOLEAN)
            }
            ExprKind::Null => {
                self.constants.insert(e.id, Value::Null);
                TypeInfo::of(TypeId::NULL)
            }
            ExprKind::This => self.eval_this(e.span),
            ExprKind::Ident(name) => self.eval_ident(e, *name),
            ExprKind::Qualified { qualifier, name } => {
                self.eval_qualified(e, *qualifier, *name)
            }
            ExprKind::Member { base, name } => self.eval_member(e, base, *name),
            ExprKind::Index { base, index } => {
                // bracket access is untyped
                self.eval_expr(base);
                self.eval_expr(index);
                TypeInfo::of(TypeId::ANY)
            }
            ExprKind::Call { callee, args } => self.eval_call(e, callee, args),
            ExprKind::New { callee, args } => self.eval_new(e, callee, args),
            ExprKind::ApplyType { base, args } => self.eval_apply_type(e, base, args),
            ExprKind::Function(f) => self.eval_func_expr(f),
            ExprKind::Unary { op, operand } => self.eval_unary(e, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(e, *op, lhs, rhs),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => self.eval_conditional(e, cond, then, otherwise),
            ExprKind::Assign { target, value, op } => {
                self.eval_assign(e, target, value, *op)
            }
        };
        self.expr_types.insert(e.id, ty);
        ty
    }

    fn eval_this(&mut self, span: Span) -> TypeInfo {
        match self.this_stack.last() {
            Some(ThisContext::Instance(t)) => TypeInfo::of(*t),
            // the receiver of a function expression is unknowable statically,
            // so like the global object it types as plain Object
            Some(ThisContext::Global | ThisContext::AnonymousFunction) | None => {
                TypeInfo::of(TypeId::OBJECT)
            }
            Some(ThisContext::Illegal) => {
                self.error(
                    SemanticError::ThisInIllegalContext { span: label(span) },
                    span,
                );
                TypeInfo::of(TypeId::ANY)
            }
        }
    }

    // ---- name references ------------------------------------------------

    fn eval_ident(&mut self, e: &Expr, name: Symbol) -> TypeInfo {
        let r = Reference::unqualified(name, self.open_namespaces(), e.span);
        match resolve(&self.symbols, &r, &self.chain, self.lowest_searchable) {
            Resolution::Resolved(b) => self.bind_read(e, name, b),
            Resolution::Ambiguous => {
                let name = self.name_of(name);
                self.error(
                    SemanticError::AmbiguousReference {
                        name,
                        span: label(e.span),
                    },
                    e.span,
                );
                TypeInfo::of(TypeId::ANY)
            }
            Resolution::NotFound => self.unresolved_lexical_read(name, e.span),
        }
    }

    fn eval_qualified(&mut self, e: &Expr, qualifier: Symbol, name: Symbol) -> TypeInfo {
        let r = Reference::qualified(name, Namespace::User(qualifier), e.span);
        match resolve(&self.symbols, &r, &self.chain, self.lowest_searchable) {
            Resolution::Resolved(b) => self.bind_read(e, name, b),
            Resolution::Ambiguous => TypeInfo::of(TypeId::ANY),
            Resolution::NotFound => self.unresolved_lexical_read(name, e.span),
        }
    }

    fn eval_member(&mut self, e: &Expr, base: &Expr, name: Symbol) -> TypeInfo {
        let bt = self.eval_expr(base);

        // constant class binding: member access goes to the static frame
        let base_class = match self.constants.get(&base.id) {
            Some(Value::Type(t)) => Some(*t),
            _ => None,
        };
        if let Some(t) = base_class {
            let Some(statics) = self.types.def(t).static_scope else {
                // imported or intrinsic class with no declared statics
                return TypeInfo::of(TypeId::ANY);
            };
            return self.resolve_member_in(e, name, statics);
        }

        let t = bt.type_id;
        if t.is_any() || !self.types.is_resolved(t) || self.types.is_dynamic(t) {
            // dynamic or unknown base: any property goes
            return TypeInfo::of(TypeId::ANY);
        }
        let Some(scope) = self.types.def(t).instance_scope else {
            return TypeInfo::of(TypeId::ANY);
        };
        self.resolve_member_in(e, name, scope)
    }

    fn resolve_member_in(&mut self, e: &Expr, name: Symbol, scope: ScopeId) -> TypeInfo {
        let r = Reference::member(name, self.open_namespaces(), scope, e.span);
        match resolve(&self.symbols, &r, &self.chain, self.lowest_searchable) {
            Resolution::Resolved(b) => self.bind_read(e, name, b),
            Resolution::Ambiguous => {
                let name = self.name_of(name);
                self.error(
                    SemanticError::AmbiguousReference {
                        name,
                        span: label(e.span),
                    },
                    e.span,
                );
                TypeInfo::of(TypeId::ANY)
            }
            Resolution::NotFound => {
                if self.reads_may_be_dynamic() {
                    return TypeInfo::of(TypeId::ANY);
                }
                self.report_unresolved(name, e.span, &[scope]);
                TypeInfo::of(TypeId::ANY)
            }
        }
    }

    /// A resolved read: record the binding, propagate const values, type by
    /// the bound slot
    fn bind_read(&mut self, e: &Expr, name: Symbol, b: Binding) -> TypeInfo {
        self.bindings.insert(e.id, b);
        self.check_version(&b, name, e.span);
        let Some(slot_id) = b.get_slot.or(b.call_slot) else {
            // a setter with no matching getter is not readable
            let name = self.name_of(name);
            self.error(
                SemanticError::UndefinedProperty {
                    name,
                    span: label(e.span),
                },
                e.span,
            );
            return TypeInfo::of(TypeId::ANY);
        };
        let slot = self.symbols.slot(slot_id);
        let ty = if b.directly_callable() && !slot.flags.is_accessor {
            // a plain method read as a value is a bound closure
            TypeInfo::of(TypeId::FUNCTION)
        } else {
            slot.ty
        };
        if let Some(v) = slot.const_value() {
            let v = v.clone();
            self.constants.insert(e.id, v);
        }
        self.check_use_def(slot_id, name, e.span);
        ty
    }

    /// Unresolved reads stay silent inside a `with` body and in permissive
    /// mode; the value types as the any type
    fn reads_may_be_dynamic(&self) -> bool {
        self.with_depth > 0 || !self.options.static_semantics
    }

    fn unresolved_lexical_read(&mut self, name: Symbol, span: Span) -> TypeInfo {
        if self.reads_may_be_dynamic() {
            return TypeInfo::of(TypeId::ANY);
        }
        let scopes: Vec<ScopeId> = self.chain[self.lowest_searchable..].to_vec();
        self.report_unresolved(name, span, &scopes);
        TypeInfo::of(TypeId::ANY)
    }

    /// The name bound nowhere: distinguish "exists under a closed namespace"
    /// from "does not exist at all"
    fn report_unresolved(&mut self, name: Symbol, span: Span, scopes: &[ScopeId]) {
        let hidden = scopes.iter().any(|&s| {
            self.symbols.name_exists_any_namespace(s, name, AccessKind::Get)
                || self
                    .symbols
                    .name_exists_any_namespace(s, name, AccessKind::Call)
        });
        let name = self.name_of(name);
        let error = if hidden {
            SemanticError::InaccessibleProperty {
                name,
                span: label(span),
            }
        } else {
            SemanticError::UndefinedProperty {
                name,
                span: label(span),
            }
        };
        self.error(error, span);
    }

    // ---- calls ----------------------------------------------------------

    fn eval_call(&mut self, e: &Expr, callee: &Expr, args: &[Expr]) -> TypeInfo {
        let ct = self.eval_expr(callee);

        // calling a class binding is an explicit conversion to that type
        if let Some(Value::Type(t)) = self.constants.get(&callee.id) {
            let t = *t;
            for a in args {
                self.eval_expr(a);
            }
            if args.len() != 1 {
                self.error(
                    SemanticError::WrongArgumentCount {
                        expected: 1,
                        found: args.len(),
                        span: label(e.span),
                    },
                    e.span,
                );
            }
            return TypeInfo::of(t);
        }

        if let Some(b) = self.bindings.get(&callee.id).copied()
            && let Some(call) = b.call_slot
        {
            self.check_call(e.span, call, args);
            self.call_slots.insert(e.id, call);
            return self.symbols.slot(call).ty;
        }

        // dynamic call through a function-typed value
        for a in args {
            self.eval_expr(a);
        }
        match ct.type_id {
            TypeId::FUNCTION | TypeId::ANY | TypeId::CLASS | TypeId::OBJECT => {
                TypeInfo::of(TypeId::ANY)
            }
            _ => {
                let found = self.type_name(ct);
                self.error(
                    SemanticError::NotCallable {
                        found,
                        span: label(e.span),
                    },
                    e.span,
                );
                TypeInfo::of(TypeId::ANY)
            }
        }
    }

    /// Argument-count and per-argument coercion checks against a callable
    /// slot's declared signature
    fn check_call(&mut self, span: Span, slot_id: SlotId, args: &[Expr]) {
        let (required, max, has_rest) = {
            let slot = self.symbols.slot(slot_id);
            (slot.required_params(), slot.params.len(), slot.has_rest())
        };
        if args.len() < required {
            self.error(
                SemanticError::WrongArgumentCount {
                    expected: required,
                    found: args.len(),
                    span: label(span),
                },
                span,
            );
        } else if !has_rest && args.len() > max {
            self.error(
                SemanticError::TooManyArguments {
                    expected: max,
                    found: args.len(),
                    span: label(span),
                },
                span,
            );
        }
        for (i, a) in args.iter().enumerate() {
            let at = self.eval_expr(a);
            let declared = self.symbols.slot(slot_id).params.get(i).copied();
            let pty = match declared {
                // a rest position absorbs anything
                Some(p) if !(has_rest && i >= max.saturating_sub(1)) => p,
                _ => TypeInfo::of(TypeId::ANY),
            };
            self.coerce(a, at, pty);
        }
    }

    fn eval_new(&mut self, e: &Expr, callee: &Expr, args: &[Expr]) -> TypeInfo {
        let ct = self.eval_expr(callee);

        if let Some(Value::Type(t)) = self.constants.get(&callee.id) {
            let t = *t;
            match self.ctor_slots.get(&t).copied() {
                Some(Some(ctor)) => {
                    self.check_call(e.span, ctor, args);
                    self.call_slots.insert(e.id, ctor);
                }
                Some(None) => {
                    // implicit constructor takes nothing
                    for a in args {
                        self.eval_expr(a);
                    }
                    if !args.is_empty() {
                        self.error(
                            SemanticError::WrongArgumentCount {
                                expected: 0,
                                found: args.len(),
                                span: label(e.span),
                            },
                            e.span,
                        );
                    }
                }
                // intrinsic or imported class: constructor unknown
                None => {
                    for a in args {
                        self.eval_expr(a);
                    }
                }
            }
            return TypeInfo::of(t);
        }

        for a in args {
            self.eval_expr(a);
        }
        match ct.type_id {
            TypeId::FUNCTION | TypeId::ANY | TypeId::CLASS | TypeId::OBJECT => {
                TypeInfo::of(TypeId::ANY)
            }
            _ => {
                let found = self.type_name(ct);
                self.error(
                    SemanticError::NotCallable {
                        found,
                        span: label(e.span),
                    },
                    e.span,
                );
                TypeInfo::of(TypeId::ANY)
            }
        }
    }

    fn eval_apply_type(&mut self, e: &Expr, base: &Expr, args: &[TypeExpr]) -> TypeInfo {
        self.eval_expr(base);
        let family = match self.constants.get(&base.id) {
            Some(Value::Type(t)) => Some(*t),
            _ => None,
        };
        let Some(family) = family else {
            return TypeInfo::of(TypeId::ANY);
        };
        let [arg] = args else {
            let name = self.types.name(family).to_string();
            self.error(
                SemanticError::UnknownType {
                    name: format!("{name} applied to {} arguments", args.len()),
                    span: label(e.span),
                },
                e.span,
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
        self.constants.insert(e.id, Value::Type(id));
        TypeInfo::of(TypeId::CLASS)
    }

    // ---- operators ------------------------------------------------------

    fn eval_unary(&mut self, e: &Expr, op: UnaryOp, operand: &Expr) -> TypeInfo {
        let ot = self.eval_expr(operand);

        let folded = self
            .constants
            .get(&operand.id)
            .and_then(|v| fold_unary(op, v, self.usage));
        if let Some(folded) = folded {
            let ty = TypeInfo::of(folded.type_id());
            self.constants.insert(e.id, folded);
            self.dispatch_unary_slot(e, op, ty.type_id);
            return ty;
        }

        let ty = match op {
            UnaryOp::Not => TypeInfo::of(TypeId::BOOLEAN),
            UnaryOp::BitNot => TypeInfo::of(TypeId::INT),
            UnaryOp::Neg | UnaryOp::Pos => {
                if ot.type_id.is_numeric() {
                    ot
                } else {
                    TypeInfo::of(TypeId::DOUBLE)
                }
            }
        };
        self.dispatch_unary_slot(e, op, ot.type_id);
        ty
    }

    fn dispatch_unary_slot(&mut self, e: &Expr, op: UnaryOp, operand: TypeId) {
        if let Some(&generic) = self.unary_ops.get(&op) {
            let slot = self.symbols.dispatch_unary(&self.types, generic, operand);
            self.call_slots.insert(e.id, slot);
        }
    }

    fn eval_binary(&mut self, e: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> TypeInfo {
        let lt = self.eval_expr(lhs);
        let rt = self.eval_expr(rhs);

        let folded = match (self.constants.get(&lhs.id), self.constants.get(&rhs.id)) {
            (Some(l), Some(r)) => fold_binary(op, l, r, self.usage),
            _ => None,
        };
        if let Some(folded) = folded {
            let ty = TypeInfo::of(folded.type_id());
            self.constants.insert(e.id, folded);
            self.dispatch_binary_slot(e, op, ty.type_id, ty.type_id);
            return ty;
        }

        let ty = if op.is_arithmetic() {
            if op == BinaryOp::Add
                && (lt.type_id == TypeId::STRING || rt.type_id == TypeId::STRING)
            {
                TypeInfo::of(TypeId::STRING)
            } else if lt.type_id.is_numeric() && rt.type_id.is_numeric() {
                TypeInfo::of(self.arithmetic_result(lt.type_id, rt.type_id))
            } else {
                TypeInfo::of(TypeId::ANY)
            }
        } else if op.is_bitwise() {
            if op == BinaryOp::UShr {
                TypeInfo::of(TypeId::UINT)
            } else {
                TypeInfo::of(TypeId::INT)
            }
        } else if op.is_logical() {
            // && and || produce one of their operands
            if lt.same_type(rt, &self.types) {
                lt
            } else {
                TypeInfo::of(TypeId::ANY)
            }
        } else {
            self.check_comparison(lhs, rhs, lt, rt, e.span);
            TypeInfo::of(TypeId::BOOLEAN)
        };
        self.dispatch_binary_slot(e, op, lt.type_id, rt.type_id);
        ty
    }

    fn dispatch_binary_slot(&mut self, e: &Expr, op: BinaryOp, lhs: TypeId, rhs: TypeId) {
        if let Some(&generic) = self.binary_ops.get(&op) {
            let slot = self.symbols.dispatch_binary(&self.types, generic, lhs, rhs);
            self.call_slots.insert(e.id, slot);
        }
    }

    /// Result representation of a non-constant arithmetic operator under the
    /// active usage; in natural mode the wider operand wins
    fn arithmetic_result(&self, l: TypeId, r: TypeId) -> TypeId {
        match self.usage {
            NumericUsage::Int => TypeId::INT,
            NumericUsage::Uint => TypeId::UINT,
            NumericUsage::Double => TypeId::DOUBLE,
            NumericUsage::Decimal => TypeId::DECIMAL,
            NumericUsage::Natural => {
                if l == TypeId::DECIMAL || r == TypeId::DECIMAL {
                    TypeId::DECIMAL
                } else if l == TypeId::DOUBLE || r == TypeId::DOUBLE {
                    TypeId::DOUBLE
                } else if l == TypeId::UINT && r == TypeId::UINT {
                    TypeId::UINT
                } else {
                    TypeId::INT
                }
            }
        }
    }

    /// Comparisons between operands that can never hold equal values are
    /// reported rather than silently typed boolean
    fn check_comparison(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        lt: TypeInfo,
        rt: TypeInfo,
        span: Span,
    ) {
        let lnull = matches!(self.constants.get(&lhs.id), Some(Value::Null));
        let rnull = matches!(self.constants.get(&rhs.id), Some(Value::Null));
        if lnull && !rnull && !self.types.accepts_null(rt) {
            let ty = self.type_name(rt);
            self.error(
                SemanticError::NullComparison {
                    ty,
                    span: label(span),
                },
                span,
            );
            return;
        }
        if rnull && !lnull && !self.types.accepts_null(lt) {
            let ty = self.type_name(lt);
            self.error(
                SemanticError::NullComparison {
                    ty,
                    span: label(span),
                },
                span,
            );
            return;
        }

        let l = lt.type_id;
        let r = rt.type_id;
        let scalar = |t: TypeId| {
            t.is_numeric() || matches!(t, TypeId::STRING | TypeId::BOOLEAN)
        };
        let related = l == r
            || l.is_any()
            || r.is_any()
            || l == TypeId::NULL
            || r == TypeId::NULL
            || (scalar(l) && scalar(r))
            || !self.types.is_resolved(l)
            || !self.types.is_resolved(r)
            || self.types.is_interface(l)
            || self.types.is_interface(r)
            || self.types.includes(l, r)
            || self.types.includes(r, l);
        if !related {
            let lhs = self.type_name(lt);
            let rhs = self.type_name(rt);
            self.error(
                SemanticError::IncompatibleComparison {
                    lhs,
                    rhs,
                    span: label(span),
                },
                span,
            );
        }
    }

    fn eval_conditional(
        &mut self,
        e: &Expr,
        cond: &Expr,
        then: &Expr,
        otherwise: &Expr,
    ) -> TypeInfo {
        self.eval_expr(cond);
        let tt = self.eval_expr(then);
        let ot = self.eval_expr(otherwise);

        // a constant condition selects a branch at compile time
        if let Some(c) = self.constants.get(&cond.id).map(|v| v.as_bool()) {
            let taken = if c { then } else { otherwise };
            if let Some(v) = self.constants.get(&taken.id).cloned() {
                self.constants.insert(e.id, v);
            }
        }

        if tt.same_type(ot, &self.types) {
            tt
        } else if tt.type_id.is_numeric() && ot.type_id.is_numeric() {
            if tt.type_id == TypeId::DECIMAL || ot.type_id == TypeId::DECIMAL {
                TypeInfo::of(TypeId::DECIMAL)
            } else {
                TypeInfo::of(TypeId::DOUBLE)
            }
        } else if self.types.includes(tt.type_id, ot.type_id) {
            tt
        } else if self.types.includes(ot.type_id, tt.type_id) {
            ot
        } else {
            TypeInfo::of(TypeId::ANY)
        }
    }

    // ---- assignment -----------------------------------------------------

    fn eval_assign(
        &mut self,
        e: &Expr,
        target: &Expr,
        value: &Expr,
        op: Option<BinaryOp>,
    ) -> TypeInfo {
        // bracket stores are always dynamic
        if let ExprKind::Index { base, index } = &target.kind {
            self.eval_expr(base);
            self.eval_expr(index);
            self.eval_expr(value);
            self.expr_types.insert(target.id, TypeInfo::of(TypeId::ANY));
            return TypeInfo::of(TypeId::ANY);
        }

        let vt = self.eval_expr(value);
        let Some((binding, name)) = self.resolve_assign_target(target) else {
            self.expr_types.insert(target.id, TypeInfo::of(TypeId::ANY));
            return TypeInfo::of(TypeId::ANY);
        };
        self.bindings.insert(target.id, binding);
        self.check_version(&binding, name, target.span);

        // compound assignment also reads the target
        if op.is_some()
            && let Some(get) = binding.get_slot
        {
            self.check_use_def(get, name, target.span);
        }

        let Some(set) = binding.set_slot else {
            // a plain function binding re-materializes as a variable on
            // assignment; only a getter with no setter is read-only
            let plain_method = binding.call_slot.is_some()
                && binding
                    .get_slot
                    .is_none_or(|g| !self.symbols.slot(g).flags.is_accessor);
            if binding.get_slot.is_some() && !plain_method {
                let name = self.name_of(name);
                self.error(
                    SemanticError::AssignToReadOnly {
                        name,
                        span: label(target.span),
                    },
                    target.span,
                );
            }
            self.expr_types.insert(target.id, TypeInfo::of(TypeId::ANY));
            return TypeInfo::of(TypeId::ANY);
        };

        let (sty, is_accessor, is_const, is_method, is_type_binding, already) = {
            let slot = self.symbols.slot(set);
            let sty = if slot.flags.is_accessor {
                slot.params.first().copied().unwrap_or(TypeInfo::of(TypeId::ANY))
            } else {
                slot.ty
            };
            (
                sty,
                slot.flags.is_accessor,
                slot.flags.is_const,
                slot.is_method(),
                matches!(slot.value, Some(Value::Type(_))),
                slot.value.is_some() || self.initialized_consts.contains(&set),
            )
        };

        // class and interface bindings re-materialize as variables on
        // assignment instead of tripping the const check
        if is_type_binding {
            self.expr_types.insert(target.id, TypeInfo::of(TypeId::ANY));
            return TypeInfo::of(TypeId::ANY);
        }

        if is_const && !is_accessor {
            if already {
                let name = self.name_of(name);
                self.error(
                    SemanticError::AssignToConst {
                        name,
                        span: label(target.span),
                    },
                    target.span,
                );
            } else {
                self.initialized_consts.insert(set);
            }
        }

        self.coerce(value, vt, sty);
        if !is_method {
            self.record_def(set);
        }
        self.expr_types.insert(target.id, sty);
        sty
    }

    /// Bind an assignment target. None means the store is dynamic (or the
    /// failure has already been reported)
    fn resolve_assign_target(&mut self, target: &Expr) -> Option<(Binding, Symbol)> {
        let (r, name) = match &target.kind {
            ExprKind::Ident(name) => (
                Reference::unqualified(*name, self.open_namespaces(), target.span),
                *name,
            ),
            ExprKind::Qualified { qualifier, name } => (
                Reference::qualified(*name, Namespace::User(*qualifier), target.span),
                *name,
            ),
            ExprKind::Member { base, name } => {
                let bt = self.eval_expr(base);
                let scope = match self.constants.get(&base.id) {
                    Some(Value::Type(t)) => self.types.def(*t).static_scope,
                    _ => {
                        let t = bt.type_id;
                        if t.is_any() || !self.types.is_resolved(t) || self.types.is_dynamic(t)
                        {
                            None
                        } else {
                            self.types.def(t).instance_scope
                        }
                    }
                };
                let scope = scope?;
                (
                    Reference::member(*name, self.open_namespaces(), scope, target.span),
                    *name,
                )
            }
            _ => return None,
        };

        match resolve(&self.symbols, &r, &self.chain, self.lowest_searchable) {
            Resolution::Resolved(b) => Some((b, name)),
            Resolution::Ambiguous => {
                let name = self.name_of(name);
                self.error(
                    SemanticError::AmbiguousReference {
                        name,
                        span: label(target.span),
                    },
                    target.span,
                );
                None
            }
            Resolution::NotFound => {
                if !self.reads_may_be_dynamic() {
                    let scopes: Vec<ScopeId> = match r.base {
                        Some(s) => vec![s],
                        None => self.chain[self.lowest_searchable..].to_vec(),
                    };
                    self.report_unresolved(name, target.span, &scopes);
                }
                None
            }
        }
    }

    // ---- conversions ----------------------------------------------------

    /// Check an implicit conversion and record it when the code generator
    /// must materialize one
    pub(super) fn coerce(&mut self, e: &Expr, from: TypeInfo, to: TypeInfo) {
        if to.type_id.is_any() || from.type_id.is_any() || to.type_id == TypeId::VOID {
            return;
        }
        if from.type_id == to.type_id {
            return;
        }
        if from.type_id.is_numeric() && to.type_id.is_numeric() {
            self.coercions.insert(e.id, to);
            return;
        }
        if to.type_id == TypeId::BOOLEAN {
            self.coercions.insert(e.id, to);
            return;
        }
        if from.type_id == TypeId::NULL {
            if !self.types.accepts_null(to) {
                let expected = self.type_name(to);
                self.error(
                    SemanticError::CoercionFailure {
                        expected,
                        found: "null".to_string(),
                        span: label(e.span),
                    },
                    e.span,
                );
            }
            return;
        }
        if self.types.includes(to.type_id, from.type_id) {
            return;
        }
        // unresolved operand types already produced their own diagnostics
        if !self.types.is_resolved(from.type_id) || !self.types.is_resolved(to.type_id) {
            return;
        }
        let expected = self.type_name(to);
        let found = self.type_name(from);
        self.error(
            SemanticError::CoercionFailure {
                expected,
                found,
                span: label(e.span),
            },
            e.span,
        );
    }

    /// Check a folded constant against a declared type, producing the value
    /// as it will be stored. None means incompatible (reported) or lossy.
    pub(super) fn check_constant_compat(
        &mut self,
        v: &Value,
        target: TypeInfo,
        span: Span,
    ) -> Option<Value> {
        let incompatible = |ev: &mut Self| {
            let expected = ev.type_name(target);
            let found = ev.types.name(v.type_id()).to_string();
            ev.error(
                SemanticError::IncompatibleDefaultValue {
                    expected,
                    found,
                    span: label(span),
                },
                span,
            );
            None
        };
        let lossy = |ev: &mut Self| {
            let value = v.to_display_string();
            let target = ev.type_name(target);
            ev.error(
                SemanticError::LossyConversion {
                    value,
                    target,
                    span: label(span),
                },
                span,
            );
            None
        };

        match target.type_id {
            TypeId::ANY => Some(v.clone()),
            TypeId::INT => match v {
                Value::Int(_) => Some(v.clone()),
                Value::Uint(u) if *u <= i32::MAX as u32 => Some(Value::Int(*u as i32)),
                Value::Uint(_) => lossy(self),
                Value::Double(d) => {
                    if d.fract() == 0.0
                        && *d >= i32::MIN as f64
                        && *d <= i32::MAX as f64
                    {
                        Some(Value::Int(*d as i32))
                    } else {
                        lossy(self)
                    }
                }
                Value::Decimal(d) => {
                    if d.fract().is_zero()
                        && let Some(i) = d.to_i64()
                        && i >= i32::MIN as i64
                        && i <= i32::MAX as i64
                    {
                        Some(Value::Int(i as i32))
                    } else {
                        lossy(self)
                    }
                }
                _ => incompatible(self),
            },
            TypeId::UINT => match v {
                Value::Uint(_) => Some(v.clone()),
                Value::Int(i) if *i >= 0 => Some(Value::Uint(*i as u32)),
                Value::Int(_) => lossy(self),
                Value::Double(d) => {
                    if d.fract() == 0.0 && *d >= 0.0 && *d <= u32::MAX as f64 {
                        Some(Value::Uint(*d as u32))
                    } else {
                        lossy(self)
                    }
                }
                Value::Decimal(d) => {
                    if d.fract().is_zero()
                        && let Some(i) = d.to_i64()
                        && i >= 0
                        && i <= u32::MAX as i64
                    {
                        Some(Value::Uint(i as u32))
                    } else {
                        lossy(self)
                    }
                }
                _ => incompatible(self),
            },
            TypeId::DOUBLE => {
                if v.is_numeric() {
                    Some(Value::Double(v.as_double()))
                } else {
                    incompatible(self)
                }
            }
            TypeId::DECIMAL => {
                if v.is_numeric() {
                    Some(Value::Decimal(v.as_decimal()))
                } else {
                    incompatible(self)
                }
            }
            TypeId::BOOLEAN => match v {
                Value::Bool(_) => Some(v.clone()),
                _ => incompatible(self),
            },
            TypeId::STRING => match v {
                Value::Str(_) | Value::Null => Some(v.clone()),
                _ => incompatible(self),
            },
            _ => match v {
                Value::Null if self.types.accepts_null(target) => Some(Value::Null),
                Value::Type(_) if target.type_id == TypeId::CLASS => Some(v.clone()),
                _ => incompatible(self),
            },
        }
    }
}
