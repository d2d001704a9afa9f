//! Statement evaluation and the body-flush machinery.
//!
//! Bodies queued during the declaration phase run here, each under its own
//! reaching-definition graph. Statements in a terminal block (after an
//! unconditional return/throw, or under a constant-false condition) are not
//! evaluated, but variable declarations inside them still get their slot
//! and type so later references resolve.

use super::{DeferredBody, Evaluator, ThisContext};
use crate::errors::SemanticError;
use crate::errors::label;
use crate::flow::FlowGraph;
use crate::scope::{BuilderKind, Namespace};
use crate::types::{TypeId, TypeInfo};
use sable_ast::{Block, Decl, FuncDecl, FuncKind, Program, Stmt, VarDecl};

impl<'a> Evaluator<'a> {
    /// Evaluation phase: global variable initializers, queued bodies, then
    /// top-level statements. Everything runs against the global definition
    /// graph except the bodies, which each get their own
    #[tracing::instrument(skip_all)]
    pub(super) fn evaluate_bodies(&mut self, program: &'a Program) {
        self.flow = Some(FlowGraph::new());
        self.flow_domain = Some(self.global);
        self.this_stack.push(ThisContext::Global);

        for decl in &program.decls {
            if let Decl::Var(v) = decl {
                self.eval_global_var_init(v);
            }
        }

        let deferred = std::mem::take(&mut self.deferred);
        for body in deferred {
            self.flush_body(body);
        }

        for stmt in &program.stmts {
            self.eval_stmt(stmt);
        }

        self.this_stack.pop();
        self.finish_flow();
    }

    /// Run one queued body in its captured scope chain
    fn flush_body(&mut self, body: DeferredBody<'a>) {
        let is_ctor = body.func.kind == FuncKind::Constructor;
        let declared_ret = self.symbols.slot(body.slot).ty;
        let ret = if is_ctor {
            TypeInfo::of(TypeId::VOID)
        } else {
            declared_ret
        };

        let saved_chain = std::mem::replace(&mut self.chain, body.chain);
        self.chain.push(body.activation);
        let saved_flow = std::mem::replace(&mut self.flow, Some(FlowGraph::new()));
        let saved_domain = std::mem::replace(&mut self.flow_domain, Some(body.activation));
        let saved_return = std::mem::replace(&mut self.return_ty, Some(ret));
        let saved_class = std::mem::replace(&mut self.current_class, body.class);
        let saved_function = std::mem::replace(&mut self.current_function, Some(body.func.name));
        let saved_usage = std::mem::replace(&mut self.usage, self.options.numeric_usage);
        let saved_lowest = std::mem::replace(&mut self.lowest_searchable, 0);
        let saved_with = std::mem::replace(&mut self.with_depth, 0);
        self.this_stack.push(body.this_ctx);

        // parameters are defined on entry
        for &p in &body.param_slots {
            self.record_def(p);
        }

        if let Some(block) = &body.func.body {
            self.eval_block(block);
        }

        // a non-void function must not fall off the end
        if !is_ctor
            && ret.type_id != TypeId::VOID
            && !ret.type_id.is_any()
            && !self.flow_is_terminal()
        {
            let name = self.name_of(body.func.name);
            self.error(
                SemanticError::MustReturnValue {
                    name,
                    span: label(body.func.span),
                },
                body.func.span,
            );
        }

        if let Some(mut flow) = std::mem::replace(&mut self.flow, saved_flow) {
            flow.solve();
        }
        self.flow_domain = saved_domain;
        self.this_stack.pop();
        self.chain = saved_chain;
        self.return_ty = saved_return;
        self.current_class = saved_class;
        self.current_function = saved_function;
        self.usage = saved_usage;
        self.lowest_searchable = saved_lowest;
        self.with_depth = saved_with;
    }

    /// A function expression's body is checked in place, under its own
    /// definition graph and an anonymous-function receiver
    pub(super) fn eval_func_expr(&mut self, f: &FuncDecl) -> TypeInfo {
        let (ret, ptys, _styles) = self.resolve_signature(f);

        let activation = self.symbols.new_scope(BuilderKind::Activation);
        let mut param_slots = Vec::with_capacity(f.params.len());
        for (p, &pty) in f.params.iter().zip(ptys.iter()) {
            let ps = self
                .symbols
                .declare_variable(activation, p.name, Namespace::Public, pty, false);
            self.var_slots.insert(p.id, ps);
            self.slot_spans.insert(ps, p.span);
            param_slots.push(ps);
        }
        let Some(block) = &f.body else {
            return TypeInfo::of(TypeId::FUNCTION);
        };

        self.chain.push(activation);
        let saved_flow = std::mem::replace(&mut self.flow, Some(FlowGraph::new()));
        let saved_domain = std::mem::replace(&mut self.flow_domain, Some(activation));
        let saved_return = std::mem::replace(&mut self.return_ty, Some(ret));
        let saved_function = std::mem::replace(&mut self.current_function, Some(f.name));
        let saved_usage = std::mem::replace(&mut self.usage, self.options.numeric_usage);
        self.this_stack.push(ThisContext::AnonymousFunction);

        for &p in &param_slots {
            self.record_def(p);
        }
        self.eval_block(block);

        if ret.type_id != TypeId::VOID && !ret.type_id.is_any() && !self.flow_is_terminal() {
            let name = self.name_of(f.name);
            self.error(
                SemanticError::MustReturnValue {
                    name,
                    span: label(f.span),
                },
                f.span,
            );
        }

        if let Some(mut flow) = std::mem::replace(&mut self.flow, saved_flow) {
            flow.solve();
        }
        self.flow_domain = saved_domain;
        self.this_stack.pop();
        self.chain.pop();
        self.return_ty = saved_return;
        self.current_function = saved_function;
        self.usage = saved_usage;
        TypeInfo::of(TypeId::FUNCTION)
    }

    /// A global variable's initializer evaluates in the top-level graph so
    /// its definition reaches later top-level reads
    fn eval_global_var_init(&mut self, v: &VarDecl) {
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
                }
            }
            None => self.coerce(init, it, ty),
        }
        if v.is_const {
            self.initialized_consts.insert(slot);
        }
        self.record_def(slot);
    }

    /// Statements in one block share a numeric pragma scope: a `use`
    /// pragma inside is effective to the end of the block
    pub(super) fn eval_block(&mut self, block: &Block) {
        let saved_usage = self.usage;
        for stmt in &block.stmts {
            self.eval_stmt(stmt);
        }
        self.usage = saved_usage;
    }

    pub(super) fn eval_stmt(&mut self, stmt: &Stmt) {
        if self.flow_is_terminal() {
            self.declare_only(stmt);
            return;
        }
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(e);
            }
            Stmt::Var(v) => self.eval_local_var(v),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => self.eval_if(cond, then, otherwise.as_ref()),
            Stmt::While { cond, body, .. } => self.eval_while(cond, body),
            Stmt::Return { value, span } => {
                match (value, self.return_ty) {
                    (Some(v), Some(ret)) => {
                        let vt = self.eval_expr(v);
                        if ret.type_id == TypeId::VOID {
                            self.error(
                                SemanticError::VoidReturnValue { span: label(*span) },
                                *span,
                            );
                        } else {
                            self.coerce(v, vt, ret);
                        }
                    }
                    (Some(v), None) => {
                        // top-level return; nothing to check against
                        self.eval_expr(v);
                    }
                    (None, Some(ret))
                        if ret.type_id != TypeId::VOID && !ret.type_id.is_any() =>
                    {
                        let name = self
                            .current_function
                            .map(|s| self.name_of(s))
                            .unwrap_or_default();
                        self.error(
                            SemanticError::MustReturnValue {
                                name,
                                span: label(*span),
                            },
                            *span,
                        );
                    }
                    _ => {}
                }
                self.flow_mark_terminal();
            }
            Stmt::Throw { value, .. } => {
                self.eval_expr(value);
                self.flow_mark_terminal();
            }
            Stmt::Block(b) => {
                // no block scoping: locals hoist to the activation frame
                self.eval_block(b);
            }
            Stmt::With { object, body, .. } => self.eval_with(object, body),
            Stmt::UseNumeric { usage, .. } => {
                self.usage = *usage;
            }
        }
    }

    fn eval_local_var(&mut self, v: &VarDecl) {
        let slot = self.declare_local(v);
        if let Some(init) = &v.init {
            let ty = self.symbols.slot(slot).ty;
            let it = self.eval_expr(init);
            match self.constants.get(&init.id).cloned() {
                Some(cv) => {
                    if let Some(stored) = self.check_constant_compat(&cv, ty, init.span)
                        && v.is_const
                    {
                        self.symbols.slot_mut(slot).value = Some(stored);
                    }
                }
                None => self.coerce(init, it, ty),
            }
            if v.is_const {
                self.initialized_consts.insert(slot);
            }
            self.record_def(slot);
        }
    }

    fn declare_local(&mut self, v: &VarDecl) -> crate::slot::SlotId {
        let ty = self.resolve_type_expr(v.ty.as_ref());
        let scope = *self.chain.last().unwrap_or(&self.global);
        let slot = self
            .symbols
            .declare_variable(scope, v.name, Namespace::Public, ty, v.is_const);
        self.var_slots.insert(v.id, slot);
        self.slot_spans.insert(slot, v.span);
        slot
    }

    fn eval_if(&mut self, cond: &sable_ast::Expr, then: &Block, otherwise: Option<&Block>) {
        self.eval_expr(cond);
        let cval = self.constants.get(&cond.id).map(|v| v.as_bool());
        let Some(cond_block) = self.flow_current() else {
            // no graph (initializer context): walk both branches flat
            self.eval_block(then);
            if let Some(e) = otherwise {
                self.eval_block(e);
            }
            return;
        };

        // constant conditions prune the untaken branch
        if cval == Some(false) {
            self.flow_start(&[]);
        } else {
            self.flow_start(&[cond_block]);
        }
        self.eval_block(then);
        let then_end = self.flow_current();

        let join_preds: Vec<_> = match otherwise {
            Some(else_block) => {
                if cval == Some(true) {
                    self.flow_start(&[]);
                } else {
                    self.flow_start(&[cond_block]);
                }
                self.eval_block(else_block);
                let else_end = self.flow_current();
                [then_end, else_end].into_iter().flatten().collect()
            }
            None => match cval {
                Some(true) => then_end.into_iter().collect(),
                Some(false) => vec![cond_block],
                None => [Some(cond_block), then_end].into_iter().flatten().collect(),
            },
        };
        self.flow_start(&join_preds);
    }

    fn eval_while(&mut self, cond: &sable_ast::Expr, body: &Block) {
        let Some(before) = self.flow_current() else {
            self.eval_expr(cond);
            self.eval_block(body);
            return;
        };
        let cond_block = self.flow_start(&[before]);
        self.eval_expr(cond);
        let cval = self.constants.get(&cond.id).map(|v| v.as_bool());

        let body_preds: Vec<_> = if cval == Some(false) {
            Vec::new()
        } else {
            cond_block.into_iter().collect()
        };
        self.flow_start(&body_preds);
        self.eval_block(body);
        // back edge so loop-carried definitions reach the condition
        if let (Some(cb), Some(be)) = (cond_block, self.flow_current()) {
            self.flow_add_pred(cb, be);
        }

        // a constant-true loop only exits through the body never reaching
        // the condition again, so the join is unreachable
        let join_preds: Vec<_> = if cval == Some(true) {
            Vec::new()
        } else {
            cond_block.into_iter().collect()
        };
        self.flow_start(&join_preds);
    }

    /// `with` pushes a dynamic scope: names below it can no longer be
    /// statically bound, and unresolved reads inside stay silent
    fn eval_with(&mut self, object: &sable_ast::Expr, body: &Block) {
        self.eval_expr(object);
        let scope = self.symbols.new_scope(BuilderKind::Block);
        self.symbols.scope_mut(scope).is_dynamic = true;
        self.chain.push(scope);
        let saved_lowest = self.lowest_searchable;
        self.lowest_searchable = self.chain.len() - 1;
        self.with_depth += 1;
        self.eval_block(body);
        self.with_depth -= 1;
        self.lowest_searchable = saved_lowest;
        self.chain.pop();
    }

    /// Slot and type setup for declarations inside unreachable code; their
    /// initializers and everything else are skipped
    fn declare_only(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(v) => {
                self.declare_local(v);
            }
            Stmt::Block(b) => {
                for s in &b.stmts {
                    self.declare_only(s);
                }
            }
            Stmt::If {
                then, otherwise, ..
            } => {
                for s in &then.stmts {
                    self.declare_only(s);
                }
                if let Some(e) = otherwise {
                    for s in &e.stmts {
                        self.declare_only(s);
                    }
                }
            }
            Stmt::While { body, .. } | Stmt::With { body, .. } => {
                for s in &body.stmts {
                    self.declare_only(s);
                }
            }
            _ => {}
        }
    }
}
