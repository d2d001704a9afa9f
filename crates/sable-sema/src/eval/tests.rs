//! End-to-end evaluator tests: small hand-built programs through the full
//! three-phase analysis.

use super::{Analysis, Evaluator, SessionOptions};
use crate::errors::{SemanticError, SemanticWarning};
use crate::types::TypeId;
use crate::value::Value;
use sable_ast::{
    BinaryOp, Block, ClassDecl, ClassMember, Decl, Expr, ExprKind, FuncDecl, FuncKind,
    InterfaceDecl, Interner, MemberAttrs, NodeIdGen, NumberSuffix, NumericUsage, Param, Program,
    Span, Stmt, Symbol, TypeExpr, TypePath, VarDecl, Visibility,
};

/// Builds AST fragments with fresh node ids and interned names
struct Build {
    interner: Interner,
    ids: NodeIdGen,
}

impl Build {
    fn new() -> Self {
        Self {
            interner: Interner::new(),
            ids: NodeIdGen::new(),
        }
    }

    fn sym(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.next(),
            kind,
            span: Span::default(),
        }
    }

    fn num(&mut self, text: &str) -> Expr {
        self.expr(ExprKind::Number {
            text: text.to_string(),
            suffix: NumberSuffix::None,
        })
    }

    fn null(&mut self) -> Expr {
        self.expr(ExprKind::Null)
    }

    fn ident(&mut self, name: &str) -> Expr {
        let name = self.sym(name);
        self.expr(ExprKind::Ident(name))
    }

    fn member(&mut self, base: Expr, name: &str) -> Expr {
        let name = self.sym(name);
        self.expr(ExprKind::Member {
            base: Box::new(base),
            name,
        })
    }

    fn bin(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
            op: None,
        })
    }

    fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn construct(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn ty(&mut self, name: &str) -> TypeExpr {
        TypeExpr::Name(self.path(name))
    }

    fn path(&mut self, name: &str) -> TypePath {
        TypePath {
            segments: vec![self.sym(name)],
            span: Span::default(),
        }
    }

    fn var(&mut self, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> VarDecl {
        let name = self.sym(name);
        VarDecl {
            id: self.ids.next(),
            name,
            ty,
            init,
            is_const: false,
            attrs: MemberAttrs::default(),
            span: Span::default(),
        }
    }

    fn const_var(&mut self, name: &str, ty: Option<TypeExpr>, init: Expr) -> VarDecl {
        let mut v = self.var(name, ty, Some(init));
        v.is_const = true;
        v
    }

    fn param(&mut self, name: &str, ty: Option<TypeExpr>) -> Param {
        let name = self.sym(name);
        Param {
            id: self.ids.next(),
            name,
            ty,
            default: None,
            is_rest: false,
            span: Span::default(),
        }
    }

    fn func(
        &mut self,
        name: &str,
        kind: FuncKind,
        params: Vec<Param>,
        return_ty: Option<TypeExpr>,
        body: Option<Block>,
    ) -> FuncDecl {
        let name = self.sym(name);
        FuncDecl {
            id: self.ids.next(),
            name,
            kind,
            params,
            return_ty,
            body,
            attrs: MemberAttrs::default(),
            span: Span::default(),
        }
    }

    fn class(&mut self, name: &str, members: Vec<ClassMember>) -> ClassDecl {
        let name = self.sym(name);
        ClassDecl {
            name,
            extends: None,
            implements: Vec::new(),
            members,
            is_dynamic: false,
            is_final: false,
            attrs: MemberAttrs::default(),
            span: Span::default(),
        }
    }

    fn program(&self, decls: Vec<Decl>, stmts: Vec<Stmt>) -> Program {
        Program {
            decls,
            stmts,
            next_node_id: self.ids.next_raw(),
        }
    }

    fn run(&self, program: &Program) -> Analysis {
        Evaluator::new(&self.interner, SessionOptions::default()).analyze(program)
    }

    fn run_with(&self, program: &Program, options: SessionOptions) -> Analysis {
        Evaluator::new(&self.interner, options).analyze(program)
    }
}

fn has_error(a: &Analysis, pred: impl Fn(&SemanticError) -> bool) -> bool {
    a.errors.iter().any(|e| pred(&e.error))
}

#[test]
fn undefined_identifier_is_reported() {
    let mut b = Build::new();
    let read = b.ident("mystery");
    let p = b.program(Vec::new(), vec![Stmt::Expr(read)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::UndefinedProperty { name, .. } if name == "mystery"
    )));
}

#[test]
fn unresolved_reads_inside_with_stay_silent() {
    let mut b = Build::new();
    let obj = b.var("obj", None, None);
    let object = b.ident("obj");
    let read = b.ident("mystery");
    let p = b.program(
        vec![Decl::Var(obj)],
        vec![Stmt::With {
            object,
            body: Block {
                stmts: vec![Stmt::Expr(read)],
            },
            span: Span::default(),
        }],
    );
    let a = b.run(&p);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
}

#[test]
fn ambiguous_reference_across_open_namespaces() {
    let mut b = Build::new();
    let mut public_var = b.var("dup", None, None);
    public_var.attrs.visibility = Visibility::Public;
    let mut internal_var = b.var("dup", None, None);
    internal_var.attrs.visibility = Visibility::Internal;
    let read = b.ident("dup");
    let p = b.program(
        vec![Decl::Var(public_var), Decl::Var(internal_var)],
        vec![Stmt::Expr(read)],
    );
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::AmbiguousReference { name, .. } if name == "dup"
    )));
}

#[test]
fn natural_mode_addition_folds() {
    let mut b = Build::new();
    let one = b.num("1");
    let two = b.num("2");
    let sum = b.bin(BinaryOp::Add, one, two);
    let sum_id = sum.id;
    let p = b.program(Vec::new(), vec![Stmt::Expr(sum)]);
    let a = b.run(&p);
    assert_eq!(a.constants.get(&sum_id), Some(&Value::Uint(3)));
}

#[test]
fn use_int_pragma_forces_int_folding() {
    let mut b = Build::new();
    let one = b.num("1");
    let two = b.num("2");
    let sum = b.bin(BinaryOp::Add, one, two);
    let sum_id = sum.id;
    let p = b.program(
        Vec::new(),
        vec![
            Stmt::UseNumeric {
                usage: NumericUsage::Int,
                span: Span::default(),
            },
            Stmt::Expr(sum),
        ],
    );
    let a = b.run(&p);
    assert_eq!(a.constants.get(&sum_id), Some(&Value::Int(3)));
}

#[test]
fn numeric_pragma_is_scoped_to_its_block() {
    let mut b = Build::new();
    let one = b.num("1");
    let two = b.num("2");
    let inner = b.bin(BinaryOp::Add, one, two);
    let inner_id = inner.id;
    let one = b.num("1");
    let two = b.num("2");
    let outer = b.bin(BinaryOp::Add, one, two);
    let outer_id = outer.id;
    let p = b.program(
        Vec::new(),
        vec![
            Stmt::Block(Block {
                stmts: vec![
                    Stmt::UseNumeric {
                        usage: NumericUsage::Double,
                        span: Span::default(),
                    },
                    Stmt::Expr(inner),
                ],
            }),
            Stmt::Expr(outer),
        ],
    );
    let a = b.run(&p);
    assert_eq!(a.constants.get(&inner_id), Some(&Value::Double(3.0)));
    assert_eq!(a.constants.get(&outer_id), Some(&Value::Uint(3)));
}

#[test]
fn const_reassignment_is_an_error() {
    let mut b = Build::new();
    let ty = b.ty("int");
    let init = b.num("1");
    let c = b.const_var("c", Some(ty), init);
    let target = b.ident("c");
    let two = b.num("2");
    let store = b.assign(target, two);
    let p = b.program(vec![Decl::Var(c)], vec![Stmt::Expr(store)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::AssignToConst { name, .. } if name == "c"
    )));
}

#[test]
fn use_before_init_warns_and_requests_default_init() {
    let mut b = Build::new();
    let flag_ty = b.ty("Boolean");
    let flag = b.param("flag", Some(flag_ty));
    let x_ty = b.ty("int");
    let x = b.var("x", Some(x_ty), None);
    let cond = b.ident("flag");
    let target = b.ident("x");
    let one = b.num("1");
    let store = b.assign(target, one);
    let read = b.ident("x");
    let body = Block {
        stmts: vec![
            Stmt::Var(x),
            Stmt::If {
                cond,
                then: Block {
                    stmts: vec![Stmt::Expr(store)],
                },
                otherwise: Some(Block {
                    stmts: vec![Stmt::Expr(read)],
                }),
                span: Span::default(),
            },
        ],
    };
    let f = b.func("f", FuncKind::Function, vec![flag], Some(TypeExpr::Void), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(a.warnings.iter().any(|w| matches!(
        &w.warning,
        SemanticWarning::UsedBeforeInit { name, .. } if name == "x"
    )));
    assert!(!a.needs_default_init.is_empty());
}

#[test]
fn definitions_from_both_branches_reach_the_join() {
    let mut b = Build::new();
    let flag_ty = b.ty("Boolean");
    let flag = b.param("flag", Some(flag_ty));
    let x_ty = b.ty("int");
    let x = b.var("x", Some(x_ty), None);
    let cond = b.ident("flag");
    let t1 = b.ident("x");
    let one = b.num("1");
    let then_store = b.assign(t1, one);
    let t2 = b.ident("x");
    let two = b.num("2");
    let else_store = b.assign(t2, two);
    let read = b.ident("x");
    let body = Block {
        stmts: vec![
            Stmt::Var(x),
            Stmt::If {
                cond,
                then: Block {
                    stmts: vec![Stmt::Expr(then_store)],
                },
                otherwise: Some(Block {
                    stmts: vec![Stmt::Expr(else_store)],
                }),
                span: Span::default(),
            },
            Stmt::Expr(read),
        ],
    };
    let f = b.func("f", FuncKind::Function, vec![flag], Some(TypeExpr::Void), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(a.warnings.is_empty(), "unexpected warnings: {:?}", a.warnings);
}

#[test]
fn statements_after_return_are_not_evaluated() {
    let mut b = Build::new();
    let one = b.num("1");
    let ret_ty = b.ty("int");
    let dead_init = b.ident("mystery");
    let dead = b.var("x", None, Some(dead_init));
    let dead_id = dead.id;
    let body = Block {
        stmts: vec![
            Stmt::Return {
                value: Some(one),
                span: Span::default(),
            },
            Stmt::Var(dead),
        ],
    };
    let f = b.func("f", FuncKind::Function, Vec::new(), Some(ret_ty), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    // the unreachable initializer is skipped, so its bad read never reports
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
    // but the declaration itself still gets a slot
    assert!(a.var_slots.contains_key(&dead_id));
}

#[test]
fn falling_off_a_non_void_function_is_an_error() {
    let mut b = Build::new();
    let ret_ty = b.ty("int");
    let f = b.func(
        "f",
        FuncKind::Function,
        Vec::new(),
        Some(ret_ty),
        Some(Block::default()),
    );
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::MustReturnValue { name, .. } if name == "f"
    )));
}

#[test]
fn returning_a_value_from_void_is_an_error() {
    let mut b = Build::new();
    let one = b.num("1");
    let body = Block {
        stmts: vec![Stmt::Return {
            value: Some(one),
            span: Span::default(),
        }],
    };
    let f = b.func("f", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(e, SemanticError::VoidReturnValue { .. })));
}

#[test]
fn call_arity_is_checked() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let param = b.param("a", Some(pty));
    let f = b.func("f", FuncKind::Function, vec![param], Some(TypeExpr::Void), None);
    let callee = b.ident("f");
    let empty_call = b.call(callee, vec![]);
    let callee = b.ident("f");
    let one = b.num("1");
    let two = b.num("2");
    let fat_call = b.call(callee, vec![one, two]);
    let p = b.program(
        vec![Decl::Function(f)],
        vec![Stmt::Expr(empty_call), Stmt::Expr(fat_call)],
    );
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::WrongArgumentCount { expected: 1, found: 0, .. }
    )));
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::TooManyArguments { expected: 1, found: 2, .. }
    )));
}

#[test]
fn null_comparison_against_non_nullable_type() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let param = b.param("a", Some(pty));
    let lhs = b.ident("a");
    let rhs = b.null();
    let cmp = b.bin(BinaryOp::Eq, lhs, rhs);
    let body = Block {
        stmts: vec![Stmt::Expr(cmp)],
    };
    let f = b.func("f", FuncKind::Function, vec![param], Some(TypeExpr::Void), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(e, SemanticError::NullComparison { .. })));
}

#[test]
fn version_gated_binding_is_unavailable_below_target() {
    let mut b = Build::new();
    let mut v = b.var("gated", None, None);
    v.attrs.min_version = Some(5);
    let read = b.ident("gated");
    let p = b.program(vec![Decl::Var(v)], vec![Stmt::Expr(read)]);
    let a = b.run_with(
        &p,
        SessionOptions {
            target_version: 3,
            ..SessionOptions::default()
        },
    );
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::VersionMismatch { required: 5, target: 3, .. }
    )));
}

#[test]
fn static_member_reads_through_the_class_binding() {
    let mut b = Build::new();
    let vty = b.ty("int");
    let mut v = b.var("count", Some(vty), None);
    v.attrs.is_static = true;
    v.attrs.visibility = Visibility::Public;
    let c = b.class("Counter", vec![ClassMember::Var(v)]);
    let base = b.ident("Counter");
    let read = b.member(base, "count");
    let read_id = read.id;
    let p = b.program(vec![Decl::Class(c)], vec![Stmt::Expr(read)]);
    let a = b.run(&p);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
    // the class binding itself is defined at declaration, not flow-tracked
    assert!(a.warnings.is_empty(), "unexpected warnings: {:?}", a.warnings);
    assert_eq!(
        a.expr_types.get(&read_id).map(|t| t.type_id),
        Some(TypeId::INT)
    );
}

#[test]
fn unknown_static_member_is_reported() {
    let mut b = Build::new();
    let c = b.class("Counter", Vec::new());
    let base = b.ident("Counter");
    let read = b.member(base, "missing");
    let p = b.program(vec![Decl::Class(c)], vec![Stmt::Expr(read)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::UndefinedProperty { name, .. } if name == "missing"
    )));
}

#[test]
fn constructor_arity_is_checked_at_new() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let param = b.param("a", Some(pty));
    let ctor = b.func("Box", FuncKind::Constructor, vec![param], None, None);
    let c = b.class("Box", vec![ClassMember::Function(ctor)]);
    let callee = b.ident("Box");
    let make = b.construct(callee, vec![]);
    let p = b.program(vec![Decl::Class(c)], vec![Stmt::Expr(make)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::WrongArgumentCount { expected: 1, found: 0, .. }
    )));
}

#[test]
fn implicit_constructor_cannot_chain_to_base_requiring_arguments() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let param = b.param("a", Some(pty));
    let ctor = b.func("Base", FuncKind::Constructor, vec![param], None, None);
    let base = b.class("Base", vec![ClassMember::Function(ctor)]);
    let mut derived = b.class("Derived", Vec::new());
    derived.extends = Some(b.path("Base"));
    let p = b.program(vec![Decl::Class(base), Decl::Class(derived)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::NoDefaultBaseConstructor { base, .. } if base == "Base"
    )));
}

#[test]
fn accessor_pair_types_must_agree() {
    let mut b = Build::new();
    let gty = b.ty("int");
    let getter = b.func("prop", FuncKind::Getter, Vec::new(), Some(gty), None);
    let sty = b.ty("String");
    let sp = b.param("value", Some(sty));
    let setter = b.func("prop", FuncKind::Setter, vec![sp], None, None);
    let c = b.class(
        "Holder",
        vec![ClassMember::Function(getter), ClassMember::Function(setter)],
    );
    let p = b.program(vec![Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::AccessorTypeMismatch { name, .. } if name == "prop"
    )));
}

#[test]
fn missing_interface_method_is_reported() {
    let mut b = Build::new();
    let m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    let i = InterfaceDecl {
        name: b.sym("Actor"),
        extends: Vec::new(),
        members: vec![m],
        span: Span::default(),
    };
    let mut c = b.class("Robot", Vec::new());
    c.implements = vec![b.path("Actor")];
    let p = b.program(vec![Decl::Interface(i), Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::UnknownInterfaceMethod { name, interface, .. }
            if name == "act" && interface == "Actor"
    )));
}

#[test]
fn incompatible_interface_implementation_is_reported() {
    let mut b = Build::new();
    let m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    let i = InterfaceDecl {
        name: b.sym("Actor"),
        extends: Vec::new(),
        members: vec![m],
        span: Span::default(),
    };
    let pty = b.ty("int");
    let extra = b.param("times", Some(pty));
    let mut bad = b.func("act", FuncKind::Function, vec![extra], Some(TypeExpr::Void), None);
    bad.attrs.visibility = Visibility::Public;
    let mut c = b.class("Robot", vec![ClassMember::Function(bad)]);
    c.implements = vec![b.path("Actor")];
    let p = b.program(vec![Decl::Interface(i), Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::IncompatibleInterfaceMethod { name, .. } if name == "act"
    )));
}

#[test]
fn conforming_implementation_passes() {
    let mut b = Build::new();
    let m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    let i = InterfaceDecl {
        name: b.sym("Actor"),
        extends: Vec::new(),
        members: vec![m],
        span: Span::default(),
    };
    let mut good = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    good.attrs.visibility = Visibility::Public;
    let mut c = b.class("Robot", vec![ClassMember::Function(good)]);
    c.implements = vec![b.path("Actor")];
    let p = b.program(vec![Decl::Interface(i), Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
}

#[test]
fn overriding_a_final_method_is_an_error() {
    let mut b = Build::new();
    let mut base_m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    base_m.attrs.visibility = Visibility::Public;
    base_m.attrs.is_final = true;
    let base = b.class("Base", vec![ClassMember::Function(base_m)]);
    let mut over = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    over.attrs.visibility = Visibility::Public;
    over.attrs.is_override = true;
    let mut derived = b.class("Derived", vec![ClassMember::Function(over)]);
    derived.extends = Some(b.path("Base"));
    let p = b.program(vec![Decl::Class(base), Decl::Class(derived)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::OverrideFinal { name, .. } if name == "act"
    )));
}

#[test]
fn override_with_mismatched_signature_is_an_error() {
    let mut b = Build::new();
    let mut base_m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    base_m.attrs.visibility = Visibility::Public;
    let base = b.class("Base", vec![ClassMember::Function(base_m)]);
    let pty = b.ty("int");
    let extra = b.param("times", Some(pty));
    let mut over = b.func("act", FuncKind::Function, vec![extra], Some(TypeExpr::Void), None);
    over.attrs.visibility = Visibility::Public;
    over.attrs.is_override = true;
    let mut derived = b.class("Derived", vec![ClassMember::Function(over)]);
    derived.extends = Some(b.path("Base"));
    let p = b.program(vec![Decl::Class(base), Decl::Class(derived)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::IncompatibleOverride { name, .. } if name == "act"
    )));
}

#[test]
fn override_attribute_without_base_method_is_an_error() {
    let mut b = Build::new();
    let base = b.class("Base", Vec::new());
    let mut over = b.func("novel", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    over.attrs.is_override = true;
    let mut derived = b.class("Derived", vec![ClassMember::Function(over)]);
    derived.extends = Some(b.path("Base"));
    let p = b.program(vec![Decl::Class(base), Decl::Class(derived)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::OverrideMissing { name, .. } if name == "novel"
    )));
}

#[test]
fn inheritance_cycle_is_reported_and_broken() {
    let mut b = Build::new();
    let mut a_cls = b.class("A", Vec::new());
    a_cls.extends = Some(b.path("B"));
    let mut b_cls = b.class("B", Vec::new());
    b_cls.extends = Some(b.path("A"));
    let p = b.program(vec![Decl::Class(a_cls), Decl::Class(b_cls)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::CircularInheritance { .. }
    )));
    // the cycle is broken so later base-chain walks terminate
    let ta = a.types.lookup("A").unwrap();
    let tb = a.types.lookup("B").unwrap();
    assert!(!(a.types.includes(ta, tb) && a.types.includes(tb, ta)));
}

#[test]
fn this_is_illegal_in_a_static_method() {
    let mut b = Build::new();
    let this = b.expr(ExprKind::This);
    let body = Block {
        stmts: vec![Stmt::Expr(this)],
    };
    let mut m = b.func("snap", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), Some(body));
    m.attrs.is_static = true;
    let c = b.class("Camera", vec![ClassMember::Function(m)]);
    let p = b.program(vec![Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::ThisInIllegalContext { .. }
    )));
}

#[test]
fn instance_method_body_sees_members_and_this() {
    let mut b = Build::new();
    let vty = b.ty("int");
    let field = b.var("level", Some(vty), None);
    let read = b.ident("level");
    let ret = Stmt::Return {
        value: Some(read),
        span: Span::default(),
    };
    let rty = b.ty("int");
    let m = b.func(
        "current",
        FuncKind::Function,
        Vec::new(),
        Some(rty),
        Some(Block { stmts: vec![ret] }),
    );
    let c = b.class(
        "Gauge",
        vec![ClassMember::Var(field), ClassMember::Function(m)],
    );
    let p = b.program(vec![Decl::Class(c)], Vec::new());
    let a = b.run(&p);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
}

#[test]
fn declared_constructor_also_chains_to_the_base() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let param = b.param("a", Some(pty));
    let base_ctor = b.func("Base", FuncKind::Constructor, vec![param], None, None);
    let base = b.class("Base", vec![ClassMember::Function(base_ctor)]);
    let derived_ctor = b.func(
        "Derived",
        FuncKind::Constructor,
        Vec::new(),
        None,
        Some(Block::default()),
    );
    let mut derived = b.class("Derived", vec![ClassMember::Function(derived_ctor)]);
    derived.extends = Some(b.path("Base"));
    let p = b.program(vec![Decl::Class(base), Decl::Class(derived)], Vec::new());
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::NoDefaultBaseConstructor { base, .. } if base == "Base"
    )));
}

#[test]
fn never_assigned_local_is_flagged_at_first_read() {
    let mut b = Build::new();
    let x_ty = b.ty("int");
    let x = b.var("x", Some(x_ty), None);
    let read = b.ident("x");
    let body = Block {
        stmts: vec![Stmt::Var(x), Stmt::Expr(read)],
    };
    let f = b.func("f", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), Some(body));
    let p = b.program(vec![Decl::Function(f)], Vec::new());
    let a = b.run(&p);
    assert!(a.warnings.iter().any(|w| matches!(
        &w.warning,
        SemanticWarning::UsedBeforeInit { name, .. } if name == "x"
    )));
    assert!(!a.needs_default_init.is_empty());
}

#[test]
fn function_expression_body_is_checked_in_place() {
    let mut b = Build::new();
    let pty = b.ty("int");
    let pa = b.param("a", Some(pty));
    let ret = b.ident("a");
    let body = Block {
        stmts: vec![Stmt::Return {
            value: Some(ret),
            span: Span::default(),
        }],
    };
    let rty = b.ty("int");
    let fd = b.func("", FuncKind::Function, vec![pa], Some(rty), Some(body));
    let fe = b.expr(ExprKind::Function(Box::new(fd)));
    let fe_id = fe.id;
    let f_ty = b.ty("Function");
    let v = b.var("f", Some(f_ty), Some(fe));
    let p = b.program(Vec::new(), vec![Stmt::Var(v)]);
    let a = b.run(&p);
    assert!(a.errors.is_empty(), "unexpected errors: {:?}", a.errors);
    assert!(a.warnings.is_empty(), "unexpected warnings: {:?}", a.warnings);
    assert_eq!(
        a.expr_types.get(&fe_id).map(|t| t.type_id),
        Some(TypeId::FUNCTION)
    );
}

#[test]
fn function_expression_must_return_on_all_paths() {
    let mut b = Build::new();
    let rty = b.ty("int");
    let fd = b.func(
        "helper",
        FuncKind::Function,
        Vec::new(),
        Some(rty),
        Some(Block::default()),
    );
    let fe = b.expr(ExprKind::Function(Box::new(fd)));
    let p = b.program(Vec::new(), vec![Stmt::Expr(fe)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::MustReturnValue { name, .. } if name == "helper"
    )));
}

#[test]
fn generic_application_with_unknown_argument_stays_untyped() {
    let mut b = Build::new();
    let c = b.class("Box", Vec::new());
    let base = b.ident("Box");
    let arg = b.ty("Missing");
    let apply = b.expr(ExprKind::ApplyType {
        base: Box::new(base),
        args: vec![arg],
    });
    let apply_id = apply.id;
    let p = b.program(vec![Decl::Class(c)], vec![Stmt::Expr(apply)]);
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(e, SemanticError::UnknownType { .. })));
    assert!(a.constants.get(&apply_id).is_none());
    assert_eq!(
        a.expr_types.get(&apply_id).map(|t| t.type_id),
        Some(TypeId::ANY)
    );
}

#[test]
fn extended_interface_requirements_reach_the_implementor() {
    let mut b = Build::new();
    let m = b.func("act", FuncKind::Function, Vec::new(), Some(TypeExpr::Void), None);
    let base_iface = InterfaceDecl {
        name: b.sym("Actor"),
        extends: Vec::new(),
        members: vec![m],
        span: Span::default(),
    };
    let extending = InterfaceDecl {
        name: b.sym("Performer"),
        extends: vec![b.path("Actor")],
        members: Vec::new(),
        span: Span::default(),
    };
    let mut c = b.class("Robot", Vec::new());
    c.implements = vec![b.path("Performer")];
    // declared before the interface it extends
    let p = b.program(
        vec![
            Decl::Interface(extending),
            Decl::Interface(base_iface),
            Decl::Class(c),
        ],
        Vec::new(),
    );
    let a = b.run(&p);
    assert!(has_error(&a, |e| matches!(
        e,
        SemanticError::UnknownInterfaceMethod { name, interface, .. }
            if name == "act" && interface == "Performer"
    )));
}
