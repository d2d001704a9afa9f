//! The type registry: canonical nominal types addressed by `TypeId`.
//!
//! Type identity is id identity: two requests for the same fully-qualified
//! name return the same `TypeId`, including parameterized instantiations.
//! Types referenced before their declaration is visited exist as unresolved
//! placeholders and are filled in (idempotently) by `resolve`.

use crate::scope::{ScopeId, SymbolTable};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Handle to an interned type. Reserved indices cover the builtins; dynamic
/// indices start at `FIRST_DYNAMIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// The unconstrained `*` type: includes everything
    pub const ANY: TypeId = TypeId(0);
    pub const VOID: TypeId = TypeId(1);
    pub const NULL: TypeId = TypeId(2);
    pub const BOOLEAN: TypeId = TypeId(3);
    pub const INT: TypeId = TypeId(4);
    pub const UINT: TypeId = TypeId(5);
    pub const DOUBLE: TypeId = TypeId(6);
    pub const DECIMAL: TypeId = TypeId(7);
    pub const STRING: TypeId = TypeId(8);
    /// Root dynamic object type
    pub const OBJECT: TypeId = TypeId(9);
    pub const FUNCTION: TypeId = TypeId(10);
    /// The metatype carried by class bindings
    pub const CLASS: TypeId = TypeId(11);
    /// The uninstantiated vector family template
    pub const VECTOR: TypeId = TypeId(12);
    /// Placeholder for the element type inside the vector template;
    /// substituted at instantiation
    pub const VECTOR_ELEMENT: TypeId = TypeId(13);

    pub const FIRST_DYNAMIC: u32 = 14;

    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::INT | Self::UINT | Self::DOUBLE | Self::DECIMAL)
    }

    #[inline]
    pub fn is_any(self) -> bool {
        self == Self::ANY
    }
}

/// Whether a nullability annotation was written, and which
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Nullability {
    /// Implied by the type's own declaration
    #[default]
    Default,
    /// Explicit `T?`
    Nullable,
    /// Explicit `T!`
    NonNullable,
}

/// A nullability-qualified view over a canonical type.
///
/// Equality is derived: two views are equal iff same type and same
/// annotation. `same_type` compares the *effective* nullability instead,
/// which is what accessor-pair and override checks want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub nullability: Nullability,
}

impl TypeInfo {
    pub fn of(type_id: TypeId) -> Self {
        Self {
            type_id,
            nullability: Nullability::Default,
        }
    }

    pub fn nullable(type_id: TypeId) -> Self {
        Self {
            type_id,
            nullability: Nullability::Nullable,
        }
    }

    pub fn non_nullable(type_id: TypeId) -> Self {
        Self {
            type_id,
            nullability: Nullability::NonNullable,
        }
    }

    pub fn is_nullable(self, registry: &TypeRegistry) -> bool {
        match self.nullability {
            Nullability::Nullable => true,
            Nullability::NonNullable => false,
            Nullability::Default => registry.default_nullable(self.type_id),
        }
    }

    /// Nullability-aware type equality (effective nullability, not spelling)
    pub fn same_type(self, other: TypeInfo, registry: &TypeRegistry) -> bool {
        self.type_id == other.type_id && self.is_nullable(registry) == other.is_nullable(registry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub name: String,
    pub base: Option<TypeId>,
    pub interfaces: SmallVec<[TypeId; 4]>,
    pub is_interface: bool,
    pub is_dynamic: bool,
    pub is_final: bool,
    pub is_numeric: bool,
    /// False until the declaration has been visited
    pub resolved: bool,
    pub instance_scope: Option<ScopeId>,
    pub static_scope: Option<ScopeId>,
    /// For parameterized instantiations: the generic family and its argument
    pub family: Option<TypeId>,
    pub element: Option<TypeId>,
}

/// Fields supplied when a type declaration is visited
#[derive(Debug, Clone, Default)]
pub struct TypeDecl {
    pub base: Option<TypeId>,
    pub interfaces: SmallVec<[TypeId; 4]>,
    pub is_interface: bool,
    pub is_dynamic: bool,
    pub is_final: bool,
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    defs: Vec<TypeDef>,
    by_name: FxHashMap<String, TypeId>,
    /// (family, argument) -> instantiation, so repeated requests return the
    /// identical id
    instantiations: FxHashMap<(TypeId, TypeId), TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.seed("*", |d| d.is_dynamic = true);
        registry.seed("void", |_| {});
        registry.seed("null", |_| {});
        registry.seed("Boolean", |d| d.is_final = true);
        registry.seed("int", |d| {
            d.is_numeric = true;
            d.is_final = true;
        });
        registry.seed("uint", |d| {
            d.is_numeric = true;
            d.is_final = true;
        });
        registry.seed("Number", |d| {
            d.is_numeric = true;
            d.is_final = true;
        });
        registry.seed("decimal", |d| {
            d.is_numeric = true;
            d.is_final = true;
        });
        registry.seed("String", |d| d.is_final = true);
        registry.seed("Object", |d| d.is_dynamic = true);
        registry.seed("Function", |_| {});
        registry.seed("Class", |_| {});
        registry.seed("Vector", |d| d.is_final = true);
        registry.seed("", |_| {}); // vector element placeholder, not nameable
        debug_assert_eq!(registry.defs.len() as u32, TypeId::FIRST_DYNAMIC);
        registry
    }

    fn seed(&mut self, name: &str, config: impl FnOnce(&mut TypeDef)) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        let mut def = TypeDef {
            name: name.to_string(),
            resolved: true,
            ..TypeDef::default()
        };
        config(&mut def);
        self.defs.push(def);
        if !name.is_empty() {
            self.by_name.insert(name.to_string(), id);
        }
        id
    }

    /// The unique TypeId for a fully-qualified name, creating an unresolved
    /// placeholder if it has not been defined yet
    pub fn get_or_create(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(TypeDef {
            name: name.to_string(),
            ..TypeDef::default()
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Look up a name without creating a placeholder
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn def(&self, id: TypeId) -> &TypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn def_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.defs[id.0 as usize]
    }

    pub fn name(&self, id: TypeId) -> &str {
        let name = self.def(id).name.as_str();
        if name.is_empty() { "<element>" } else { name }
    }

    pub fn is_resolved(&self, id: TypeId) -> bool {
        self.def(id).resolved
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.def(id).is_interface
    }

    pub fn is_dynamic(&self, id: TypeId) -> bool {
        self.def(id).is_dynamic
    }

    /// Fill in a placeholder once its declaration is visited. Idempotent:
    /// resolving an already-resolved type is a no-op.
    pub fn resolve(&mut self, id: TypeId, decl: TypeDecl) {
        let def = self.def_mut(id);
        if def.resolved {
            return;
        }
        def.base = decl.base;
        def.interfaces = decl.interfaces;
        def.is_interface = decl.is_interface;
        def.is_dynamic = decl.is_dynamic;
        def.is_final = decl.is_final;
        def.resolved = true;
    }

    /// In-place redefinition for incremental recompilation: the identity
    /// object survives so outstanding references stay valid.
    pub fn reset_and_rebuild(&mut self, id: TypeId, decl: TypeDecl) {
        debug_assert!(
            id.0 >= TypeId::FIRST_DYNAMIC,
            "builtin types cannot be redefined"
        );
        let def = self.def_mut(id);
        def.resolved = false;
        def.instance_scope = None;
        def.static_scope = None;
        self.resolve(id, decl);
    }

    /// Is `sub` a subtype of `sup`?
    ///
    /// The any type includes everything and is included by nothing. Classes
    /// are checked by base-chain equality; interfaces by a breadth-first walk
    /// of `sub`'s implemented-interface closure, including interfaces
    /// inherited through base classes and through interface extension.
    pub fn includes(&self, sup: TypeId, sub: TypeId) -> bool {
        if sup == TypeId::ANY {
            return true;
        }
        if sub == TypeId::ANY {
            return false;
        }
        if sup == sub {
            return true;
        }
        if self.def(sup).is_interface {
            return self.implements(sub, sup);
        }
        let mut cur = self.def(sub).base;
        while let Some(base) = cur {
            if base == sup {
                return true;
            }
            cur = self.def(base).base;
        }
        false
    }

    /// Breadth-first search of the candidate's interface closure, with
    /// duplicate suppression so interface-extension cycles terminate
    fn implements(&self, candidate: TypeId, interface: TypeId) -> bool {
        let mut queue: Vec<TypeId> = Vec::new();
        let mut visited: SmallVec<[TypeId; 8]> = SmallVec::new();

        let mut cls = Some(candidate);
        while let Some(c) = cls {
            let def = self.def(c);
            queue.extend(def.interfaces.iter().copied());
            // an interface extending other interfaces records them in base
            // position too when declared as a class-like chain
            cls = def.base;
        }

        while let Some(i) = queue.pop() {
            if visited.contains(&i) {
                continue;
            }
            visited.push(i);
            if i == interface {
                return true;
            }
            queue.extend(self.def(i).interfaces.iter().copied());
        }
        false
    }

    /// Whether the default (unannotated) view of a type admits null
    pub fn default_nullable(&self, id: TypeId) -> bool {
        !matches!(
            id,
            TypeId::BOOLEAN | TypeId::INT | TypeId::UINT | TypeId::DOUBLE | TypeId::DECIMAL
                | TypeId::VOID
        )
    }

    /// Can a value of this type be compared against the null literal?
    pub fn accepts_null(&self, info: TypeInfo) -> bool {
        info.type_id == TypeId::ANY || info.type_id == TypeId::NULL || info.is_nullable(self)
    }

    /// Look up or create the instantiation of a generic family at an
    /// argument type; repeated requests return the identical id. Member
    /// slots are copied from the template with the element placeholder
    /// substituted.
    pub fn instantiate(
        &mut self,
        family: TypeId,
        arg: TypeId,
        symbols: &mut SymbolTable,
    ) -> TypeId {
        if let Some(&existing) = self.instantiations.get(&(family, arg)) {
            return existing;
        }
        let name = format!("{}.<{}>", self.name(family), self.name(arg));
        let id = self.get_or_create(&name);
        self.instantiations.insert((family, arg), id);

        let template_scope = self.def(family).instance_scope;
        let def = self.def_mut(id);
        def.resolved = true;
        def.is_final = true;
        def.family = Some(family);
        def.element = Some(arg);

        if let Some(template) = template_scope {
            let copied = symbols.instantiate_scope(template, TypeId::VECTOR_ELEMENT, arg, id);
            self.def_mut(id).instance_scope = Some(copied);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        let mut reg = TypeRegistry::new();
        let a = reg.get_or_create("com.example.Foo");
        let b = reg.get_or_create("com.example.Foo");
        let c = reg.get_or_create("com.example.Bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn placeholder_reports_unresolved_until_resolved() {
        let mut reg = TypeRegistry::new();
        let t = reg.get_or_create("Foo");
        assert!(!reg.is_resolved(t));
        reg.resolve(t, TypeDecl::default());
        assert!(reg.is_resolved(t));
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let base = reg.get_or_create("Base");
        reg.resolve(base, TypeDecl::default());
        let t = reg.get_or_create("Foo");
        reg.resolve(
            t,
            TypeDecl {
                base: Some(base),
                ..TypeDecl::default()
            },
        );
        // second resolve must not overwrite
        reg.resolve(t, TypeDecl::default());
        assert_eq!(reg.def(t).base, Some(base));
    }

    #[test]
    fn any_includes_everything() {
        let mut reg = TypeRegistry::new();
        let t = reg.get_or_create("Foo");
        assert!(reg.includes(TypeId::ANY, t));
        assert!(reg.includes(TypeId::ANY, TypeId::INT));
        assert!(!reg.includes(t, TypeId::ANY));
    }

    #[test]
    fn class_chain_inclusion() {
        let mut reg = TypeRegistry::new();
        let a = reg.get_or_create("A");
        let b = reg.get_or_create("B");
        let c = reg.get_or_create("C");
        reg.resolve(a, TypeDecl::default());
        reg.resolve(
            b,
            TypeDecl {
                base: Some(a),
                ..TypeDecl::default()
            },
        );
        reg.resolve(
            c,
            TypeDecl {
                base: Some(b),
                ..TypeDecl::default()
            },
        );
        assert!(reg.includes(a, c));
        assert!(reg.includes(b, c));
        assert!(!reg.includes(c, a));
    }

    #[test]
    fn interface_inclusion_is_transitive_through_extension() {
        let mut reg = TypeRegistry::new();
        let i1 = reg.get_or_create("I1");
        let i2 = reg.get_or_create("I2");
        reg.resolve(
            i1,
            TypeDecl {
                is_interface: true,
                ..TypeDecl::default()
            },
        );
        // I2 extends I1
        reg.resolve(
            i2,
            TypeDecl {
                is_interface: true,
                interfaces: smallvec::smallvec![i1],
                ..TypeDecl::default()
            },
        );
        // Base implements I2, Derived extends Base
        let base = reg.get_or_create("Base");
        let derived = reg.get_or_create("Derived");
        reg.resolve(
            base,
            TypeDecl {
                interfaces: smallvec::smallvec![i2],
                ..TypeDecl::default()
            },
        );
        reg.resolve(
            derived,
            TypeDecl {
                base: Some(base),
                ..TypeDecl::default()
            },
        );
        assert!(reg.includes(i2, base));
        assert!(reg.includes(i1, base));
        assert!(reg.includes(i2, derived));
        assert!(reg.includes(i1, derived));
    }

    #[test]
    fn nullability_views() {
        let reg = TypeRegistry::new();
        assert!(!TypeInfo::of(TypeId::INT).is_nullable(&reg));
        assert!(TypeInfo::nullable(TypeId::INT).is_nullable(&reg));
        assert!(TypeInfo::of(TypeId::STRING).is_nullable(&reg));
        assert!(!TypeInfo::non_nullable(TypeId::STRING).is_nullable(&reg));
        assert_eq!(TypeInfo::of(TypeId::INT), TypeInfo::of(TypeId::INT));
        assert_ne!(TypeInfo::of(TypeId::INT), TypeInfo::nullable(TypeId::INT));
    }

    #[test]
    fn same_type_compares_effective_nullability() {
        let reg = TypeRegistry::new();
        // String's default view is nullable, so it matches an explicit T?
        assert!(
            TypeInfo::of(TypeId::STRING).same_type(TypeInfo::nullable(TypeId::STRING), &reg)
        );
        assert!(
            !TypeInfo::of(TypeId::STRING).same_type(TypeInfo::non_nullable(TypeId::STRING), &reg)
        );
    }
}
