//! Scope objects and the name table.
//!
//! A scope is a named container of slots reachable by (name, namespace,
//! access-kind) lookup. Allocation strategy differs by lexical role; the
//! roles form a closed enum (`BuilderKind`) and the few operations that vary
//! by role dispatch on it with a `match`. Scopes and slots live in arenas
//! inside `SymbolTable` and are addressed by stable ids.

use crate::slot::{CallSequence, MethodId, ParamStyle, Slot, SlotId, SlotShape};
use crate::types::{TypeId, TypeInfo, TypeRegistry};
use rustc_hash::FxHashMap;
use sable_ast::Symbol;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Access kind a name table entry serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Get,
    Set,
    Call,
    Construct,
}

/// Namespace qualifying a binding. Protected and private namespaces are
/// distinct per declaring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Public,
    Internal,
    Protected(TypeId),
    Private(TypeId),
    User(Symbol),
}

impl Namespace {
    pub fn is_protected(self) -> bool {
        matches!(self, Namespace::Protected(_))
    }
}

/// Lexical role of a scope; governs where its index space begins and how
/// new members are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderKind {
    /// Function parameters and hoisted locals
    Activation,
    /// Nested block
    Block,
    /// Class static frame
    ClassStatic,
    /// Class instance frame (links to a base instance frame)
    Instance,
    /// Top-level frame
    Global,
    /// Package frame
    Package,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: BuilderKind,
    /// Slots declared in this scope, in declaration order
    pub slots: Vec<SlotId>,
    names: FxHashMap<(Symbol, Namespace, AccessKind), SlotId>,
    /// Base-class instance scope (single inheritance)
    pub base: Option<ScopeId>,
    /// Interface scopes this scope conforms to (conformance, not storage)
    pub interfaces: SmallVec<[ScopeId; 2]>,
    /// The class/interface this scope belongs to, if any
    pub owner_type: Option<TypeId>,
    /// Dynamic scopes permit properties not declared at compile time
    pub is_dynamic: bool,
    /// Where this scope's member index space begins: inherited member count
    /// for instance frames, zero otherwise
    index_base: u32,
    storage_base: u32,
    next_storage: u32,
}

impl Scope {
    /// Total member count including inherited, for derived-frame offsets
    pub fn member_count(&self) -> u32 {
        self.index_base + self.slots.len() as u32
    }

    pub fn storage_count(&self) -> u32 {
        self.storage_base + self.next_storage
    }
}

/// Arena of scopes and slots for one compilation
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    slots: Vec<Slot>,
    next_method_id: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, kind: BuilderKind) -> ScopeId {
        self.alloc_scope(kind, None, None)
    }

    /// Instance frames offset their index space past every inherited slot so
    /// derived members never collide with base members
    pub fn new_instance_scope(&mut self, owner: TypeId, base: Option<ScopeId>) -> ScopeId {
        let id = self.alloc_scope(BuilderKind::Instance, Some(owner), base);
        if let Some(base_id) = base {
            let (index_base, storage_base) = {
                let b = self.scope(base_id);
                (b.member_count(), b.storage_count())
            };
            let scope = self.scope_mut(id);
            scope.index_base = index_base;
            scope.storage_base = storage_base;
        }
        id
    }

    pub fn new_static_scope(&mut self, owner: TypeId) -> ScopeId {
        self.alloc_scope(BuilderKind::ClassStatic, Some(owner), None)
    }

    fn alloc_scope(
        &mut self,
        kind: BuilderKind,
        owner_type: Option<TypeId>,
        base: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            slots: Vec::new(),
            names: FxHashMap::default(),
            base,
            interfaces: SmallVec::new(),
            owner_type,
            is_dynamic: false,
            index_base: 0,
            storage_base: 0,
            next_storage: 0,
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id.index()]
    }

    fn push_slot(&mut self, scope_id: ScopeId, mut slot: Slot) -> SlotId {
        let id = SlotId(self.slots.len() as u32);
        slot.id = id;
        let expected_index = self.scope(scope_id).member_count();
        assert_eq!(
            slot.index, expected_index,
            "slot index contract violated in scope {scope_id:?}"
        );
        self.slots.push(slot);
        self.scope_mut(scope_id).slots.push(id);
        id
    }

    fn fresh_method_id(&mut self) -> MethodId {
        let id = MethodId(self.next_method_id);
        self.next_method_id += 1;
        id
    }

    /// Declare a variable binding; registers both Get and Set entries
    pub fn declare_variable(
        &mut self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        ty: TypeInfo,
        is_const: bool,
    ) -> SlotId {
        let (index, storage_index) = {
            let scope = self.scope_mut(scope_id);
            let index = scope.member_count();
            let storage = scope.storage_base + scope.next_storage;
            scope.next_storage += 1;
            (index, storage)
        };
        let mut slot = Slot::variable(SlotId(0), scope_id, index, storage_index, ty);
        slot.flags.is_const = is_const;
        let id = self.push_slot(scope_id, slot);
        let scope = self.scope_mut(scope_id);
        scope.names.insert((name, ns, AccessKind::Get), id);
        scope.names.insert((name, ns, AccessKind::Set), id);
        id
    }

    /// Declare a method; registers Call and Get (the method is readable as a
    /// bound closure) under the same slot
    pub fn declare_method(
        &mut self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        return_ty: TypeInfo,
        params: SmallVec<[TypeInfo; 4]>,
        param_styles: SmallVec<[ParamStyle; 4]>,
        call_seq: CallSequence,
    ) -> SlotId {
        let index = self.scope(scope_id).member_count();
        let method_id = self.fresh_method_id();
        let slot = Slot::method(
            SlotId(0),
            scope_id,
            index,
            method_id,
            return_ty,
            params,
            param_styles,
            call_seq,
        );
        let id = self.push_slot(scope_id, slot);
        let scope = self.scope_mut(scope_id);
        scope.names.insert((name, ns, AccessKind::Call), id);
        scope.names.insert((name, ns, AccessKind::Get), id);
        id
    }

    /// Declare one half of an accessor pair; registers only the requested
    /// access kind
    pub fn declare_accessor(
        &mut self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        kind: AccessKind,
        ty: TypeInfo,
        params: SmallVec<[TypeInfo; 4]>,
        call_seq: CallSequence,
    ) -> SlotId {
        debug_assert!(
            matches!(kind, AccessKind::Get | AccessKind::Set),
            "accessors are get or set"
        );
        let index = self.scope(scope_id).member_count();
        let method_id = self.fresh_method_id();
        let styles = params.iter().map(|_| ParamStyle::Required).collect();
        let mut slot = Slot::method(
            SlotId(0),
            scope_id,
            index,
            method_id,
            ty,
            params,
            styles,
            call_seq,
        );
        slot.flags.is_accessor = true;
        let id = self.push_slot(scope_id, slot);
        self.scope_mut(scope_id).names.insert((name, ns, kind), id);
        id
    }

    /// Declare a constructor; registered under Construct for the class name
    pub fn declare_constructor(
        &mut self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        owner: TypeId,
        params: SmallVec<[TypeInfo; 4]>,
        param_styles: SmallVec<[ParamStyle; 4]>,
    ) -> SlotId {
        let index = self.scope(scope_id).member_count();
        let method_id = self.fresh_method_id();
        let slot = Slot::method(
            SlotId(0),
            scope_id,
            index,
            method_id,
            TypeInfo::of(owner),
            params,
            param_styles,
            CallSequence::Args,
        );
        let id = self.push_slot(scope_id, slot);
        self.scope_mut(scope_id)
            .names
            .insert((name, ns, AccessKind::Construct), id);
        id
    }

    /// Declare an operator slot. With `overload_of`, the new slot is a
    /// specialization recorded in the generic slot's dispatch table rather
    /// than a name-table entry; intrinsic operators are reached through the
    /// evaluator's operator table, not by name.
    pub fn declare_operator(
        &mut self,
        scope_id: ScopeId,
        operands: &[TypeId],
        result: TypeInfo,
        overload_of: Option<SlotId>,
    ) -> SlotId {
        let call_seq = match operands.len() {
            1 => CallSequence::Operand,
            2 => CallSequence::Operands2,
            n => unreachable!("operator with {n} operands"),
        };
        let index = self.scope(scope_id).member_count();
        let method_id = self.fresh_method_id();
        let params: SmallVec<[TypeInfo; 4]> = operands.iter().map(|&t| TypeInfo::of(t)).collect();
        let styles = params.iter().map(|_| ParamStyle::Required).collect();
        let mut slot = Slot::method(
            SlotId(0),
            scope_id,
            index,
            method_id,
            result,
            params,
            styles,
            call_seq,
        );
        slot.flags.is_intrinsic = true;
        let id = self.push_slot(scope_id, slot);

        if let Some(generic) = overload_of {
            match operands {
                [operand] => {
                    let table = self
                        .slot_mut(generic)
                        .unary_overloads
                        .get_or_insert_with(Default::default);
                    let prev = table.insert(*operand, id);
                    assert!(prev.is_none(), "duplicate unary operator overload");
                }
                [lhs, rhs] => {
                    let table = self
                        .slot_mut(generic)
                        .binary_overloads
                        .get_or_insert_with(Default::default);
                    let prev = table.insert((*lhs, *rhs), id);
                    assert!(prev.is_none(), "duplicate binary operator overload");
                }
                _ => unreachable!(),
            }
        }
        id
    }

    /// Re-bind an inherited member under new namespace bindings without
    /// allocating a new slot id (override/reshadow)
    pub fn inherit(
        &mut self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        kind: AccessKind,
        slot: SlotId,
    ) {
        self.scope_mut(scope_id).names.insert((name, ns, kind), slot);
    }

    /// Iterate a scope's name-table entries in arbitrary order
    pub fn names_in(
        &self,
        scope_id: ScopeId,
    ) -> impl Iterator<Item = ((Symbol, Namespace, AccessKind), SlotId)> + '_ {
        self.scope(scope_id).names.iter().map(|(&k, &v)| (k, v))
    }

    /// Local lookup, this scope only
    pub fn find_local(
        &self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        kind: AccessKind,
    ) -> Option<SlotId> {
        self.scope(scope_id).names.get(&(name, ns, kind)).copied()
    }

    /// Lookup along the base chain, innermost first
    pub fn find_in_bases(
        &self,
        scope_id: ScopeId,
        name: Symbol,
        ns: Namespace,
        kind: AccessKind,
    ) -> Option<(ScopeId, SlotId)> {
        let mut cur = Some(scope_id);
        while let Some(s) = cur {
            if let Some(slot) = self.find_local(s, name, ns, kind) {
                return Some((s, slot));
            }
            cur = self.scope(s).base;
        }
        None
    }

    /// All (namespace, slot) matches for a name/kind across the candidate
    /// namespaces, taken from the nearest base-chain level that has any.
    /// Derived declarations shadow base declarations.
    pub fn matches_in_namespaces(
        &self,
        scope_id: ScopeId,
        name: Symbol,
        kind: AccessKind,
        namespaces: &[Namespace],
    ) -> SmallVec<[(Namespace, SlotId); 2]> {
        let mut cur = Some(scope_id);
        while let Some(s) = cur {
            let mut found: SmallVec<[(Namespace, SlotId); 2]> = SmallVec::new();
            for &ns in namespaces {
                if let Some(slot) = self.find_local(s, name, ns, kind) {
                    found.push((ns, slot));
                }
            }
            if !found.is_empty() {
                return found;
            }
            cur = self.scope(s).base;
        }
        SmallVec::new()
    }

    /// Does any namespace whatsoever bind this name here? Used to classify a
    /// failed lookup as inaccessible rather than undefined.
    pub fn name_exists_any_namespace(
        &self,
        scope_id: ScopeId,
        name: Symbol,
        kind: AccessKind,
    ) -> bool {
        let mut cur = Some(scope_id);
        while let Some(s) = cur {
            if self
                .scope(s)
                .names
                .keys()
                .any(|&(n, _, k)| n == name && k == kind)
            {
                return true;
            }
            cur = self.scope(s).base;
        }
        false
    }

    /// Pick the most specific unary overload for the operand's static type,
    /// falling back to the generic slot
    pub fn dispatch_unary(
        &self,
        registry: &TypeRegistry,
        generic: SlotId,
        operand: TypeId,
    ) -> SlotId {
        let Some(table) = self.slot(generic).unary_overloads.as_deref() else {
            return generic;
        };
        if let Some(&exact) = table.get(&operand) {
            return exact;
        }
        let mut best: Option<(TypeId, SlotId)> = None;
        for (&key, &slot) in table {
            if !registry.includes(key, operand) {
                continue;
            }
            best = Some(match best {
                None => (key, slot),
                Some((bk, bs)) => {
                    if registry.includes(bk, key) {
                        (key, slot)
                    } else if registry.includes(key, bk) {
                        (bk, bs)
                    } else {
                        unreachable!("incomparable unary operator overloads both match")
                    }
                }
            });
        }
        best.map(|(_, s)| s).unwrap_or(generic)
    }

    /// Pick the most specific binary overload for the operand types,
    /// falling back to the generic slot
    pub fn dispatch_binary(
        &self,
        registry: &TypeRegistry,
        generic: SlotId,
        lhs: TypeId,
        rhs: TypeId,
    ) -> SlotId {
        let Some(table) = self.slot(generic).binary_overloads.as_deref() else {
            return generic;
        };
        if let Some(&exact) = table.get(&(lhs, rhs)) {
            return exact;
        }
        let more_specific = |a: (TypeId, TypeId), b: (TypeId, TypeId)| {
            registry.includes(b.0, a.0) && registry.includes(b.1, a.1)
        };
        let mut best: Option<((TypeId, TypeId), SlotId)> = None;
        for (&key, &slot) in table {
            if !(registry.includes(key.0, lhs) && registry.includes(key.1, rhs)) {
                continue;
            }
            best = Some(match best {
                None => (key, slot),
                Some((bk, bs)) => {
                    if more_specific(key, bk) {
                        (key, slot)
                    } else if more_specific(bk, key) {
                        (bk, bs)
                    } else {
                        unreachable!("incomparable binary operator overloads both match")
                    }
                }
            });
        }
        best.map(|(_, s)| s).unwrap_or(generic)
    }

    /// Copy a generic template's member scope, substituting the element
    /// placeholder with the instantiation argument
    pub fn instantiate_scope(
        &mut self,
        template: ScopeId,
        placeholder: TypeId,
        substitute: TypeId,
        owner: TypeId,
    ) -> ScopeId {
        let copied = self.new_instance_scope(owner, None);
        let subst = |info: TypeInfo| -> TypeInfo {
            if info.type_id == placeholder {
                TypeInfo {
                    type_id: substitute,
                    nullability: info.nullability,
                }
            } else {
                info
            }
        };

        let entries: Vec<((Symbol, Namespace, AccessKind), SlotId)> = self
            .scope(template)
            .names
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect();
        // group name-table entries by source slot so a slot bound under
        // several kinds is copied once
        let mut copied_slots: FxHashMap<SlotId, SlotId> = FxHashMap::default();
        let slot_order: Vec<SlotId> = self.scope(template).slots.clone();
        for old_id in slot_order {
            let old = self.slot(old_id).clone();
            let new_id = match old.shape {
                SlotShape::Variable { .. } => {
                    let scope = self.scope_mut(copied);
                    let index = scope.member_count();
                    let storage = scope.storage_base + scope.next_storage;
                    scope.next_storage += 1;
                    let mut slot =
                        Slot::variable(SlotId(0), copied, index, storage, subst(old.ty));
                    slot.flags = old.flags;
                    slot.min_version = old.min_version;
                    self.push_slot(copied, slot)
                }
                SlotShape::Method { .. } => {
                    let index = self.scope(copied).member_count();
                    let method_id = self.fresh_method_id();
                    let mut slot = Slot::method(
                        SlotId(0),
                        copied,
                        index,
                        method_id,
                        subst(old.ty),
                        old.params.iter().map(|&p| subst(p)).collect(),
                        old.param_styles.clone(),
                        old.call_seq,
                    );
                    slot.flags = old.flags;
                    slot.min_version = old.min_version;
                    self.push_slot(copied, slot)
                }
            };
            copied_slots.insert(old_id, new_id);
        }
        for ((name, ns, kind), old_slot) in entries {
            if let Some(&new_slot) = copied_slots.get(&old_slot) {
                self.scope_mut(copied).names.insert((name, ns, kind), new_slot);
            }
        }
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn sym(n: u32) -> Symbol {
        Symbol(n)
    }

    #[test]
    fn variable_registers_get_and_set() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Global);
        let slot = table.declare_variable(
            scope,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::INT),
            false,
        );
        assert_eq!(
            table.find_local(scope, sym(1), Namespace::Public, AccessKind::Get),
            Some(slot)
        );
        assert_eq!(
            table.find_local(scope, sym(1), Namespace::Public, AccessKind::Set),
            Some(slot)
        );
        assert_eq!(
            table.find_local(scope, sym(1), Namespace::Public, AccessKind::Call),
            None
        );
    }

    #[test]
    fn accessor_registers_single_kind() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Instance);
        let getter = table.declare_accessor(
            scope,
            sym(1),
            Namespace::Public,
            AccessKind::Get,
            TypeInfo::of(TypeId::STRING),
            SmallVec::new(),
            CallSequence::ThisArgs,
        );
        assert_eq!(
            table.find_local(scope, sym(1), Namespace::Public, AccessKind::Get),
            Some(getter)
        );
        assert_eq!(
            table.find_local(scope, sym(1), Namespace::Public, AccessKind::Set),
            None
        );
        assert!(table.slot(getter).flags.is_accessor);
    }

    #[test]
    fn derived_instance_frame_offsets_past_base() {
        let mut table = SymbolTable::new();
        let mut reg = TypeRegistry::new();
        let base_ty = reg.get_or_create("Base");
        let derived_ty = reg.get_or_create("Derived");

        let base = table.new_instance_scope(base_ty, None);
        table.declare_variable(base, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        table.declare_variable(base, sym(2), Namespace::Public, TypeInfo::of(TypeId::INT), false);

        let derived = table.new_instance_scope(derived_ty, Some(base));
        let slot = table.declare_variable(
            derived,
            sym(3),
            Namespace::Public,
            TypeInfo::of(TypeId::INT),
            false,
        );
        // derived indices start past both inherited members
        assert_eq!(table.slot(slot).index, 2);
        assert_eq!(table.slot(slot).storage_index(), Some(2));
    }

    #[test]
    fn base_chain_lookup_shadows() {
        let mut table = SymbolTable::new();
        let mut reg = TypeRegistry::new();
        let base_ty = reg.get_or_create("Base");
        let derived_ty = reg.get_or_create("Derived");
        let base = table.new_instance_scope(base_ty, None);
        let base_slot =
            table.declare_variable(base, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        let derived = table.new_instance_scope(derived_ty, Some(base));

        // visible through the chain
        assert_eq!(
            table.find_in_bases(derived, sym(1), Namespace::Public, AccessKind::Get),
            Some((base, base_slot))
        );
        // a derived re-declaration shadows
        let shadow = table.declare_variable(
            derived,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::STRING),
            false,
        );
        assert_eq!(
            table.find_in_bases(derived, sym(1), Namespace::Public, AccessKind::Get),
            Some((derived, shadow))
        );
    }

    #[test]
    fn inherit_reuses_slot_id() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Instance);
        let slot = table.declare_variable(
            scope,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::INT),
            false,
        );
        let derived = table.new_scope(BuilderKind::Instance);
        table.inherit(derived, sym(1), Namespace::Internal, AccessKind::Get, slot);
        assert_eq!(
            table.find_local(derived, sym(1), Namespace::Internal, AccessKind::Get),
            Some(slot)
        );
    }

    #[test]
    fn operator_dispatch_prefers_most_specific() {
        let mut table = SymbolTable::new();
        let reg = TypeRegistry::new();
        let scope = table.new_scope(BuilderKind::Global);
        let generic = table.declare_operator(
            scope,
            &[TypeId::ANY, TypeId::ANY],
            TypeInfo::of(TypeId::ANY),
            None,
        );
        let int_add = table.declare_operator(
            scope,
            &[TypeId::INT, TypeId::INT],
            TypeInfo::of(TypeId::INT),
            Some(generic),
        );
        assert_eq!(
            table.dispatch_binary(&reg, generic, TypeId::INT, TypeId::INT),
            int_add
        );
        // no specific match: generic fallback
        assert_eq!(
            table.dispatch_binary(&reg, generic, TypeId::STRING, TypeId::INT),
            generic
        );
    }

    #[test]
    fn method_and_variable_slot_spaces() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Global);
        let v = table.declare_variable(
            scope,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::INT),
            false,
        );
        let m = table.declare_method(
            scope,
            sym(2),
            Namespace::Public,
            TypeInfo::of(TypeId::VOID),
            SmallVec::new(),
            SmallVec::new(),
            CallSequence::Args,
        );
        assert!(table.slot(v).storage_index().is_some());
        assert!(table.slot(v).method_id().is_none());
        assert!(table.slot(m).method_id().is_some());
        assert!(table.slot(m).storage_index().is_none());
        assert_eq!(table.slot(m).index, 1);
    }

    #[test]
    fn instantiate_scope_substitutes_element() {
        let mut table = SymbolTable::new();
        let mut reg = TypeRegistry::new();
        let vec_inst = reg.get_or_create("Vector.<int>");
        let template = table.new_instance_scope(TypeId::VECTOR, None);
        table.declare_variable(
            template,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::VECTOR_ELEMENT),
            false,
        );
        let copied =
            table.instantiate_scope(template, TypeId::VECTOR_ELEMENT, TypeId::INT, vec_inst);
        let slot = table
            .find_local(copied, sym(1), Namespace::Public, AccessKind::Get)
            .expect("copied member");
        assert_eq!(table.slot(slot).ty.type_id, TypeId::INT);
    }
}
