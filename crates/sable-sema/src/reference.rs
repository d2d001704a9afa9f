//! Reference resolution: binding a name occurrence to a slot.
//!
//! A reference is an unqualified or qualified name plus a candidate
//! namespace set. Resolution searches either an explicit base scope's chain
//! or the lexical scope chain (innermost last, bounded below by the lowest
//! searchable index recorded when a dynamic-scope construct is entered).
//! Once bound, the get/set/call slot indices are stable for the rest of the
//! compilation.

use crate::bitset::BitSet;
use crate::scope::{AccessKind, Namespace, ScopeId, SymbolTable};
use crate::slot::SlotId;
use sable_ast::{Span, Symbol};
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: Symbol,
    /// Candidate (open) namespaces, in search priority order
    pub namespaces: SmallVec<[Namespace; 4]>,
    /// Explicit qualifier given: check each namespace against each scope,
    /// never merging across scopes
    pub qualified: bool,
    /// Explicit base scope to search instead of the lexical chain
    pub base: Option<ScopeId>,
    pub span: Span,
}

impl Reference {
    pub fn unqualified(name: Symbol, namespaces: SmallVec<[Namespace; 4]>, span: Span) -> Self {
        Self {
            name,
            namespaces,
            qualified: false,
            base: None,
            span,
        }
    }

    pub fn qualified(name: Symbol, namespace: Namespace, span: Span) -> Self {
        Self {
            name,
            namespaces: smallvec::smallvec![namespace],
            qualified: true,
            base: None,
            span,
        }
    }

    pub fn member(name: Symbol, namespaces: SmallVec<[Namespace; 4]>, base: ScopeId, span: Span) -> Self {
        Self {
            name,
            namespaces,
            qualified: false,
            base: Some(base),
            span,
        }
    }
}

/// A successful binding: which scope matched and the slot for each access
/// kind present there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub scope: ScopeId,
    pub get_slot: Option<SlotId>,
    pub set_slot: Option<SlotId>,
    pub call_slot: Option<SlotId>,
}

impl Binding {
    /// A call slot alongside the get slot marks the reference as directly
    /// callable as a method rather than through a property read
    pub fn directly_callable(&self) -> bool {
        self.call_slot.is_some()
    }

    pub fn primary(&self) -> Option<SlotId> {
        self.get_slot.or(self.set_slot).or(self.call_slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Binding),
    Ambiguous,
    NotFound,
}

/// Resolve a reference against a scope chain (innermost last).
///
/// `lowest_searchable` bounds the downward walk: scopes below that index are
/// shadowed by an enclosing dynamic-scope construct and are skipped.
pub fn resolve(
    symbols: &SymbolTable,
    reference: &Reference,
    chain: &[ScopeId],
    lowest_searchable: usize,
) -> Resolution {
    if let Some(base) = reference.base {
        return resolve_in_scope(symbols, reference, base);
    }
    for &scope in chain.iter().skip(lowest_searchable).rev() {
        match resolve_in_scope(symbols, reference, scope) {
            Resolution::NotFound => continue,
            other => return other,
        }
    }
    Resolution::NotFound
}

fn resolve_in_scope(symbols: &SymbolTable, reference: &Reference, scope: ScopeId) -> Resolution {
    if reference.qualified {
        // qualified: accept the first namespace that matches; no merging
        for &ns in &reference.namespaces {
            let get = symbols.find_in_bases(scope, reference.name, ns, AccessKind::Get);
            let set = symbols.find_in_bases(scope, reference.name, ns, AccessKind::Set);
            let call = symbols.find_in_bases(scope, reference.name, ns, AccessKind::Call);
            if get.is_some() || set.is_some() || call.is_some() {
                let bound_scope = get.or(call).or(set).map(|(s, _)| s).unwrap_or(scope);
                return Resolution::Resolved(Binding {
                    scope: bound_scope,
                    get_slot: get.map(|(_, s)| s),
                    set_slot: set.map(|(_, s)| s),
                    call_slot: call.map(|(_, s)| s),
                });
            }
        }
        return Resolution::NotFound;
    }

    let gets =
        symbols.matches_in_namespaces(scope, reference.name, AccessKind::Get, &reference.namespaces);
    let sets =
        symbols.matches_in_namespaces(scope, reference.name, AccessKind::Set, &reference.namespaces);
    let calls =
        symbols.matches_in_namespaces(scope, reference.name, AccessKind::Call, &reference.namespaces);

    if gets.is_empty() && sets.is_empty() && calls.is_empty() {
        return Resolution::NotFound;
    }

    // more than one distinct slot for the same access kind under different
    // open namespaces is ambiguous
    if distinct_slots(&gets) > 1 || distinct_slots(&sets) > 1 || distinct_slots(&calls) > 1 {
        return Resolution::Ambiguous;
    }

    // a getter and setter visible only under *different* open namespaces is
    // ambiguous too, unless the protected-namespace half is the sole match
    if let (Some(&(gns, gslot)), Some(&(sns, sslot))) = (gets.first(), sets.first())
        && gslot != sslot
    {
        let accessor_pair = symbols.slot(gslot).flags.is_accessor
            && symbols.slot(sslot).flags.is_accessor;
        if accessor_pair && gns != sns && !(gns.is_protected() || sns.is_protected()) {
            return Resolution::Ambiguous;
        }
    }

    Resolution::Resolved(Binding {
        scope,
        get_slot: gets.first().map(|&(_, s)| s),
        set_slot: sets.first().map(|&(_, s)| s),
        call_slot: calls.first().map(|&(_, s)| s),
    })
}

fn distinct_slots(matches: &[(Namespace, SlotId)]) -> usize {
    let mut seen: SmallVec<[SlotId; 2]> = SmallVec::new();
    for &(_, slot) in matches {
        if !seen.contains(&slot) {
            seen.push(slot);
        }
    }
    seen.len()
}

/// After binding a get-reference: does any definition of the slot reach this
/// use? An empty intersection means the variable may be read before it is
/// initialized, and the binding needs a defensive default at entry.
pub fn calc_use_definitions(def_bits: &BitSet, reaching: &BitSet) -> bool {
    def_bits.intersect_count(reaching) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::BuilderKind;
    use crate::types::{TypeId, TypeInfo};
    use smallvec::smallvec;

    fn sym(n: u32) -> Symbol {
        Symbol(n)
    }

    fn open() -> SmallVec<[Namespace; 4]> {
        smallvec![Namespace::Public, Namespace::Internal]
    }

    #[test]
    fn innermost_scope_wins() {
        let mut table = SymbolTable::new();
        let outer = table.new_scope(BuilderKind::Global);
        let inner = table.new_scope(BuilderKind::Activation);
        table.declare_variable(outer, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        let inner_slot = table.declare_variable(
            inner,
            sym(1),
            Namespace::Public,
            TypeInfo::of(TypeId::STRING),
            false,
        );

        let r = Reference::unqualified(sym(1), open(), Span::default());
        match resolve(&table, &r, &[outer, inner], 0) {
            Resolution::Resolved(b) => assert_eq!(b.get_slot, Some(inner_slot)),
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[test]
    fn lowest_searchable_bounds_the_walk() {
        let mut table = SymbolTable::new();
        let outer = table.new_scope(BuilderKind::Global);
        let inner = table.new_scope(BuilderKind::Block);
        table.declare_variable(outer, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);

        let r = Reference::unqualified(sym(1), open(), Span::default());
        // the outer scope sits below the searchable boundary
        assert_eq!(resolve(&table, &r, &[outer, inner], 1), Resolution::NotFound);
        assert!(matches!(
            resolve(&table, &r, &[outer, inner], 0),
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn ambiguous_across_namespaces() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Global);
        table.declare_variable(scope, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        table.declare_variable(scope, sym(1), Namespace::Internal, TypeInfo::of(TypeId::INT), false);

        let r = Reference::unqualified(sym(1), open(), Span::default());
        assert_eq!(resolve(&table, &r, &[scope], 0), Resolution::Ambiguous);
    }

    #[test]
    fn qualified_reference_is_never_ambiguous() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Global);
        table.declare_variable(scope, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        let internal_slot = table.declare_variable(
            scope,
            sym(1),
            Namespace::Internal,
            TypeInfo::of(TypeId::INT),
            false,
        );

        let r = Reference::qualified(sym(1), Namespace::Internal, Span::default());
        match resolve(&table, &r, &[scope], 0) {
            Resolution::Resolved(b) => assert_eq!(b.get_slot, Some(internal_slot)),
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[test]
    fn binding_is_idempotent() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(BuilderKind::Global);
        let slot =
            table.declare_variable(scope, sym(1), Namespace::Public, TypeInfo::of(TypeId::INT), false);
        let r = Reference::unqualified(sym(1), open(), Span::default());
        let first = resolve(&table, &r, &[scope], 0);
        let second = resolve(&table, &r, &[scope], 0);
        assert_eq!(first, second);
        assert!(matches!(first, Resolution::Resolved(b) if b.get_slot == Some(slot)));
    }

    #[test]
    fn split_accessor_namespaces_are_ambiguous_unless_protected() {
        let mut table = SymbolTable::new();
        let mut scope_mk = |g_ns, s_ns| {
            let scope = table.new_scope(BuilderKind::Instance);
            table.declare_accessor(
                scope,
                sym(1),
                g_ns,
                AccessKind::Get,
                TypeInfo::of(TypeId::STRING),
                SmallVec::new(),
                crate::slot::CallSequence::ThisArgs,
            );
            table.declare_accessor(
                scope,
                sym(1),
                s_ns,
                AccessKind::Set,
                TypeInfo::of(TypeId::VOID),
                smallvec![TypeInfo::of(TypeId::STRING)],
                crate::slot::CallSequence::ThisArgs,
            );
            scope
        };
        let split = scope_mk(Namespace::Public, Namespace::Internal);
        let owner = TypeId::new(40);
        let protected = scope_mk(Namespace::Public, Namespace::Protected(owner));

        let open_all: SmallVec<[Namespace; 4]> = smallvec![
            Namespace::Public,
            Namespace::Internal,
            Namespace::Protected(owner)
        ];
        let r = Reference::unqualified(sym(1), open_all.clone(), Span::default());
        assert_eq!(resolve(&table, &r, &[split], 0), Resolution::Ambiguous);
        assert!(matches!(
            resolve(&table, &r, &[protected], 0),
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn use_definitions_intersection() {
        let mut defs = BitSet::new();
        let mut reaching = BitSet::new();
        // never assigned anywhere: no definition can reach
        assert!(!calc_use_definitions(&defs, &reaching));
        defs.set(3);
        // definition exists but does not reach
        assert!(!calc_use_definitions(&defs, &reaching));
        reaching.set(3);
        assert!(calc_use_definitions(&defs, &reaching));
    }
}
