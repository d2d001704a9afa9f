//! Interface conformance: every method of every interface a class reaches
//! (directly or through its base chain) must be implemented publicly with an
//! agreeing signature. Extended interfaces need no extra walk here: an
//! interface's name table already carries the signatures it extends.

use super::Evaluator;
use crate::errors::{SemanticError, label};
use crate::scope::{AccessKind, Namespace};
use crate::slot::SlotId;
use crate::types::TypeId;
use rustc_hash::FxHashSet;
use sable_ast::{Span, Symbol};

impl Evaluator<'_> {
    pub(super) fn check_interface_conformance(&mut self, ty: TypeId, span: Span) {
        let Some(class_scope) = self.types.def(ty).instance_scope else {
            return;
        };

        // interfaces named anywhere along the base chain, each checked once
        let mut queue: Vec<TypeId> = Vec::new();
        let mut cls = Some(ty);
        while let Some(c) = cls {
            let def = self.types.def(c);
            queue.extend(def.interfaces.iter().copied());
            cls = def.base;
        }
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();
        // a signature reachable through two implements clauses is one
        // requirement, not two
        let mut checked: FxHashSet<(Symbol, AccessKind, SlotId)> = FxHashSet::default();

        while let Some(iface) = queue.pop() {
            if !visited.insert(iface) {
                continue;
            }
            let Some(iface_scope) = self.types.def(iface).instance_scope else {
                continue;
            };

            let required: Vec<(Symbol, AccessKind, SlotId)> = self
                .symbols
                .names_in(iface_scope)
                .filter_map(|((name, _, kind), slot)| match kind {
                    AccessKind::Construct => None,
                    // a plain method registers under Call and Get; the Call
                    // entry carries the requirement
                    AccessKind::Get
                        if !self.symbols.slot(slot).flags.is_accessor =>
                    {
                        None
                    }
                    _ => Some((name, kind, slot)),
                })
                .collect();

            for (name, kind, iface_slot) in required {
                if !checked.insert((name, kind, iface_slot)) {
                    continue;
                }
                match self
                    .symbols
                    .find_in_bases(class_scope, name, Namespace::Public, kind)
                {
                    None => {
                        let name = self.name_of(name);
                        let interface = self.types.name(iface).to_string();
                        self.error(
                            SemanticError::UnknownInterfaceMethod {
                                name,
                                interface,
                                span: label(span),
                            },
                            span,
                        );
                    }
                    Some((_, impl_slot)) => {
                        if !self.signatures_match(impl_slot, iface_slot) {
                            let impl_span = self
                                .slot_spans
                                .get(&impl_slot)
                                .copied()
                                .unwrap_or(span);
                            let name = self.name_of(name);
                            let interface = self.types.name(iface).to_string();
                            self.error(
                                SemanticError::IncompatibleInterfaceMethod {
                                    name,
                                    interface,
                                    span: label(impl_span),
                                },
                                impl_span,
                            );
                        }
                    }
                }
            }
        }
    }
}
