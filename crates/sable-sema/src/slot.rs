//! Symbol-table slots: one compile-time binding each.
//!
//! Two shapes share the contract: variable slots carry a storage index and
//! (if const) a value; method slots carry a method id and the declared
//! parameter signature. The shapes are mutually exclusive by construction.

use crate::bitset::BitSet;
use crate::scope::ScopeId;
use crate::types::{TypeId, TypeInfo};
use crate::value::Value;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a callable body, assigned at declaration and carried through
/// to the code generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u32);

/// How a parameter position was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    Required,
    /// Has a compile-time default value
    Optional,
    /// Absorbs all remaining arguments, each coerced to the any type
    Rest,
}

/// Which operands a caller must push for this slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSequence {
    /// Receiver plus argument list (instance methods, accessors)
    ThisArgs,
    /// Argument list only (global functions, statics)
    Args,
    /// One operand, no receiver (unary operators)
    Operand,
    /// Two operands, no receiver (binary operators)
    Operands2,
}

#[derive(Debug, Clone)]
pub enum SlotShape {
    Variable {
        /// Fixed numeric index into the owning frame's storage
        storage_index: u32,
    },
    Method {
        method_id: MethodId,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotFlags {
    pub is_final: bool,
    pub is_override: bool,
    pub is_const: bool,
    pub is_imported: bool,
    pub is_intrinsic: bool,
    /// Set when reaching-definition analysis finds a use no definition
    /// reaches; forces defensive default-initialization at method entry
    pub needs_init: bool,
    /// Distinguishes a getter/setter slot from a plain method slot
    pub is_accessor: bool,
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    pub owner: ScopeId,
    /// Position in the owning scope's slot array (offset past inherited
    /// members for instance frames)
    pub index: u32,
    /// Declared type; the any type until known
    pub ty: TypeInfo,
    /// Declared parameter types for callable slots; empty means zero-arg
    pub params: SmallVec<[TypeInfo; 4]>,
    pub param_styles: SmallVec<[ParamStyle; 4]>,
    pub call_seq: CallSequence,
    /// Compile-time constant value; readable only when `flags.is_const`
    pub value: Option<Value>,
    /// Back-link to the base-class slot this one overrides
    pub overridden: Option<SlotId>,
    /// Operator dispatch: operand type -> specialized slot
    pub unary_overloads: Option<Box<FxHashMap<TypeId, SlotId>>>,
    pub binary_overloads: Option<Box<FxHashMap<(TypeId, TypeId), SlotId>>>,
    pub flags: SlotFlags,
    /// Minimum language version that can see this binding
    pub min_version: u32,
    pub shape: SlotShape,
    /// Definition bits assigned to this binding, for use-before-init checks
    pub def_bits: BitSet,
}

impl Slot {
    pub fn variable(id: SlotId, owner: ScopeId, index: u32, storage_index: u32, ty: TypeInfo) -> Self {
        Self {
            id,
            owner,
            index,
            ty,
            params: SmallVec::new(),
            param_styles: SmallVec::new(),
            call_seq: CallSequence::Args,
            value: None,
            overridden: None,
            unary_overloads: None,
            binary_overloads: None,
            flags: SlotFlags::default(),
            min_version: 0,
            shape: SlotShape::Variable { storage_index },
            def_bits: BitSet::new(),
        }
    }

    pub fn method(
        id: SlotId,
        owner: ScopeId,
        index: u32,
        method_id: MethodId,
        return_ty: TypeInfo,
        params: SmallVec<[TypeInfo; 4]>,
        param_styles: SmallVec<[ParamStyle; 4]>,
        call_seq: CallSequence,
    ) -> Self {
        debug_assert_eq!(params.len(), param_styles.len(), "slot parameter lists must be parallel");
        Self {
            id,
            owner,
            index,
            ty: return_ty,
            params,
            param_styles,
            call_seq,
            value: None,
            overridden: None,
            unary_overloads: None,
            binary_overloads: None,
            flags: SlotFlags::default(),
            min_version: 0,
            shape: SlotShape::Method { method_id },
            def_bits: BitSet::new(),
        }
    }

    /// Storage index for variable slots; None for method slots
    pub fn storage_index(&self) -> Option<u32> {
        match self.shape {
            SlotShape::Variable { storage_index } => Some(storage_index),
            SlotShape::Method { .. } => None,
        }
    }

    /// Method id for method slots; None for variable slots
    pub fn method_id(&self) -> Option<MethodId> {
        match self.shape {
            SlotShape::Variable { .. } => None,
            SlotShape::Method { method_id } => Some(method_id),
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self.shape, SlotShape::Method { .. })
    }

    /// Constant value, readable only once the slot is marked const
    pub fn const_value(&self) -> Option<&Value> {
        if self.flags.is_const { self.value.as_ref() } else { None }
    }

    /// Number of required parameters (leading Required positions)
    pub fn required_params(&self) -> usize {
        self.param_styles
            .iter()
            .take_while(|s| matches!(s, ParamStyle::Required))
            .count()
    }

    pub fn has_rest(&self) -> bool {
        matches!(self.param_styles.last(), Some(ParamStyle::Rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_are_mutually_exclusive() {
        let var = Slot::variable(SlotId(0), ScopeId(0), 0, 0, TypeInfo::of(TypeId::INT));
        assert_eq!(var.storage_index(), Some(0));
        assert_eq!(var.method_id(), None);

        let m = Slot::method(
            SlotId(1),
            ScopeId(0),
            1,
            MethodId(7),
            TypeInfo::of(TypeId::VOID),
            SmallVec::new(),
            SmallVec::new(),
            CallSequence::ThisArgs,
        );
        assert_eq!(m.storage_index(), None);
        assert_eq!(m.method_id(), Some(MethodId(7)));
    }

    #[test]
    fn const_value_gated_on_flag() {
        let mut var = Slot::variable(SlotId(0), ScopeId(0), 0, 0, TypeInfo::of(TypeId::INT));
        var.value = Some(Value::Int(5));
        assert!(var.const_value().is_none());
        var.flags.is_const = true;
        assert_eq!(var.const_value(), Some(&Value::Int(5)));
    }

    #[test]
    fn required_params_counts_leading_required() {
        let mut m = Slot::method(
            SlotId(0),
            ScopeId(0),
            0,
            MethodId(0),
            TypeInfo::of(TypeId::VOID),
            smallvec::smallvec![
                TypeInfo::of(TypeId::INT),
                TypeInfo::of(TypeId::INT),
                TypeInfo::of(TypeId::ANY)
            ],
            smallvec::smallvec![ParamStyle::Required, ParamStyle::Optional, ParamStyle::Rest],
            CallSequence::Args,
        );
        assert_eq!(m.required_params(), 1);
        assert!(m.has_rest());
        m.param_styles = smallvec::smallvec![ParamStyle::Required, ParamStyle::Required, ParamStyle::Required];
        assert_eq!(m.required_params(), 3);
        assert!(!m.has_rest());
    }
}
