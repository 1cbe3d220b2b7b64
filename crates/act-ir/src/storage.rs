use act_dsl::ast::{AbiType, Span};

use crate::timing::Timing;
use crate::types::{ActType, Exp};

/// A resolved reference into contract storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageRef {
    /// A named slot of a contract.
    Var {
        contract: String,
        name: String,
        span: Span,
    },
    /// A mapping access with one expression per declared key.
    Mapping {
        base: Box<StorageRef>,
        indices: Vec<Exp>,
        span: Span,
    },
    /// A field of a contract-typed slot. Unsupported by the SMT encoder.
    Field {
        base: Box<StorageRef>,
        name: String,
        span: Span,
    },
}

impl StorageRef {
    pub fn contract(&self) -> &str {
        match self {
            StorageRef::Var { contract, .. } => contract,
            StorageRef::Mapping { base, .. } | StorageRef::Field { base, .. } => base.contract(),
        }
    }

    /// The declared slot name this reference roots in.
    pub fn slot_name(&self) -> &str {
        match self {
            StorageRef::Var { name, .. } => name,
            StorageRef::Mapping { base, .. } => base.slot_name(),
            StorageRef::Field { name, .. } => name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            StorageRef::Var { span, .. }
            | StorageRef::Mapping { span, .. }
            | StorageRef::Field { span, .. } => *span,
        }
    }

    pub fn indices(&self) -> &[Exp] {
        match self {
            StorageRef::Mapping { indices, .. } => indices,
            _ => &[],
        }
    }

    pub fn map_indices(&self, f: &dyn Fn(&Exp) -> Exp) -> StorageRef {
        match self {
            StorageRef::Var { .. } => self.clone(),
            StorageRef::Mapping {
                base,
                indices,
                span,
            } => StorageRef::Mapping {
                base: Box::new(base.map_indices(f)),
                indices: indices.iter().map(|ix| f(ix)).collect(),
                span: *span,
            },
            StorageRef::Field { base, name, span } => StorageRef::Field {
                base: Box::new(base.map_indices(f)),
                name: name.clone(),
                span: *span,
            },
        }
    }
}

/// A storage reference together with its precise type: the act-type of the
/// accessed value and the declared ABI type it decodes to.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageItem {
    pub ty: ActType,
    pub abi: AbiType,
    pub reference: StorageRef,
}

impl StorageItem {
    pub fn contract(&self) -> &str {
        self.reference.contract()
    }

    pub fn slot_name(&self) -> &str {
        self.reference.slot_name()
    }

    pub fn map_indices(&self, f: &dyn Fn(&Exp) -> Exp) -> StorageItem {
        StorageItem {
            ty: self.ty,
            abi: self.abi,
            reference: self.reference.map_indices(f),
        }
    }

    /// Identity of the underlying slot, ignoring index expressions. Used to
    /// decide whether two locations refer to the same declared slot.
    pub fn slot_id(&self) -> (String, String) {
        (self.contract().to_string(), self.slot_name().to_string())
    }

    pub fn entry(&self, timing: Timing) -> Exp {
        Exp::TEntry(timing, self.clone())
    }
}

/// A read-only reference: constrained but not assigned.
pub type StorageLocation = StorageItem;

/// An assignment of a new value to a storage location.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUpdate {
    pub item: StorageItem,
    pub rhs: Exp,
}

/// A line of a state-update list: either a genuine update or a location
/// that is not mutated but still constrained (pre-state equals post-state).
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    Constant(StorageLocation),
    Update(StorageUpdate),
}

impl Rewrite {
    pub fn location(&self) -> &StorageLocation {
        match self {
            Rewrite::Constant(loc) => loc,
            Rewrite::Update(u) => &u.item,
        }
    }

    /// Drop the assignment, keeping only the referenced location.
    pub fn to_constant(&self) -> Rewrite {
        Rewrite::Constant(self.location().clone())
    }
}
