use act_dsl::ast::{AbiType, SlotType};
use num::BigInt;

use crate::types::ActType;

/// The act-type an ABI type elaborates to.
pub fn act_type(abi: AbiType) -> ActType {
    match abi {
        AbiType::UInt(_) | AbiType::Int(_) | AbiType::Address => ActType::Integer,
        AbiType::Bool => ActType::Boolean,
        AbiType::Bytes(_) | AbiType::String => ActType::ByteStr,
    }
}

/// The act-type of the value read out of a slot.
pub fn slot_act_type(slot: &SlotType) -> ActType {
    match slot {
        SlotType::Value(abi) => act_type(*abi),
        SlotType::Mapping { value, .. } => act_type(*value),
    }
}

/// The ABI type of the value read out of a slot.
pub fn slot_value_abi(slot: &SlotType) -> AbiType {
    match slot {
        SlotType::Value(abi) => *abi,
        SlotType::Mapping { value, .. } => *value,
    }
}

/// Inclusive integer bounds of an ABI type, when it has an integer range.
pub fn bounds(abi: AbiType) -> Option<(BigInt, BigInt)> {
    let one = BigInt::from(1);
    match abi {
        AbiType::UInt(bits) => {
            let hi = (one.clone() << bits) - one;
            Some((BigInt::from(0), hi))
        }
        AbiType::Int(bits) => {
            let half = one.clone() << (bits - 1);
            Some((-half.clone(), half - one))
        }
        AbiType::Address => {
            let hi = (one.clone() << 160u32) - one;
            Some((BigInt::from(0), hi))
        }
        AbiType::Bool | AbiType::Bytes(_) | AbiType::String => None,
    }
}
