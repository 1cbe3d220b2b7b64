use act_dsl::ast::{AbiType, SlotType};
use act_ir::abi;
use act_ir::errors::InternalError;
use act_ir::types::ActType;

/// SMT sorts. Mappings are modelled as arrays nested by key arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtSort {
    Int,
    Bool,
    Str,
    Array(Box<SmtSort>, Box<SmtSort>),
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Str => write!(f, "String"),
            SmtSort::Array(k, v) => write!(f, "(Array {k} {v})"),
        }
    }
}

/// The SMT sort of an act-type. Contract-typed expressions have no sort;
/// they never reach the encoder.
pub fn sort_of(ty: ActType) -> Result<SmtSort, InternalError> {
    match ty {
        ActType::Integer => Ok(SmtSort::Int),
        ActType::Boolean => Ok(SmtSort::Bool),
        ActType::ByteStr => Ok(SmtSort::Str),
        ActType::Contract => Err(InternalError::ExtCreates),
    }
}

pub fn sort_of_abi(abi: AbiType) -> Result<SmtSort, InternalError> {
    sort_of(abi::act_type(abi))
}

/// The sort a declared slot is modelled with: a plain constant for value
/// slots, nested arrays for mappings.
pub fn sort_of_slot(slot: &SlotType) -> Result<SmtSort, InternalError> {
    match slot {
        SlotType::Value(abi) => sort_of_abi(*abi),
        SlotType::Mapping { keys, value } => {
            let mut sort = sort_of_abi(*value)?;
            for key in keys.iter().rev() {
                sort = SmtSort::Array(Box::new(sort_of_abi(*key)?), Box::new(sort));
            }
            Ok(sort)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn act_type_sorts() {
        assert_eq!(sort_of(ActType::Integer).unwrap().to_string(), "Int");
        assert_eq!(sort_of(ActType::Boolean).unwrap().to_string(), "Bool");
        assert_eq!(sort_of(ActType::ByteStr).unwrap().to_string(), "String");
        assert!(sort_of(ActType::Contract).is_err());
    }

    #[test]
    fn mapping_slots_nest_arrays_by_key_arity() {
        let slot = SlotType::Mapping {
            keys: vec![AbiType::Address, AbiType::Address],
            value: AbiType::UInt(256),
        };
        assert_eq!(
            sort_of_slot(&slot).unwrap().to_string(),
            "(Array Int (Array Int Int))"
        );
    }

    #[test]
    fn bool_keyed_mapping() {
        let slot = SlotType::Mapping {
            keys: vec![AbiType::Bool],
            value: AbiType::String,
        };
        assert_eq!(sort_of_slot(&slot).unwrap().to_string(), "(Array Bool String)");
    }
}
