use indexmap::IndexMap;

use act_dsl::ast::{RawAct, RawBehaviour, SlotType};

use crate::errors::{ErrCtx, TypeError};

/// Slot declarations of one contract, in declaration order.
pub type SlotMap = IndexMap<String, SlotType>;

/// The global store schema: contract name → slot name → slot type.
/// Built once from all constructor definitions; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Store {
    contracts: IndexMap<String, SlotMap>,
}

impl Store {
    pub fn contract(&self, name: &str) -> Option<&SlotMap> {
        self.contracts.get(name)
    }

    pub fn slot(&self, contract: &str, name: &str) -> Option<&SlotType> {
        self.contracts.get(contract)?.get(name)
    }

    pub fn contains_contract(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SlotMap)> {
        self.contracts.iter()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Scan all constructor definitions and collect the store schema.
///
/// Duplicate contracts and duplicate slots are reported but do not abort:
/// the first declaration wins so later passes can still run.
pub(crate) fn discover(act: &RawAct, ctx: &ErrCtx<'_>) -> (Store, Vec<TypeError>) {
    let mut store = Store::default();
    let mut errors = Vec::new();

    for behaviour in &act.behaviours {
        let RawBehaviour::Definition(def) = behaviour else {
            continue;
        };
        if store.contains_contract(&def.contract.node) {
            errors.push(TypeError::DuplicateContract {
                name: def.contract.node.clone(),
                span: ctx.at(def.contract.span),
                src: ctx.src(),
            });
            continue;
        }
        // Every declaration of a duplicated name is flagged, first included.
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for assign in &def.creates {
            *counts.entry(assign.name.node.as_str()).or_default() += 1;
        }
        for assign in &def.creates {
            if counts[assign.name.node.as_str()] > 1 {
                errors.push(TypeError::DuplicateSlot {
                    name: assign.name.node.clone(),
                    span: ctx.at(assign.name.span),
                    src: ctx.src(),
                });
            }
        }
        let mut slots = SlotMap::new();
        for assign in &def.creates {
            slots
                .entry(assign.name.node.clone())
                .or_insert_with(|| assign.slot.clone());
        }
        store.contracts.insert(def.contract.node.clone(), slots);
    }

    (store, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use act_dsl::ast::AbiType;
    use act_dsl::parser::parse;

    fn run(src: &str) -> (Store, Vec<TypeError>) {
        let act = parse(src, "t.act").unwrap();
        let ctx = ErrCtx {
            source: src,
            filename: "t.act",
        };
        discover(&act, &ctx)
    }

    #[test]
    fn collects_slots_per_contract() {
        let (store, errors) = run(r#"
behaviour init of Token
interface constructor(uint256 _totalSupply)
creates
  uint256 totalSupply := _totalSupply
  mapping(address => uint256) balanceOf := [CALLER := _totalSupply]

behaviour init of Amm
interface constructor()
creates
  uint256 x := 0
  uint256 y := 0
"#);
        assert!(errors.is_empty());
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.slot("Token", "totalSupply"),
            Some(&SlotType::Value(AbiType::UInt(256)))
        );
        assert_eq!(
            store.slot("Token", "balanceOf"),
            Some(&SlotType::Mapping {
                keys: vec![AbiType::Address],
                value: AbiType::UInt(256)
            })
        );
        assert!(store.slot("Amm", "totalSupply").is_none());
    }

    #[test]
    fn duplicate_slots_flag_both_declarations_and_keep_first() {
        let (store, errors) = run(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 1
  uint8 x := 2
"#);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, TypeError::DuplicateSlot { .. })));
        assert_eq!(store.slot("C", "x"), Some(&SlotType::Value(AbiType::UInt(256))));
    }

    #[test]
    fn duplicate_contracts_report_but_keep_first() {
        let (store, errors) = run(r#"
behaviour init of C
interface constructor()
creates
  uint256 x := 1

behaviour init of C
interface constructor()
creates
  uint256 y := 1
"#);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TypeError::DuplicateContract { .. }));
        assert!(store.slot("C", "x").is_some());
        assert!(store.slot("C", "y").is_none());
    }

    #[test]
    fn slot_order_is_declaration_order() {
        let (store, _) = run(r#"
behaviour init of C
interface constructor()
creates
  uint256 z := 1
  uint256 a := 2
  uint256 m := 3
"#);
        let names: Vec<&String> = store.contract("C").unwrap().keys().collect();
        assert_eq!(names, ["z", "a", "m"]);
    }
}
