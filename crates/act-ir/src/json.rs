//! JSON serialization of the typed program, consumed by the `type`
//! command. Operators serialize as `{symbol, arity, args}`; storage
//! references as `lookup`/`select` nodes; sorts use the stable
//! `AInteger` / `ABoolean` / `AByteStr` / `AContract` tags.

use serde_json::{json, Value};

use act_dsl::ast::SlotType;

use crate::storage::{Rewrite, StorageItem, StorageRef, StorageUpdate};
use crate::timing::Timing;
use crate::types::{Act, Behaviour, Constructor, Contract, Interface, Invariant, Exp};

pub fn act_json(act: &Act) -> Value {
    json!({
        "kind": "Program",
        "store": store_json(act),
        "contracts": act.contracts.iter().map(contract_json).collect::<Vec<_>>(),
    })
}

fn store_json(act: &Act) -> Value {
    let mut store = serde_json::Map::new();
    for (contract, slots) in act.store.iter() {
        let mut slot_map = serde_json::Map::new();
        for (name, slot) in slots {
            slot_map.insert(name.clone(), slot_type_json(slot));
        }
        store.insert(contract.clone(), Value::Object(slot_map));
    }
    Value::Object(store)
}

fn slot_type_json(slot: &SlotType) -> Value {
    match slot {
        SlotType::Value(abi) => json!(abi.to_string()),
        SlotType::Mapping { keys, value } => json!({
            "mapping": {
                "keys": keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                "value": value.to_string(),
            }
        }),
    }
}

fn contract_json(contract: &Contract) -> Value {
    json!({
        "kind": "Contract",
        "name": contract.name(),
        "constructor": constructor_json(&contract.constructors[0]),
        "behaviors": contract.behaviours.iter().map(behaviour_json).collect::<Vec<_>>(),
    })
}

fn constructor_json(ctor: &Constructor) -> Value {
    json!({
        "kind": "Constructor",
        "contract": ctor.contract,
        "mode": ctor.mode.to_string(),
        "interface": interface_json(&ctor.interface),
        "preconditions": exps_json(&ctor.preconditions),
        "postconditions": exps_json(&ctor.postconditions),
        "invariants": ctor.invariants.iter().map(invariant_json).collect::<Vec<_>>(),
        "initialStorage": ctor.initial_storage.iter().map(update_json).collect::<Vec<_>>(),
        "extStorage": ctor.ext_storage.iter().map(rewrite_json).collect::<Vec<_>>(),
    })
}

fn behaviour_json(b: &Behaviour) -> Value {
    json!({
        "kind": "Behaviour",
        "name": b.name,
        "contract": b.contract,
        "mode": b.mode.to_string(),
        "interface": interface_json(&b.interface),
        "preconditions": exps_json(&b.preconditions),
        "caseConditions": exps_json(&b.case_conditions),
        "postconditions": exps_json(&b.postconditions),
        "stateUpdates": b.state_updates.iter().map(rewrite_json).collect::<Vec<_>>(),
        "returns": b.returns.as_ref().map(exp_json),
    })
}

fn invariant_json(inv: &Invariant) -> Value {
    json!({
        "kind": "Invariant",
        "contract": inv.contract,
        "preconditions": exps_json(&inv.preconditions),
        "storageBounds": exps_json(&inv.storage_bounds),
        "predicate": exp_json(&inv.predicate),
    })
}

fn interface_json(iface: &Interface) -> Value {
    json!({
        "name": iface.name,
        "args": iface.args.iter().map(|(name, abi)| json!({
            "name": name,
            "abiType": abi.to_string(),
        })).collect::<Vec<_>>(),
    })
}

fn update_json(u: &StorageUpdate) -> Value {
    json!({
        "location": item_json(&u.item),
        "value": exp_json(&u.rhs),
    })
}

fn rewrite_json(rw: &Rewrite) -> Value {
    match rw {
        Rewrite::Constant(loc) => json!({"constant": item_json(loc)}),
        Rewrite::Update(u) => json!({"rewrite": update_json(u)}),
    }
}

fn item_json(item: &StorageItem) -> Value {
    let mut v = ref_json(&item.reference);
    if let Value::Object(map) = &mut v {
        map.insert("sort".into(), json!(item.ty.tag()));
        map.insert("abiType".into(), json!(item.abi.to_string()));
    }
    v
}

fn ref_json(r: &StorageRef) -> Value {
    match r {
        StorageRef::Var { contract, name, .. } => json!({
            "symbol": "lookup",
            "arity": 2,
            "args": [contract, name],
        }),
        StorageRef::Mapping { base, indices, .. } => {
            let mut args = vec![ref_json(base)];
            args.extend(indices.iter().map(exp_json));
            json!({
                "symbol": "select",
                "arity": args.len(),
                "args": args,
            })
        }
        StorageRef::Field { base, name, .. } => json!({
            "symbol": "field",
            "arity": 2,
            "args": [ref_json(base), json!(name)],
        }),
    }
}

fn exps_json(exps: &[Exp]) -> Value {
    json!(exps.iter().map(exp_json).collect::<Vec<_>>())
}

fn op(symbol: &str, args: Vec<Value>) -> Value {
    json!({
        "symbol": symbol,
        "arity": args.len(),
        "args": args,
    })
}

pub fn exp_json(e: &Exp) -> Value {
    match e {
        Exp::And(l, r) => op("and", vec![exp_json(l), exp_json(r)]),
        Exp::Or(l, r) => op("or", vec![exp_json(l), exp_json(r)]),
        Exp::Not(x) => op("not", vec![exp_json(x)]),
        Exp::LitBool(b) => json!({"literal": b, "sort": "ABoolean"}),
        Exp::Lt(l, r) => op("<", vec![exp_json(l), exp_json(r)]),
        Exp::Le(l, r) => op("<=", vec![exp_json(l), exp_json(r)]),
        Exp::Gt(l, r) => op(">", vec![exp_json(l), exp_json(r)]),
        Exp::Ge(l, r) => op(">=", vec![exp_json(l), exp_json(r)]),
        Exp::Eq(_, l, r) => op("==", vec![exp_json(l), exp_json(r)]),
        Exp::NEq(_, l, r) => op("=/=", vec![exp_json(l), exp_json(r)]),
        Exp::InRange(abi, x) => op("inRange", vec![json!(abi.to_string()), exp_json(x)]),
        Exp::Add(l, r) => op("+", vec![exp_json(l), exp_json(r)]),
        Exp::Sub(l, r) => op("-", vec![exp_json(l), exp_json(r)]),
        Exp::Mul(l, r) => op("*", vec![exp_json(l), exp_json(r)]),
        Exp::Div(l, r) => op("/", vec![exp_json(l), exp_json(r)]),
        Exp::Mod(l, r) => op("%", vec![exp_json(l), exp_json(r)]),
        Exp::Pow(l, r) => op("^", vec![exp_json(l), exp_json(r)]),
        Exp::LitInt(n) => json!({"literal": n.to_string(), "sort": "AInteger"}),
        Exp::Cat(l, r) => op("++", vec![exp_json(l), exp_json(r)]),
        Exp::Slice(b, lo, hi) => op("slice", vec![exp_json(b), exp_json(lo), exp_json(hi)]),
        Exp::LitBytes(s) => json!({"literal": s, "sort": "AByteStr"}),
        Exp::Env(t, v) => json!({"ethEnv": v.source_name(), "sort": t.tag()}),
        Exp::Ite(_, c, t, f) => op("ite", vec![exp_json(c), exp_json(t), exp_json(f)]),
        Exp::Var(t, name) => json!({"var": name, "sort": t.tag()}),
        Exp::TEntry(timing, item) => json!({
            "entry": item_json(item),
            "timing": timing_tag(*timing),
            "sort": item.ty.tag(),
        }),
        Exp::Create(c, args) => op(
            "create",
            std::iter::once(json!(c))
                .chain(args.iter().map(exp_json))
                .collect(),
        ),
    }
}

fn timing_tag(t: Timing) -> &'static str {
    match t {
        Timing::Pre => "pre",
        Timing::Post => "post",
        Timing::Neither => "neither",
    }
}
