//! Typechecking and elaboration: name resolution, bidirectional expression
//! checking, case normalization, timing analysis and claim splitting.

mod cases;
mod expr;

use indexmap::IndexMap;

use act_dsl::ast::{
    AssignRhs, Definition, Expr, RawAct, RawBehaviour, SlotType, StorageEntry, Transition,
};

use crate::abi;
use crate::errors::{CheckFailure, ErrCtx, InternalError, TypeError, TypeErrors};
use crate::storage::{Rewrite, StorageItem, StorageRef, StorageUpdate};
use crate::store::{self, Store};
use crate::timing::{set_time, Timing};
use crate::traversal;
use crate::types::{
    Act, ActType, Behaviour, Constructor, Contract, Exp, Interface, Invariant, Mode,
};

use expr::{check_expr, resolve_entry, ExprEnv, TimeMode};

/// Typecheck a parsed specification into the timing-annotated IR.
///
/// User errors accumulate across independent declarations and are returned
/// together; unsupported-feature stubs abort immediately as internal
/// errors.
pub fn typecheck(raw: &RawAct, source: &str, filename: &str) -> Result<Act, CheckFailure> {
    let ctx = ErrCtx { source, filename };
    let (store, errors) = store::discover(raw, &ctx);

    let mut defs: IndexMap<String, &Definition> = IndexMap::new();
    let mut transitions: IndexMap<String, Vec<&Transition>> = IndexMap::new();
    for b in &raw.behaviours {
        match b {
            RawBehaviour::Definition(d) => {
                defs.entry(d.contract.node.clone()).or_insert(d);
            }
            RawBehaviour::Transition(t) => {
                transitions
                    .entry(t.contract.node.clone())
                    .or_default()
                    .push(t);
            }
        }
    }

    let mut checker = Checker {
        ctx: &ctx,
        store: &store,
        errors,
    };

    for (contract, ts) in &transitions {
        if !defs.contains_key(contract) {
            checker.errors.push(TypeError::MissingConstructor {
                name: contract.clone(),
                span: ctx.at(ts[0].contract.span),
                src: ctx.src(),
            });
        }
        checker.check_duplicate_behaviours(contract, ts);
    }

    let mut contracts = Vec::new();
    for (contract, def) in &defs {
        let ts = transitions.get(contract).map(Vec::as_slice).unwrap_or(&[]);
        let checked = checker.check_contract(def, ts)?;
        if !checked.constructors.is_empty() {
            contracts.push(checked);
        }
    }

    if checker.errors.is_empty() {
        Ok(Act { store, contracts })
    } else {
        Err(TypeErrors::new(checker.errors).into())
    }
}

struct Checker<'a> {
    ctx: &'a ErrCtx<'a>,
    store: &'a Store,
    errors: Vec<TypeError>,
}

impl<'a> Checker<'a> {
    fn collect(&mut self, r: Result<Exp, TypeError>) -> Option<Exp> {
        match r {
            Ok(e) => Some(e),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    fn check_duplicate_behaviours(&mut self, contract: &str, ts: &[&Transition]) {
        let mut seen: Vec<(String, String)> = Vec::new();
        for t in ts {
            let iface = typed_interface(&t.interface);
            let key = (t.name.node.clone(), iface.to_string());
            if seen.contains(&key) {
                self.errors.push(TypeError::DuplicateBehaviour {
                    name: t.name.node.clone(),
                    contract: contract.to_string(),
                    span: self.ctx.at(t.name.span),
                    src: self.ctx.src(),
                });
            } else {
                seen.push(key);
            }
        }
    }

    fn env_for<'e>(
        &self,
        contract: &'e str,
        interface: &act_dsl::ast::Interface,
    ) -> Option<ExprEnv<'e>>
    where
        'a: 'e,
    {
        let slots = self.store.contract(contract)?;
        let calldata = interface
            .decls
            .iter()
            .map(|d| (d.name.node.clone(), d.abi))
            .collect();
        Some(ExprEnv {
            contract,
            slots,
            store: self.store,
            calldata,
        })
    }

    fn check_contract(
        &mut self,
        def: &Definition,
        ts: &[&Transition],
    ) -> Result<Contract, InternalError> {
        let constructors = self.check_definition(def)?;
        let mut behaviours = Vec::new();
        for t in ts {
            behaviours.extend(self.check_transition(t));
        }
        Ok(Contract {
            constructors,
            behaviours,
        })
    }

    // -----------------------------------------------------------------
    // Shared blocks
    // -----------------------------------------------------------------

    /// Elaborate the `iff` blocks into untimed boolean preconditions;
    /// `iff in range` expressions become in-range predicates.
    fn check_iffs(
        &mut self,
        env: &ExprEnv<'_>,
        iffs: &[act_dsl::ast::IffBlock],
    ) -> Vec<Exp> {
        let mut out = Vec::new();
        for block in iffs {
            match block.range {
                None => {
                    for e in &block.exprs {
                        let checked =
                            check_expr(env, self.ctx, e, ActType::Boolean, TimeMode::Untimed);
                        if let Some(x) = self.collect(checked) {
                            out.push(x);
                        }
                    }
                }
                Some(abi) => {
                    if abi::bounds(abi).is_none() {
                        self.errors.push(TypeError::NoRange {
                            abi: abi.to_string(),
                            span: self.ctx.at(block.span),
                            src: self.ctx.src(),
                        });
                        continue;
                    }
                    for e in &block.exprs {
                        let checked =
                            check_expr(env, self.ctx, e, ActType::Integer, TimeMode::Untimed);
                        if let Some(x) = self.collect(checked) {
                            out.push(Exp::in_range(abi, x));
                        }
                    }
                }
            }
        }
        out
    }

    /// Postconditions allow explicit `pre`/`post`; bare references denote
    /// the post-state.
    fn check_ensures(&mut self, env: &ExprEnv<'_>, exprs: &[Expr]) -> Vec<Exp> {
        exprs
            .iter()
            .filter_map(|e| {
                let checked = check_expr(env, self.ctx, e, ActType::Boolean, TimeMode::Timed);
                self.collect(checked).map(|x| set_time(&x, Timing::Post))
            })
            .collect()
    }

    /// Elaborate a `storage` block into rewrites. Right-hand sides and
    /// index expressions read the pre-state.
    fn check_storage_block(
        &mut self,
        env: &ExprEnv<'_>,
        entries: &[StorageEntry],
    ) -> Vec<Rewrite> {
        let mut out = Vec::new();
        for se in entries {
            let resolved = resolve_entry(
                env,
                self.ctx,
                act_dsl::ast::EntryTime::Untimed,
                &se.entry,
                TimeMode::Untimed,
            );
            let Some(exp) = self.collect(resolved) else {
                continue;
            };
            let item = match exp {
                Exp::TEntry(_, item) => item,
                other => {
                    let found = match other {
                        Exp::Var(..) => "calldata argument",
                        _ => "bytestring slice",
                    };
                    self.errors.push(TypeError::TypeMismatch {
                        expected: "storage reference".to_string(),
                        found: found.to_string(),
                        span: self.ctx.at(se.entry.span),
                        src: self.ctx.src(),
                    });
                    continue;
                }
            };
            let item = item.map_indices(&|ix| set_time(ix, Timing::Pre));
            match &se.rhs {
                None => out.push(Rewrite::Constant(item)),
                Some(rhs) => {
                    let checked = check_expr(env, self.ctx, rhs, item.ty, TimeMode::Untimed);
                    if let Some(value) = self.collect(checked) {
                        out.push(Rewrite::Update(StorageUpdate {
                            item,
                            rhs: set_time(&value, Timing::Pre),
                        }));
                    }
                }
            }
        }
        out
    }

    /// Infer the type of a return expression by trying each act-type.
    fn check_returns(&mut self, env: &ExprEnv<'_>, e: &Expr) -> Option<Exp> {
        let mut first_err = None;
        for ty in [ActType::Integer, ActType::Boolean, ActType::ByteStr] {
            match check_expr(env, self.ctx, e, ty, TimeMode::Timed) {
                Ok(x) => return Some(set_time(&x, Timing::Pre)),
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_err {
            self.errors.push(err);
        }
        None
    }

    // -----------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------

    fn check_transition(&mut self, t: &Transition) -> Vec<Behaviour> {
        let Some(env) = self.env_for(&t.contract.node, &t.interface) else {
            // Missing constructor was already reported.
            return Vec::new();
        };
        let interface = typed_interface(&t.interface);
        let preconditions = self.check_iffs(&env, &t.iffs);
        let postconditions = self.check_ensures(&env, &t.ensures);
        let normalized = cases::normalize(&env, self.ctx, &t.cases, &mut self.errors);

        let mut behaviours = Vec::new();
        for (guard, post) in normalized {
            let state_updates = self.check_storage_block(&env, &post.storage);
            let returns = post.returns.as_ref().and_then(|r| self.check_returns(&env, r));

            if !preconditions.is_empty() {
                behaviours.push(Behaviour {
                    name: t.name.node.clone(),
                    mode: Mode::Fail,
                    contract: t.contract.node.clone(),
                    interface: interface.clone(),
                    preconditions: vec![Exp::not(Exp::conj(
                        preconditions.clone(),
                    ))],
                    case_conditions: vec![guard.clone()],
                    postconditions: Vec::new(),
                    state_updates: state_updates.iter().map(Rewrite::to_constant).collect(),
                    returns: None,
                });
            }
            behaviours.push(Behaviour {
                name: t.name.node.clone(),
                mode: Mode::Pass,
                contract: t.contract.node.clone(),
                interface: interface.clone(),
                preconditions: preconditions.clone(),
                case_conditions: vec![guard],
                postconditions: postconditions.clone(),
                state_updates,
                returns,
            });
        }
        // Pass claims first, in source order, then their fail twins.
        behaviours.sort_by_key(|b| match b.mode {
            Mode::Pass => 0,
            Mode::Fail => 1,
        });
        behaviours
    }

    // -----------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------

    fn check_definition(&mut self, def: &Definition) -> Result<Vec<Constructor>, InternalError> {
        let contract = def.contract.node.clone();
        let Some(env) = self.env_for(&contract, &def.interface) else {
            return Ok(Vec::new());
        };
        let interface = typed_interface(&def.interface);
        let preconditions = self.check_iffs(&env, &def.iffs);
        let postconditions = self.check_ensures(&env, &def.ensures);
        let initial_storage = self.check_creates(&env, def)?;
        let ext_storage = self.check_ext_storage(&env, def);

        let mut invariants = Vec::new();
        for e in &def.invariants {
            let checked = check_expr(&env, self.ctx, e, ActType::Boolean, TimeMode::Untimed);
            if let Some(predicate) = self.collect(checked) {
                let storage_bounds = traversal::locations(&predicate)
                    .into_iter()
                    .filter(|loc| loc.ty == ActType::Integer && abi::bounds(loc.abi).is_some())
                    .map(|loc| {
                        Exp::in_range(loc.abi, loc.entry(Timing::Neither))
                    })
                    .collect();
                invariants.push(Invariant {
                    contract: contract.clone(),
                    preconditions: preconditions.clone(),
                    storage_bounds,
                    predicate,
                });
            }
        }

        let mut constructors = Vec::new();
        if !preconditions.is_empty() {
            constructors.push(Constructor {
                contract: contract.clone(),
                mode: Mode::Fail,
                interface: interface.clone(),
                preconditions: vec![Exp::not(Exp::conj(
                    preconditions.clone(),
                ))],
                postconditions: Vec::new(),
                invariants: Vec::new(),
                initial_storage: Vec::new(),
                ext_storage: ext_storage.iter().map(Rewrite::to_constant).collect(),
            });
        }
        constructors.insert(
            0,
            Constructor {
                contract,
                mode: Mode::Pass,
                interface,
                preconditions,
                postconditions,
                invariants,
                initial_storage,
                ext_storage,
            },
        );
        Ok(constructors)
    }

    /// Elaborate the `creates` block into initial storage updates. No
    /// expression in a creates block may read storage.
    fn check_creates(
        &mut self,
        env: &ExprEnv<'_>,
        def: &Definition,
    ) -> Result<Vec<StorageUpdate>, InternalError> {
        let mut out = Vec::new();
        let mut declared: Vec<&str> = Vec::new();
        for assign in &def.creates {
            // The store keeps the first declaration on duplicates; skip the
            // rest here as well.
            if declared.contains(&assign.name.node.as_str()) {
                continue;
            }
            declared.push(&assign.name.node);
            let base = StorageRef::Var {
                contract: env.contract.to_string(),
                name: assign.name.node.clone(),
                span: assign.name.span,
            };
            match (&assign.slot, &assign.rhs) {
                (_, AssignRhs::StructLit(_)) => {
                    return Err(InternalError::StructAssignment);
                }
                (SlotType::Value(abi), AssignRhs::Expr(e)) => {
                    let checked =
                        check_expr(env, self.ctx, e, abi::act_type(*abi), TimeMode::Untimed);
                    if let Some(value) = self.collect(checked) {
                        self.reject_storage_reads(&value, e);
                        out.push(StorageUpdate {
                            item: StorageItem {
                                ty: abi::act_type(*abi),
                                abi: *abi,
                                reference: base,
                            },
                            rhs: value,
                        });
                    }
                }
                (SlotType::Value(_), AssignRhs::MappingLit(_)) => {
                    self.errors.push(TypeError::TypeMismatch {
                        expected: assign.slot.to_string(),
                        found: "mapping initialization".to_string(),
                        span: self.ctx.at(assign.span),
                        src: self.ctx.src(),
                    });
                }
                (SlotType::Mapping { .. }, AssignRhs::Expr(e)) => {
                    self.errors.push(TypeError::TypeMismatch {
                        expected: assign.slot.to_string(),
                        found: "single value".to_string(),
                        span: self.ctx.at(e.span()),
                        src: self.ctx.src(),
                    });
                }
                (SlotType::Mapping { keys, value }, AssignRhs::MappingLit(pairs)) => {
                    for (k, v) in pairs {
                        if keys.len() != 1 {
                            self.errors.push(TypeError::ArityMismatch {
                                name: assign.name.node.clone(),
                                expected: keys.len(),
                                found: 1,
                                span: self.ctx.at(k.span()),
                                src: self.ctx.src(),
                            });
                            continue;
                        }
                        let key = check_expr(
                            env,
                            self.ctx,
                            k,
                            abi::act_type(keys[0]),
                            TimeMode::Untimed,
                        );
                        let val =
                            check_expr(env, self.ctx, v, abi::act_type(*value), TimeMode::Untimed);
                        let (Some(key), Some(val)) = (self.collect(key), self.collect(val)) else {
                            continue;
                        };
                        self.reject_storage_reads(&key, k);
                        self.reject_storage_reads(&val, v);
                        out.push(StorageUpdate {
                            item: StorageItem {
                                ty: abi::act_type(*value),
                                abi: *value,
                                reference: StorageRef::Mapping {
                                    base: Box::new(base.clone()),
                                    indices: vec![key],
                                    span: assign.span,
                                },
                            },
                            rhs: val,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn reject_storage_reads(&mut self, typed: &Exp, raw: &Expr) {
        if !traversal::entries(typed).is_empty() {
            self.errors.push(TypeError::StorageReadInCreates {
                span: self.ctx.at(raw.span()),
                src: self.ctx.src(),
            });
        }
    }

    /// A constructor's `storage` block may only constrain other contracts'
    /// slots.
    fn check_ext_storage(&mut self, env: &ExprEnv<'_>, def: &Definition) -> Vec<Rewrite> {
        let rewrites = self.check_storage_block(env, &def.ext_storage);
        for rw in &rewrites {
            if rw.location().contract() == env.contract {
                self.errors.push(TypeError::OwnStorageInConstructor {
                    span: self.ctx.at(rw.location().reference.span()),
                    src: self.ctx.src(),
                });
            }
        }
        rewrites
    }
}

fn typed_interface(iface: &act_dsl::ast::Interface) -> Interface {
    Interface {
        name: iface.name.node.clone(),
        args: iface
            .decls
            .iter()
            .map(|d| (d.name.node.clone(), d.abi))
            .collect(),
    }
}
