//! Edge reconciliation (C6): merging a block's predecessors into its
//! before-context, and repairing any predecessor whose own after-context
//! disagrees with what the merge settled on.

use super::context::{Context, Value};
use super::lattice::{difference, Object};
use super::transfer::insert_repair_pair;
use crate::cfg::{Cfg, Dominators};
use crate::ir::{BlockId, Function};
use std::collections::BTreeMap;

pub(crate) struct ReconcileResult {
    pub before: Context,
    pub mutated_predecessors: Vec<BlockId>,
}

/// §4.4: partition predecessors into visited/unvisited (substituting the
/// immediate dominator's after-context for the latter), fold into a merged
/// context, then repair any visited predecessor whose stored after-context
/// disagrees with the merge.
pub(crate) fn reconcile(
    function: &mut Function,
    cfg: &Cfg,
    doms: &Dominators,
    stored: &BTreeMap<BlockId, (Context, Context)>,
    block_id: BlockId,
) -> ReconcileResult {
    let preds = cfg.predecessors(block_id);
    let idom = doms.idom(block_id);

    let mut visited_preds = Vec::new();
    let mut sources = Vec::new();
    for &pred in preds {
        if let Some((_, after)) = stored.get(&pred) {
            visited_preds.push(pred);
            sources.push(after.clone());
        } else {
            let fallback = idom.expect("precondition violation: unreachable block during reconciliation");
            let (_, fallback_after) = stored
                .get(&fallback)
                .expect("precondition violation: immediate dominator has no after-context yet");
            sources.push(fallback_after.clone());
        }
    }

    let mut deduped: Vec<Context> = Vec::new();
    for source in sources {
        if !deduped.contains(&source) {
            deduped.push(source);
        }
    }

    let merged = match deduped.len() {
        0 => Context::new(),
        1 => deduped.into_iter().next().unwrap(),
        _ => Context::join(&deduped),
    };

    let mut mutated = Vec::new();
    for &pred in &visited_preds {
        let (_, after) = stored.get(&pred).expect("visited predecessor must be stored");
        if repair_predecessor(function, after, &merged, pred) {
            tracing::debug!(pred = %pred, block = %block_id, "repaired predecessor at merge point");
            mutated.push(pred);
        }
    }

    ReconcileResult { before: merged, mutated_predecessors: mutated }
}

/// Insert repairs at the tail of `pred` so that, once re-evaluated, its
/// new after-context agrees with `merged` on every local they both still
/// hold live. Returns whether anything was inserted.
fn repair_predecessor(function: &mut Function, after: &Context, merged: &Context, pred: BlockId) -> bool {
    let terminator = function.block(pred).terminator().clone();
    let mut mutated = false;

    let mut keys: Vec<_> = after.locals.keys().filter(|k| merged.locals.contains_key(k)).copied().collect();
    keys.sort();

    for key in keys {
        let after_value = &after.locals[&key];
        let merged_value = &merged.locals[&key];
        if after_value == merged_value {
            continue;
        }
        match (after_value, merged_value) {
            (Value::Object(a), Value::Object(b)) => {
                assert!(
                    matches!(a, Object::Full(_)) && matches!(b, Object::Full(_)),
                    "precondition violation: object-valued local {key} broke the locations-of-equal-extent invariant at merge"
                );
                function
                    .insert_before(terminator.id, crate::ir::Opcode::Deinit { object: key }, terminator.span.clone())
                    .expect("IR mutation failed during edge-reconciliation repair");
                mutated = true;
            }
            (Value::Locations(locs), Value::Locations(_)) => {
                for loc in locs {
                    let after_obj = after.object_at(loc);
                    let merged_obj = merged.object_at(loc);
                    let mut paths = difference(&after_obj, &merged_obj);
                    paths.sort();
                    for rel_path in paths {
                        insert_repair_pair(function, terminator.id, terminator.span.clone(), after, loc, &rel_path)
                            .expect("IR mutation failed during edge-reconciliation repair");
                        mutated = true;
                    }
                }
            }
            _ => panic!("precondition violation: mismatched value kinds for local {key} at merge"),
        }
    }

    mutated
}
