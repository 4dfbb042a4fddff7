//! The CFG driver (C5): dominator-tree BFS work-list fixed point. Queue
//! shape follows `abstraps::core::absint::Interpreter`'s own
//! `VecDeque`-based block queue.

use super::context::Context;
use super::lattice::{Object, ObjectState};
use super::memory::{Cell, Root};
use super::reconcile::reconcile;
use super::transfer::evaluate_block;
use crate::cfg::{Cfg, Dominators};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::ir::{BlockId, Convention, FunctionId, Module, Reg};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub struct RunOutcome {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
}

fn entry_context(function: &crate::ir::Function) -> Context {
    let mut ctx = Context::new();
    for (i, (convention, ty)) in function.params.iter().enumerate() {
        let index = i as u32;
        let arg = Reg::Arg(index);
        match convention {
            Convention::Let | Convention::Inout => {
                ctx.locals.insert(arg, super::context::Value::locations(BTreeSet::from([super::memory::Location::arg(index)])));
                ctx.memory.insert(
                    Root::Arg(index),
                    Cell {
                        ty: ty.clone(),
                        object: Object::Full(ObjectState::Initialized),
                    },
                );
            }
            Convention::Set => {
                ctx.locals.insert(arg, super::context::Value::locations(BTreeSet::from([super::memory::Location::arg(index)])));
                ctx.memory.insert(
                    Root::Arg(index),
                    Cell {
                        ty: ty.clone(),
                        object: Object::Full(ObjectState::Uninitialized),
                    },
                );
            }
            Convention::Sink => {
                ctx.locals.insert(arg, super::context::Value::Object(Object::Full(ObjectState::Initialized)));
            }
            Convention::Yielded => {
                panic!("precondition violation: `yielded` is not representable as a function parameter convention")
            }
        }
    }
    ctx
}

/// Transitively reopen `start` and every successor of it that is
/// currently marked done, limited to the subgraph reachable through
/// already-done blocks — a mutated predecessor invalidates not just
/// itself but everything downstream that was evaluated on the strength
/// of its now-stale after-context.
fn reopen_from(cfg: &Cfg, done: &mut FxHashSet<BlockId>, queue: &mut VecDeque<BlockId>, start: BlockId) {
    done.remove(&start);
    queue.push_back(start);
    let mut frontier = vec![start];
    while let Some(block) = frontier.pop() {
        for &succ in cfg.successors(block) {
            if done.remove(&succ) {
                queue.push_back(succ);
                frontier.push(succ);
            }
        }
    }
}

pub fn run(module: &mut Module, function_id: FunctionId) -> RunOutcome {
    let function = module.function_mut(function_id);
    let cfg = Cfg::build(function);
    let entry = function.entry();
    let doms = Dominators::compute(&cfg, entry);

    let mut queue: VecDeque<BlockId> = doms.bfs_preorder(&cfg).into();
    let mut stored: BTreeMap<BlockId, (Context, Context)> = BTreeMap::new();
    let mut done: FxHashSet<BlockId> = FxHashSet::default();
    let mut diagnostics = DiagnosticSink::new();

    let ceiling = function.blocks.len().saturating_mul(function.blocks.len() + 4) + 64;
    let mut iterations = 0usize;

    while let Some(block_id) = queue.pop_front() {
        if done.contains(&block_id) {
            continue;
        }

        iterations += 1;
        if iterations > ceiling {
            panic!("precondition violation: definite-initialization fixed point failed to converge within the expected bound");
        }

        let before = if block_id == entry {
            entry_context(function)
        } else {
            let preds = cfg.predecessors(block_id);
            let idom = doms
                .idom(block_id)
                .unwrap_or_else(|| panic!("precondition violation: block {block_id} is unreachable"));
            let idom_ready = stored.contains_key(&idom);
            let preds_ready = preds.iter().all(|&pred| doms.dominates(block_id, pred) || stored.contains_key(&pred));
            if !idom_ready || !preds_ready {
                queue.push_back(block_id);
                continue;
            }

            let result = reconcile(function, &cfg, &doms, &stored, block_id);
            for pred in result.mutated_predecessors {
                reopen_from(&cfg, &mut done, &mut queue, pred);
            }
            result.before
        };

        let previous = stored.get(&block_id).cloned();
        if let Some((prev_before, _)) = &previous {
            if *prev_before == before {
                tracing::debug!(block = %block_id, "before-context unchanged, marking done without re-evaluating");
                done.insert(block_id);
                continue;
            }
        }

        tracing::debug!(block = %block_id, "evaluating block");
        let result = evaluate_block(function, block_id, before.clone());
        for diagnostic in &result.diagnostics {
            diagnostics.push(diagnostic.clone());
        }

        if result.failed {
            return RunOutcome {
                success: false,
                diagnostics: diagnostics.into_vec(),
            };
        }

        let preds = cfg.predecessors(block_id);
        let all_preds_done = preds.iter().all(|pred| done.contains(pred));
        let undone: Vec<_> = preds.iter().filter(|pred| !done.contains(*pred)).collect();
        let only_undone_is_self = undone.len() == 1 && *undone[0] == block_id;
        let after_unchanged = previous.as_ref().is_some_and(|(_, prev_after)| *prev_after == result.after);

        let is_done = all_preds_done || (only_undone_is_self && after_unchanged);
        stored.insert(block_id, (before, result.after));

        if is_done {
            done.insert(block_id);
        } else {
            queue.push_back(block_id);
        }
    }

    RunOutcome {
        success: true,
        diagnostics: diagnostics.into_vec(),
    }
}
