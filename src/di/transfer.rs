//! The instruction evaluator (C4): the transfer function for every opcode
//! in the closed set, implemented exactly per the opcode table this crate
//! implements. Dispatch shape (a `match` over an opcode tag, mutating an
//! environment as it goes) follows `abstraps::core::absint::Interpreter::step`.

use super::context::{Context, Value};
use super::lattice::{Object, ObjectState, Summary};
use super::memory::{Cell, Location, Root};
use crate::diagnostics::Diagnostic;
use crate::ir::{Convention, Function, InstId, Instruction, Opcode, Reg, SourceSpan};
use std::collections::BTreeSet;

pub(crate) struct BlockResult {
    pub after: Context,
    pub diagnostics: Vec<Diagnostic>,
    pub failed: bool,
}

/// Evaluate every instruction in `block_id` from `before`, in order,
/// stopping at the first diagnostic — the first failed evaluator aborts
/// the current block.
pub(crate) fn evaluate_block(function: &mut Function, block_id: crate::ir::BlockId, before: Context) -> BlockResult {
    let snapshot: Vec<Instruction> = function.block(block_id).instructions.clone();
    let mut ctx = before;
    let mut diagnostics = Vec::new();

    for inst in &snapshot {
        tracing::trace!(inst = %inst.id, "evaluating instruction");
        match evaluate_instruction(function, inst, &mut ctx) {
            Ok(()) => {}
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                return BlockResult {
                    after: ctx,
                    diagnostics,
                    failed: true,
                };
            }
        }
    }

    BlockResult {
        after: ctx,
        diagnostics,
        failed: false,
    }
}

fn expect_locations<'a>(ctx: &'a Context, reg: Reg) -> &'a BTreeSet<Location> {
    match ctx.get(reg) {
        Some(Value::Locations(set)) => set,
        Some(Value::Object(_)) => panic!("precondition violation: register {reg} holds an Object, not Locations"),
        None => panic!("precondition violation: register {reg} is unbound"),
    }
}

fn diagnostic_for_use(summary: &Summary, span: SourceSpan) -> Diagnostic {
    let message = match summary {
        Summary::FullyUninitialized => "use of uninitialized object",
        Summary::FullyConsumed(_) => "use of consumed object",
        Summary::PartiallyInitialized(_) => "use of partially initialized object",
        Summary::PartiallyConsumed(..) => "use of partially consumed object",
        Summary::FullyInitialized => unreachable!("precondition violation: not a use-diagnostic case"),
    };
    Diagnostic::error(message, span)
}

/// `sink`-consume a register holding an `Object`: it must be fully
/// initialized, and becomes `Consumed(by: {inst.id})`. Any other state is
/// an illegal move, regardless of which state it actually was in — unlike
/// `borrow`/`load`, which report which of the four non-initialized
/// summaries a use found.
fn consume(ctx: &mut Context, reg: Reg, inst: &Instruction) -> Result<(), Diagnostic> {
    let value = ctx
        .get(reg)
        .unwrap_or_else(|| panic!("precondition violation: register {reg} is unbound"))
        .clone();
    let Value::Object(object) = value else {
        panic!("precondition violation: register {reg} holds Locations, not an Object, and cannot be consumed");
    };
    let summary = object.summary();
    if !matches!(summary, Summary::FullyInitialized) {
        return Err(Diagnostic::error("illegal move", inst.span.clone()));
    }
    ctx.locals.insert(
        reg,
        Value::Object(Object::Full(ObjectState::Consumed(BTreeSet::from([inst.id])))),
    );
    Ok(())
}

fn source_reg_for_root(root: Root) -> Reg {
    match root {
        Root::Arg(i) => Reg::Arg(i),
        Root::Inst(id) => Reg::Val(id, 0),
    }
}

/// Insert the `load`+`deinit` pair that drains one initialized field path,
/// as a real IR mutation (not a bookkeeping shortcut) — so a later,
/// from-scratch run of this pass sees an already-repaired program and
/// makes no further changes.
pub(crate) fn insert_repair_pair(
    function: &mut Function,
    before: InstId,
    span: SourceSpan,
    ctx: &Context,
    loc: &Location,
    rel_path: &[usize],
) -> anyhow::Result<()> {
    let root = loc.root().expect("precondition violation: repair target must not be the null location");
    let mut full_path = loc.path().to_vec();
    full_path.extend_from_slice(rel_path);
    let cell = ctx
        .cell(root)
        .unwrap_or_else(|| panic!("precondition violation: repair target {root} missing from memory"));
    let field_ty = cell.ty.at_path(&full_path).clone();

    let load_id = function.insert_before(
        before,
        Opcode::Load {
            ty: field_ty,
            source: source_reg_for_root(root),
            path: full_path.into_iter().collect(),
        },
        span.clone(),
    )?;
    function.insert_before(before, Opcode::Deinit { object: Reg::Val(load_id, 0) }, span)?;
    tracing::debug!(at = %loc, "inserted load+deinit repair pair");
    Ok(())
}

fn evaluate_instruction(function: &mut Function, inst: &Instruction, ctx: &mut Context) -> Result<(), Diagnostic> {
    match &inst.opcode {
        Opcode::AllocStack { ty } => {
            let root = Root::Inst(inst.id);
            if ctx.cell(root).is_some() {
                return Err(Diagnostic::error("unbounded stack allocation", inst.span.clone()));
            }
            ctx.memory.insert(
                root,
                Cell {
                    ty: ty.clone(),
                    object: Object::Full(ObjectState::Uninitialized),
                },
            );
            ctx.locals.insert(inst.result(0), Value::locations(BTreeSet::from([Location::inst(inst.id)])));
        }

        Opcode::Borrow { cap, source, path } => {
            let locs = expect_locations(ctx, *source).clone();
            let projected: BTreeSet<Location> = locs.iter().map(|l| l.append(path)).collect();

            match cap {
                Convention::Let | Convention::Inout => {
                    for loc in &projected {
                        let summary = ctx.project_mut(loc).summary();
                        if !matches!(summary, Summary::FullyInitialized) {
                            return Err(diagnostic_for_use(&summary, inst.span.clone()));
                        }
                    }
                }
                Convention::Set => {
                    for loc in &projected {
                        let obj = ctx.project_mut(loc).clone();
                        let mut rel_paths = obj.initialized_paths();
                        rel_paths.sort();
                        for rel_path in &rel_paths {
                            insert_repair_pair(function, inst.id, inst.span.clone(), ctx, loc, rel_path)
                                .expect("IR mutation failed during set-borrow repair");
                        }
                        *ctx.project_mut(loc) = Object::Full(ObjectState::Uninitialized);
                    }
                }
                Convention::Sink => {
                    panic!("precondition violation: `sink` is not a borrow capability")
                }
                Convention::Yielded => {
                    panic!("precondition violation: `yielded` is not representable as a borrow capability in this pass")
                }
            }

            ctx.locals.insert(inst.result(0), Value::locations(projected));
        }

        Opcode::Load { source, path, .. } => {
            let locs = expect_locations(ctx, *source).clone();
            let projected: BTreeSet<Location> = locs.iter().map(|l| l.append(path)).collect();

            for loc in &projected {
                let summary = ctx.project_mut(loc).summary();
                if !matches!(summary, Summary::FullyInitialized) {
                    return Err(diagnostic_for_use(&summary, inst.span.clone()));
                }
            }
            for loc in &projected {
                *ctx.project_mut(loc) = Object::Full(ObjectState::Consumed(BTreeSet::from([inst.id])));
            }
            ctx.locals.insert(inst.result(0), Value::Object(Object::Full(ObjectState::Initialized)));
        }

        Opcode::Store { object, target } => {
            consume(ctx, *object, inst)?;
            let locs = expect_locations(ctx, *target).clone();
            for loc in &locs {
                *ctx.project_mut(loc) = Object::Full(ObjectState::Initialized);
            }
        }

        Opcode::Record { operands } => {
            for &operand in operands.iter() {
                consume(ctx, operand, inst)?;
            }
            ctx.locals.insert(inst.result(0), Value::Object(Object::Full(ObjectState::Initialized)));
        }

        Opcode::Destructure { object, arity } => {
            consume(ctx, *object, inst)?;
            for i in 0..*arity {
                ctx.locals.insert(Reg::Val(inst.id, i as u16), Value::Object(Object::Full(ObjectState::Initialized)));
            }
        }

        Opcode::Call { operands, conventions } => {
            for (&operand, convention) in operands.iter().zip(conventions.iter()) {
                match convention {
                    Convention::Let | Convention::Inout | Convention::Set => {}
                    Convention::Sink => consume(ctx, operand, inst)?,
                    Convention::Yielded => {
                        panic!("precondition violation: `yielded` is not representable as a call argument convention")
                    }
                }
            }
            ctx.locals.insert(inst.result(0), Value::Object(Object::Full(ObjectState::Initialized)));
        }

        Opcode::Deinit { object } => {
            consume(ctx, *object, inst)?;
        }

        Opcode::DeallocStack { location } => {
            let locs = expect_locations(ctx, *location).clone();
            for loc in &locs {
                let root = loc.root().expect("precondition violation: dealloc_stack target must not be the null location");
                let object = ctx
                    .cell(root)
                    .unwrap_or_else(|| panic!("precondition violation: dealloc_stack on an unallocated cell {root}"))
                    .object
                    .clone();
                let mut rel_paths = object.initialized_paths();
                rel_paths.sort();
                for rel_path in &rel_paths {
                    insert_repair_pair(function, inst.id, inst.span.clone(), ctx, loc, rel_path)
                        .expect("IR mutation failed during dealloc_stack repair");
                }
                ctx.memory.remove(&root);
            }
        }

        Opcode::CondBranch { cond, .. } => {
            consume(ctx, *cond, inst)?;
        }

        Opcode::Return { value } => {
            if let Some(value) = value {
                consume(ctx, *value, inst)?;
            }
        }

        Opcode::Branch { .. } | Opcode::EndBorrow { .. } | Opcode::Unreachable => {}
    }

    Ok(())
}
