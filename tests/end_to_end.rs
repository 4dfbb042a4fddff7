//! The six end-to-end scenarios: one IR-level input each, checked against
//! the exact diagnostic (or repair) it should produce.

mod common;

use common::span;
use smallvec::smallvec;
use vsem::ir::{BlockId, Convention, FieldPath, FunctionBuilder, Module, Opcode, Reg, Ty};
use vsem::DefiniteInitializationPass;

#[test]
fn use_of_uninitialized_is_rejected() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("use_of_uninitialized", vec![]);
    let x = fb.push(Opcode::AllocStack { ty: Ty::scalar("Int") }, span(1));
    fb.push(
        Opcode::Borrow {
            cap: Convention::Let,
            source: x,
            path: FieldPath::new(),
        },
        span(2),
    );
    fb.push(Opcode::Return { value: None }, span(3));
    let function = fb.finish().expect("well-formed function");

    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "use of uninitialized object");
}

#[test]
fn double_move_is_rejected() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("double_move", vec![(Convention::Sink, Ty::scalar("Int"))]);
    let x = Reg::Arg(0);
    fb.push(
        Opcode::Call {
            operands: smallvec![x],
            conventions: smallvec![Convention::Sink],
        },
        span(1),
    );
    fb.push(
        Opcode::Call {
            operands: smallvec![x],
            conventions: smallvec![Convention::Sink],
        },
        span(2),
    );
    fb.push(Opcode::Return { value: None }, span(3));
    let function = fb.finish().expect("well-formed function");

    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "illegal move");
}

#[test]
fn branch_merge_with_divergent_init_is_repaired() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("branch_merge_divergent_init", vec![(Convention::Sink, Ty::scalar("Bool"))]);
    let cond = Reg::Arg(0);

    let x = fb.push(Opcode::AllocStack { ty: Ty::scalar("Int") }, span(1));
    let then_block = fb.block();
    let else_block = fb.block();
    let merge_block = fb.block();
    fb.push(
        Opcode::CondBranch {
            cond,
            then_block,
            else_block,
        },
        span(2),
    );

    fb.switch_to(then_block);
    let v = fb.push(Opcode::Record { operands: smallvec![] }, span(3));
    fb.push(Opcode::Store { object: v, target: x }, span(4));
    fb.push(Opcode::Branch { target: merge_block }, span(5));

    fb.switch_to(else_block);
    fb.push(Opcode::Branch { target: merge_block }, span(6));

    fb.switch_to(merge_block);
    fb.push(Opcode::Return { value: None }, span(7));

    let function = fb.finish().expect("well-formed function");
    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(outcome.success);
    assert!(outcome.diagnostics.is_empty());

    let repaired = module.function(fid).block(then_block);
    assert_eq!(repaired.instructions.len(), 5, "expected a load+deinit pair inserted before the branch");
    assert!(matches!(repaired.instructions[2].opcode, Opcode::Load { .. }));
    assert!(matches!(repaired.instructions[3].opcode, Opcode::Deinit { .. }));
    assert!(matches!(repaired.instructions[4].opcode, Opcode::Branch { .. }));

    // Re-running from scratch on the now-repaired module must be a no-op.
    let rerun = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(rerun.success);
    assert!(rerun.diagnostics.is_empty());
    assert_eq!(module.function(fid).block(then_block).instructions.len(), 5);
}

#[test]
fn set_borrow_over_initialized_storage_is_repaired() {
    common::init_tracing();
    let pair_ty = Ty::record("Pair", vec![Ty::scalar("Int"), Ty::scalar("Int")]);
    let mut fb = FunctionBuilder::new("set_borrow_repair", vec![]);
    let x = fb.push(Opcode::AllocStack { ty: pair_ty }, span(1));
    let p1 = fb.push(Opcode::Record { operands: smallvec![] }, span(2));
    fb.push(Opcode::Store { object: p1, target: x }, span(3));
    fb.push(
        Opcode::Borrow {
            cap: Convention::Set,
            source: x,
            path: FieldPath::new(),
        },
        span(4),
    );
    fb.push(Opcode::Return { value: None }, span(5));
    let function = fb.finish().expect("well-formed function");

    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(outcome.success);
    assert!(outcome.diagnostics.is_empty());

    let entry = module.function(fid).block(BlockId(0));
    assert_eq!(entry.instructions.len(), 7);
    assert!(matches!(entry.instructions[3].opcode, Opcode::Load { .. }));
    assert!(matches!(entry.instructions[4].opcode, Opcode::Deinit { .. }));
    assert!(matches!(entry.instructions[5].opcode, Opcode::Borrow { .. }));
}

#[test]
fn dealloc_with_live_object_is_repaired() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("dealloc_live_object", vec![]);
    let x = fb.push(Opcode::AllocStack { ty: Ty::scalar("Int") }, span(1));
    let v = fb.push(Opcode::Record { operands: smallvec![] }, span(2));
    fb.push(Opcode::Store { object: v, target: x }, span(3));
    fb.push(Opcode::DeallocStack { location: x }, span(4));
    fb.push(Opcode::Return { value: None }, span(5));
    let function = fb.finish().expect("well-formed function");

    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(outcome.success);
    assert!(outcome.diagnostics.is_empty());

    let entry = module.function(fid).block(BlockId(0));
    assert_eq!(entry.instructions.len(), 7);
    assert!(matches!(entry.instructions[3].opcode, Opcode::Load { .. }));
    assert!(matches!(entry.instructions[4].opcode, Opcode::Deinit { .. }));
    assert!(matches!(entry.instructions[5].opcode, Opcode::DeallocStack { .. }));
}

#[test]
fn partial_initialization_of_a_record_is_rejected() {
    common::init_tracing();
    let pair_ty = Ty::record("Pair", vec![Ty::scalar("Int"), Ty::scalar("Int")]);
    let mut fb = FunctionBuilder::new("partial_init_record", vec![]);
    let x = fb.push(Opcode::AllocStack { ty: pair_ty }, span(1));
    let b0 = fb.push(
        Opcode::Borrow {
            cap: Convention::Set,
            source: x,
            path: FieldPath::from_slice(&[0]),
        },
        span(2),
    );
    let v = fb.push(Opcode::Record { operands: smallvec![] }, span(3));
    fb.push(Opcode::Store { object: v, target: b0 }, span(4));
    fb.push(
        Opcode::Borrow {
            cap: Convention::Let,
            source: x,
            path: FieldPath::new(),
        },
        span(5),
    );
    fb.push(Opcode::Return { value: None }, span(6));
    let function = fb.finish().expect("well-formed function");

    let mut module = Module::new();
    let fid = module.insert(function);
    let outcome = DefiniteInitializationPass::new().run(&mut module, fid);

    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "use of partially initialized object");
}
