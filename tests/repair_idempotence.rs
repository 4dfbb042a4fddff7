//! Running the pass twice in a row must be equivalent to running it once:
//! the second run either returns success immediately with no insertions,
//! or reproduces the same diagnostic set (spec §8, "Repair idempotence").
//! This is the key correctness property for the pass as a program
//! transformer, so each repair-producing scenario gets its own check here
//! rather than relying solely on the spot-check inline in `end_to_end.rs`.

mod common;

use common::span;
use smallvec::smallvec;
use vsem::ir::{Block, BlockId, Convention, FieldPath, FunctionBuilder, Module, Opcode, Ty};
use vsem::DefiniteInitializationPass;

fn opcode_shapes(block: &Block) -> Vec<String> {
    block.instructions.iter().map(|inst| format!("{:?}", inst.opcode)).collect()
}

#[test]
fn set_borrow_repair_is_idempotent() {
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

    let first = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(first.success);
    assert!(first.diagnostics.is_empty());
    let after_first = opcode_shapes(module.function(fid).block(BlockId(0)));

    let second = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(second.success);
    assert!(second.diagnostics.is_empty());
    let after_second = opcode_shapes(module.function(fid).block(BlockId(0)));

    assert_eq!(after_first, after_second, "a second run must not insert anything new");
}

#[test]
fn dealloc_repair_is_idempotent() {
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

    let first = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(first.success);
    assert!(first.diagnostics.is_empty());
    let after_first = opcode_shapes(module.function(fid).block(BlockId(0)));

    let second = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(second.success);
    assert!(second.diagnostics.is_empty());
    let after_second = opcode_shapes(module.function(fid).block(BlockId(0)));

    assert_eq!(after_first, after_second);
}

#[test]
fn branch_merge_repair_is_idempotent() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("branch_merge_divergent_init", vec![(Convention::Sink, Ty::scalar("Bool"))]);
    let cond = vsem::ir::Reg::Arg(0);

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

    let first = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(first.success);
    assert!(first.diagnostics.is_empty());
    let after_first_then = opcode_shapes(module.function(fid).block(then_block));
    let after_first_else = opcode_shapes(module.function(fid).block(else_block));

    let second = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(second.success);
    assert!(second.diagnostics.is_empty());
    let after_second_then = opcode_shapes(module.function(fid).block(then_block));
    let after_second_else = opcode_shapes(module.function(fid).block(else_block));

    assert_eq!(after_first_then, after_second_then);
    assert_eq!(after_first_else, after_second_else);
}

#[test]
fn a_failed_run_reproduces_the_same_diagnostic_set_on_rerun() {
    common::init_tracing();
    let mut fb = FunctionBuilder::new("double_move", vec![(Convention::Sink, Ty::scalar("Int"))]);
    let x = vsem::ir::Reg::Arg(0);
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

    let first = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(!first.success);
    let second = DefiniteInitializationPass::new().run(&mut module, fid);
    assert!(!second.success);

    let first_messages: Vec<_> = first.diagnostics.iter().map(|d| d.message.clone()).collect();
    let second_messages: Vec<_> = second.diagnostics.iter().map(|d| d.message.clone()).collect();
    assert_eq!(first_messages, second_messages);
}
