//! Control-flow graph and dominator-tree queries over a `Function`, built
//! on `petgraph` — the same crate `rust-lang-polonius` reaches for to back
//! its own graph-shaped analysis state.

pub mod dominators;

pub use dominators::Dominators;

use crate::ir::{BlockId, Function, Opcode};
use petgraph::graphmap::DiGraphMap;
use std::collections::BTreeMap;

/// Successor/predecessor edges derived from every block's terminator.
#[derive(Debug)]
pub struct Cfg {
    successors: BTreeMap<BlockId, Vec<BlockId>>,
    predecessors: BTreeMap<BlockId, Vec<BlockId>>,
    graph: DiGraphMap<u32, ()>,
}

impl Cfg {
    pub fn build(function: &Function) -> Self {
        let mut successors: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
        let mut predecessors: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
        let mut graph = DiGraphMap::new();

        for block in &function.blocks {
            graph.add_node(block.id.0);
            successors.entry(block.id).or_default();
            predecessors.entry(block.id).or_default();
        }

        for block in &function.blocks {
            let targets = match &block.terminator().opcode {
                Opcode::Branch { target } => vec![*target],
                Opcode::CondBranch { then_block, else_block, .. } => vec![*then_block, *else_block],
                Opcode::Return { .. } | Opcode::Unreachable => Vec::new(),
                other => panic!(
                    "precondition violation: block {} does not end in a terminator opcode ({other:?})",
                    block.id
                ),
            };
            for &target in &targets {
                graph.add_edge(block.id.0, target.0, ());
                predecessors.entry(target).or_default().push(block.id);
            }
            successors.insert(block.id, targets);
        }

        Cfg {
            successors,
            predecessors,
            graph,
        }
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.successors.get(&block).map_or(&[], |v| v.as_slice())
    }

    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.predecessors.get(&block).map_or(&[], |v| v.as_slice())
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.successors.keys().copied()
    }

    pub(crate) fn graph(&self) -> &DiGraphMap<u32, ()> {
        &self.graph
    }
}
