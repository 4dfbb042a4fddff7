//! Dominator-tree queries, delegated to `petgraph::algo::dominators`
//! (Cooper–Harvey–Kennedy's iterative algorithm), rather than hand-rolled —
//! the graph already lives in a `DiGraphMap`, so there is no reason to
//! reimplement what the crate already provides.

use super::Cfg;
use crate::ir::BlockId;
use petgraph::algo::dominators::{self, Dominators as PetDominators};
use std::collections::{BTreeMap, VecDeque};

pub struct Dominators {
    entry: BlockId,
    inner: PetDominators<u32>,
}

impl Dominators {
    pub fn compute(cfg: &Cfg, entry: BlockId) -> Self {
        let inner = dominators::simple_fast(cfg.graph(), entry.0);
        Dominators { entry, inner }
    }

    /// The block's immediate dominator, or `None` if the block is
    /// unreachable from the entry (a precondition violation for every
    /// caller but the driver's own readiness check).
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        if block == self.entry {
            return Some(self.entry);
        }
        self.inner.immediate_dominator(block.0).map(BlockId)
    }

    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        match self.inner.dominators(b.0) {
            Some(mut chain) => chain.any(|n| n == a.0),
            None => false,
        }
    }

    /// BFS pre-order over the dominator tree, rooted at the entry block.
    pub fn bfs_preorder(&self, cfg: &Cfg) -> Vec<BlockId> {
        let mut children: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
        for block in cfg.blocks() {
            if let Some(dom) = self.idom(block) {
                if dom != block {
                    children.entry(dom).or_default().push(block);
                }
            }
        }

        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.entry);
        while let Some(block) = queue.pop_front() {
            order.push(block);
            if let Some(kids) = children.get(&block) {
                for &kid in kids {
                    queue.push_back(kid);
                }
            }
        }
        order
    }
}
