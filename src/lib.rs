//! `vsem` ("value semantics"): a minimal typed IR plus the Definite
//! Initialization / Ownership analysis pass that proves every object in
//! it is fully initialized at every use, fully uninitialized at every
//! (re)bind, and fully consumed or uninitialized at every deallocation.
//!
//! - [`ir`] — the IR builder collaborator: opcodes, blocks, functions.
//! - [`cfg`] — control-flow graph and dominator-tree queries.
//! - [`di`] — the analysis itself.
//! - [`diagnostics`] — the structured diagnostic channel the pass reports
//!   program errors through.

pub mod cfg;
pub mod di;
pub mod diagnostics;
pub mod ir;

pub use di::{DefiniteInitializationPass, PassOutcome};
