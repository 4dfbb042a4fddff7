//! The Definite Initialization / Ownership analysis pass: proves every
//! object is fully initialized at every use, fully uninitialized at every
//! (re)bind, and fully consumed or uninitialized at every deallocation.
//!
//! Structured as eight cooperating components (C1–C8): the abstract value
//! lattice ([`lattice`]), the symbolic memory model ([`memory`]), the
//! abstract context ([`context`]), the instruction evaluator
//! (`transfer`, private), the CFG driver (`driver`, private), edge
//! reconciliation (`reconcile`, private), the diagnostic channel
//! (`crate::diagnostics`), and the IR mutator (`crate::ir::Function`).

pub mod context;
pub mod lattice;
pub mod memory;

mod driver;
mod reconcile;
mod transfer;

pub use context::{Context, Value};
pub use lattice::{difference, Object, ObjectState, Summary};
pub use memory::{Cell, Location, Root};

use crate::diagnostics::Diagnostic;
use crate::ir::{FunctionId, Module};

/// The pass's result: whether every block evaluated without a program
/// error, and the diagnostics accumulated along the way.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
pub struct DefiniteInitializationPass;

impl DefiniteInitializationPass {
    pub const NAME: &'static str = "Definite initialization";

    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Run the pass over a single function, mutating `module` in place
    /// with any `load`+`deinit` repairs it inserts.
    pub fn run(&self, module: &mut Module, function: FunctionId) -> PassOutcome {
        tracing::info!(pass = Self::NAME, function = %function, "running definite initialization");
        let outcome = driver::run(module, function);
        if outcome.success {
            tracing::info!(function = %function, diagnostics = outcome.diagnostics.len(), "definite initialization succeeded");
        } else {
            tracing::warn!(function = %function, diagnostics = outcome.diagnostics.len(), "definite initialization failed");
        }
        PassOutcome {
            success: outcome.success,
            diagnostics: outcome.diagnostics,
        }
    }
}
