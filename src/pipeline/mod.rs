//! Pipeline orchestration and completeness verification.
//!
//! The pipeline walks every known forecast run through an ordered chain of
//! six stages. Each stage is checked for completeness against the artifact
//! store, optionally regenerated in fix mode, and classified into an
//! explicit outcome. Failures are isolated per run: a defect in one run's
//! data never blocks the rest of the batch.

pub mod audit;
pub mod controller;
pub mod descriptor;
pub mod naming;
pub mod runner;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{write_audit_table, AuditError, AUDIT_FILE};
pub use controller::{PipelineController, PipelineError};
pub use descriptor::{FinalStep, RunDescriptor};
pub use runner::{StageError, StageOutcome, StageRunner};
pub use stage::StageKind;
