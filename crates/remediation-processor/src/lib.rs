//! Change processor: record store changes in, remediation commands out.
//!
//! Each change batch is folded into a single [`StateDelta`](telemetry_types::StateDelta),
//! from which a [`RemediationCommand`](telemetry_types::RemediationCommand)
//! targeting the pre-change values is built, persisted to the remediation
//! table and published on `remediation/<building>`.
//!
//! Per-step failures are logged and the batch is still acknowledged.

pub mod config;
pub mod error;
pub mod processor;
pub mod runner;

pub use config::ProcessorConfig;
pub use error::{ProcessorError, ProcessorResult};
pub use processor::{fold_batch, BatchOutcome, ChangeProcessor, Direction, ProcessorState};
pub use runner::ProcessorLoop;
