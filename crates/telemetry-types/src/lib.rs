//! Shared types for the thermoloop feedback loop.
//!
//! ```text
//! controller ──TelemetryEvent──▶ fan-out ──ArchivedRecord──▶ record store
//!     ▲                                                          │
//!     └──────RemediationCommand◀── change processor ◀──StateDelta─┘
//! ```
//!
//! Everything that crosses a process boundary lives here: the telemetry
//! event and its wire envelope, the archived record written by the sinks,
//! the state delta derived from the change log, and the remediation command
//! published back to the device. The waveform used by the device simulator
//! and the ingestion clock are here too, since both sides of the loop need
//! them in tests.

mod clock;
mod error;
mod event;
mod mode;
mod record;
mod remediation;
pub mod waveform;

pub use clock::{FixedClock, IngestionClock, SystemClock};
pub use error::{TypesError, TypesResult};
pub use event::{decode_event, encode_event, Action, Envelope, TelemetryEvent};
pub use mode::ControllerMode;
pub use record::{ArchivedRecord, Digest};
pub use remediation::{RemediationCommand, StateDelta};
