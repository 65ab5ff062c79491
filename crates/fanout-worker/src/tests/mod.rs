//! Behavioural tests for the fan-out worker.
//!
//! - `harness.rs`     - In-memory backends, a fixed clock and misbehaving sinks
//! - `cardinality.rs` - One outcome per registered sink, always
//! - `isolation.rs`   - Failing, slow and panicking sinks do not affect siblings
//! - `timestamp.rs`   - One ingestion timestamp shared by archive key and record digest
//! - `scenario.rs`    - Monitor event through all three real sinks
//! - `ingest.rs`      - Subscription loop: decode, dispatch, skip, cancel

mod cardinality;
pub(crate) mod harness;
mod ingest;
mod isolation;
