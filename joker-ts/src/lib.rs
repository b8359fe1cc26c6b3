//! Isochronous TS ingest pipeline (C5): sync-byte reassembly, a bounded
//! retention ring, and per-PID fan-out to hooks running on a dedicated
//! worker thread.
//!
//! The USB callback only ever calls [`TsPipeline::on_iso_payload`]; all
//! blocking, dispatch and eviction happens off that thread.

pub mod hooks;
pub mod node;
pub mod pipeline;
pub mod reassemble;
pub mod ring;
pub mod stats;

pub use hooks::{Hook, PidHookTable};
pub use node::TsNode;
pub use pipeline::{packet_pid, TsPipeline};
pub use reassemble::Reassembler;
pub use ring::{RetentionRing, RingOptions, DEFAULT_R_MAX};
pub use stats::Stats;
