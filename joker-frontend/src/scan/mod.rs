//! Blind-scan sequencer (C9, §4.9): a cooperative state machine that
//! sweeps a frequency/symbol-rate window for DVB-S/S2 carriers across
//! every LNB quadrant.

pub mod candidate;
pub mod sequencer;
pub mod types;

pub use candidate::{extract_candidates, Candidate};
pub use sequencer::BlindScanSequencer;
pub use types::{
    BlindScanCallbacks, BlindScanOptions, Detection, LnbQuadrant, MainState, NullCallbacks,
    Progress, QUADRANTS,
};
