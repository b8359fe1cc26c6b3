use crate::params::{DeliverySystem, LnbVoltage};

/// Main blind-scan state machine (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainState {
    Spectrum,
    SpectrumSave,
    Start,
    Ss1Fin,
    Stage1Fin,
    Ss2Start,
    Ss2Fin,
    Fs2Start,
    Fs2Fin,
    CsPreparing,
    CsTuned,
    CsFin,
    Fs3Start,
    Finish,
}

/// One of the four band/polarity combinations an LNB can present at a
/// time; a blind scan must sweep each in turn (supplemented from
/// `joker_blind_scan.c` — not in the distilled state machine itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnbQuadrant {
    pub voltage: LnbVoltage,
    pub tone_on: bool,
}

pub const QUADRANTS: [LnbQuadrant; 4] = [
    LnbQuadrant { voltage: LnbVoltage::V13, tone_on: false },
    LnbQuadrant { voltage: LnbVoltage::V13, tone_on: true },
    LnbQuadrant { voltage: LnbVoltage::V18, tone_on: false },
    LnbQuadrant { voltage: LnbVoltage::V18, tone_on: true },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub quadrant: LnbQuadrant,
    pub delivery_system: DeliverySystem,
    pub center_khz: u32,
    pub symbol_rate_ksym: u32,
}

/// Major/minor progress report (§4.9 "Progress").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: &'static str,
    pub percent: u8,
}

pub trait BlindScanCallbacks {
    fn on_detection(&mut self, _detection: Detection) {}
    fn on_power_spectrum(&mut self, _quadrant: LnbQuadrant, _samples: &[(u32, i16)]) {}
    fn on_progress(&mut self, _progress: Progress) {}
}

/// No-op callback set, for callers that only want the final detection
/// list from [`crate::scan::BlindScanSequencer::run_to_completion`].
#[derive(Default)]
pub struct NullCallbacks;
impl BlindScanCallbacks for NullCallbacks {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlindScanOptions {
    pub f_min_khz: u32,
    pub f_max_khz: u32,
    pub sr_min_ksym: u32,
    pub sr_max_ksym: u32,
    pub tuner_step_khz: u32,
    pub clip_step_centidb: i16,
    pub candidate_capacity: usize,
}

impl Default for BlindScanOptions {
    fn default() -> Self {
        BlindScanOptions {
            f_min_khz: 950_000,
            f_max_khz: 2_150_000,
            sr_min_ksym: 1_000,
            sr_max_ksym: 45_000,
            tuner_step_khz: 40_000,
            clip_step_centidb: 50,
            candidate_capacity: 256,
        }
    }
}
