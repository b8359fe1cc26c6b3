/// How the frontend's IQ sense relates to the signal (resolved open
/// question, §9): frontends that cannot detect inversion themselves
/// always report [`SpectralInversion::Normal`] and document the
/// limitation on the implementing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpectralInversion {
    #[default]
    Normal,
    Inverted,
    Auto,
}

/// LNB supply state (satellite-only, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnbVoltage {
    Off,
    V13,
    V18,
}

/// DVB delivery system a frontend is asked to lock onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySystem {
    DvbS,
    DvbS2,
}

/// Configuration passed to [`crate::Frontend::set_frontend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendParams {
    pub frequency_khz: u32,
    pub symbol_rate_ksym: u32,
    pub delivery_system: DeliverySystem,
    pub spectral_inversion: SpectralInversion,
}

/// Lock-chain status bits returned by [`crate::Frontend::read_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendStatus {
    pub has_signal: bool,
    pub has_carrier: bool,
    pub has_viterbi: bool,
    pub has_sync: bool,
    pub has_lock: bool,
}

impl FrontendStatus {
    pub fn locked() -> Self {
        FrontendStatus {
            has_signal: true,
            has_carrier: true,
            has_viterbi: true,
            has_sync: true,
            has_lock: true,
        }
    }
}
