//! Frontend abstraction (C4) and blind-scan sequencer (C9): a uniform
//! operation set over whichever demodulator/tuner pair the device carries,
//! plus the DVB-S/S2 blind-scan state machine built on top of it.

pub mod error;
pub mod frontend_trait;
pub mod params;
pub mod scan;

pub use error::ScanError;
pub use frontend_trait::Frontend;
pub use params::{DeliverySystem, FrontendParams, FrontendStatus, LnbVoltage, SpectralInversion};
pub use scan::{BlindScanCallbacks, BlindScanOptions, BlindScanSequencer, Detection};
