use thiserror::Error;

/// Errors specific to frontend configuration and blind scanning, wrapping
/// the shared bus/I²C error where one bubbles up (§7).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Bus(#[from] joker_proto::Error),

    /// A candidate's arena is full; the scan cannot record any more
    /// detections or power-curve segments (§4.9 "hard error").
    #[error("candidate storage overflow: {0}")]
    StorageOverflow(&'static str),

    /// The scan was cancelled via its cooperative cancel flag.
    #[error("scan cancelled")]
    Cancelled,
}
