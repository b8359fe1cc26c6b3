use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlashError {
    #[error(transparent)]
    Bus(#[from] joker_proto::Error),

    #[error("flash ID mismatch: expected {expected:02X?}, got {got:02X?}")]
    IdMismatch { expected: [u8; 3], got: [u8; 3] },

    #[error("poll for WIP clear timed out after {0:?}")]
    EraseTimeout(std::time::Duration),

    #[error("page program data exceeds the {0}-byte page size")]
    PageTooLarge(usize),
}
