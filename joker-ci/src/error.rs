use thiserror::Error;

#[derive(Debug, Error)]
pub enum CiError {
    #[error(transparent)]
    Bus(#[from] joker_proto::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("TPDU frame shorter than the 2-byte link header")]
    FrameTooShort,
}
