#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: section shorter than its declared length")]
    Truncated(&'static str),
    #[error("{0}: malformed section body")]
    Malformed(&'static str),
    #[error("expected table_id {expected:#04x}, got {got:#04x}")]
    UnexpectedTableId { expected: u8, got: u8 },
    #[error(transparent)]
    Bus(#[from] joker_proto::Error),
}
