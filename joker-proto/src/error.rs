/// Every error kind the core surfaces (§7).
///
/// All crates in the workspace share this one type so a caller can match on
/// a single error regardless of which component raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bulk exchange did not complete within its deadline.
    #[error("usb: io timeout")]
    IoTimeout,
    /// Fewer bytes were read than the opcode's reply length required.
    #[error("usb: short read ({got} of {expected} bytes)")]
    IoShortRead { got: usize, expected: usize },
    /// Fewer bytes were written than the outgoing frame required.
    #[error("usb: short write ({got} of {expected} bytes)")]
    IoShortWrite { got: usize, expected: usize },
    /// An isochronous transfer was cancelled before it completed.
    #[error("usb: transfer cancelled")]
    IoCancelled,
    /// A lower-level libusb/OS error.
    #[error("usb: {0}")]
    IoBackend(String),

    /// I²C: the addressed device never acknowledged.
    #[error("i2c: no ack from address {0:#04x}")]
    I2cNoAck(u8),
    /// I²C: the master lost arbitration mid-transaction.
    #[error("i2c: arbitration lost")]
    I2cArbLost,
    /// I²C: `TIP` never cleared within the poll budget.
    #[error("i2c: timeout waiting for transaction-in-progress to clear")]
    I2cTimeout,

    /// The reply to a command frame didn't match the opcode's expected
    /// shape.
    #[error("control bus: malformed frame for opcode {0:?}")]
    BadFrame(crate::opcode::Opcode),
    /// The device replied with (or was asked for) an opcode the bus doesn't
    /// know.
    #[error("control bus: unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// The frontend has not achieved lock; transient, caller may retry.
    #[error("frontend: no lock")]
    NoLock,
    /// The demodulator/tuner hardware is in a state that makes the current
    /// tune unrecoverable; the caller must re-tune from scratch.
    #[error("frontend: hardware in unrecoverable state: {0}")]
    DemodHwState(String),

    /// Requested LNB voltage/frequency combination is not supported.
    #[error("lnb: requested configuration out of range")]
    LnbOutOfRange,
    /// LNB power supply reports current below the expected floor (likely no
    /// LNB connected).
    #[error("lnb: supply current too low")]
    LnbCurrentLow,
    /// LNB power supply reports an overcurrent condition (likely a short).
    #[error("lnb: supply overcurrent")]
    LnbOvercurrent,

    /// The retention ring silently dropped data because no reader was
    /// draining it; not fatal, but `dropped_bytes` advanced.
    #[error("ts: retention ring overflow, {0} bytes dropped")]
    RingOverflow(u64),
    /// A fixed-size arena (e.g. the blind-scan candidate list) is full.
    #[error("storage overflow: {0}")]
    StorageOverflow(&'static str),

    /// The calling activity's cancel flag was observed at a suspension
    /// point.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Lock timeouts and I²C glitches are transient by design; everything
    /// else bubbles straight to the caller (§7 "Propagation").
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NoLock)
    }
}
