use thiserror::Error;

/// Top-level error type for device open/close/tune lifecycle operations
/// (C1, §7). Per-component operations return the shared
/// [`joker_proto::Error`] or their own crate's error type directly; this
/// wraps those plus libusb failures for the calls only `joker-core` makes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Bus(#[from] joker_proto::Error),

    #[error(transparent)]
    Usb(#[from] rusb::Error),

    #[error("no device found with VID:PID {0:04x}:{1:04x}")]
    DeviceNotFound(u16, u16),

    #[error(transparent)]
    Scan(#[from] joker_frontend::ScanError),

    #[error(transparent)]
    Flash(#[from] joker_spi::FlashError),

    #[error(transparent)]
    Ci(#[from] joker_ci::CiError),

    #[error("capture was already started")]
    AlreadyStarted,

    #[error("capture was not started")]
    NotStarted,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn device_not_found_formats_vid_pid_as_hex() {
        let err = CoreError::DeviceNotFound(0x2d6b, 0x7777);
        assert_eq!(err.to_string(), "no device found with VID:PID 2d6b:7777");
    }
}
