use crate::error::ScanError;
use crate::params::{FrontendParams, FrontendStatus, LnbVoltage};

/// Uniform operation set every concrete demodulator/tuner pair is driven
/// through (C4, §4.4). The abstraction hides that some chips expose a
/// one-shot tune and others a continuous search: callers always get a
/// non-blocking configure followed by a pollable status.
pub trait Frontend {
    fn init(&mut self) -> Result<(), ScanError>;
    fn sleep(&mut self) -> Result<(), ScanError>;
    fn release(&mut self) -> Result<(), ScanError>;

    /// Blocking configuration; does not wait for lock.
    fn set_frontend(&mut self, params: &FrontendParams) -> Result<(), ScanError>;

    /// Starts (or restarts, if `retune`) acquisition and returns the
    /// driver's suggested poll interval in milliseconds.
    fn tune(&mut self, retune: bool) -> Result<u32, ScanError>;

    fn read_status(&mut self) -> Result<FrontendStatus, ScanError>;

    /// 0x0000 weak … 0xFFFF strong.
    fn read_signal_strength(&mut self) -> Result<u16, ScanError>;

    fn read_ber(&mut self) -> Result<(u32, u32), ScanError>;

    /// milli-dB.
    fn read_snr(&mut self) -> Result<i32, ScanError>;

    fn read_ucblocks(&mut self) -> Result<u32, ScanError>;

    fn i2c_gate_ctrl(&mut self, open: bool) -> Result<(), ScanError>;

    // Satellite-only operations. Frontends that aren't satellite tuners
    // can leave these at their default, which reports the unsupported
    // state rather than panicking.
    fn diseqc_send_master_cmd(&mut self, _cmd: &[u8]) -> Result<(), ScanError> {
        Err(not_satellite())
    }

    fn set_tone(&mut self, _on: bool) -> Result<(), ScanError> {
        Err(not_satellite())
    }

    fn set_voltage(&mut self, _voltage: LnbVoltage) -> Result<(), ScanError> {
        Err(not_satellite())
    }

    /// One power sample (centi-dB, relative) at `offset_khz` from the
    /// frontend's last tuned frequency, read off the demodulator's
    /// on-chip spectrum scanner. Drives the blind-scan SS/PM sub-machines.
    fn read_spectrum_power(&mut self, _offset_khz: i32) -> Result<i16, ScanError> {
        Err(not_satellite())
    }
}

fn not_satellite() -> ScanError {
    ScanError::Bus(joker_proto::Error::DemodHwState(
        "operation requires a satellite frontend".to_string(),
    ))
}
