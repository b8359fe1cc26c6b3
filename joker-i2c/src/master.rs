use std::thread;
use std::time::Duration;

use joker_proto::{ControlBus, Error};

use crate::registers::{self, cr, ctr, sr};

const MAX_POLL_CYCLES: u32 = 100;
const POLL_BACKOFF: Duration = Duration::from_millis(1);

/// An OpenCores I2C master addressed through a [`ControlBus`] (C3, §4.3).
///
/// Owns whatever bus it's built with, mirroring how the bit-banged `bk4819`
/// driver in the teacher crate owns its GPIO pins rather than borrowing them.
pub struct I2cMaster<B> {
    bus: B,
}

impl<B: ControlBus> I2cMaster<B> {
    /// Sets the bus prescaler for 400 kHz and enables the core.
    pub fn new(mut bus: B) -> Result<Self, Error> {
        bus.i2c_write_reg(registers::PRELO, registers::PRESCALE_400KHZ_LO)?;
        bus.i2c_write_reg(registers::PREHI, registers::PRESCALE_400KHZ_HI)?;
        bus.i2c_write_reg(registers::CTR, ctr::EN)?;
        Ok(I2cMaster { bus })
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn poll_tip(&mut self) -> Result<u8, Error> {
        for _ in 0..MAX_POLL_CYCLES {
            let status = self.bus.i2c_read_reg(registers::SR)?;
            if status & sr::TIP == 0 {
                return Ok(status);
            }
            thread::sleep(POLL_BACKOFF);
        }
        Err(Error::I2cTimeout)
    }

    fn run_command(&mut self, addr: u8, cr_bits: u8, check_ack: bool) -> Result<u8, Error> {
        self.bus.i2c_write_reg(registers::CR, cr_bits)?;
        let status = self.poll_tip()?;
        if status & sr::AL != 0 {
            return Err(Error::I2cArbLost);
        }
        if check_ack && status & sr::RXACK != 0 {
            return Err(Error::I2cNoAck(addr));
        }
        Ok(status)
    }

    /// Writes `bytes` to 7-bit address `addr` inside a single START…STOP
    /// framed transaction. An empty `bytes` sends the address phase alone,
    /// usable as a bus presence probe.
    pub fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Error> {
        self.bus.i2c_write_reg(registers::TXR, addr << 1)?;

        if bytes.is_empty() {
            self.run_command(addr, cr::STA | cr::WR | cr::STO, true)?;
            return Ok(());
        }

        self.run_command(addr, cr::STA | cr::WR, true)?;
        let last = bytes.len() - 1;
        for (i, &byte) in bytes.iter().enumerate() {
            self.bus.i2c_write_reg(registers::TXR, byte)?;
            let stop = if i == last { cr::STO } else { 0 };
            self.run_command(addr, cr::WR | stop, true)?;
        }
        Ok(())
    }

    /// Probes for a device at `addr` without transferring any data.
    pub fn ping(&mut self, addr: u8) -> Result<(), Error> {
        self.write(addr, &[])
    }

    /// Reads `len` bytes from 7-bit address `addr`, NACKing and stopping
    /// after the last byte.
    pub fn read(&mut self, addr: u8, len: usize) -> Result<Vec<u8>, Error> {
        if len == 0 {
            return self.ping(addr);
        }

        self.bus.i2c_write_reg(registers::TXR, (addr << 1) | 0x01)?;
        self.run_command(addr, cr::STA | cr::WR, true)?;

        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let last = i == len - 1;
            let cr_bits = cr::RD | if last { cr::NACK | cr::STO } else { 0 };
            self.run_command(addr, cr_bits, false)?;
            out.push(self.bus.i2c_read_reg(registers::RXR)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use joker_proto::{CommandFrame, Opcode};
    use std::collections::VecDeque;

    /// A minimal fake register file: scripts the status byte returned by
    /// each `SR` read and the data byte returned by each `RXR` read,
    /// otherwise acknowledges every write.
    #[derive(Default)]
    struct FakeRegs {
        sr: VecDeque<u8>,
        rx: VecDeque<u8>,
        default_sr: u8,
    }

    impl ControlBus for FakeRegs {
        fn exchange(&mut self, frame: &CommandFrame, _reply_len: usize) -> Result<Vec<u8>, Error> {
            match frame.opcode() {
                Opcode::I2cWrite => Ok(Vec::new()),
                Opcode::I2cRead => {
                    let reg = frame.payload()[0];
                    let value = if reg == registers::SR {
                        self.sr.pop_front().unwrap_or(self.default_sr)
                    } else {
                        self.rx.pop_front().unwrap_or(0)
                    };
                    Ok(vec![0, value])
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn write_two_bytes_succeeds_when_every_phase_acks() {
        let mut regs = FakeRegs::default();
        regs.sr = VecDeque::from(vec![0x00, 0x00, 0x00]); // init CTR read not needed
        let mut master = I2cMaster::new(regs).unwrap();
        master.bus_mut().sr = VecDeque::from(vec![0x00, 0x00, 0x00]);
        master.write(0x50, &[0xAA, 0xBB]).unwrap();
    }

    #[test]
    fn missing_ack_on_address_phase_reports_no_ack() {
        let regs = FakeRegs::default();
        let mut master = I2cMaster::new(regs).unwrap();
        master.bus_mut().sr = VecDeque::from(vec![sr::RXACK]);
        let err = master.write(0x50, &[0x01]).unwrap_err();
        assert!(matches!(err, Error::I2cNoAck(0x50)));
    }

    #[test]
    fn arbitration_lost_is_reported() {
        let regs = FakeRegs::default();
        let mut master = I2cMaster::new(regs).unwrap();
        master.bus_mut().sr = VecDeque::from(vec![sr::AL]);
        let err = master.write(0x50, &[0x01]).unwrap_err();
        assert!(matches!(err, Error::I2cArbLost));
    }

    #[test]
    fn tip_never_clearing_times_out() {
        let regs = FakeRegs::default();
        let mut master = I2cMaster::new(regs).unwrap();
        master.bus_mut().default_sr = sr::TIP;
        let err = master.ping(0x50).unwrap_err();
        assert!(matches!(err, Error::I2cTimeout));
    }

    #[test]
    fn read_nacks_and_stops_on_last_byte() {
        let regs = FakeRegs::default();
        let mut master = I2cMaster::new(regs).unwrap();
        master.bus_mut().sr = VecDeque::from(vec![0x00, 0x00, 0x00]);
        master.bus_mut().rx = VecDeque::from(vec![0x11, 0x22]);
        let bytes = master.read(0x50, 2).unwrap();
        assert_eq!(bytes, vec![0x11, 0x22]);
    }
}
