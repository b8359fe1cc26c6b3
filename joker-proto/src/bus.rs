use crate::error::Error;
use crate::filter::FilterCommand;
use crate::frame::CommandFrame;
use crate::opcode::Opcode;
use crate::reset::ResetMask;

/// The command bus (C2): one opcode frame out, one reply in, FIFO-paired.
///
/// Every long-running component (I²C master, frontend, SPI programmer, CI
/// link) is written against this trait rather than against `joker-core`'s
/// USB implementation, so it can be driven by an in-memory fake in tests —
/// mirroring `k5lib::Client` being generic over its transport.
///
/// Implementations must serialize calls behind one mutex (§4.2, §5): a
/// caller that holds the bus for one `exchange` must release it before any
/// other component's frame can be interleaved on the wire.
pub trait ControlBus {
    /// Writes `frame` to bulk-OUT, then — if the opcode has a reply —
    /// reads exactly that many bytes from bulk-IN and returns them.
    ///
    /// `reply_len` lets `SPI` (whose reply length mirrors its request) be
    /// driven without a `match` in every caller; other opcodes should pass
    /// `frame.opcode().fixed_reply_len()`.
    fn exchange(&mut self, frame: &CommandFrame, reply_len: usize) -> Result<Vec<u8>, Error>;

    fn version(&mut self) -> Result<u16, Error> {
        let frame = CommandFrame::new(Opcode::Version, Vec::new())?;
        let reply = self.exchange(&frame, 2)?;
        Ok(u16::from_be_bytes([reply[0], reply[1]]))
    }

    fn i2c_write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        let frame = CommandFrame::new(Opcode::I2cWrite, vec![reg, value])?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    fn i2c_read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        let frame = CommandFrame::new(Opcode::I2cRead, vec![reg])?;
        let reply = self.exchange(&frame, 2)?;
        Ok(reply[1])
    }

    fn reset_write(&mut self, mask: ResetMask) -> Result<(), Error> {
        let bits = mask.to_wire().to_be_bytes();
        let frame = CommandFrame::new(Opcode::ResetCtrlWrite, bits.to_vec())?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    fn reset_read(&mut self) -> Result<ResetMask, Error> {
        let frame = CommandFrame::new(Opcode::ResetCtrlRead, Vec::new())?;
        let reply = self.exchange(&frame, 2)?;
        Ok(ResetMask::from_wire(u16::from_be_bytes([reply[0], reply[1]])))
    }

    fn ts_insel_write(&mut self, source: u16) -> Result<(), Error> {
        let frame = CommandFrame::new(Opcode::TsInselWrite, source.to_be_bytes().to_vec())?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    fn ts_insel_read(&mut self) -> Result<u16, Error> {
        let frame = CommandFrame::new(Opcode::TsInselRead, Vec::new())?;
        let reply = self.exchange(&frame, 2)?;
        Ok(u16::from_be_bytes([reply[0], reply[1]]))
    }

    fn isoc_len_write(&mut self, packet_size: u16) -> Result<(), Error> {
        let [hi, lo] = packet_size.to_be_bytes();
        let hi_frame = CommandFrame::new(Opcode::IsocLenWriteHi, vec![hi])?;
        self.exchange(&hi_frame, 0)?;
        let lo_frame = CommandFrame::new(Opcode::IsocLenWriteLo, vec![lo])?;
        self.exchange(&lo_frame, 0)?;
        Ok(())
    }

    fn ts_filter(&mut self, command: FilterCommand) -> Result<(), Error> {
        let frame = CommandFrame::new(Opcode::TsFilter, command.encode())?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    /// SPI passthrough: the reply mirrors the request length (§4.2).
    fn spi(&mut self, bytes: Vec<u8>) -> Result<Vec<u8>, Error> {
        let reply_len = bytes.len();
        let frame = CommandFrame::new(Opcode::Spi, bytes)?;
        self.exchange(&frame, reply_len)
    }

    fn ci_status(&mut self) -> Result<[u8; 2], Error> {
        let frame = CommandFrame::new(Opcode::CiStatus, Vec::new())?;
        let reply = self.exchange(&frame, 2)?;
        Ok([reply[0], reply[1]])
    }

    fn ci_read_mem(&mut self, addr: u16) -> Result<u8, Error> {
        let frame = CommandFrame::new(Opcode::CiReadMem, addr.to_be_bytes().to_vec())?;
        let reply = self.exchange(&frame, 2)?;
        Ok(reply[1])
    }

    fn ci_ts(&mut self, enable: bool) -> Result<(), Error> {
        let frame = CommandFrame::new(Opcode::CiTs, vec![enable as u8])?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    fn ci_write(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        let frame = CommandFrame::new(Opcode::CiWrite, bytes)?;
        self.exchange(&frame, 0)?;
        Ok(())
    }

    fn ci_read(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let frame = CommandFrame::new(Opcode::CiRead, Vec::new())?;
        self.exchange(&frame, len)
    }
}


#[cfg(test)]
mod test {
    use super::fake::ScriptedBus;
    use super::*;

    #[test]
    fn version_parses_be_u16() {
        let mut bus = ScriptedBus::default();
        bus.replies.push_back(Ok(vec![0x01, 0x02]));
        assert_eq!(bus.version().unwrap(), 0x0102);
    }

    #[test]
    fn reset_round_trips_through_wire() {
        let mut bus = ScriptedBus::default();
        let mask = ResetMask::SAT_DEMOD | ResetMask::TUNER;
        bus.replies.push_back(Ok(vec![]));
        bus.reset_write(mask).unwrap();
        assert_eq!(bus.sent[0].payload(), mask.to_wire().to_be_bytes());
    }

    #[test]
    fn ts_filter_allow_one_sends_pid() {
        let mut bus = ScriptedBus::default();
        bus.replies.push_back(Ok(vec![]));
        bus.ts_filter(FilterCommand::AllowOne(0x110)).unwrap();
        assert_eq!(bus.sent[0].payload(), &[0x2, 0x01, 0x10]);
    }
}
