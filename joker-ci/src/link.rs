use joker_proto::ControlBus;

use crate::error::CiError;
use crate::status::CiStatus;
use crate::tpdu::{decode_tpdu, encode_tpdu_chunks, FLAG_MORE, TPDU_MAX_PAYLOAD};

/// CI link and CAM byte channel (C8, §4.8), exposing a single CAM slot
/// through the command bus.
pub struct CiLink<B> {
    bus: B,
}

impl<B: ControlBus> CiLink<B> {
    pub fn new(bus: B) -> Self {
        CiLink { bus }
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn ci_read_status(&mut self) -> Result<CiStatus, CiError> {
        let bits = self.bus.ci_status()?;
        Ok(CiStatus::from_wire(bits))
    }

    pub fn ci_read_attr_mem(&mut self, addr: u16) -> Result<u8, CiError> {
        Ok(self.bus.ci_read_mem(addr)?)
    }

    /// Routes the live TS through the CAM for descrambling.
    pub fn ci_enable_ts(&mut self, enable: bool) -> Result<(), CiError> {
        Ok(self.bus.ci_ts(enable)?)
    }

    /// Frames `bytes` into one or more TPDUs and writes each to the CAM
    /// channel in order.
    pub fn tpdu_send(&mut self, connection_id: u8, bytes: &[u8]) -> Result<(), CiError> {
        for frame in encode_tpdu_chunks(connection_id, bytes) {
            self.bus.ci_write(frame)?;
        }
        Ok(())
    }

    /// Reads TPDU frames from the CAM channel until a `FLAG_LAST` frame
    /// is seen, reassembling the payload and stripping the link-layer
    /// header.
    pub fn tpdu_recv(&mut self) -> Result<(u8, Vec<u8>), CiError> {
        let mut connection_id = 0u8;
        let mut payload = Vec::new();
        loop {
            let raw = self.bus.ci_read(TPDU_MAX_PAYLOAD + 2)?;
            let (cid, flag, chunk) = decode_tpdu(&raw)?;
            connection_id = cid;
            payload.extend_from_slice(chunk);
            if flag != FLAG_MORE {
                break;
            }
        }
        Ok((connection_id, payload))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use joker_proto::{CommandFrame, Error, Opcode};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeLink {
        written: Vec<Vec<u8>>,
        reads: VecDeque<Vec<u8>>,
    }

    impl ControlBus for FakeLink {
        fn exchange(&mut self, frame: &CommandFrame, _reply_len: usize) -> Result<Vec<u8>, Error> {
            match frame.opcode() {
                Opcode::CiWrite => {
                    self.written.push(frame.payload().to_vec());
                    Ok(Vec::new())
                }
                Opcode::CiRead => Ok(self.reads.pop_front().unwrap_or_default()),
                Opcode::CiStatus => Ok(vec![0, 0x07]),
                Opcode::CiTs => Ok(Vec::new()),
                Opcode::CiReadMem => Ok(vec![0, 0x42]),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn tpdu_send_writes_one_frame_per_chunk() {
        let mut link = CiLink::new(FakeLink::default());
        link.tpdu_send(5, b"abc").unwrap();
        assert_eq!(link.bus.written.len(), 1);
        assert_eq!(link.bus.written[0][0], 5);
    }

    #[test]
    fn tpdu_recv_reassembles_across_more_flagged_frames() {
        let mut fake = FakeLink::default();
        fake.reads.push_back(vec![9, FLAG_MORE, b'h', b'e']);
        fake.reads.push_back(vec![9, 0x00, b'l', b'l', b'o']);
        let mut link = CiLink::new(fake);
        let (cid, payload) = link.tpdu_recv().unwrap();
        assert_eq!(cid, 9);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn status_bits_decode_through_the_link() {
        let mut link = CiLink::new(FakeLink::default());
        let status = link.ci_read_status().unwrap();
        assert!(status.module_present);
        assert!(status.ready);
    }
}
