use crate::opcode::Opcode;

/// Maximum size of an outgoing or incoming frame payload, matching the
/// device's fixed command buffer (§6).
pub const MAX_FRAME_LEN: usize = 1024;

/// One outgoing request on the control bus: an opcode plus its payload
/// (§3 "Command Frame").
///
/// `payload` never includes the opcode byte itself — [`CommandFrame::encode`]
/// prepends it when building the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    opcode: Opcode,
    payload: Vec<u8>,
}

impl CommandFrame {
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Result<Self, crate::Error> {
        if payload.len() + 1 > MAX_FRAME_LEN {
            return Err(crate::Error::BadFrame(opcode));
        }
        Ok(CommandFrame { opcode, payload })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serializes opcode + payload into the wire form written to bulk-OUT.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.opcode.as_byte());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_prepends_opcode() {
        let frame = CommandFrame::new(Opcode::I2cWrite, vec![0x68, 0x00]).unwrap();
        assert_eq!(frame.encode(), vec![Opcode::I2cWrite.as_byte(), 0x68, 0x00]);
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0u8; MAX_FRAME_LEN];
        assert!(CommandFrame::new(Opcode::Spi, payload).is_err());
    }
}
