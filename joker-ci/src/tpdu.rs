use crate::error::CiError;

/// Largest payload one TPDU link-layer frame can carry (§4.8).
pub const TPDU_MAX_PAYLOAD: usize = 4094;

pub const FLAG_LAST: u8 = 0x00;
pub const FLAG_MORE: u8 = 0x80;

/// Splits `bytes` into TPDU link-layer frames, each prefixed with
/// `(connection_id, more/last flag)` (§4.8). Always yields at least one
/// frame, even for an empty payload.
pub fn encode_tpdu_chunks(connection_id: u8, bytes: &[u8]) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = if bytes.is_empty() {
        vec![&[][..]]
    } else {
        bytes.chunks(TPDU_MAX_PAYLOAD).collect()
    };
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let flag = if i == last { FLAG_LAST } else { FLAG_MORE };
            let mut frame = Vec::with_capacity(2 + chunk.len());
            frame.push(connection_id);
            frame.push(flag);
            frame.extend_from_slice(chunk);
            frame
        })
        .collect()
}

/// Strips the link-layer header off one TPDU frame.
pub fn decode_tpdu(frame: &[u8]) -> Result<(u8, u8, &[u8]), CiError> {
    if frame.len() < 2 {
        return Err(CiError::FrameTooShort);
    }
    Ok((frame[0], frame[1], &frame[2..]))
}
