use joker_proto::{TS_PACKET_LEN, TS_SYNC};

/// Recovers a byte-aligned, sync-confirmed 188-byte TS packet stream from
/// isochronous payloads that carry no guarantee of 188-byte alignment
/// across transfers (§4.5).
///
/// Holds at most one partial packet (< 188 bytes) across calls to
/// [`Reassembler::feed`]. A packet is only ever emitted once its start byte
/// is confirmed sync AND either the payload ends exactly there or the byte
/// 188 positions later is also sync — the same confirmation the original
/// device firmware used to resync after a dropped microframe.
pub struct Reassembler {
    tail: Vec<u8>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Reassembler {
            tail: Vec::with_capacity(TS_PACKET_LEN - 1),
        }
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of carried-over, not-yet-confirmed bytes (0..187).
    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }

    /// Feeds one isochronous payload. Returns the concatenated bytes of
    /// every confirmed 188-byte packet found, in arrival order.
    pub fn feed(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut cursor = 0usize;

        if !self.tail.is_empty() {
            let need = TS_PACKET_LEN - self.tail.len();
            let confirmed = payload.len() > need && payload[need] == TS_SYNC;
            if confirmed {
                let mut packet = std::mem::take(&mut self.tail);
                packet.extend_from_slice(&payload[..need]);
                out.extend_from_slice(&packet);
                cursor = need;
            } else {
                self.tail.clear();
            }
        }

        while cursor + TS_PACKET_LEN <= payload.len() {
            if payload[cursor] == TS_SYNC {
                let next = cursor + TS_PACKET_LEN;
                let confirmed = next == payload.len() || payload[next] == TS_SYNC;
                if confirmed {
                    out.extend_from_slice(&payload[cursor..cursor + TS_PACKET_LEN]);
                    cursor += TS_PACKET_LEN;
                    continue;
                }
            }
            cursor += 1;
        }

        self.tail = payload[cursor..].to_vec();
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn packet(first_byte: u8, fill: u8) -> Vec<u8> {
        let mut p = vec![fill; TS_PACKET_LEN];
        p[0] = first_byte;
        p
    }

    #[test]
    fn single_payload_three_packets_after_garbage_prefix() {
        let mut payload = vec![0x00u8; 7];
        payload.extend(packet(TS_SYNC, 0xAA));
        payload.extend(packet(TS_SYNC, 0xBB));
        payload.extend(packet(TS_SYNC, 0xCC));

        let mut r = Reassembler::new();
        let out = r.feed(&payload);
        assert_eq!(out.len(), 3 * TS_PACKET_LEN);
        assert_eq!(out[0], TS_SYNC);
        assert_eq!(out[TS_PACKET_LEN], TS_SYNC);
        assert_eq!(out[2 * TS_PACKET_LEN], TS_SYNC);
        assert_eq!(r.tail_len(), 0);
    }

    #[test]
    fn packet_confirmed_across_a_payload_boundary() {
        let mut payload1 = vec![0x00u8; 3];
        payload1.extend(packet(TS_SYNC, 0xAA));
        payload1.extend(vec![TS_SYNC; 1]);
        payload1.extend(vec![0x11u8; 99]);

        let mut r = Reassembler::new();
        let out1 = r.feed(&payload1);
        assert_eq!(out1.len(), TS_PACKET_LEN);
        assert_eq!(r.tail_len(), 100);

        let mut payload2 = vec![0x22u8; 88];
        payload2.push(TS_SYNC);
        payload2.extend(vec![0x33u8; 50]);

        let out2 = r.feed(&payload2);
        assert_eq!(out2.len(), TS_PACKET_LEN);
        assert_eq!(r.tail_len(), 51);
    }

    #[test]
    fn unconfirmed_tail_is_discarded_not_synthesized_into_a_packet() {
        let mut payload1 = vec![0x00u8; 2];
        payload1.extend(packet(TS_SYNC, 0xAA));
        payload1.push(TS_SYNC);
        payload1.extend(vec![0x00u8; 49]);

        let mut r = Reassembler::new();
        let out1 = r.feed(&payload1);
        assert_eq!(out1.len(), TS_PACKET_LEN);
        assert_eq!(r.tail_len(), 50);

        let mut payload2 = vec![0x00u8; 200];
        payload2[138] = 0x11;
        let out2 = r.feed(&payload2);
        assert_eq!(out2.len(), 0);
        assert_eq!(r.tail_len(), 187);
    }
}
