use std::collections::HashMap;

use crc::{Crc, CRC_32_MPEG_2};
use joker_proto::{TS_PACKET_LEN, TS_SYNC};

use crate::pat::TABLE_ID_PAT;
use crate::program::Program;

const PAT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Builds a replacement PAT TS packet listing only `selected` programs
/// (§4.7): same PID (0x00), a freshly computed CRC32, and the given
/// continuity counter nibble.
pub fn synthesize_pat_packet(
    programs: &HashMap<u16, Program>,
    selected: &[u16],
    transport_stream_id: u16,
    continuity_counter: u8,
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&transport_stream_id.to_be_bytes());
    body.push(0b0000_0001); // version 0, current_next_indicator set
    body.push(0x00);
    body.push(0x00);
    for &number in selected {
        if let Some(program) = programs.get(&number) {
            body.extend_from_slice(&number.to_be_bytes());
            body.extend_from_slice(&(0xE000 | program.pmt_pid).to_be_bytes());
        }
    }

    let section_length = body.len() + 4; // + CRC32
    let mut section = vec![
        TABLE_ID_PAT,
        ((section_length >> 8) as u8) & 0x0F,
        (section_length & 0xFF) as u8,
    ];
    section.extend_from_slice(&body);

    let crc = PAT_CRC.checksum(&section);
    section.extend_from_slice(&crc.to_be_bytes());

    let mut packet = Vec::with_capacity(TS_PACKET_LEN);
    packet.push(TS_SYNC);
    packet.push(0x40); // payload_unit_start_indicator, PID high bits = 0
    packet.push(0x00); // PID low byte
    packet.push(0x10 | (continuity_counter & 0x0F)); // no adaptation field, payload only
    packet.push(0x00); // pointer_field
    packet.extend_from_slice(&section);
    packet.resize(TS_PACKET_LEN, 0xFF);
    packet
}
