use nom::multi::many0;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::error::Error;

pub const TABLE_ID_PAT: u8 = 0x00;

/// One `program_number → PID` record from a PAT (§4.6). `program_number ==
/// 0` maps to the network PID rather than a PMT and is filtered out by
/// [`parse_pat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version: u8,
    pub entries: Vec<PatEntry>,
}

fn entry(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (input, program_number) = be_u16(input)?;
    let (input, pid_field) = be_u16(input)?;
    Ok((input, (program_number, pid_field & 0x1FFF)))
}

/// Parses a complete PAT section (table_id through CRC32, as produced by
/// [`crate::section::SectionReassembler`]).
pub fn parse_pat(section: &[u8]) -> Result<Pat, Error> {
    if section.len() < 8 + 4 {
        return Err(Error::Truncated("PAT"));
    }
    if section[0] != TABLE_ID_PAT {
        return Err(Error::UnexpectedTableId {
            expected: TABLE_ID_PAT,
            got: section[0],
        });
    }
    let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
    let total = 3 + section_length;
    if section.len() < total {
        return Err(Error::Truncated("PAT"));
    }

    let transport_stream_id = u16::from_be_bytes([section[3], section[4]]);
    let version = (section[5] >> 1) & 0x1F;

    let body = &section[8..total - 4];
    let (_, pairs) = many0(entry)(body).map_err(|_| Error::Malformed("PAT"))?;

    let entries = pairs
        .into_iter()
        .filter(|(program_number, _)| *program_number != 0)
        .map(|(program_number, pmt_pid)| PatEntry {
            program_number,
            pmt_pid,
        })
        .collect();

    Ok(Pat {
        transport_stream_id,
        version,
        entries,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_pat() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes()); // transport_stream_id
        body.push(0b0000_0001); // version 0, current_next
        body.push(0x00); // section_number
        body.push(0x00); // last_section_number
        body.extend_from_slice(&10u16.to_be_bytes());
        body.extend_from_slice(&(0xE000 | 0x0100u16).to_be_bytes());
        body.extend_from_slice(&20u16.to_be_bytes());
        body.extend_from_slice(&(0xE000 | 0x0200u16).to_be_bytes());

        let section_length = body.len() + 4; // + CRC32
        let mut section = vec![TABLE_ID_PAT];
        section.push(((section_length >> 8) as u8) & 0x0F);
        section.push((section_length & 0xFF) as u8);
        section.extend_from_slice(&body);
        section.extend_from_slice(&[0u8; 4]); // CRC32 placeholder
        section
    }

    #[test]
    fn parses_two_programs_and_drops_network_pid_entry() {
        let section = sample_pat();
        let pat = parse_pat(&section).unwrap();
        assert_eq!(pat.transport_stream_id, 1);
        assert_eq!(
            pat.entries,
            vec![
                PatEntry { program_number: 10, pmt_pid: 0x100 },
                PatEntry { program_number: 20, pmt_pid: 0x200 },
            ]
        );
    }

    #[test]
    fn rejects_wrong_table_id() {
        let mut section = sample_pat();
        section[0] = 0x02;
        assert!(matches!(parse_pat(&section), Err(Error::UnexpectedTableId { .. })));
    }
}
