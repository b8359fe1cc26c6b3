use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::pat::parse_pat;
use crate::pmt::{parse_pmt, ElementaryStream};
use crate::sdt::parse_sdt;
use crate::section::SectionReassembler;

pub const PID_PAT: u16 = 0x00;
pub const PID_SDT: u16 = 0x11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamState {
    None,
    PendingSend,
    Sent,
}

/// One entry in the live program list (§3 "Program").
#[derive(Debug, Clone)]
pub struct Program {
    pub number: u16,
    pub name: Option<String>,
    pub pmt_pid: u16,
    pub service_type: u8,
    pub streams: Vec<ElementaryStream>,
    pub cam_state: CamState,
    pub last_pmt_version: Option<u8>,
}

impl Program {
    pub fn has_video(&self) -> bool {
        self.streams.iter().any(ElementaryStream::is_video)
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(ElementaryStream::is_audio)
    }
}

/// Section reassemblers over PID 0 (PAT) and every discovered PMT PID, plus
/// SDT for service names (§4.6). The live program map is kept behind an
/// `Arc` swapped on every change so a reader snapshot never observes a
/// partially applied PAT/PMT update.
pub struct ProgramIndex {
    pat: SectionReassembler,
    pmts: HashMap<u16, SectionReassembler>,
    sdt: SectionReassembler,
    programs: Mutex<Arc<HashMap<u16, Program>>>,
    pat_version: Option<u8>,
}

impl Default for ProgramIndex {
    fn default() -> Self {
        ProgramIndex {
            pat: SectionReassembler::new(),
            pmts: HashMap::new(),
            sdt: SectionReassembler::new(),
            programs: Mutex::new(Arc::new(HashMap::new())),
            pat_version: None,
        }
    }
}

impl ProgramIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<HashMap<u16, Program>> {
        Arc::clone(&self.programs.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Feeds one TS packet. Returns `true` if the program list changed as a
    /// result (a new/removed program, or an ES-list update from a new PMT
    /// version).
    pub fn on_packet(&mut self, pid: u16, packet: &[u8]) -> bool {
        if pid == PID_PAT {
            if let Some(section) = self.pat.feed_packet(packet) {
                return self.apply_pat(&section);
            }
        } else if pid == PID_SDT {
            if let Some(section) = self.sdt.feed_packet(packet) {
                return self.apply_sdt(&section);
            }
        } else if let Some(reassembler) = self.pmts.get_mut(&pid) {
            if let Some(section) = reassembler.feed_packet(packet) {
                return self.apply_pmt(pid, &section);
            }
        }
        false
    }

    fn apply_pat(&mut self, section: &[u8]) -> bool {
        let pat = match parse_pat(section) {
            Ok(pat) => pat,
            Err(e) => {
                log::warn!("psi: malformed PAT: {e}");
                return false;
            }
        };
        if self.pat_version == Some(pat.version) {
            return false;
        }
        self.pat_version = Some(pat.version);

        let mut programs = (*self.snapshot()).clone();
        let seen: std::collections::HashSet<u16> =
            pat.entries.iter().map(|e| e.program_number).collect();
        programs.retain(|number, _| seen.contains(number));
        self.pmts.retain(|pid, _| {
            programs.values().any(|p: &Program| p.pmt_pid == *pid) || pat.entries.iter().any(|e| e.pmt_pid == *pid)
        });

        for entry in &pat.entries {
            self.pmts.entry(entry.pmt_pid).or_insert_with(SectionReassembler::new);
            programs.entry(entry.program_number).or_insert_with(|| Program {
                number: entry.program_number,
                name: None,
                pmt_pid: entry.pmt_pid,
                service_type: 0,
                streams: Vec::new(),
                cam_state: CamState::None,
                last_pmt_version: None,
            });
        }

        *self.programs.lock().unwrap_or_else(|e| e.into_inner()) = Arc::new(programs);
        true
    }

    fn apply_pmt(&mut self, pid: u16, section: &[u8]) -> bool {
        let pmt = match parse_pmt(section) {
            Ok(pmt) => pmt,
            Err(e) => {
                log::warn!("psi: malformed PMT on PID {pid:#06x}: {e}");
                return false;
            }
        };

        let mut programs = (*self.snapshot()).clone();
        let Some(program) = programs.get_mut(&pmt.program_number) else {
            return false;
        };
        if program.last_pmt_version == Some(pmt.version) {
            return false;
        }
        program.streams = pmt.streams;
        program.last_pmt_version = Some(pmt.version);

        *self.programs.lock().unwrap_or_else(|e| e.into_inner()) = Arc::new(programs);
        true
    }

    fn apply_sdt(&mut self, section: &[u8]) -> bool {
        let services = match parse_sdt(section) {
            Ok(services) => services,
            Err(e) => {
                log::warn!("psi: malformed SDT: {e}");
                return false;
            }
        };

        let mut programs = (*self.snapshot()).clone();
        let mut changed = false;
        for service in services {
            if let Some(program) = programs.get_mut(&service.service_id) {
                if program.name.as_deref() != Some(service.name.as_str())
                    || program.service_type != service.service_type
                {
                    program.name = Some(service.name);
                    program.service_type = service.service_type;
                    changed = true;
                }
            }
        }
        if changed {
            *self.programs.lock().unwrap_or_else(|e| e.into_inner()) = Arc::new(programs);
        }
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pat::TABLE_ID_PAT;
    use crate::pmt::TABLE_ID_PMT;

    fn pusi_packet(pid: u16, section: &[u8]) -> Vec<u8> {
        let mut p = vec![0x47u8, 0x40 | ((pid >> 8) as u8 & 0x1F), (pid & 0xFF) as u8, 0x10, 0x00];
        p.extend_from_slice(section);
        p.resize(188, 0xFF);
        p
    }

    fn pat_section(entries: &[(u16, u16)], version: u8) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.push((version << 1) | 1);
        body.push(0x00);
        body.push(0x00);
        for (num, pid) in entries {
            body.extend_from_slice(&num.to_be_bytes());
            body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        }
        let len = body.len() + 4;
        let mut section = vec![TABLE_ID_PAT, ((len >> 8) as u8) & 0x0F, (len & 0xFF) as u8];
        section.extend_from_slice(&body);
        section.extend_from_slice(&[0u8; 4]);
        section
    }

    fn pmt_section(program_number: u16, streams: &[(u8, u16)], version: u8) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&program_number.to_be_bytes());
        body.push((version << 1) | 1);
        body.push(0x00);
        body.push(0x00);
        body.extend_from_slice(&(0xE000 | 0x1FFu16).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        for (stream_type, pid) in streams {
            body.push(*stream_type);
            body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
            body.extend_from_slice(&0u16.to_be_bytes());
        }
        let len = body.len() + 4;
        let mut section = vec![TABLE_ID_PMT, ((len >> 8) as u8) & 0x0F, (len & 0xFF) as u8];
        section.extend_from_slice(&body);
        section.extend_from_slice(&[0u8; 4]);
        section
    }

    #[test]
    fn pat_then_pmt_populates_program_streams() {
        let mut index = ProgramIndex::new();
        let pat = pat_section(&[(10, 0x100), (20, 0x200)], 0);
        assert!(index.on_packet(PID_PAT, &pusi_packet(PID_PAT, &pat)));

        let programs = index.snapshot();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[&10].streams.len(), 0);

        let pmt = pmt_section(10, &[(0x1B, 0x110), (0x0F, 0x111)], 0);
        assert!(index.on_packet(0x100, &pusi_packet(0x100, &pmt)));

        let programs = index.snapshot();
        assert_eq!(programs[&10].streams.len(), 2);
        assert!(programs[&10].has_video());
        assert!(programs[&10].has_audio());
    }

    #[test]
    fn repeated_pat_with_same_version_is_a_no_op() {
        let mut index = ProgramIndex::new();
        let pat = pat_section(&[(10, 0x100)], 0);
        assert!(index.on_packet(PID_PAT, &pusi_packet(PID_PAT, &pat)));
        assert!(!index.on_packet(PID_PAT, &pusi_packet(PID_PAT, &pat)));
    }
}
