use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use joker_proto::{ControlBus, FilterCommand};
use joker_ts::{TsNode, TsPipeline};

use crate::pat_synth::synthesize_pat_packet;
use crate::program::Program;

/// Fixed service PIDs always allowed through regardless of program
/// selection (§4.7).
pub const FIXED_SERVICE_PIDS: [u16; 11] = [
    0x00, 0x01, 0x02, 0x10, 0x11, 0x12, 0x13, 0x14, 0x1E, 0x1F, 0x1FFB,
];

/// Translates a selected-program set into the hardware PID allow-list and,
/// when any program is selected, installs a PAT rewriter on the ingest
/// pipeline (C7, §4.7).
pub struct FilterCoordinator {
    transport_stream_id: u16,
    continuity_counter: Arc<AtomicU8>,
    selected: Mutex<Vec<u16>>,
}

impl FilterCoordinator {
    pub fn new(transport_stream_id: u16) -> Self {
        FilterCoordinator {
            transport_stream_id,
            continuity_counter: Arc::new(AtomicU8::new(0)),
            selected: Mutex::new(Vec::new()),
        }
    }

    /// Computes the allow-list for `selected` and issues it via `bus`. When
    /// `selected` is empty, issues `allow_all` and clears any PAT rewriter
    /// on `pipeline`.
    pub fn apply<B: ControlBus>(
        &self,
        bus: &mut B,
        pipeline: &TsPipeline,
        programs: &std::collections::HashMap<u16, Program>,
        selected: &[u16],
    ) -> Result<HashSet<u16>, joker_proto::Error> {
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = selected.to_vec();

        if selected.is_empty() {
            bus.ts_filter(FilterCommand::AllowAll)?;
            pipeline.set_pat_rewriter(None);
            return Ok(HashSet::new());
        }

        let mut pids: HashSet<u16> = FIXED_SERVICE_PIDS.into_iter().collect();
        for number in selected {
            if let Some(program) = programs.get(number) {
                pids.insert(program.pmt_pid);
                for stream in &program.streams {
                    pids.insert(stream.pid);
                }
            }
        }

        bus.ts_filter(FilterCommand::DenyAll)?;
        for &pid in &pids {
            bus.ts_filter(FilterCommand::AllowOne(pid))?;
        }

        self.install_rewriter(pipeline, programs.clone(), selected.to_vec());
        Ok(pids)
    }

    fn install_rewriter(
        &self,
        pipeline: &TsPipeline,
        programs: std::collections::HashMap<u16, Program>,
        selected: Vec<u16>,
    ) {
        let tsid = self.transport_stream_id;
        let counter = Arc::clone(&self.continuity_counter);
        pipeline.set_pat_rewriter(Some(Arc::new(move |node: &mut TsNode| {
            rewrite_pat_packets(node, &programs, &selected, tsid, &counter);
        })));
    }
}

/// Overwrites every PAT packet (PID 0x00) in `node` in place with a freshly
/// synthesised one (§4.7).
fn rewrite_pat_packets(
    node: &mut TsNode,
    programs: &std::collections::HashMap<u16, Program>,
    selected: &[u16],
    transport_stream_id: u16,
    counter: &AtomicU8,
) {
    use joker_proto::TS_PACKET_LEN;

    let mut cursor = 0usize;
    while cursor + TS_PACKET_LEN <= node.bytes.len() {
        let packet = &node.bytes[cursor..cursor + TS_PACKET_LEN];
        let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
        if pid == 0x00 {
            let cc = counter.fetch_add(1, Ordering::Relaxed) & 0x0F;
            let replacement = synthesize_pat_packet(programs, selected, transport_stream_id, cc);
            node.bytes[cursor..cursor + TS_PACKET_LEN].copy_from_slice(&replacement);
        }
        cursor += TS_PACKET_LEN;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use joker_proto::CommandFrame;
    use joker_ts::RingOptions;
    use std::collections::HashMap;

    struct RecordingBus {
        sent: Vec<FilterCommand>,
    }

    impl ControlBus for RecordingBus {
        fn exchange(
            &mut self,
            frame: &CommandFrame,
            _reply_len: usize,
        ) -> Result<Vec<u8>, joker_proto::Error> {
            let payload = frame.payload();
            let cmd = match payload[0] {
                0x0 => FilterCommand::AllowAll,
                0x1 => FilterCommand::DenyAll,
                0x2 => FilterCommand::AllowOne(u16::from_be_bytes([payload[1], payload[2]])),
                0x3 => FilterCommand::DenyOne(u16::from_be_bytes([payload[1], payload[2]])),
                _ => unreachable!(),
            };
            self.sent.push(cmd);
            Ok(Vec::new())
        }
    }

    fn program(number: u16, pmt_pid: u16, es: Vec<u16>) -> Program {
        Program {
            number,
            name: None,
            pmt_pid,
            service_type: 0,
            streams: es
                .into_iter()
                .map(|pid| joker_psi_es(pid))
                .collect(),
            cam_state: crate::program::CamState::None,
            last_pmt_version: None,
        }
    }

    fn joker_psi_es(pid: u16) -> crate::pmt::ElementaryStream {
        crate::pmt::ElementaryStream { stream_type: 0x1B, pid }
    }

    #[test]
    fn selecting_a_program_denies_all_then_allows_its_pids() {
        let mut programs = HashMap::new();
        programs.insert(10, program(10, 0x100, vec![0x110, 0x111]));
        programs.insert(20, program(20, 0x200, vec![]));

        let pipeline = TsPipeline::new(RingOptions::default());
        let coordinator = FilterCoordinator::new(1);
        let mut bus = RecordingBus { sent: Vec::new() };

        let pids = coordinator
            .apply(&mut bus, &pipeline, &programs, &[10])
            .unwrap();

        assert!(pids.contains(&0x100));
        assert!(pids.contains(&0x110));
        assert!(pids.contains(&0x00));
        assert!(!pids.contains(&0x200));
        assert_eq!(bus.sent[0], FilterCommand::DenyAll);
        pipeline.stop();
    }

    #[test]
    fn empty_selection_allows_all_and_clears_rewriter() {
        let programs = HashMap::new();
        let pipeline = TsPipeline::new(RingOptions::default());
        let coordinator = FilterCoordinator::new(1);
        let mut bus = RecordingBus { sent: Vec::new() };

        coordinator.apply(&mut bus, &pipeline, &programs, &[]).unwrap();
        assert_eq!(bus.sent, vec![FilterCommand::AllowAll]);
        pipeline.stop();
    }
}
