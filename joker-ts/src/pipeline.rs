use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use joker_proto::TS_PACKET_LEN;

use crate::hooks::{Hook, PidHookTable};
use crate::node::TsNode;
use crate::reassemble::Reassembler;
use crate::ring::{RetentionRing, RingOptions};
use crate::stats::Stats;

/// Extracts the 13-bit PID from a 188-byte TS packet header (§6).
pub fn packet_pid(packet: &[u8]) -> u16 {
    (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16
}

type PatRewriter = dyn Fn(&mut TsNode) + Send + Sync;

/// Owns reassembly, retention and PID fan-out for one capture session (C5).
///
/// The USB callback thread only calls [`TsPipeline::on_iso_payload`], which
/// reassembles and enqueues without blocking; a dedicated worker thread
/// performs PID dispatch and retention bookkeeping.
pub struct TsPipeline {
    reassembler: Mutex<Reassembler>,
    ring: Arc<RetentionRing>,
    hooks: Mutex<Arc<PidHookTable>>,
    pat_rewriter: Mutex<Option<Arc<PatRewriter>>>,
    stats: Arc<Stats>,
    seq: AtomicU64,
    cancel: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TsPipeline {
    pub fn new(options: RingOptions) -> Arc<Self> {
        let pipeline = Arc::new(TsPipeline {
            reassembler: Mutex::new(Reassembler::new()),
            ring: Arc::new(RetentionRing::new(options)),
            hooks: Mutex::new(Arc::new(PidHookTable::new())),
            pat_rewriter: Mutex::new(None),
            stats: Arc::new(Stats::default()),
            seq: AtomicU64::new(0),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        });
        pipeline.spawn_worker();
        pipeline
    }

    fn spawn_worker(self: &Arc<Self>) {
        let pipeline = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("joker-ts-worker".into())
            .spawn(move || pipeline.worker_loop())
            .expect("spawn ts worker thread");
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    fn worker_loop(&self) {
        while let Some(node) = self.ring.pop_pending() {
            let hooks = Arc::clone(&self.hooks.lock().unwrap_or_else(|e| e.into_inner()));
            let mut cursor = 0usize;
            while cursor + TS_PACKET_LEN <= node.bytes.len() {
                let packet = &node.bytes[cursor..cursor + TS_PACKET_LEN];
                hooks.dispatch(packet_pid(packet), packet);
                cursor += TS_PACKET_LEN;
            }
            self.stats
                .record_transfer(1, node.bytes.len() as u64 / TS_PACKET_LEN as u64);
            self.ring.retain(node);
            self.stats.maybe_log();
        }
    }

    /// Called from the USB isochronous callback (§4.5 "Node emission").
    /// Reassembly is cheap and synchronous; nothing here blocks.
    pub fn on_iso_payload(&self, payload: &[u8]) {
        let bytes = self
            .reassembler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .feed(payload);
        if bytes.is_empty() {
            return;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.ring.push_pending(TsNode::new(seq, bytes));
    }

    pub fn install_hook(&self, pid: u16, hook: Arc<Hook>) {
        let mut hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        *hooks = Arc::new(hooks.with_hook(pid, hook));
    }

    pub fn remove_hook(&self, pid: u16) {
        let mut hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        *hooks = Arc::new(hooks.without_hook(pid));
    }

    /// Installs (or clears, with `None`) the PAT-rewrite callback the filter
    /// coordinator drives (§4.7).
    pub fn set_pat_rewriter(&self, rewriter: Option<Arc<PatRewriter>>) {
        *self.pat_rewriter.lock().unwrap_or_else(|e| e.into_inner()) = rewriter;
    }

    /// Pull API (§4.5): blocks until `buf.len()` bytes are served.
    pub fn read_ts(&self, buf: &mut [u8]) -> usize {
        let rewriter = self.pat_rewriter.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let apply = move |node: &mut TsNode| {
            if let Some(r) = &rewriter {
                r(node);
            }
        };
        self.ring.read_ts(buf, &apply)
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.ring.dropped_bytes()
    }

    /// Reclaims the ring and joins the worker thread (§5 `stop_ts`).
    /// Idempotent.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.ring.cancel();
        if let Some(handle) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TsPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ts_packet(pid: u16) -> Vec<u8> {
        let mut p = vec![0u8; TS_PACKET_LEN];
        p[0] = joker_proto::TS_SYNC;
        p[1] = (pid >> 8) as u8 & 0x1F;
        p[2] = (pid & 0xFF) as u8;
        p
    }

    #[test]
    fn packet_pid_extracts_13_bits() {
        let packet = ts_packet(0x1FFB);
        assert_eq!(packet_pid(&packet), 0x1FFB);
    }

    #[test]
    fn dispatches_to_installed_hook_and_serves_pull_api() {
        let pipeline = TsPipeline::new(RingOptions::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        pipeline.install_hook(0x100, Arc::new(move |_, _| { h.fetch_add(1, Ordering::SeqCst); }));

        pipeline.on_iso_payload(&ts_packet(0x100));
        assert!(pipeline.ring.wait_for_bytes(TS_PACKET_LEN, Duration::from_secs(1)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let mut buf = vec![0u8; TS_PACKET_LEN];
        assert_eq!(pipeline.read_ts(&mut buf), TS_PACKET_LEN);
        assert_eq!(buf[0], joker_proto::TS_SYNC);
        pipeline.stop();
    }
}
