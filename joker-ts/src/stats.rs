use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Running ingest counters, logged every two wall-clock seconds (§4.5).
/// Updated from the TS worker thread only; never touched from the USB
/// callback, which must not format or print.
pub struct Stats {
    transfers: AtomicU64,
    packets: AtomicU64,
    bytes: AtomicU64,
    last_log: Mutex<Instant>,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            transfers: AtomicU64::new(0),
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            last_log: Mutex::new(Instant::now()),
        }
    }
}

impl Stats {
    pub fn record_transfer(&self, packets: u64, bytes: u64) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        self.packets.fetch_add(packets, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Logs and resets the counters if at least two seconds have elapsed
    /// since the last log. Cheap to call on every worker iteration.
    pub fn maybe_log(&self) {
        let mut last = self.last_log.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = last.elapsed();
        if elapsed.as_secs_f64() < 2.0 {
            return;
        }
        let transfers = self.transfers.swap(0, Ordering::Relaxed);
        let packets = self.packets.swap(0, Ordering::Relaxed);
        let bytes = self.bytes.swap(0, Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();
        let mbit = (bytes as f64 * 8.0) / secs / 1_000_000.0;
        log::debug!(
            "ts: {:.1} transfers/s, {:.1} packets/s, {} bytes, {:.2} Mbit/s",
            transfers as f64 / secs,
            packets as f64 / secs,
            bytes,
            mbit
        );
        *last = Instant::now();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_transfer_accumulates() {
        let stats = Stats::default();
        stats.record_transfer(2, 376);
        stats.record_transfer(1, 188);
        assert_eq!(stats.packets.load(Ordering::Relaxed), 3);
        assert_eq!(stats.bytes.load(Ordering::Relaxed), 564);
    }
}
