use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::node::TsNode;

/// Default byte cap on `retained`, order 16 MiB (§3 "Retention Ring").
pub const DEFAULT_R_MAX: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct RingOptions {
    pub r_max: usize,
}

impl Default for RingOptions {
    fn default() -> Self {
        RingOptions { r_max: DEFAULT_R_MAX }
    }
}

struct Inner {
    pending: VecDeque<TsNode>,
    retained: VecDeque<TsNode>,
    retained_bytes: usize,
    cancelled: bool,
}

/// Two sub-lists under one mutex (§3, §5): `pending` awaits PID-hook
/// dispatch by the TS worker, `retained` awaits consumption by the pull
/// API. A single condition variable serves both; the worker waits on
/// `pending` non-empty, `read_ts` waits on `retained` holding enough bytes.
pub struct RetentionRing {
    inner: Mutex<Inner>,
    cond: Condvar,
    r_max: usize,
    dropped_bytes: AtomicU64,
}

impl RetentionRing {
    pub fn new(options: RingOptions) -> Self {
        RetentionRing {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                retained: VecDeque::new(),
                retained_bytes: 0,
                cancelled: false,
            }),
            cond: Condvar::new(),
            r_max: options.r_max,
            dropped_bytes: AtomicU64::new(0),
        }
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes.load(Ordering::Relaxed)
    }

    /// Called from the USB callback path once a transfer has been
    /// reassembled into a node. Never blocks.
    pub fn push_pending(&self, node: TsNode) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.push_back(node);
        self.cond.notify_all();
    }

    /// Blocks until a pending node is available or the ring is cancelled.
    pub fn pop_pending(&self) -> Option<TsNode> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(node) = inner.pending.pop_front() {
                return Some(node);
            }
            if inner.cancelled {
                return None;
            }
            inner = self.cond.wait(inner).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Moves a dispatched node into `retained`, evicting the oldest nodes
    /// until the byte cap is respected (§3 "eviction is oldest-first").
    pub fn retain(&self, node: TsNode) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.retained_bytes += node.remaining();
        inner.retained.push_back(node);
        while inner.retained_bytes > self.r_max {
            if let Some(evicted) = inner.retained.pop_front() {
                let lost = evicted.remaining() as u64;
                inner.retained_bytes -= evicted.remaining();
                self.dropped_bytes.fetch_add(lost, Ordering::Relaxed);
                log::warn!("ts: retention ring overflow, dropping {lost} bytes");
            } else {
                break;
            }
        }
        self.cond.notify_all();
    }

    /// Pull API (§4.5): blocks until `buf.len()` bytes can be served from
    /// `retained`, or until cancelled (returns the short count served so
    /// far). `rewrite` runs once per node, on first access, to let the
    /// filter coordinator splice a synthesised PAT in place.
    pub fn read_ts(&self, buf: &mut [u8], rewrite: &dyn Fn(&mut TsNode)) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut filled = 0usize;
        while filled < buf.len() {
            if inner.retained.is_empty() {
                if inner.cancelled {
                    break;
                }
                inner = self.cond.wait(inner).unwrap_or_else(|e| e.into_inner());
                continue;
            }
            let node = inner.retained.front_mut().unwrap();
            if node.read_off == 0 && !node.pat_replaced {
                rewrite(node);
                node.pat_replaced = true;
            }
            let take = (buf.len() - filled).min(node.remaining());
            buf[filled..filled + take]
                .copy_from_slice(&node.bytes[node.read_off..node.read_off + take]);
            node.read_off += take;
            filled += take;
            inner.retained_bytes -= take;
            if node.is_exhausted() {
                inner.retained.pop_front();
            }
        }
        filled
    }

    /// Blocks up to `deadline` for `n` bytes without consuming them; used
    /// by tests and callers that want to avoid a long block. Not part of
    /// the core pull contract.
    pub fn wait_for_bytes(&self, n: usize, deadline: Duration) -> bool {
        let start = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        while inner.retained_bytes < n && !inner.cancelled {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return inner.retained_bytes >= n;
            }
            let (next, _) = self
                .cond
                .wait_timeout(inner, deadline - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            inner = next;
        }
        inner.retained_bytes >= n
    }

    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.cancelled = true;
        self.cond.notify_all();
    }

    pub fn retained_bytes(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).retained_bytes
    }
}
