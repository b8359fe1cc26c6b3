use std::collections::HashMap;
use std::sync::Arc;

use joker_proto::PID_WILDCARD;

/// A per-PID callback invoked on the TS worker thread for every packet that
/// carries its PID (§3 "PID Hook Table"). Never blocks; never touches the
/// control bus.
pub type Hook = dyn Fn(u16, &[u8]) + Send + Sync;

/// An immutable snapshot of the PID → hook mapping.
///
/// The table is copy-on-write from the worker's point of view (§5):
/// installing a hook builds a brand-new [`PidHookTable`] and the pipeline
/// swaps its `Arc` under the ring mutex, so the worker thread never
/// observes a half-updated map.
#[derive(Clone, Default)]
pub struct PidHookTable {
    by_pid: HashMap<u16, Arc<Hook>>,
    wildcard: Option<Arc<Hook>>,
}

impl PidHookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this table with `hook` installed for `pid`
    /// (`PID_WILDCARD` installs the catch-all hook). Any previous hook for
    /// that key is replaced.
    pub fn with_hook(&self, pid: u16, hook: Arc<Hook>) -> Self {
        let mut next = self.clone();
        if pid == PID_WILDCARD {
            next.wildcard = Some(hook);
        } else {
            next.by_pid.insert(pid, hook);
        }
        next
    }

    /// Returns a copy of this table with the hook for `pid` removed.
    pub fn without_hook(&self, pid: u16) -> Self {
        let mut next = self.clone();
        if pid == PID_WILDCARD {
            next.wildcard = None;
        } else {
            next.by_pid.remove(&pid);
        }
        next
    }

    /// Dispatches one packet to the hook registered for its PID, falling
    /// back to the wildcard hook if no PID-specific hook is installed.
    /// Invoked at most once per packet (§3 invariant).
    pub fn dispatch(&self, pid: u16, packet: &[u8]) {
        if let Some(hook) = self.by_pid.get(&pid) {
            hook(pid, packet);
        } else if let Some(hook) = &self.wildcard {
            hook(pid, packet);
        }
    }
}
