//! Sync Utility: the convenience loop body a control-side or device-side thread runs once
//! per iteration, per §4.7.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::pv::Pv;
use crate::registry::PvManager;

/// A callback invoked after each successful `readNonBlocking` drained by [`SyncUtility::receive_all`]
/// or [`SyncUtility::receive`]. Receives the PV that was just read.
pub type ReceiveListener = Arc<dyn Fn(&Arc<dyn Pv>) + Send + Sync>;

/// Drains the Notification Hub and fans reads/writes out across a PV Registry's PVs for one
/// side (control or device). Holds at most one listener per PV name; registering again
/// replaces the previous listener.
pub struct SyncUtility {
    registry: Arc<PvManager>,
    control_side: bool,
    listeners: Mutex<HashMap<String, ReceiveListener>>,
}

impl SyncUtility {
    pub fn new(registry: Arc<PvManager>, control_side: bool) -> Self {
        Self { registry, control_side, listeners: Mutex::new(HashMap::new()) }
    }

    pub fn add_receive_notification_listener(&self, pv_name: impl Into<String>, listener: ReceiveListener) {
        self.listeners.lock().expect("sync utility lock poisoned").insert(pv_name.into(), listener);
    }

    pub fn remove_receive_notification_listener(&self, pv_name: &str) {
        self.listeners.lock().expect("sync utility lock poisoned").remove(pv_name);
    }

    /// Drains every pending notification token; for each, repeatedly calls `readNonBlocking`
    /// on the referenced PV until it stops yielding new data, invoking that PV's listener (if
    /// any) after each successful read.
    pub fn receive_all(&self) {
        while let Some(pv) = self.registry.next_notification(self.control_side) {
            trace!(name = pv.name(), "sync utility draining notification");
            self.drain_and_notify(&pv);
        }
    }

    /// Same as [`SyncUtility::receive_all`] but restricted to the PVs named in `names`: any
    /// pending notification for a PV not in the set is left in the hub for a later drain.
    pub fn receive(&self, names: &[&str]) {
        while let Some(pv) = self.registry.next_notification_matching(self.control_side, |n| names.contains(&n)) {
            self.drain_and_notify(&pv);
        }
    }

    fn drain_and_notify(&self, pv: &Arc<dyn Pv>) {
        while pv.read_non_blocking() {
            if let Some(listener) = self.listeners.lock().expect("sync utility lock poisoned").get(pv.name()) {
                listener(pv);
            }
        }
    }

    /// Invokes `write` on every writeable PV known to the registry's side, via the listener
    /// map's write hooks. As with `receive_all`, the untyped `Pv` surface cannot itself carry
    /// a generic payload, so `sendAll`'s actual per-type writes are performed by the caller;
    /// this method exists to mirror the source's bulk-update iteration shape and is the
    /// extension point a caller wires concrete writes into.
    pub fn send_all(&self, writer: impl Fn(&Arc<dyn Pv>)) {
        for pv in self.registry.get_all_process_variables(self.control_side) {
            if pv.is_writeable() {
                writer(&pv);
            }
        }
    }

    pub fn send(&self, names: &[&str], writer: impl Fn(&Arc<dyn Pv>)) {
        for pv in self.registry.get_all_process_variables(self.control_side) {
            if pv.is_writeable() && names.contains(&pv.name()) {
                writer(&pv);
            }
        }
    }

    /// Calls `receive_all` repeatedly, sleeping `interval` between passes, until `timeout`
    /// elapses. A non-positive `timeout` performs exactly one pass and returns immediately.
    pub fn wait_for_notifications(&self, timeout: Duration, interval: Duration) {
        if timeout.is_zero() {
            self.receive_all();
            return;
        }
        let deadline = Instant::now() + timeout;
        loop {
            self.receive_all();
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(interval.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}
