//! Notification Hub: lets a consumer thread learn "some PV is pending" without scanning
//! every PV it owns.
//!
//! The design calls for lock-free MPSC queues; this crate's teacher lineage denies
//! `unsafe_code` crate-wide (see [`crate::queue`] for the same trade-off applied to the
//! Transport Queue), so the queues here are `Mutex`-guarded `VecDeque`s instead. The observable
//! contract — coalesced, edge-triggered tokens, cleared before the consumer reads the PV — is
//! unaffected; only the internal synchronization primitive differs from a literal lock-free
//! implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::pv::Pv;

/// Which side's queue a notification lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    ControlSystem,
    Device,
}

struct Entry {
    latch: Arc<AtomicBool>,
    pv: Arc<dyn Pv>,
}

/// Two per-side token queues plus the coalescing machinery shared by every PV pair created
/// from the same registry.
#[derive(Default)]
pub struct NotificationHub {
    control: Mutex<VecDeque<Entry>>,
    device: Mutex<VecDeque<Entry>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, cleared per-PV latch. One is needed per unidirectional pair.
    pub fn make_latch() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    /// Attempts to post a notification for `pv` on `side`. Coalesced: if `latch` is already
    /// set, this is a no-op — a PV with a pending token does not get a second one queued.
    pub fn notify(&self, side: Side, latch: &Arc<AtomicBool>, pv: Arc<dyn Pv>) {
        if latch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.queue_for(side)
                .lock()
                .expect("notification hub lock poisoned")
                .push_back(Entry { latch: latch.clone(), pv });
        }
    }

    /// Pops the next pending PV on `side`, clearing its latch first so that a publish racing
    /// with this call enqueues a fresh token rather than being silently dropped.
    pub fn next_notification(&self, side: Side) -> Option<Arc<dyn Pv>> {
        let mut queue = self.queue_for(side).lock().expect("notification hub lock poisoned");
        let entry = queue.pop_front()?;
        entry.latch.store(false, Ordering::Release);
        Some(entry.pv)
    }

    /// Pops the first pending PV on `side` whose name satisfies `predicate`, leaving every
    /// other pending entry in place. Used by the Sync Utility's `receive`/`send` restricted
    /// variants, which must drain only a named subset without disturbing the rest.
    pub fn next_notification_matching(&self, side: Side, predicate: impl Fn(&str) -> bool) -> Option<Arc<dyn Pv>> {
        let mut queue = self.queue_for(side).lock().expect("notification hub lock poisoned");
        let position = queue.iter().position(|entry| predicate(entry.pv.name()))?;
        let entry = queue.remove(position).expect("position was just found");
        entry.latch.store(false, Ordering::Release);
        Some(entry.pv)
    }

    pub fn is_empty(&self, side: Side) -> bool {
        self.queue_for(side).lock().expect("notification hub lock poisoned").is_empty()
    }

    fn queue_for(&self, side: Side) -> &Mutex<VecDeque<Entry>> {
        match side {
            Side::ControlSystem => &self.control,
            Side::Device => &self.device,
        }
    }
}

/// Binds a PV endpoint's publish path to the hub entry its partner drains from. Held by a
/// `Sender`/bidirectional endpoint and fired on every successful write.
pub struct NotifySlot {
    hub: Arc<NotificationHub>,
    side: Side,
    latch: Arc<AtomicBool>,
    pv: Arc<dyn Pv>,
}

impl NotifySlot {
    pub fn new(hub: Arc<NotificationHub>, side: Side, latch: Arc<AtomicBool>, pv: Arc<dyn Pv>) -> Self {
        Self { hub, side, latch, pv }
    }

    pub fn fire(&self) {
        self.hub.notify(self.side, &self.latch, self.pv.clone());
    }
}
