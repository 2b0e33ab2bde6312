//! PV Registry (`PVManager`): the single point of creation and lookup for process variables.
//!
//! Registration happens from one initialization thread before hand-off; after hand-off the
//! map itself is never mutated again, so lookups from either side require no locking beyond
//! what `Arc`/`HashMap` already give for free once the map is built (§5).

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::{PvError, Result};
use crate::notify::{NotificationHub, NotifySlot, Side};
use crate::persistence::PersistenceOverlay;
use crate::pv::bidirectional::{BidirectionalEndpoint, PersistenceRole};
use crate::pv::unidirectional::{Receiver, Sender};
use crate::pv::Pv;
use crate::queue::TransportQueue;
use crate::scalar::{PvElement, ValueType};
use crate::timestamp::{SystemTimeStampSource, TimeStampSource};

/// Which side publishes and which side receives for a freshly created pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ControlSystemToDevice,
    DeviceToControlSystem,
    Bidirectional,
}

/// Optional per-PV creation flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateFlags {
    /// Allows blocking `read()` on the device-side receiver of this PV. Absent: poll-only.
    pub wait_for_new_data: bool,
    /// Allows `writeDestructively` on the control-side sender of this PV.
    pub may_send_destructively: bool,
}

struct Entry {
    control_side: Arc<dyn Any + Send + Sync>,
    device_side: Arc<dyn Any + Send + Sync>,
    control_pv: Arc<dyn Pv>,
    device_pv: Arc<dyn Pv>,
    value_type: ValueType,
}

/// Owns both endpoints of every registered PV, keyed by name. `getProcessArray`/
/// `getProcessVariable` look up by name and side; `createProcessArray` is the only mutator.
/// Registration is expected to happen from one initialization thread before hand-off, so it
/// takes `&self` (interior `Mutex`) rather than requiring `&mut self` everywhere lookups happen.
/// Call [`PvManager::finalize`] once registration is complete: every `createProcessArray`
/// call after that point is rejected with [`PvError::RegistryFinalized`].
pub struct PvManager {
    application_name: String,
    hub: Arc<NotificationHub>,
    entries: Mutex<HashMap<String, Entry>>,
    persistence: Mutex<Option<Arc<PersistenceOverlay>>>,
    finalized: AtomicBool,
}

impl PvManager {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            hub: Arc::new(NotificationHub::new()),
            entries: Mutex::new(HashMap::new()),
            persistence: Mutex::new(None),
            finalized: AtomicBool::new(false),
        }
    }

    /// Ends the registration phase. After this call, `createProcessArray` fails with
    /// `RegistryFinalized` for every name, registered or not; lookups are unaffected.
    /// Idempotent — finalizing an already-finalized registry is a no-op.
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::Release);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Creates a persistence overlay rooted at `directory`, loading any existing
    /// `<application_name>.persist` file. The registry does not auto-attach it to any PV;
    /// the caller attaches it to each writeable control-side sender or bidirectional
    /// endpoint individually via `attach_persistence`, in whatever order suits the
    /// application.
    pub fn enable_persistent_data_storage(&self, directory: impl AsRef<std::path::Path>) -> Arc<PersistenceOverlay> {
        let overlay = Arc::new(PersistenceOverlay::new(self.application_name.clone(), directory));
        *self.persistence.lock().expect("registry lock poisoned") = Some(overlay.clone());
        overlay
    }

    /// Creates a named PV pair of element type `T` and length `len`. `initial` seeds the
    /// starting payload; required so poll-only receivers never block on an empty queue.
    pub fn create_process_array<T: PvElement>(
        &self,
        direction: Direction,
        name: impl Into<String>,
        len: usize,
        initial: Vec<T>,
        number_of_buffers: usize,
        flags: CreateFlags,
    ) -> Result<()> {
        let name = name.into();
        if self.is_finalized() {
            return Err(PvError::RegistryFinalized { name });
        }
        if number_of_buffers < 2 {
            return Err(PvError::QueueTooSmall { name, requested: number_of_buffers });
        }
        if initial.len() != len {
            return Err(PvError::LengthMismatch { name, expected: len, actual: initial.len() });
        }
        {
            let entries = self.entries.lock().expect("registry lock poisoned");
            if entries.contains_key(&name) {
                return Err(PvError::DuplicateName { name });
            }
        }

        let capacity = number_of_buffers - 1;
        let (control_pv, device_pv, control_any, device_any): (
            Arc<dyn Pv>,
            Arc<dyn Pv>,
            Arc<dyn Any + Send + Sync>,
            Arc<dyn Any + Send + Sync>,
        ) = match direction {
            Direction::ControlSystemToDevice => {
                let (sender, receiver) =
                    self.build_unidirectional(&name, len, capacity, &initial, flags, Side::Device);
                (
                    sender.clone() as Arc<dyn Pv>,
                    receiver.clone() as Arc<dyn Pv>,
                    sender as Arc<dyn Any + Send + Sync>,
                    receiver as Arc<dyn Any + Send + Sync>,
                )
            }
            Direction::DeviceToControlSystem => {
                let (sender, receiver) =
                    self.build_unidirectional(&name, len, capacity, &initial, flags, Side::ControlSystem);
                (
                    receiver.clone() as Arc<dyn Pv>,
                    sender.clone() as Arc<dyn Pv>,
                    receiver as Arc<dyn Any + Send + Sync>,
                    sender as Arc<dyn Any + Send + Sync>,
                )
            }
            Direction::Bidirectional => {
                let (control, device) = self.build_bidirectional(&name, len, capacity, &initial, flags);
                let control = Arc::new(control);
                let device = Arc::new(device);
                (
                    control.clone() as Arc<dyn Pv>,
                    device.clone() as Arc<dyn Pv>,
                    control as Arc<dyn Any + Send + Sync>,
                    device as Arc<dyn Any + Send + Sync>,
                )
            }
        };

        let entry = Entry {
            control_side: control_any,
            device_side: device_any,
            control_pv,
            device_pv,
            value_type: T::VALUE_TYPE,
        };
        self.entries.lock().expect("registry lock poisoned").insert(name.clone(), entry);
        info!(name = %name, len = len as u64, ?direction, "registered process variable");
        Ok(())
    }

    fn build_unidirectional<T: PvElement>(
        &self,
        name: &str,
        len: usize,
        capacity: usize,
        initial: &[T],
        flags: CreateFlags,
        receiving_side: Side,
    ) -> (Arc<Sender<T>>, Arc<Receiver<T>>) {
        let queue = TransportQueue::<T>::new(capacity, len);
        let receiver = Arc::new(Receiver::new(name.to_string(), len, queue.clone(), flags.wait_for_new_data));
        receiver.seed(
            initial,
            Default::default(),
            Default::default(),
            crate::buffer::Validity::Ok,
        );
        let latch = NotificationHub::make_latch();
        let notify = NotifySlot::new(self.hub.clone(), receiving_side, latch, receiver.clone());
        let sender = Arc::new(Sender::new(
            name.to_string(),
            len,
            queue,
            Arc::new(SystemTimeStampSource::new()),
            flags.may_send_destructively,
            notify,
        ));
        (sender, receiver)
    }

    fn build_bidirectional<T: PvElement>(
        &self,
        name: &str,
        len: usize,
        capacity: usize,
        initial: &[T],
        flags: CreateFlags,
    ) -> (BidirectionalEndpoint<T>, BidirectionalEndpoint<T>) {
        let queue_device_to_control = TransportQueue::<T>::new(capacity, len);
        let queue_control_to_device = TransportQueue::<T>::new(capacity, len);

        let receiver_on_control = Arc::new(Receiver::new(
            name.to_string(),
            len,
            queue_device_to_control.clone(),
            flags.wait_for_new_data,
        ));
        let notify_to_control = NotifySlot::new(
            self.hub.clone(),
            Side::ControlSystem,
            NotificationHub::make_latch(),
            receiver_on_control.clone(),
        );
        let sender_on_device = Sender::new(
            name.to_string(),
            len,
            queue_device_to_control,
            Arc::new(SystemTimeStampSource::new()),
            flags.may_send_destructively,
            notify_to_control,
        );

        let receiver_on_device = Arc::new(Receiver::new(
            name.to_string(),
            len,
            queue_control_to_device.clone(),
            flags.wait_for_new_data,
        ));
        let notify_to_device = NotifySlot::new(
            self.hub.clone(),
            Side::Device,
            NotificationHub::make_latch(),
            receiver_on_device.clone(),
        );
        let sender_on_control = Sender::new(
            name.to_string(),
            len,
            queue_control_to_device,
            Arc::new(SystemTimeStampSource::new()),
            flags.may_send_destructively,
            notify_to_device,
        );

        let control = BidirectionalEndpoint::new(
            name.to_string(),
            len,
            sender_on_control,
            receiver_on_control,
            PersistenceRole::ControlSystemSide,
        );
        let device = BidirectionalEndpoint::new(
            name.to_string(),
            len,
            sender_on_device,
            receiver_on_device,
            PersistenceRole::DeviceSide,
        );
        control.seed(initial, crate::buffer::Validity::Ok);
        device.seed(initial, crate::buffer::Validity::Ok);
        (control, device)
    }

    /// Returns the control-side or device-side typed endpoint for `name`.
    pub fn get_process_array<T: PvElement>(&self, name: &str, control_side: bool) -> Result<Arc<dyn Any + Send + Sync>> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        let entry = entries.get(name).ok_or_else(|| PvError::UnknownName { name: name.to_string() })?;
        if entry.value_type != T::VALUE_TYPE {
            return Err(PvError::TypeMismatch { name: name.to_string() });
        }
        Ok(if control_side { entry.control_side.clone() } else { entry.device_side.clone() })
    }

    /// Downcasts the control- or device-side endpoint of unidirectional PV `name` to a
    /// concrete `Sender<T>`. Fails with `TypeMismatch` if `name` does not hold a `Sender<T>`
    /// on that side (wrong element type, or the side is a `Receiver`/bidirectional endpoint).
    pub fn get_sender<T: PvElement>(&self, name: &str, control_side: bool) -> Result<Arc<Sender<T>>> {
        self.get_process_array::<T>(name, control_side)?
            .downcast::<Sender<T>>()
            .map_err(|_| PvError::TypeMismatch { name: name.to_string() })
    }

    /// Downcasts to a concrete `Receiver<T>`; see [`PvManager::get_sender`].
    pub fn get_receiver<T: PvElement>(&self, name: &str, control_side: bool) -> Result<Arc<Receiver<T>>> {
        self.get_process_array::<T>(name, control_side)?
            .downcast::<Receiver<T>>()
            .map_err(|_| PvError::TypeMismatch { name: name.to_string() })
    }

    /// Downcasts to a concrete `BidirectionalEndpoint<T>`; see [`PvManager::get_sender`].
    pub fn get_bidirectional<T: PvElement>(&self, name: &str, control_side: bool) -> Result<Arc<BidirectionalEndpoint<T>>> {
        self.get_process_array::<T>(name, control_side)?
            .downcast::<BidirectionalEndpoint<T>>()
            .map_err(|_| PvError::TypeMismatch { name: name.to_string() })
    }

    /// Returns the untyped PV handle for `name` on the given side.
    pub fn get_process_variable(&self, name: &str, control_side: bool) -> Result<Arc<dyn Pv>> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        let entry = entries.get(name).ok_or_else(|| PvError::UnknownName { name: name.to_string() })?;
        Ok(if control_side { entry.control_pv.clone() } else { entry.device_pv.clone() })
    }

    pub fn has_process_variable(&self, name: &str) -> bool {
        self.entries.lock().expect("registry lock poisoned").contains_key(name)
    }

    /// All endpoints on the given side; iteration order unspecified (`HashMap` order).
    pub fn get_all_process_variables(&self, control_side: bool) -> Vec<Arc<dyn Pv>> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .values()
            .map(|entry| if control_side { entry.control_pv.clone() } else { entry.device_pv.clone() })
            .collect()
    }

    pub fn next_notification(&self, control_side: bool) -> Option<Arc<dyn Pv>> {
        let side = if control_side { Side::ControlSystem } else { Side::Device };
        self.hub.next_notification(side)
    }

    /// As [`PvManager::next_notification`], but restricted to PVs whose name satisfies
    /// `predicate`; other pending notifications are left in the hub untouched.
    pub fn next_notification_matching(&self, control_side: bool, predicate: impl Fn(&str) -> bool) -> Option<Arc<dyn Pv>> {
        let side = if control_side { Side::ControlSystem } else { Side::Device };
        self.hub.next_notification_matching(side, predicate)
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn persistence(&self) -> Option<Arc<PersistenceOverlay>> {
        self.persistence.lock().expect("registry lock poisoned").clone()
    }
}
