//! Plain Sender/Receiver pair over one [`TransportQueue`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tracing::{trace, warn};

use crate::buffer::{Buffer, Validity};
use crate::error::{PvError, Result};
use crate::notify::NotifySlot;
use crate::persistence::PersistenceSink;
use crate::pv::Pv;
use crate::queue::TransportQueue;
use crate::scalar::{PvElement, ValueType};
use crate::timestamp::{TimeStampSource, Timestamp};
use crate::version::VersionNumber;

struct SenderState<T> {
    scratch: Buffer<T>,
    last_version: VersionNumber,
    last_timestamp: Timestamp,
    validity: Validity,
}

/// The write-only end of a unidirectional pair.
pub struct Sender<T: PvElement> {
    name: String,
    len: usize,
    queue: TransportQueue<T>,
    state: Mutex<SenderState<T>>,
    timestamp_source: Arc<dyn TimeStampSource>,
    may_send_destructively: bool,
    notify: NotifySlot,
    persistence: Mutex<Option<Arc<dyn PersistenceSink<T>>>>,
}

impl<T: PvElement> Sender<T> {
    pub fn new(
        name: impl Into<String>,
        len: usize,
        queue: TransportQueue<T>,
        timestamp_source: Arc<dyn TimeStampSource>,
        may_send_destructively: bool,
        notify: NotifySlot,
    ) -> Self {
        Self {
            name: name.into(),
            len,
            queue,
            state: Mutex::new(SenderState {
                scratch: Buffer::empty(len),
                last_version: VersionNumber::default(),
                last_timestamp: Timestamp::default(),
                validity: Validity::Ok,
            }),
            timestamp_source,
            may_send_destructively,
            notify,
            persistence: Mutex::new(None),
        }
    }

    /// Attaches a persistence sink; every subsequent successful write is recorded into it.
    pub fn attach_persistence(&self, sink: Arc<dyn PersistenceSink<T>>) {
        *self.persistence.lock().expect("sender lock poisoned") = Some(sink);
    }

    pub fn set_data_validity(&self, validity: Validity) {
        self.state.lock().expect("sender lock poisoned").validity = validity;
    }

    /// Writes `payload`, generating a fresh version and timestamp. Returns `true` if this
    /// write overwrote data the receiver had not yet consumed.
    pub fn write(&self, payload: &[T]) -> Result<bool> {
        self.write_with_version(payload, VersionNumber::new())
    }

    /// Writes `payload` with an explicit version, which must be strictly greater than the
    /// version used by the last write on this sender.
    pub fn write_with_version(&self, payload: &[T], version: VersionNumber) -> Result<bool> {
        self.check_length(payload.len())?;
        let timestamp = self.timestamp_source.current_timestamp();
        let mut state = self.state.lock().expect("sender lock poisoned");
        self.check_monotonic(&state, version)?;

        state.scratch.copy_from_slice(payload);
        state.scratch.stamp(timestamp, version, state.validity);
        let lost = self.queue.push_overwrite(&mut state.scratch);
        state.last_version = version;
        state.last_timestamp = timestamp;
        drop(state);

        if let Some(sink) = self.persistence.lock().expect("sender lock poisoned").as_ref() {
            sink.record(&self.name, payload);
        }
        if lost {
            warn!(name = %self.name, "push_overwrite discarded undelivered data");
        }
        self.notify.fire();
        Ok(lost)
    }

    /// Moves `payload` into the transport instead of cloning it. Requires the sender to have
    /// been created with `may_send_destructively`; after this call `payload`'s contents are
    /// unspecified.
    pub fn write_destructively(&self, payload: &mut Vec<T>) -> Result<bool> {
        let timestamp = self.timestamp_source.current_timestamp();
        self.write_destructively_with(payload, timestamp, VersionNumber::new())
    }

    pub fn write_destructively_with(
        &self,
        payload: &mut Vec<T>,
        timestamp: Timestamp,
        version: VersionNumber,
    ) -> Result<bool> {
        if !self.may_send_destructively {
            return Err(PvError::DestructiveWriteNotPermitted { name: self.name.clone() });
        }
        self.check_length(payload.len())?;
        let mut state = self.state.lock().expect("sender lock poisoned");
        self.check_monotonic(&state, version)?;

        state.scratch.swap_payload(payload);
        state.scratch.stamp(timestamp, version, state.validity);
        if let Some(sink) = self.persistence.lock().expect("sender lock poisoned").as_ref() {
            sink.record(&self.name, state.scratch.payload());
        }
        let lost = self.queue.push_overwrite(&mut state.scratch);
        state.last_version = version;
        state.last_timestamp = timestamp;
        drop(state);

        if lost {
            warn!(name = %self.name, "destructive push_overwrite discarded undelivered data");
        }
        self.notify.fire();
        Ok(lost)
    }

    fn check_length(&self, actual: usize) -> Result<()> {
        if actual != self.len {
            return Err(PvError::PayloadLengthCorruption { name: self.name.clone(), expected: self.len, actual });
        }
        Ok(())
    }

    fn check_monotonic(&self, state: &SenderState<T>, version: VersionNumber) -> Result<()> {
        if version <= state.last_version {
            return Err(PvError::NonMonotonicVersion {
                name: self.name.clone(),
                last: state.last_version,
                attempted: version,
            });
        }
        Ok(())
    }
}

impl<T: PvElement> Pv for Sender<T> {
    fn name(&self) -> &str {
        &self.name
    }
    fn value_type(&self) -> ValueType {
        T::VALUE_TYPE
    }
    fn number_of_samples(&self) -> usize {
        self.len
    }
    fn is_readable(&self) -> bool {
        false
    }
    fn is_writeable(&self) -> bool {
        true
    }
    fn get_timestamp(&self) -> Timestamp {
        self.state.lock().expect("sender lock poisoned").last_timestamp
    }
    fn get_version_number(&self) -> VersionNumber {
        self.state.lock().expect("sender lock poisoned").last_version
    }
    fn data_validity(&self) -> Validity {
        self.state.lock().expect("sender lock poisoned").validity
    }
    fn read_non_blocking(&self) -> bool {
        false
    }
    fn role(&self) -> crate::pv::PvRole {
        crate::pv::PvRole::Sender
    }
}

/// The read-only end of a unidirectional pair.
pub struct Receiver<T: PvElement> {
    name: String,
    len: usize,
    queue: TransportQueue<T>,
    current: Mutex<Buffer<T>>,
    wait_for_new_data: bool,
}

impl<T: PvElement> Receiver<T> {
    pub fn new(name: impl Into<String>, len: usize, queue: TransportQueue<T>, wait_for_new_data: bool) -> Self {
        Self {
            name: name.into(),
            len,
            queue,
            current: Mutex::new(Buffer::empty(len)),
            wait_for_new_data,
        }
    }

    /// Seeds the receiver's local buffer without going through the queue — used by the
    /// registry to give poll-only receivers an initial value before first use (§4.5).
    pub fn seed(&self, payload: &[T], timestamp: Timestamp, version: VersionNumber, validity: Validity) {
        let mut current = self.current.lock().expect("receiver lock poisoned");
        current.copy_from_slice(payload);
        current.stamp(timestamp, version, validity);
    }

    /// Non-blocking pop. Returns `true` iff a new value was delivered.
    pub fn read_non_blocking(&self) -> bool {
        let mut current = self.current.lock().expect("receiver lock poisoned");
        self.queue.pop(&mut current)
    }

    /// Blocks until a value arrives or the queue is cancelled. Disallowed on poll-only
    /// receivers (those created without `wait_for_new_data`).
    pub fn read(&self) -> Result<bool> {
        if !self.wait_for_new_data {
            return Err(PvError::BlockingReadNotPermitted { name: self.name.clone() });
        }
        let mut current = self.current.lock().expect("receiver lock poisoned");
        Ok(self.queue.pop_wait(&mut current, None))
    }

    /// Drains every pending value, keeping only the most recent. Returns `true` iff at least
    /// one value was consumed.
    pub fn read_latest(&self) -> bool {
        let mut current = self.current.lock().expect("receiver lock poisoned");
        let mut consumed = false;
        while self.queue.pop(&mut current) {
            consumed = true;
        }
        consumed
    }

    /// Returns a future that resolves the next time data is available, polling via the
    /// Transport Queue's waker registration rather than busy-looping.
    pub fn read_async(&self) -> ReadAsync<'_, T> {
        ReadAsync { receiver: self }
    }

    pub fn payload(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.current.lock().expect("receiver lock poisoned").payload().to_vec()
    }

    pub fn cancel(&self) {
        self.queue.cancel();
    }
}

impl<T: PvElement> Pv for Receiver<T> {
    fn name(&self) -> &str {
        &self.name
    }
    fn value_type(&self) -> ValueType {
        T::VALUE_TYPE
    }
    fn number_of_samples(&self) -> usize {
        self.len
    }
    fn is_readable(&self) -> bool {
        true
    }
    fn is_writeable(&self) -> bool {
        false
    }
    fn get_timestamp(&self) -> Timestamp {
        self.current.lock().expect("receiver lock poisoned").timestamp()
    }
    fn get_version_number(&self) -> VersionNumber {
        self.current.lock().expect("receiver lock poisoned").version()
    }
    fn data_validity(&self) -> Validity {
        self.current.lock().expect("receiver lock poisoned").validity()
    }
    fn read_non_blocking(&self) -> bool {
        Receiver::read_non_blocking(self)
    }
    fn role(&self) -> crate::pv::PvRole {
        crate::pv::PvRole::Receiver
    }
}

/// Future returned by [`Receiver::read_async`].
pub struct ReadAsync<'a, T: PvElement> {
    receiver: &'a Receiver<T>,
}

impl<'a, T: PvElement> Future for ReadAsync<'a, T> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        if self.receiver.read_non_blocking() {
            trace!(name = %self.receiver.name, "readAsync resolved without waiting");
            return Poll::Ready(true);
        }
        self.receiver.queue.register_waker(cx.waker().clone());
        // Re-check after registering: a push between the first check and registration would
        // otherwise be missed until some later, unrelated wake.
        if self.receiver.read_non_blocking() {
            return Poll::Ready(true);
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationHub, Side};
    use crate::timestamp::MockTimeStampSource;

    fn make_pair(capacity: usize) -> (Sender<i32>, Arc<Receiver<i32>>) {
        let queue = TransportQueue::<i32>::new(capacity, 1);
        let receiver = Arc::new(Receiver::new("x", 1, queue.clone(), true));
        let hub = Arc::new(NotificationHub::new());
        let latch = NotificationHub::make_latch();
        let notify = NotifySlot::new(hub, Side::Device, latch, receiver.clone());
        let sender = Sender::new("x", 1, queue, Arc::new(MockTimeStampSource::new()), false, notify);
        (sender, receiver)
    }

    #[test]
    fn scalar_round_trip_matches_documented_example() {
        let (sender, receiver) = make_pair(2);
        for v in [42, 43, 44] {
            assert!(!sender.write(&[v]).unwrap());
        }
        let mut seen = Vec::new();
        while receiver.read_non_blocking() {
            seen.push(receiver.payload()[0]);
        }
        assert_eq!(seen, vec![42, 43, 44]);
    }

    #[test]
    fn write_rejects_length_mismatch() {
        let (sender, _receiver) = make_pair(2);
        let err = sender.write(&[1, 2]).unwrap_err();
        assert!(matches!(err, PvError::PayloadLengthCorruption { .. }));
        assert!(err.is_runtime_error());
    }

    #[test]
    fn explicit_version_must_be_strictly_increasing() {
        let (sender, _receiver) = make_pair(2);
        let v1 = VersionNumber::new();
        sender.write_with_version(&[1], v1).unwrap();
        let err = sender.write_with_version(&[2], v1).unwrap_err();
        assert!(matches!(err, PvError::NonMonotonicVersion { .. }));
    }

    #[test]
    fn destructive_write_requires_the_flag() {
        let queue = TransportQueue::<i32>::new(2, 1);
        let receiver = Arc::new(Receiver::new("x", 1, queue.clone(), true));
        let hub = Arc::new(NotificationHub::new());
        let notify = NotifySlot::new(hub, Side::Device, NotificationHub::make_latch(), receiver);
        let sender = Sender::new("x", 1, queue, Arc::new(MockTimeStampSource::new()), false, notify);

        let mut payload = vec![1];
        let err = sender.write_destructively(&mut payload).unwrap_err();
        assert!(matches!(err, PvError::DestructiveWriteNotPermitted { .. }));
    }

    #[test]
    fn read_latest_collapses_to_most_recent_and_drains_queue() {
        let (sender, receiver) = make_pair(2);
        for v in 1..=9 {
            sender.write(&[v]).unwrap();
        }
        assert!(receiver.read_latest());
        assert_eq!(receiver.payload(), vec![9]);
        assert!(!receiver.read_non_blocking());
    }

    #[test]
    fn poll_only_receiver_rejects_blocking_read() {
        let queue = TransportQueue::<i32>::new(2, 1);
        let receiver = Receiver::new("x", 1, queue, false);
        let err = receiver.read().unwrap_err();
        assert!(matches!(err, PvError::BlockingReadNotPermitted { .. }));
    }

    #[test]
    fn data_validity_travels_with_the_buffer() {
        let (sender, receiver) = make_pair(2);
        assert_eq!(receiver.data_validity(), Validity::Faulty);
        sender.set_data_validity(Validity::Faulty);
        sender.write(&[1]).unwrap();
        assert!(receiver.read_non_blocking());
        assert_eq!(receiver.data_validity(), Validity::Faulty);

        sender.set_data_validity(Validity::Ok);
        sender.write(&[2]).unwrap();
        assert!(receiver.read_non_blocking());
        assert_eq!(receiver.data_validity(), Validity::Ok);
    }
}
