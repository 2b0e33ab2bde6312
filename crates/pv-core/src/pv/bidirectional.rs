//! Bidirectional PV pair: two unidirectional pairs glued together with a causality filter
//! that prevents a value written on one endpoint from echoing back on itself forever.

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::buffer::{Buffer, Validity};
use crate::error::{PvError, Result};
use crate::persistence::PersistenceSink;
use crate::pv::unidirectional::{Receiver, Sender};
use crate::pv::Pv;
use crate::scalar::{PvElement, ValueType};
use crate::timestamp::Timestamp;
use crate::version::VersionNumber;

/// Which bidirectional endpoint, if either, may carry a persistence overlay. Named for what
/// each side is *granted* rather than what it is denied, unlike the flag in the system this
/// crate's contract was distilled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistenceRole {
    /// May have a [`PersistenceSink`] attached via [`BidirectionalEndpoint::attach_persistence`].
    ControlSystemSide,
    /// May not; attaching here is a `LogicError`.
    DeviceSide,
}

/// One endpoint of a bidirectional pair. Wraps an outgoing [`Sender`] and an incoming
/// [`Receiver`] from the two underlying unidirectional pairs, plus the causality filter state
/// that decides whether an arrived value should update this endpoint's publicly visible
/// buffer.
pub struct BidirectionalEndpoint<T: PvElement> {
    name: String,
    len: usize,
    sender: Sender<T>,
    receiver: Arc<Receiver<T>>,
    /// The endpoint's own current value, distinct from the `Receiver`'s internal buffer: a
    /// value the causality filter rejects must not become visible here, even though the
    /// `Receiver` has already consumed it from the queue.
    public: Mutex<Buffer<T>>,
    persistence_role: PersistenceRole,
    persistence: Mutex<Option<Arc<dyn PersistenceSink<T>>>>,
}

impl<T: PvElement> BidirectionalEndpoint<T> {
    pub fn new(
        name: impl Into<String>,
        len: usize,
        sender: Sender<T>,
        receiver: Arc<Receiver<T>>,
        persistence_role: PersistenceRole,
    ) -> Self {
        Self {
            name: name.into(),
            len,
            sender,
            receiver,
            public: Mutex::new(Buffer::empty(len)),
            persistence_role,
            persistence: Mutex::new(None),
        }
    }

    /// Seeds this endpoint's public buffer without going through the queue or the causality
    /// filter — used by the registry to give a freshly created bidirectional PV an initial
    /// value on both sides before either side has written anything.
    pub fn seed(&self, payload: &[T], validity: Validity) {
        let mut public = self.public.lock().expect("bidirectional endpoint lock poisoned");
        public.copy_from_slice(payload);
        public.set_validity(validity);
    }

    pub fn attach_persistence(&self, sink: Arc<dyn PersistenceSink<T>>) -> Result<()> {
        if self.persistence_role != PersistenceRole::ControlSystemSide {
            return Err(PvError::PersistenceOnWrongEndpoint { name: self.name.clone() });
        }
        *self.persistence.lock().expect("bidirectional endpoint lock poisoned") = Some(sink);
        Ok(())
    }

    /// Writes `payload`, adopting the freshly generated version and timestamp as this
    /// endpoint's own current value.
    pub fn write(&self, payload: &[T]) -> Result<bool> {
        let version = VersionNumber::new();
        let lost = self.sender.write_with_version(payload, version)?;
        let timestamp = self.sender.get_timestamp();
        let validity = self.sender.data_validity();

        let mut public = self.public.lock().expect("bidirectional endpoint lock poisoned");
        public.copy_from_slice(payload);
        public.stamp(timestamp, version, validity);
        drop(public);

        if let Some(sink) = self.persistence.lock().expect("bidirectional endpoint lock poisoned").as_ref() {
            sink.record(&self.name, payload);
        }
        Ok(lost)
    }

    /// Destructive writes are rejected on bidirectional endpoints: they would let the
    /// partner's echo defeat the causality filter's version bookkeeping.
    pub fn write_destructively(&self, _payload: &mut Vec<T>) -> Result<bool> {
        Err(PvError::BidirectionalDestructiveWrite { name: self.name.clone() })
    }

    pub fn read_non_blocking(&self) -> bool {
        if !self.receiver.read_non_blocking() {
            return false;
        }
        self.apply_causality_filter()
    }

    pub fn read(&self) -> Result<bool> {
        if !self.receiver.read()? {
            return Ok(false);
        }
        Ok(self.apply_causality_filter())
    }

    pub fn read_latest(&self) -> bool {
        if !self.receiver.read_latest() {
            return false;
        }
        self.apply_causality_filter()
    }

    /// Compares the value the `Receiver` just pulled off the queue against this endpoint's
    /// own version. Strictly newer: adopt it. Otherwise: discard, leaving `public` untouched.
    fn apply_causality_filter(&self) -> bool {
        let arrived_version = self.receiver.get_version_number();
        let mut public = self.public.lock().expect("bidirectional endpoint lock poisoned");
        if arrived_version <= public.version() {
            trace!(name = %self.name, "discarding stale/echoed arrival behind causality filter");
            return false;
        }
        let payload = self.receiver.payload();
        public.copy_from_slice(&payload);
        public.stamp(self.receiver.get_timestamp(), arrived_version, self.receiver.data_validity());
        drop(public);

        if let Some(sink) = self.persistence.lock().expect("bidirectional endpoint lock poisoned").as_ref() {
            sink.record(&self.name, &payload);
        }
        true
    }

    pub fn payload(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.public.lock().expect("bidirectional endpoint lock poisoned").payload().to_vec()
    }

    pub fn cancel(&self) {
        self.receiver.cancel();
    }
}

impl<T: PvElement> Pv for BidirectionalEndpoint<T> {
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
        true
    }
    fn get_timestamp(&self) -> Timestamp {
        self.public.lock().expect("bidirectional endpoint lock poisoned").timestamp()
    }
    fn get_version_number(&self) -> VersionNumber {
        self.public.lock().expect("bidirectional endpoint lock poisoned").version()
    }
    fn data_validity(&self) -> Validity {
        self.public.lock().expect("bidirectional endpoint lock poisoned").validity()
    }
    fn read_non_blocking(&self) -> bool {
        BidirectionalEndpoint::read_non_blocking(self)
    }
    fn role(&self) -> crate::pv::PvRole {
        crate::pv::PvRole::SenderReceiver
    }
}
