//! The unit of transfer between Sender and Receiver: a fixed-length payload plus the
//! timestamp, version and validity tag that travel with it.

use crate::timestamp::Timestamp;
use crate::version::VersionNumber;

/// Out-of-band data-validity tag. Carried with every [`Buffer`], set by producers, observed
/// by consumers, and never reset by a read — only a new arrival changes it (§7).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validity {
    Ok,
    #[default]
    Faulty,
}

/// Payload + timestamp + version + validity, moved by swap rather than copy.
///
/// `N`, the payload length, is fixed for the lifetime of the owning PV; every `Buffer` that
/// ever passes through a given Transport Queue has the same length so that swapping never
/// changes the shape of either side's local buffer.
#[derive(Clone, Debug)]
pub struct Buffer<T> {
    payload: Vec<T>,
    timestamp: Timestamp,
    version: VersionNumber,
    validity: Validity,
}

impl<T: Default + Clone> Buffer<T> {
    /// Creates a buffer of the given length, payload filled with `T::default()`, zero
    /// timestamp and version, and [`Validity::Faulty`] — the safe "nothing has arrived yet"
    /// state used to seed both the Transport Queue's preallocated slots and a fresh
    /// Receiver-side local buffer.
    pub fn empty(len: usize) -> Self {
        Self {
            payload: vec![T::default(); len],
            timestamp: Timestamp::default(),
            version: VersionNumber::default(),
            validity: Validity::Faulty,
        }
    }
}

impl<T> Buffer<T> {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &[T] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [T] {
        &mut self.payload
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn version(&self) -> VersionNumber {
        self.version
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn set_validity(&mut self, validity: Validity) {
        self.validity = validity;
    }

    /// Overwrites payload, timestamp, version and validity in place — used by the Sender
    /// side to stamp a user-supplied payload before it is swapped into the Transport Queue.
    pub fn stamp(&mut self, timestamp: Timestamp, version: VersionNumber, validity: Validity) {
        self.timestamp = timestamp;
        self.version = version;
        self.validity = validity;
    }

    /// Copies `src` into this buffer's payload. Panics if the lengths differ — the caller is
    /// expected to have already validated length via the PV's own length check, which raises
    /// a typed `RuntimeError` instead of panicking (see [`crate::error::PvError`]).
    pub fn copy_from_slice(&mut self, src: &[T])
    where
        T: Clone,
    {
        debug_assert_eq!(self.payload.len(), src.len());
        self.payload.clone_from_slice(src);
    }

    /// Swaps this buffer's payload with `other` in place, leaving `other` holding whatever
    /// this buffer held before the call. Used by destructive writes, which move the caller's
    /// vector into the transport rather than cloning it.
    pub fn swap_payload(&mut self, other: &mut Vec<T>) {
        std::mem::swap(&mut self.payload, other);
    }
}
