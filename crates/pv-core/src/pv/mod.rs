//! Process variables: the named, typed, fixed-length accessors that sit on top of a
//! [`TransportQueue`](crate::queue::TransportQueue). [`unidirectional`] implements the plain
//! Sender/Receiver pair; [`bidirectional`] glues two of those together with the causality
//! filter that prevents echo.

pub mod bidirectional;
pub mod unidirectional;

use crate::buffer::Validity;
use crate::scalar::ValueType;
use crate::timestamp::Timestamp;
use crate::version::VersionNumber;

/// The role a PV endpoint was created with, fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PvRole {
    Sender,
    Receiver,
    SenderReceiver,
}

/// The untyped surface every PV endpoint exposes, independent of its element type — used by
/// the registry's `getProcessVariable` and by the Sync Utility to iterate heterogeneous
/// collections of PVs without knowing `T`.
pub trait Pv: Send + Sync {
    fn name(&self) -> &str;
    fn value_type(&self) -> ValueType;
    fn number_of_samples(&self) -> usize;
    fn is_readable(&self) -> bool;
    fn is_writeable(&self) -> bool;
    fn is_read_only(&self) -> bool {
        self.is_readable() && !self.is_writeable()
    }
    fn get_timestamp(&self) -> Timestamp;
    fn get_version_number(&self) -> VersionNumber;
    fn data_validity(&self) -> Validity;
    /// Drains one pending value into this endpoint's current buffer without blocking.
    /// Returns `false` once nothing is left to drain (or for a non-readable endpoint).
    fn read_non_blocking(&self) -> bool;
    /// The role this endpoint was created with, fixed for its lifetime.
    fn role(&self) -> PvRole;
}
