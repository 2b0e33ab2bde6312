#![deny(unsafe_code)]
#![doc = "pv-core: the synchronization core of a control-system adapter."]
#![doc = ""]
#![doc = "Two independent execution domains — a real-time device/application side and a slower"]
#![doc = "control-system side — exchange typed, named process variables (PVs) through a bounded,"]
#![doc = "swap-transfer transport. This crate is exactly that transport, the version-number and"]
#![doc = "timestamp discipline that makes it safe to share, the bidirectional causality filter"]
#![doc = "that stops a write from echoing back to its own writer, the registry that wires names"]
#![doc = "to PV pairs, the notification hub that lets a consumer avoid polling every PV, and the"]
#![doc = "XML overlay that persists writeable values across restarts."]
#![doc = ""]
#![doc = "== Compatibility =="]
#![doc = "This crate follows SemVer 2.0. Breaking changes land only on a MAJOR bump; anything"]
#![doc = "exposed through [`prelude`] is part of the stable surface."]

/// Process-wide monotonic version numbers attached to every update.
pub mod version;

/// Timestamps and the pluggable clock sources that mint them.
pub mod timestamp;

/// The payload + timestamp + version + validity value moved across the transport by swap.
pub mod buffer;

/// The closed set of scalar element types a PV payload may hold.
pub mod scalar;

/// The error taxonomy (`LogicError`/`RuntimeError`, unified as [`error::PvError`]).
pub mod error;

/// The bounded single-producer/single-consumer queue at the heart of every PV pair.
pub mod queue;

/// Sender/Receiver and bidirectional PV endpoints built on top of a [`queue::TransportQueue`].
pub mod pv;

/// Edge-triggered, coalesced "some PV is pending" signaling between the two sides.
pub mod notify;

/// Names → PV pairs: the single point of creation and lookup.
pub mod registry;

/// XML-backed snapshot/restore of writeable PV payloads, keyed by application name.
pub mod persistence;

/// Per-thread convenience loop body: drain notifications, fan out reads/writes.
pub mod sync;

pub mod prelude;

pub use buffer::{Buffer, Validity};
pub use error::{PvError, Result};
pub use queue::TransportQueue;
pub use registry::{CreateFlags, Direction, PvManager};
pub use scalar::{PvElement, ValueType};
pub use timestamp::{SystemTimeStampSource, TimeStampSource, Timestamp};
pub use version::VersionNumber;
