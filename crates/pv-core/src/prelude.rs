//! Convenience re-export of the types most call sites need.
//!
//! ```
//! use pv_core::prelude::*;
//! ```

pub use crate::buffer::{Buffer, Validity};
pub use crate::error::{PvError, Result};
pub use crate::notify::{NotificationHub, NotifySlot, Side};
pub use crate::persistence::{PersistenceOverlay, PersistenceSink};
pub use crate::pv::bidirectional::{BidirectionalEndpoint, PersistenceRole};
pub use crate::pv::unidirectional::{Receiver, Sender};
pub use crate::pv::{Pv, PvRole};
pub use crate::queue::TransportQueue;
pub use crate::registry::{CreateFlags, Direction, PvManager};
pub use crate::scalar::{PvElement, ValueType};
pub use crate::sync::SyncUtility;
pub use crate::timestamp::{MockTimeStampSource, SystemTimeStampSource, TimeStampSource, Timestamp};
pub use crate::version::VersionNumber;
