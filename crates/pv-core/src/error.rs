//! Error taxonomy: `LogicError` (caller contract violation) vs. `RuntimeError`
//! (environmental fault), per §7. Both are represented as variants of [`PvError`] rather
//! than as separate types, so call sites can propagate a single `Result<_, PvError>` while
//! still pattern-matching on [`PvError::is_logic_error`] / [`PvError::is_runtime_error`] when
//! the distinction matters to the caller.

use thiserror::Error;

use crate::version::VersionNumber;

/// The unified error type for every fallible operation in this crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PvError {
    #[error("PV '{name}' is not writeable")]
    NotWriteable { name: String },

    #[error("PV '{name}' is not readable")]
    NotReadable { name: String },

    #[error(
        "PV '{name}' initial payload length mismatch: declared length {expected}, got {actual}"
    )]
    LengthMismatch { name: String, expected: usize, actual: usize },

    #[error(
        "PV '{name}' local buffer no longer matches its declared length: expected {expected} elements, got {actual}"
    )]
    PayloadLengthCorruption { name: String, expected: usize, actual: usize },

    #[error(
        "PV '{name}' explicit version {attempted} is not strictly greater than the last used version {last}"
    )]
    NonMonotonicVersion {
        name: String,
        last: VersionNumber,
        attempted: VersionNumber,
    },

    #[error("PV '{name}' does not allow destructive writes (may-send-destructively flag not set)")]
    DestructiveWriteNotPermitted { name: String },

    #[error("bidirectional endpoint '{name}' rejects destructive writes")]
    BidirectionalDestructiveWrite { name: String },

    #[error("a PV named '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("PV '{name}' not found in the registry")]
    UnknownName { name: String },

    #[error("PV '{name}' type mismatch: registry holds a different element type")]
    TypeMismatch { name: String },

    #[error("numberOfBuffers must be >= 2, got {requested} for PV '{name}'")]
    QueueTooSmall { name: String, requested: usize },

    #[error(
        "persistent data storage may only be attached to the control-system side of bidirectional PV '{name}'"
    )]
    PersistenceOnWrongEndpoint { name: String },

    #[error("blocking read on PV '{name}' requires the wait_for_new_data flag")]
    BlockingReadNotPermitted { name: String },

    #[error("registry is read-only after hand-off; cannot register PV '{name}'")]
    RegistryFinalized { name: String },

    #[error("queue for PV '{name}' is exhausted beyond the lost-data contract")]
    QueueExhausted { name: String },

    #[error("failed to parse persistence file '{path}': {detail}")]
    PersistenceParseFailure { path: String, detail: String },

    #[error("failed to write persistence file '{path}': {detail}")]
    PersistenceWriteFailure { path: String, detail: String },
}

impl PvError {
    /// `true` for every variant that represents a caller contract violation (§7's
    /// `LogicError`): wrong role, duplicate name, type/length mismatch, non-monotone
    /// version, destructive write without the flag, persistence on the wrong endpoint.
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            PvError::NotWriteable { .. }
                | PvError::NotReadable { .. }
                | PvError::LengthMismatch { .. }
                | PvError::NonMonotonicVersion { .. }
                | PvError::DestructiveWriteNotPermitted { .. }
                | PvError::BidirectionalDestructiveWrite { .. }
                | PvError::DuplicateName { .. }
                | PvError::UnknownName { .. }
                | PvError::TypeMismatch { .. }
                | PvError::QueueTooSmall { .. }
                | PvError::PersistenceOnWrongEndpoint { .. }
                | PvError::BlockingReadNotPermitted { .. }
                | PvError::RegistryFinalized { .. }
        )
    }

    /// `true` for every variant that represents an environmental fault (§7's
    /// `RuntimeError`): the PV itself remains usable afterwards. `PayloadLengthCorruption`,
    /// `QueueExhausted` and the persistence failures fall here because none of them stem
    /// from an invalid argument at the call site that produced them.
    pub fn is_runtime_error(&self) -> bool {
        !self.is_logic_error()
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PvError>;
