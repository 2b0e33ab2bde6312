//! Timestamps and the pluggable time sources that mint them.
//!
//! A [`Timestamp`] is the four-field value the original wire format uses: seconds and
//! nanoseconds since the epoch, plus two disambiguating indices for updates that land within
//! the same clock tick. [`TimeStampSource`] is the seam that lets a PV pair either ride the
//! system clock or accept an externally driven source (useful for hardware time bases and for
//! deterministic tests).

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// `{seconds, nanoseconds, index0, index1}`, all 32-bit unsigned. Equality compares all four
/// fields. The default timestamp is all-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: u32,
    pub nanoseconds: u32,
    pub index0: u32,
    pub index1: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, nanoseconds: u32, index0: u32, index1: u32) -> Self {
        Self { seconds, nanoseconds, index0, index1 }
    }
}

/// A source of [`Timestamp`]s. Implementations must guarantee that the timestamps they
/// return are non-decreasing across successive calls from the same source instance; they
/// need not be strictly increasing (two updates in the same tick may tie, distinguished only
/// by `index0`/`index1` if the implementation chooses to use them).
pub trait TimeStampSource: Send + Sync {
    fn current_timestamp(&self) -> Timestamp;
}

/// The default time source: wall-clock time, made non-decreasing by clamping against the
/// last value handed out. A real-time clock can jump backwards (NTP step, VM migration); this
/// guards the one invariant PV pairs actually depend on without pretending to fix the clock.
#[derive(Debug, Default)]
pub struct SystemTimeStampSource {
    last: Mutex<Timestamp>,
}

impl SystemTimeStampSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeStampSource for SystemTimeStampSource {
    fn current_timestamp(&self) -> Timestamp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let candidate = Timestamp::new(now.as_secs() as u32, now.subsec_nanos(), 0, 0);

        let mut last = self.last.lock().expect("system timestamp source lock poisoned");
        let next = if candidate.seconds > last.seconds
            || (candidate.seconds == last.seconds && candidate.nanoseconds > last.nanoseconds)
        {
            candidate
        } else {
            // Clock did not advance (or went backwards): stay at the last value but bump
            // index0 so two updates landing in the same instant remain distinguishable.
            Timestamp { index0: last.index0.wrapping_add(1), ..*last }
        };
        *last = next;
        next
    }
}

/// A manually driven time source for deterministic tests: returns whatever was last set via
/// [`MockTimeStampSource::set`], starting at the zero timestamp.
#[derive(Debug, Default)]
pub struct MockTimeStampSource {
    current: Mutex<Timestamp>,
}

impl MockTimeStampSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timestamp returned by subsequent calls. Panics if `value` would move the
    /// source backwards, since that would violate the non-decreasing contract every
    /// `TimeStampSource` must uphold.
    pub fn set(&self, value: Timestamp) {
        let mut current = self.current.lock().expect("mock timestamp source lock poisoned");
        assert!(
            value >= *current,
            "MockTimeStampSource must be non-decreasing: {value:?} < {current:?}"
        );
        *current = value;
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.seconds, self.nanoseconds, self.index0, self.index1).cmp(&(
            other.seconds,
            other.nanoseconds,
            other.index0,
            other.index1,
        ))
    }
}

impl TimeStampSource for MockTimeStampSource {
    fn current_timestamp(&self) -> Timestamp {
        *self.current.lock().expect("mock timestamp source lock poisoned")
    }
}
