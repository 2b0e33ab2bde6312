//! Process-wide monotonic version numbers.
//!
//! Every [`Buffer`](crate::buffer::Buffer) carries one [`VersionNumber`]. Generation is the
//! only mutating operation; once created a version is an immutable, totally ordered token.
//! Comparisons are the only exposed operation beyond generation — there is deliberately no
//! way to read the underlying integer back out, so callers cannot accidentally depend on its
//! magnitude or try to reconstruct one from a raw value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// A process-wide, monotonically increasing, totally ordered token attached to every update.
///
/// Equality means "same logical update" — two [`Buffer`](crate::buffer::Buffer)s carrying
/// equal versions are the same write observed twice. [`VersionNumber::default`] is the
/// smallest possible value, strictly less than every version produced by [`VersionNumber::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber(u64);

impl VersionNumber {
    /// Generates a new version number, strictly greater than every version generated so far
    /// in this process. Safe to call concurrently from any number of threads.
    pub fn new() -> Self {
        Self(NEXT_VERSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for VersionNumber {
    /// The smallest possible version, smaller than any version returned by [`VersionNumber::new`].
    fn default() -> Self {
        Self(0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_smaller_than_any_generated_version() {
        let generated = VersionNumber::new();
        assert!(VersionNumber::default() < generated);
    }

    #[test]
    fn successive_generations_strictly_increase() {
        let a = VersionNumber::new();
        let b = VersionNumber::new();
        assert!(b > a);
    }

    #[test]
    fn equality_means_same_update() {
        let a = VersionNumber::new();
        let copy = a;
        assert_eq!(a, copy);
    }

    #[test]
    fn concurrent_generation_is_unique_and_total_order() {
        use std::collections::HashSet;
        use std::thread;

        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..256).map(|_| VersionNumber::new()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for version in handle.join().unwrap() {
                assert!(all.insert(version), "version numbers must be unique across threads");
            }
        }
    }
}
