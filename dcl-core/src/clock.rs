//! The clock synchronization helper is explicitly an external collaborator
//! (spec.md §1 "Deliberately out of scope"). What the runtime itself
//! requires is a way to stamp profiling timestamps (§3 "Remote event") and
//! data-transfer submit/start/end times (§3 "Data transfer") that are at
//! least comparable across nodes running the real collaborator. `Clock` is
//! the seam: a `LocalClock` is provided so the runtime runs standalone, and
//! a real deployment plugs in its own synchronized implementation.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Nanoseconds since an epoch that is constant for the lifetime of a
    /// cluster. Must be monotonically non-decreasing on a single process.
    fn now_nanos(&self) -> u64;
}

/// Wall-clock based implementation good enough for a single machine or for
/// development; a production deployment is expected to substitute an
/// implementation backed by the (unspecified) cluster-wide sync protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now_nanos(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_nanos() as u64
    }
}

pub fn shared_local_clock() -> Arc<dyn Clock> {
    Arc::new(LocalClock)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_clock_is_non_decreasing() {
        let clock = LocalClock;
        let a = clock.now_nanos();
        let b = clock.now_nanos();
        assert!(b >= a);
    }
}
