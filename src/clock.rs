use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of "now" for issuance stamps and expiry checks.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.  Clones share the same instant.
///
/// ```rust
/// use chrono::Duration;
/// use jwt_issuer::{Clock, ManualClock};
///
/// let clock = ManualClock::from_millis(1_700_000_000_250);
/// clock.advance(Duration::milliseconds(750));
/// assert_eq!(clock.now().timestamp_millis(), 1_700_000_001_000);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self::from_millis(at.timestamp_millis())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move the clock by `by`, saturating instead of wrapping.
    pub fn advance(&self, by: Duration) {
        let delta = by.num_milliseconds();
        let _ = self
            .millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |millis| {
                Some(millis.saturating_add(delta))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().unwrap_or(if millis < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_instant() {
        let clock = ManualClock::from_millis(1_000);
        let other = clock.clone();
        clock.advance(Duration::seconds(2));
        assert_eq!(other.now().timestamp_millis(), 3_000);
    }

    #[test]
    fn set_overrides_current_instant() {
        let clock = ManualClock::from_millis(0);
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        clock.set(at);
        assert_eq!(clock.now(), at);
    }

    #[test]
    fn advance_saturates_at_the_ends() {
        let clock = ManualClock::from_millis(i64::MAX - 10);
        clock.advance(Duration::days(1));
        assert_eq!(clock.millis.load(Ordering::SeqCst), i64::MAX);
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);

        let clock = ManualClock::from_millis(i64::MIN + 10);
        clock.advance(Duration::days(-1));
        assert_eq!(clock.millis.load(Ordering::SeqCst), i64::MIN);
        assert_eq!(clock.now(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn system_clock_tracks_wall_time() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
