use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds, the unit every manager's time-proportional math (spec
/// §3's `Settlement.time`, §4.3's mint schedule `last_mint`) is expressed in.
pub type Seconds = i64;

/// One calendar day in seconds — the alignment unit for order `end` times
/// (spec §4.3: "`end` is aligned to 86 400 seconds").
pub const DAY_SECONDS: Seconds = 86_400;

/// A pluggable source of wall-clock time.
///
/// Grounded on the teacher pack's `ChainEpochClock` (ChainSafe/forest's
/// `node/clock`), which wraps a genesis time so epoch arithmetic is
/// deterministic and testable; here the abstraction is flattened to "what
/// time is it" since the settlement engine has no genesis/epoch concept of
/// its own (spec DESIGN NOTES: "the core spec treats wall-clock reads as a
/// pluggable `Clock` capability to make tests deterministic").
pub trait Clock: Send + Sync {
    fn now(&self) -> Seconds;
}

/// Reads the real OS clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Seconds {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as Seconds
    }
}

/// A clock that returns a fixed, mutable instant — used in tests to drive
/// scenarios like spec §8's "After `now >= end`, `sub_order` succeeds".
#[derive(Debug)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now: Seconds) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: Seconds) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Seconds) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Seconds {
        self.0.load(Ordering::SeqCst)
    }
}

/// Rounds `t` down to the start of its calendar day, in seconds.
pub fn day_floor(t: Seconds) -> Seconds {
    t.div_euclid(DAY_SECONDS) * DAY_SECONDS
}

/// True if `t` falls exactly on a day boundary.
pub fn is_day_aligned(t: Seconds) -> bool {
    t.rem_euclid(DAY_SECONDS) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let c = FixedClock::new(100);
        assert_eq!(c.now(), 100);
        c.advance(50);
        assert_eq!(c.now(), 150);
        c.set(0);
        assert_eq!(c.now(), 0);
    }

    #[test]
    fn day_alignment() {
        assert!(is_day_aligned(0));
        assert!(is_day_aligned(DAY_SECONDS * 3));
        assert!(!is_day_aligned(DAY_SECONDS + 1));
        assert_eq!(day_floor(DAY_SECONDS + 10), DAY_SECONDS);
    }
}
