//! Timestamp-derived nonces for code generation that does not depend on
//! storage write order.

use chrono::Utc;
use parking_lot::Mutex;

/// Time source for [`NonceGenerator`].
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hands out strictly increasing millisecond nonces.
///
/// The last value is kept under a mutex. A caller that reads the same
/// millisecond as the previous one, or an earlier one after the clock stepped
/// back, gets `last + 1` instead. Nonces run ahead of the clock during bursts
/// and the clock catches up once the burst ends. No call ever blocks on time.
pub struct NonceGenerator {
    clock: Box<dyn Clock>,
    last: Mutex<i64>,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: Mutex::new(i64::MIN),
        }
    }

    /// Returns the next nonce.
    pub fn next_nonce(&self) -> u64 {
        let now = self.clock.now_millis();
        let mut last = self.last.lock();

        let next = if now > *last { now } else { *last + 1 };
        *last = next;
        next.max(0) as u64
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
