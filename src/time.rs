//! Time source used by every blocking wait in the stack.
//!
//! All waits in this crate are bounded: a [`Deadline`] is taken from a
//! [`Clock`] and the caller sleeps in short steps through the clock's
//! [`DelayNs`] implementation until data arrives or the deadline passes.

use embedded_hal::delay::DelayNs;

/// A monotonic millisecond clock that can also sleep.
///
/// Implementations are typically a thin wrapper over a hardware timer. The
/// value returned by [`now_ms`](Clock::now_ms) must never go backwards.
///
/// # Examples
///
/// ```rust
/// use embedded_hal::delay::DelayNs;
/// use libcellular::time::Clock;
///
/// struct TickClock {
///     ticks_ms: u64,
/// }
///
/// impl DelayNs for TickClock {
///     fn delay_ns(&mut self, ns: u32) {
///         self.ticks_ms += u64::from(ns / 1_000_000);
///     }
/// }
///
/// impl Clock for TickClock {
///     fn now_ms(&self) -> u64 {
///         self.ticks_ms
///     }
/// }
/// ```
pub trait Clock: DelayNs {
    /// Milliseconds elapsed since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

/// A point in time after which a wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at_ms: u64,
}

impl Deadline {
    /// A deadline `timeout_ms` milliseconds from now.
    pub fn after<C: Clock + ?Sized>(clock: &C, timeout_ms: u32) -> Self {
        Self {
            expires_at_ms: clock.now_ms().saturating_add(u64::from(timeout_ms)),
        }
    }

    /// Whether the deadline has passed.
    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now_ms() >= self.expires_at_ms
    }

    /// Milliseconds left before expiry, zero once expired.
    pub fn remaining_ms<C: Clock + ?Sized>(&self, clock: &C) -> u64 {
        self.expires_at_ms.saturating_sub(clock.now_ms())
    }
}

/// [`Clock`] backed by `std::time::Instant` and `std::thread::sleep`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Create a clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
