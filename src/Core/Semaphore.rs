// Counting semaphore on top of the futex word.

use super::futex::{futex_wait, futex_wake};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Counting semaphore used for synchronous completions and dispatcher start-up.
///
/// `post` may run on any thread, before or after the waiter arrives; a post
/// that happens first is never lost.
pub struct Semaphore {
    permits: AtomicU32,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            permits: AtomicU32::new(initial),
        }
    }

    pub fn post(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        futex_wake(&self.permits, 1);
    }

    /// Takes a permit if one is available without blocking.
    pub fn try_wait(&self) -> bool {
        let mut current = self.permits.load(Ordering::Acquire);
        while current > 0 {
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Blocks until a permit is available.
    pub fn wait(&self) {
        while !self.try_wait() {
            futex_wait(&self.permits, 0, None);
        }
    }

    /// Blocks for at most `timeout`. Returns false if no permit arrived.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        loop {
            if self.try_wait() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            futex_wait(&self.permits, 0, Some(deadline - now));
        }
    }

    pub fn available(&self) -> u32 {
        self.permits.load(Ordering::Acquire)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}
