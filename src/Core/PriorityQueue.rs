// Bounded multi-level priority queue: the hand-off point between producer
// threads and a dispatcher's worker.

use crate::error::{RouterError, RouterResult};
use crate::config::Priority;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct Levels<T> {
    levels: Vec<VecDeque<T>>,
    len: usize,
    closed: bool,
}

/// Strict-priority, FIFO-within-level, bounded queue.
///
/// Level 0 is the highest priority. A lower level is only served once every
/// higher level is empty.
pub struct PriorityQueue<T> {
    inner: Mutex<Levels<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// Why a push did not take the item. The item is handed back.
pub struct PushError<T> {
    pub error: RouterError,
    pub item: T,
}

impl<T> PriorityQueue<T> {
    pub fn new(capacity: usize, level_count: u8) -> RouterResult<Self> {
        if capacity == 0 {
            return Err(RouterError::invalid("queue capacity must be non-zero"));
        }
        if level_count == 0 {
            return Err(RouterError::invalid("queue needs at least one priority level"));
        }

        let levels = (0..level_count).map(|_| VecDeque::new()).collect();
        Ok(Self {
            inner: Mutex::new(Levels {
                levels,
                len: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Appends `item` at `priority`, waiting up to `timeout` for room.
    /// `Duration::MAX` waits until there is room or the queue closes.
    pub fn push(&self, priority: Priority, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        let mut guard = self.inner.lock();
        let level = priority as usize;
        if level >= guard.levels.len() {
            return Err(PushError {
                error: RouterError::invalid("priority outside the queue's levels"),
                item,
            });
        }

        // a deadline past what Instant can hold means wait for room
        let deadline = Instant::now().checked_add(timeout);
        while guard.len >= self.capacity && !guard.closed {
            match deadline {
                Some(deadline) => {
                    if self.not_full.wait_until(&mut guard, deadline).timed_out() {
                        break;
                    }
                }
                None => self.not_full.wait(&mut guard),
            }
        }

        if guard.closed {
            return Err(PushError {
                error: RouterError::NotSupported,
                item,
            });
        }
        if guard.len >= self.capacity {
            return Err(PushError {
                error: RouterError::ResourceExhausted,
                item,
            });
        }

        guard.levels[level].push_back(item);
        guard.len += 1;
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item of the highest non-empty level, waiting up to
    /// `timeout`. Returns `None` on timeout, on [`wake`](Self::wake) or once closed and empty.
    pub fn pop(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.inner.lock();
        if guard.len == 0 && !guard.closed {
            match Instant::now().checked_add(timeout) {
                Some(deadline) => {
                    let _ = self.not_empty.wait_until(&mut guard, deadline);
                }
                None => self.not_empty.wait(&mut guard),
            }
        }

        let item = guard.levels.iter_mut().find_map(|level| level.pop_front());
        if item.is_some() {
            guard.len -= 1;
            drop(guard);
            self.not_full.notify_one();
        }
        item
    }

    /// Interrupts a blocked `pop` so its caller can re-check external state.
    pub fn wake(&self) {
        self.not_empty.notify_all();
    }

    /// Refuses every later push and wakes all waiters.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Takes every remaining item, highest priority first.
    pub fn drain(&self) -> Vec<T> {
        let mut guard = self.inner.lock();
        let mut items = Vec::with_capacity(guard.len);
        for level in guard.levels.iter_mut() {
            items.extend(level.drain(..));
        }
        guard.len = 0;
        drop(guard);
        self.not_full.notify_all();
        items
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn level_count(&self) -> u8 {
        self.inner.lock().levels.len() as u8
    }
}
