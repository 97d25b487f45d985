// Reference-counted lifecycle shared by dispatchers, nodes and remote services.

use crate::config::MAX_REF_COUNT;
use crossbeam_utils::CachePadded;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle status of a shared object. Ordering matters: new references are
/// only handed out while the status is at most `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ObjectStatus {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    ToDestroy = 4,
}

impl ObjectStatus {
    fn from_bits(bits: u64) -> Self {
        match bits {
            0 => ObjectStatus::Stopped,
            1 => ObjectStatus::Starting,
            2 => ObjectStatus::Running,
            3 => ObjectStatus::Stopping,
            _ => ObjectStatus::ToDestroy,
        }
    }
}

const STATUS_SHIFT: u32 = 32;
const COUNT_MASK: u64 = 0xFFFF_FFFF;

#[inline]
fn pack(status: ObjectStatus, count: u32) -> u64 {
    ((status as u64) << STATUS_SHIFT) | count as u64
}

#[inline]
fn unpack(word: u64) -> (ObjectStatus, u32) {
    (
        ObjectStatus::from_bits(word >> STATUS_SHIFT),
        (word & COUNT_MASK) as u32,
    )
}

/// Status and reference count packed into one atomic word, so the
/// "refuse new owners once teardown started" check and the increment are a
/// single compare-and-swap.
pub struct SharedHeader {
    state: CachePadded<AtomicU64>,
    max_refs: u32,
}

impl SharedHeader {
    /// A header in `Stopped` with the creation reference already counted.
    pub fn new() -> Self {
        Self::with_max_refs(MAX_REF_COUNT)
    }

    pub fn with_max_refs(max_refs: u32) -> Self {
        Self {
            state: CachePadded::new(AtomicU64::new(pack(ObjectStatus::Stopped, 1))),
            max_refs: max_refs.max(1),
        }
    }

    pub fn status(&self) -> ObjectStatus {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    pub fn ref_count(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).1
    }

    /// Moves to `to` only if the current status is `from`.
    pub fn transition(&self, from: ObjectStatus, to: ObjectStatus) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (status, count) = unpack(current);
            if status != from {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                pack(to, count),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Unconditionally sets the status, keeping the count. `ToDestroy` is sticky.
    pub fn set_status(&self, to: ObjectStatus) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (status, count) = unpack(current);
            if status == ObjectStatus::ToDestroy {
                return;
            }
            match self.state.compare_exchange_weak(
                current,
                pack(to, count),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn try_acquire(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (status, count) = unpack(current);
            if status > ObjectStatus::Running || count == 0 || count >= self.max_refs {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                pack(status, count + 1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns true when this call released the last reference.
    fn release(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (status, count) = unpack(current);
            debug_assert!(count > 0, "shared object released more often than referenced");
            if count == 0 {
                return false;
            }
            let next = if count == 1 {
                pack(ObjectStatus::ToDestroy, 0)
            } else {
                pack(status, count - 1)
            };
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return count == 1,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SharedHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented by every object managed through [`SharedRef`].
pub trait Lifecycle: Send + Sync + 'static {
    fn header(&self) -> &SharedHeader;

    /// Runs exactly once, when the last reference is released.
    fn destroy(&self) {}
}

/// One counted reference to a shared object.
///
/// Dropping the handle is `Disref`; [`SharedRef::try_ref`] is `Ref`. There is
/// deliberately no `Clone`: acquiring a new owner can fail.
pub struct SharedRef<T: ?Sized + Lifecycle> {
    inner: Arc<T>,
}

impl<T: Lifecycle> SharedRef<T> {
    pub fn new(object: T) -> Self {
        Self {
            inner: Arc::new(object),
        }
    }
}

impl<T: ?Sized + Lifecycle> SharedRef<T> {
    /// Takes over the creation reference of a boxed object. Unsized objects
    /// (`Box<dyn MessageNode>`) enter through here.
    pub fn from_box(object: Box<T>) -> Self {
        Self {
            inner: Arc::from(object),
        }
    }

    /// Acquires another reference, or `None` if the object is shutting down
    /// or saturated.
    pub fn try_ref(&self) -> Option<Self> {
        if self.inner.header().try_acquire() {
            Some(Self {
                inner: Arc::clone(&self.inner),
            })
        } else {
            None
        }
    }

    pub fn status(&self) -> ObjectStatus {
        self.inner.header().status()
    }

    pub fn ref_count(&self) -> u32 {
        self.inner.header().ref_count()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: ?Sized + Lifecycle> Deref for SharedRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized + Lifecycle> Drop for SharedRef<T> {
    fn drop(&mut self) {
        if self.inner.header().release() {
            self.inner.destroy();
        }
    }
}

impl std::fmt::Debug for SharedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_shared_header(self, f)
    }
}

impl<T: ?Sized + Lifecycle + std::fmt::Debug> std::fmt::Debug for SharedRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.inner, f)
    }
}
