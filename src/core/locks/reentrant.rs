use crate::core::detector;
use crate::core::types::MutexId;
use parking_lot::{
    ReentrantMutex as ParkingLotReentrantMutex,
    ReentrantMutexGuard as ParkingLotReentrantMutexGuard,
};
use std::ops::Deref;

/// Reentrant mutex reporting to the lock order debugger
///
/// Re-locking on the owning thread only raises the nesting count; it never
/// adds an ordering edge.
pub struct ReentrantMutex<T> {
    id: MutexId,
    inner: ParkingLotReentrantMutex<T>,
}

/// Guard for a ReentrantMutex, reports the release when dropped
pub struct ReentrantMutexGuard<'a, T> {
    id: MutexId,
    guard: ParkingLotReentrantMutexGuard<'a, T>,
}

impl<T> ReentrantMutex<T> {
    pub fn new(value: T) -> Self {
        Self::named("reentrant_mutex", value)
    }

    pub fn named(name: &'static str, value: T) -> Self {
        Self::with_id(MutexId::new(name), value)
    }

    pub fn with_id(id: MutexId, value: T) -> Self {
        ReentrantMutex {
            id,
            inner: ParkingLotReentrantMutex::new(value),
        }
    }

    pub fn id(&self) -> MutexId {
        self.id
    }

    pub fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        detector::entering(self.id);
        let guard = self.inner.lock();
        ReentrantMutexGuard { id: self.id, guard }
    }

    pub fn try_lock(&self) -> Option<ReentrantMutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        detector::entering(self.id);
        Some(ReentrantMutexGuard { id: self.id, guard })
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Deref for ReentrantMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> Drop for ReentrantMutexGuard<'_, T> {
    fn drop(&mut self) {
        detector::leaving(self.id);
    }
}

impl<T: Default> Default for ReentrantMutex<T> {
    fn default() -> Self {
        ReentrantMutex::new(Default::default())
    }
}
