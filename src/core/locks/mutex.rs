use crate::core::detector;
use crate::core::types::MutexId;
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};

/// A wrapper around a mutex that reports lock operations to the lock order debugger
///
/// The Mutex provides the same interface as a parking_lot mutex but reports
/// every acquisition and release to the installed debugger. Without an
/// installed debugger it behaves exactly like the wrapped mutex.
///
/// # Example
///
/// ```rust
/// use lockorder::Mutex;
/// use std::sync::Arc;
/// use std::thread;
///
/// let accounts = Arc::new(Mutex::named("accounts", 42));
/// let accounts_clone = Arc::clone(&accounts);
///
/// thread::spawn(move || {
///     *accounts_clone.lock() += 1;
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(*accounts.lock(), 43);
/// ```
pub struct Mutex<T> {
    /// Identity reported to the debugger
    id: MutexId,
    /// The wrapped mutex
    inner: ParkingLotMutex<T>,
}

/// Guard for a Mutex, reports the release when dropped
pub struct MutexGuard<'a, T> {
    /// Lock that this guard is for
    id: MutexId,
    /// The inner MutexGuard
    guard: ParkingLotMutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new Mutex labelled "mutex" with a fresh identity
    pub fn new(value: T) -> Self {
        Self::named("mutex", value)
    }

    /// Create a new Mutex with a fresh identity and the given label
    ///
    /// The label is what diagnostics print and what a targeted pair matches.
    pub fn named(name: &'static str, value: T) -> Self {
        Self::with_id(MutexId::new(name), value)
    }

    /// Create a new Mutex reporting under an existing identity
    ///
    /// Useful with `MutexId::intern` when several wrappers stand for one
    /// logical lock.
    pub fn with_id(id: MutexId, value: T) -> Self {
        Mutex {
            id,
            inner: ParkingLotMutex::new(value),
        }
    }

    /// Get the identity of this mutex
    pub fn id(&self) -> MutexId {
        self.id
    }

    /// Acquire the lock, reporting the acquisition first
    ///
    /// If the acquisition breaks the established lock order, the debugger's
    /// violation callback runs before this blocks.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        detector::entering(self.id);
        let guard = self.inner.lock();
        MutexGuard { id: self.id, guard }
    }

    /// Try to acquire the lock without blocking
    ///
    /// Only a successful acquisition is reported.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        detector::entering(self.id);
        Some(MutexGuard { id: self.id, guard })
    }

    /// Consumes this mutex, returning the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// The mutable borrow statically guarantees no lock is held, so nothing is
    /// reported.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        detector::leaving(self.id);
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Mutex<T> {
        Mutex::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(t: T) -> Self {
        Mutex::new(t)
    }
}
