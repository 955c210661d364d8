//! Safe wrappers over the platform lock
//!
//! [`LockGuard`] pairs `acquire` with `release` on every exit path.
//! [`LockCell`] makes the platform lock the sole owner of the data it
//! protects, so mailbox state is only reachable while the lock is held.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::platform::Lock;

/// Holds a platform lock until dropped
pub struct LockGuard<'a, L: Lock> {
    lock: &'a L,
}

impl<'a, L: Lock> LockGuard<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.acquire();
        Self { lock }
    }

    /// The underlying lock, e.g. to pass to a condition wait
    pub fn lock(&self) -> &'a L {
        self.lock
    }
}

impl<L: Lock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Data owned by a platform lock
pub struct LockCell<L: Lock, T> {
    lock: L,
    value: UnsafeCell<T>,
}

// SAFETY: `value` is only reachable through a `LockCellGuard`, which exists
// only while `lock` is held.
unsafe impl<L: Lock, T: Send> Sync for LockCell<L, T> {}
unsafe impl<L: Lock, T: Send> Send for LockCell<L, T> {}

impl<L: Lock, T> LockCell<L, T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: L::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock (may block)
    pub fn lock(&self) -> LockCellGuard<'_, L, T> {
        self.lock.acquire();
        LockCellGuard { cell: self }
    }
}

/// Exclusive access to a [`LockCell`]
pub struct LockCellGuard<'a, L: Lock, T> {
    cell: &'a LockCell<L, T>,
}

impl<L: Lock, T> Deref for LockCellGuard<'_, L, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock
        unsafe { &*self.cell.value.get() }
    }
}

impl<L: Lock, T> DerefMut for LockCellGuard<'_, L, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, and `&mut self` rules out a
        // second borrow through this guard
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<L: Lock, T> Drop for LockCellGuard<'_, L, T> {
    fn drop(&mut self) {
        self.cell.lock.release();
    }
}
