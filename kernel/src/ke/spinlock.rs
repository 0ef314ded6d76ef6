//! Kernel Spinlock
//!
//! Spinlocks provide mutual exclusion for the short critical sections of the
//! scheduler: the process table lock and any lock a caller hands to
//! [`Kernel::sleep`](crate::Kernel::sleep).
//!
//! Acquiring a spinlock disables interrupts on the current processor through
//! [`Processor::push_off`] and records the owning processor, so a second
//! acquisition by the same processor (a guaranteed deadlock) is caught as a
//! bug check instead of spinning forever.
//!
//! Ownership is per processor, not per call stack. The table lock is taken by
//! the scheduler and released by the process it switched to (and the other
//! way round), so a guard may be dropped on a different stack than the one
//! that created it. [`SpinLock::force_unlock`] covers the one case where the
//! releasing side has no guard at all: the first run of a new process.
//!
//! # Usage
//! ```
//! use prio_kernel::{Processor, SpinLock};
//! # use core::cell::Cell;
//! # struct Uniprocessor { depth: Cell<usize> }
//! # impl Processor for Uniprocessor {
//! #     fn cpu_id(&self) -> usize { 0 }
//! #     fn push_off(&self) { self.depth.set(self.depth.get() + 1) }
//! #     fn pop_off(&self) { self.depth.set(self.depth.get() - 1) }
//! # }
//! # let cpu = Uniprocessor { depth: Cell::new(0) };
//!
//! let lock = SpinLock::new("counter", 0u64);
//! {
//!     let mut guard = lock.lock(&cpu);
//!     *guard += 1;
//!     assert!(lock.holding(&cpu));
//! }
//! assert!(!lock.holding(&cpu));
//! ```

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use super::bugcheck::{bugcheck, codes};

/// Holder value while no processor owns the lock
const NO_HOLDER: usize = usize::MAX;

/// Per-processor services a spinlock needs
///
/// Implemented by [`Kernel`](crate::Kernel) on top of its processor control
/// blocks; tests may supply a trivial implementation.
pub trait Processor {
    /// Number of the executing processor
    ///
    /// Only stable while interrupts are disabled.
    fn cpu_id(&self) -> usize;

    /// Disable interrupts, nesting
    ///
    /// The first push remembers whether interrupts were enabled.
    fn push_off(&self);

    /// Undo one [`push_off`](Self::push_off)
    ///
    /// Interrupts come back on only when the outermost push is undone and
    /// they were enabled before it.
    fn pop_off(&self);
}

/// A spinlock for mutual exclusion
///
/// Equivalent to NT's KSPIN_LOCK, with owner tracking.
pub struct SpinLock<T> {
    /// Name for diagnostics
    name: &'static str,
    /// Processor currently holding the lock
    holder: AtomicUsize,
    inner: spin::Mutex<T>,
}

impl<T> SpinLock<T> {
    /// Create a new unlocked spinlock
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            holder: AtomicUsize::new(NO_HOLDER),
            inner: spin::Mutex::new(data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the spinlock, returning a guard that releases on drop
    ///
    /// Interrupts stay disabled on this processor while the lock is held.
    pub fn lock<'a>(&'a self, processor: &'a dyn Processor) -> SpinLockGuard<'a, T> {
        processor.push_off();

        let cpu = processor.cpu_id();
        if self.holding(processor) {
            log::error!("spinlock {}: already held by cpu {}", self.name, cpu);
            bugcheck(codes::SPIN_LOCK_ALREADY_OWNED, cpu as u64);
        }

        let inner = self.inner.lock();
        self.holder.store(cpu, Ordering::Relaxed);

        SpinLockGuard {
            lock: self,
            processor,
            inner: ManuallyDrop::new(inner),
        }
    }

    /// Check whether the executing processor holds the lock
    ///
    /// Meaningful only with interrupts disabled, like `cpu_id`.
    pub fn holding(&self, processor: &dyn Processor) -> bool {
        self.inner.is_locked() && self.holder.load(Ordering::Relaxed) == processor.cpu_id()
    }

    /// Check if the lock is currently held by any processor
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Release the lock held by `guard` and hand back the lock itself
    ///
    /// Used where the lock must be re-acquired later on, possibly after a
    /// context switch.
    pub fn unlock(guard: SpinLockGuard<'_, T>) -> &SpinLock<T> {
        let lock = guard.lock;
        drop(guard);
        lock
    }

    /// Release a lock this processor acquired through a guard that lives on
    /// another stack
    ///
    /// # Safety
    /// The caller must be on the processor that holds the lock, and the guard
    /// that acquired it must never be dropped afterwards.
    pub unsafe fn force_unlock(&self, processor: &dyn Processor) {
        if !self.holding(processor) {
            log::error!("spinlock {}: force release by non-owner", self.name);
            bugcheck(codes::SPIN_LOCK_NOT_OWNED, processor.cpu_id() as u64);
        }
        self.holder.store(NO_HOLDER, Ordering::Relaxed);
        // SAFETY: held by this processor, and the caller guarantees the
        // acquiring guard is abandoned.
        unsafe { self.inner.force_unlock() };
        processor.pop_off();
    }
}

/// RAII guard for spinlock
///
/// Releases the lock and pops the interrupt nesting when dropped.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    processor: &'a dyn Processor,
    inner: ManuallyDrop<spin::MutexGuard<'a, T>>,
}

impl<'a, T> SpinLockGuard<'a, T> {
    /// The lock this guard holds
    pub fn lock(&self) -> &'a SpinLock<T> {
        self.lock
    }
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        if !self.lock.holding(self.processor) {
            log::error!("spinlock {}: released by non-owner", self.lock.name);
            bugcheck(codes::SPIN_LOCK_NOT_OWNED, self.processor.cpu_id() as u64);
        }
        self.lock.holder.store(NO_HOLDER, Ordering::Relaxed);

        // SAFETY: dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.inner) };

        self.processor.pop_off();
    }
}
