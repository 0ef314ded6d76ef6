//! Sleep and Wakeup
//!
//! A process blocks on a [`Channel`] and stays off every ready queue until
//! some other context calls [`Kernel::wakeup`] on the same channel, or until
//! it is killed.
//!
//! # No lost wakeups
//!
//! The sleeper checks its condition under some lock `lk` and then calls
//! [`Kernel::sleep`] with the guard. The table lock is taken before `lk` is
//! released, and wakeup needs the table lock, so a waker that changes the
//! condition under `lk` can only run its wakeup once the sleeper is
//! SLEEPING.

use crate::hal::Machine;
use crate::ps::{Channel, Pid, ProcError, ProcTable, Slot};

use super::kernel::{audit, Kernel};
use super::spinlock::{SpinLock, SpinLockGuard};

impl<M: Machine> Kernel<M> {
    /// Atomically release `guard` and block the current process on `chan`
    ///
    /// Returns `guard`'s lock re-acquired once the process runs again.
    /// Wakeups may be spurious; callers re-check their condition in a loop.
    pub fn sleep<'a, T>(&'a self, chan: Channel, guard: SpinLockGuard<'a, T>) -> SpinLockGuard<'a, T> {
        let slot = self.current_slot();

        let table = self.table.lock(self);
        let lk = SpinLock::unlock(guard);

        let table = self.sleep_locked(chan, table, slot);

        drop(table);
        lk.lock(self)
    }

    /// [`sleep`](Self::sleep) for a caller that already holds the table lock
    pub(crate) fn sleep_locked<'a>(
        &'a self,
        chan: Channel,
        mut table: SpinLockGuard<'a, ProcTable>,
        slot: Slot,
    ) -> SpinLockGuard<'a, ProcTable> {
        table.block(slot, chan);
        log::trace!("{} sleeps on {:?}", slot, chan);
        self.sched(table, slot)
    }

    /// Wake every process sleeping on `chan`
    ///
    /// Returns how many processes became RUNNABLE.
    pub fn wakeup(&self, chan: Channel) -> usize {
        let mut table = self.table.lock(self);
        let woken = table.wakeup(chan);
        if woken > 0 {
            audit(&table);
        }
        woken
    }

    /// Ask process `pid` to terminate
    ///
    /// The process exits the next time it passes a trap checkpoint; a sleeper
    /// is made RUNNABLE right away so it gets there.
    pub fn kill(&self, pid: Pid) -> Result<(), ProcError> {
        let mut table = self.table.lock(self);
        let slot = table.kill(pid)?;
        audit(&table);
        log::warn!("kill pid {} ({})", pid, slot);
        Ok(())
    }

    /// Whether the process in `slot` has been killed
    pub(crate) fn is_killed(&self, slot: Slot) -> bool {
        self.table.lock(self).get(slot).is_killed()
    }
}
