//! Clock
//!
//! A tick counter advanced by the timer interrupt of processor 0. Processes
//! waiting for time sleep on [`Channel::Ticks`] and re-check the count on
//! every tick.
//!
//! Lock order: the ticks lock is always taken before the table lock.

use crate::hal::Machine;
use crate::ps::{Channel, ProcError};

use super::kernel::Kernel;
use super::spinlock::Processor;

impl<M: Machine> Kernel<M> {
    /// Advance the clock by one tick
    ///
    /// Ignored on every processor but 0, so the count is in units of one
    /// processor's timer period.
    pub fn clock_interrupt(&self) {
        if self.cpu_id() != 0 {
            return;
        }
        let mut ticks = self.ticks.lock(self);
        *ticks += 1;
        self.wakeup(Channel::Ticks);
    }

    /// Ticks since boot
    pub fn uptime(&self) -> u64 {
        *self.ticks.lock(self)
    }

    /// Block the current process for `n` ticks
    ///
    /// Fails with [`ProcError::Killed`] if the process is killed while
    /// waiting.
    pub fn sleep_ticks(&self, n: u64) -> Result<(), ProcError> {
        let slot = self.current_slot();

        let mut ticks = self.ticks.lock(self);
        let start = *ticks;
        while *ticks - start < n {
            if self.is_killed(slot) {
                return Err(ProcError::Killed);
            }
            ticks = self.sleep(Channel::Ticks, ticks);
        }
        Ok(())
    }
}
