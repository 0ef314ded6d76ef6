//! Trap Checkpoints
//!
//! Hooks the trap layer calls on its way back to a process. A killed process
//! is only terminated here, at a point where it holds no locks, never at the
//! moment [`Kernel::kill`] runs.
//!
//! A process terminated at a checkpoint exits with
//! [`ExitStatus::from_trap`], which never collides with a voluntary exit
//! status.

use crate::hal::Machine;
use crate::ps::{ExitStatus, ProcState};

use super::kernel::Kernel;

impl<M: Machine> Kernel<M> {
    /// Exit the current process if it has been killed
    ///
    /// Does nothing outside process context.
    pub fn checkpoint(&self, trapno: u32) {
        if let Some(slot) = self.current() {
            if self.is_killed(slot) {
                self.exit(ExitStatus::from_trap(trapno).raw());
            }
        }
    }

    /// A user-mode fault in the current process
    ///
    /// The process is marked killed and exits at once.
    pub fn fault(&self, trapno: u32) -> ! {
        let slot = self.current_slot();
        log::warn!("{}: fault, trap {}", slot, trapno);

        self.table.lock(self).mark_killed(slot);
        self.exit(ExitStatus::from_trap(trapno).raw())
    }

    /// Timer interrupt: tick the clock and make the running process give up
    /// the processor
    pub fn timer_interrupt(&self, trapno: u32) {
        self.clock_interrupt();

        let slot = match self.current() {
            Some(slot) => slot,
            None => return,
        };
        let running = matches!(
            self.table.lock(self).get(slot).state(),
            ProcState::Running { .. }
        );
        if running {
            self.checkpoint(trapno);
            self.yield_now();
            self.checkpoint(trapno);
        }
    }
}
