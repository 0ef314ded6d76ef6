//! Process Termination
//!
//! A process ends in two steps. [`Kernel::exit`] turns it into a ZOMBIE that
//! keeps its slot, pid and exit status. The parent's [`Kernel::wait`] then
//! reaps it: the context is released, the slot returns to UNUSED and the
//! status is handed over. Children of an exiting process are adopted by the
//! root process, which reaps them in its own wait loop.

use crate::hal::Machine;
use crate::ke::bugcheck::{bugcheck, codes};
use crate::ke::kernel::{audit, Kernel};

use super::table::ChildScan;
use super::{Channel, Pid, ProcError};

impl<M: Machine> Kernel<M> {
    /// Terminate the current process with `status`
    ///
    /// `status` is stored as given; see [`ExitStatus`](super::ExitStatus)
    /// for the encoding the system-call layer uses.
    ///
    /// # Never Returns
    pub fn exit(&self, status: i32) -> ! {
        let slot = self.current_slot();
        if self.table.lock(self).init() == Some(slot) {
            bugcheck(codes::INIT_EXITING, slot.index() as u64);
        }

        self.machine.release_resources(slot);

        let mut table = self.table.lock(self);
        table.zombify(slot, status);
        audit(&table);
        log::debug!(
            "exit: pid {} status {:#x}",
            table.get(slot).pid().map_or(0, Pid::as_u32),
            status
        );

        let _table = self.sched(table, slot);
        bugcheck(codes::ZOMBIE_EXIT, slot.index() as u64)
    }

    /// Wait for a child to exit and reap it
    ///
    /// Returns the child's pid and stores its exit status in `status`.
    /// Fails with [`ProcError::NoChildren`] if the caller has no children and
    /// with [`ProcError::Killed`] if it is killed while waiting.
    pub fn wait(&self, status: Option<&mut i32>) -> Result<Pid, ProcError> {
        let slot = self.current_slot();

        let mut table = self.table.lock(self);
        loop {
            match table.scan_children(slot) {
                ChildScan::Zombie(child) => {
                    self.machine.release_context(child);
                    let (pid, code) = table.reap(child);
                    audit(&table);
                    drop(table);

                    log::debug!("reap: pid {} status {:#x}", pid, code);
                    if let Some(out) = status {
                        *out = code;
                    }
                    return Ok(pid);
                }
                ChildScan::None => return Err(ProcError::NoChildren),
                ChildScan::Running => {}
            }

            if table.get(slot).is_killed() {
                return Err(ProcError::Killed);
            }
            table = self.sleep_locked(Channel::Wait(slot), table, slot);
        }
    }
}
