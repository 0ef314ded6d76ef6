//! Process Priority
//!
//! Two fixed levels, no boosting or decay. A priority only changes through
//! [`Kernel::setprio`] or by inheritance at fork.

use crate::hal::Machine;
use crate::ke::kernel::{audit, Kernel};

use super::{Pid, Priority, ProcError};

impl<M: Machine> Kernel<M> {
    /// Priority of the live process `pid`
    pub fn getprio(&self, pid: Pid) -> Result<Priority, ProcError> {
        self.table.lock(self).getprio(pid)
    }

    /// Change the priority of the live process `pid`
    ///
    /// A RUNNABLE process moves to the tail of its new queue. A running
    /// process keeps its processor until it next yields.
    pub fn setprio(&self, pid: Pid, priority: Priority) -> Result<(), ProcError> {
        let mut table = self.table.lock(self);
        let old = table.setprio(pid, priority)?;
        audit(&table);

        if old != priority {
            log::debug!("pid {}: priority {} -> {}", pid, old.name(), priority.name());
        }
        Ok(())
    }
}
