//! Process Creation
//!
//! - [`Kernel::spawn_init`]: the root process, built at boot
//! - [`Kernel::fork`]: a copy of the calling process
//!
//! Both claim an EMBRYO slot under the table lock, set up its context
//! through the [`Machine`] without the lock, and publish the process as
//! RUNNABLE under the lock again. A failure in between returns the slot to
//! the free pool with no other side effect.

use crate::hal::Machine;
use crate::ke::bugcheck::{bugcheck, codes};
use crate::ke::kernel::{audit, Kernel};

use super::{Pid, ProcError, Slot};

impl<M: Machine> Kernel<M> {
    /// Create the root process from the boot configuration
    ///
    /// It takes the configured name and priority and becomes the adopter of
    /// orphaned processes. Spawning it twice is fatal.
    pub fn spawn_init(&self) -> Result<Pid, ProcError> {
        let (slot, pid) = self.embryo()?;

        if let Err(err) = self.machine.setup_init(slot) {
            self.abort_embryo(slot, true);
            return Err(err);
        }

        let mut table = self.table.lock(self);
        if let Some(existing) = table.init() {
            bugcheck(codes::INVALID_CONFIGURATION, existing.index() as u64);
        }
        table.setup(slot, self.config().init_name, self.config().init_priority);
        table.set_init(slot);
        table.make_runnable(slot);
        audit(&table);

        log::info!(
            "init process {} pid {} ({})",
            self.config().init_name,
            pid,
            self.config().init_priority.name()
        );
        Ok(pid)
    }

    /// Create a child of the calling process
    ///
    /// The child gets a copy of the caller's address space and resources,
    /// its name, and the priority the caller has at this moment. Returns the
    /// child's pid.
    pub fn fork(&self) -> Result<Pid, ProcError> {
        let parent = self.current_slot();
        let (child, pid) = self.embryo()?;

        if let Err(err) = self.machine.duplicate(parent, child) {
            log::debug!("fork from {}: duplicate failed: {}", parent, err);
            self.abort_embryo(child, true);
            return Err(err);
        }

        let mut table = self.table.lock(self);
        table.inherit(child, parent);
        table.make_runnable(child);
        audit(&table);

        log::debug!(
            "fork: pid {} -> pid {} ({})",
            table.get(parent).pid().map_or(0, Pid::as_u32),
            pid,
            table.get(child).priority().name()
        );
        Ok(pid)
    }

    /// Allocate a slot and its kernel context
    fn embryo(&self) -> Result<(Slot, Pid), ProcError> {
        let (slot, pid) = {
            let mut table = self.table.lock(self);
            let slot = table.alloc()?;
            let pid = table
                .get(slot)
                .pid()
                .unwrap_or_else(|| bugcheck(codes::PROCESS_TABLE_CORRUPTED, slot.index() as u64));
            (slot, pid)
        };

        if let Err(err) = self.machine.prepare_context(slot) {
            self.abort_embryo(slot, false);
            return Err(err);
        }
        Ok((slot, pid))
    }

    /// Undo [`embryo`](Self::embryo)
    fn abort_embryo(&self, slot: Slot, has_context: bool) {
        let mut table = self.table.lock(self);
        if has_context {
            self.machine.release_context(slot);
        }
        table.free(slot);
        audit(&table);
    }
}
