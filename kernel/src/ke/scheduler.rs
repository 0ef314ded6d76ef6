//! Priority Scheduler
//!
//! Two-level cooperative scheduler:
//! - HIGH queue drained before NORMAL is looked at
//! - FIFO within a level (yield and wakeup append at the tail)
//! - no preemption of a running process by a newly runnable one
//!
//! # Lock handoff
//!
//! The process table lock is held across every context switch. The
//! dispatcher takes it before switching into a process; the process releases
//! it on the other side, either in [`Kernel::fork_return`] on its first run
//! or by dropping the guard [`Kernel::sched`] hands back. Going the other
//! way, a process locks the table before calling `sched` and the dispatcher
//! drops its own guard once the switch returns. Ownership is tracked per
//! processor, so whichever stack releases the lock, the holder check agrees.

use crate::hal::Machine;
use crate::ps::{ProcState, ProcTable, Slot};

use super::bugcheck::{bugcheck, codes};
use super::kernel::{audit, Kernel};
use super::spinlock::{Processor, SpinLock, SpinLockGuard};

impl<M: Machine> Kernel<M> {
    /// One pass of the per-processor dispatch loop
    ///
    /// Picks the HIGH head, else the NORMAL head, runs it until it switches
    /// back, and returns whether anything ran.
    pub fn schedule_once(&self) -> bool {
        // Let pending interrupts in between two dispatches
        self.machine.enable_interrupts();

        let mut table = self.table.lock(self);
        let cpu = self.cpu_id();
        let slot = match table.dispatch(cpu) {
            Some(slot) => slot,
            None => return false,
        };
        audit(&table);

        let prcb = self.prcb();
        prcb.set_current(Some(slot));
        prcb.count_switch();
        log::trace!(
            "cpu {}: dispatch {} pid {:?} ({})",
            cpu,
            slot,
            table.get(slot).pid(),
            table.get(slot).priority().name()
        );

        // SAFETY: table lock held, slot RUNNING on this processor
        unsafe { self.machine.switch_to_process(cpu, slot) };

        // The process gave the processor back and locked the table for us
        self.prcb().set_current(None);
        drop(table);
        true
    }

    /// Per-processor scheduler loop
    ///
    /// # Never Returns
    pub fn scheduler(&self) -> ! {
        log::debug!("cpu {}: scheduler started", self.machine.cpu_id());
        loop {
            if !self.schedule_once() {
                self.machine.idle();
            }
        }
    }

    /// Switch from the current process back to the scheduler
    ///
    /// The caller holds the table lock and nothing else, has already moved
    /// the process out of RUNNING, and gets the lock back when the process
    /// is next dispatched.
    pub(crate) fn sched<'a>(
        &'a self,
        table: SpinLockGuard<'a, ProcTable>,
        slot: Slot,
    ) -> SpinLockGuard<'a, ProcTable> {
        if !self.table.holding(self) {
            bugcheck(codes::SCHED_NOT_LOCKED, slot.index() as u64);
        }
        let prcb = self.prcb();
        if prcb.ncli() != 1 {
            bugcheck(codes::SCHED_LOCKS, prcb.ncli() as u64);
        }
        if let ProcState::Running { .. } = table.get(slot).state() {
            bugcheck(codes::SCHED_RUNNING, slot.index() as u64);
        }
        if self.machine.interrupts_enabled() {
            bugcheck(codes::SCHED_INTERRUPTIBLE, slot.index() as u64);
        }

        // Interrupt state belongs to this process, not to the processor
        let intena = prcb.intena();
        let cpu = self.cpu_id();

        // SAFETY: all of the above
        unsafe { self.machine.switch_to_scheduler(cpu, slot) };

        // Possibly resumed on a different processor
        self.prcb().set_intena(intena);
        table
    }

    /// Give up the processor for one scheduling round
    pub fn yield_now(&self) {
        let slot = self.current_slot();
        let mut table = self.table.lock(self);
        table.make_runnable(slot);
        let table = self.sched(table, slot);
        drop(table);
    }

    /// First code run by a new process
    ///
    /// Releases the table lock held by the dispatcher that switched here.
    ///
    /// # Safety
    /// Must be called exactly once, on the first dispatch of a process, before
    /// anything else touches the table.
    pub unsafe fn fork_return(&self) {
        // SAFETY: the dispatcher's guard stays on the scheduler stack and
        // is dropped there only after this process switches back with the
        // lock re-acquired.
        unsafe { SpinLock::force_unlock(&self.table, self) };
    }
}
