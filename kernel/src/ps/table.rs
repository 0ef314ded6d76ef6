//! Process Table
//!
//! The fixed array of process control blocks together with the ready queues
//! and the pid allocator. One instance lives inside the kernel's table lock;
//! every method here assumes that lock is held and performs no locking or
//! context switching of its own.
//!
//! The table enforces the lifecycle:
//! - a slot is linked into a ready queue exactly while it is RUNNABLE
//! - a free slot carries no pid, name, parent, linkage or killed flag, and
//!   the free-slot priority
//!
//! Methods that change state keep both properties; [`ProcTable::verify`]
//! checks them from scratch.

use core::fmt;

use crate::config::constants::{FIRST_PID, FREE_SLOT_PRIORITY, MAX_PID, NPROC};
use crate::ke::bugcheck::{bugcheck, codes};
use crate::ke::ready::ReadyQueues;

use super::process::{Channel, Pid, Proc, ProcInfo, ProcName, ProcState, Slot};
use super::{Priority, ProcError};

/// Outcome of scanning for the children of a waiting process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildScan {
    /// A child already exited and can be reaped
    Zombie(Slot),
    /// Children exist but none has exited yet
    Running,
    /// The process has no children at all
    None,
}

/// Reason [`ProcTable::verify`] rejected the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFault {
    /// Ready queue structure is broken
    Queues,
    /// A slot is queued without being RUNNABLE, or the reverse
    Membership(Slot),
    /// A queued slot sits in the queue of another priority
    WrongLevel(Slot),
    /// A free slot still carries process data
    DirtyFreeSlot(Slot),
}

/// The process table
#[derive(Clone)]
pub struct ProcTable {
    procs: [Proc; NPROC],
    ready: ReadyQueues,
    next_pid: u32,
    /// Root process, adopter of orphans
    init: Option<Slot>,
}

impl ProcTable {
    pub const fn new() -> Self {
        Self {
            procs: [Proc::new(); NPROC],
            ready: ReadyQueues::new(),
            next_pid: FIRST_PID,
            init: None,
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, slot: Slot) -> &Proc {
        &self.procs[slot.index()]
    }

    fn get_mut(&mut self, slot: Slot) -> &mut Proc {
        &mut self.procs[slot.index()]
    }

    /// Slot of the live process with `pid`
    pub fn find(&self, pid: Pid) -> Option<Slot> {
        Slot::all().find(|&slot| {
            let proc = self.get(slot);
            proc.is_live() && proc.pid == Some(pid)
        })
    }

    pub fn info(&self, pid: Pid) -> Option<ProcInfo> {
        self.find(pid).map(|slot| self.get(slot).info())
    }

    pub fn ready(&self) -> &ReadyQueues {
        &self.ready
    }

    pub fn init(&self) -> Option<Slot> {
        self.init
    }

    /// Iterate over allocated slots
    pub fn live(&self) -> impl Iterator<Item = (Slot, &Proc)> + '_ {
        Slot::all()
            .map(move |slot| (slot, self.get(slot)))
            .filter(|(_, proc)| proc.is_live())
    }

    /// Number of allocated slots
    pub fn count(&self) -> usize {
        self.live().count()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Claim the first UNUSED slot as an EMBRYO with a fresh pid
    ///
    /// Fails with [`ProcError::TableFull`] when no slot is free or the pid
    /// space is exhausted.
    pub(crate) fn alloc(&mut self) -> Result<Slot, ProcError> {
        let slot = Slot::all()
            .find(|&slot| !self.get(slot).is_live())
            .ok_or(ProcError::TableFull)?;
        if self.next_pid > MAX_PID {
            log::warn!("process ids exhausted");
            return Err(ProcError::TableFull);
        }

        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;

        let proc = self.get_mut(slot);
        proc.transition(slot, ProcState::Embryo);
        proc.pid = Some(pid);
        proc.killed = false;
        Ok(slot)
    }

    /// Return an EMBRYO whose setup failed to the free pool
    pub(crate) fn free(&mut self, slot: Slot) {
        self.get_mut(slot).clear(slot);
    }

    /// Name and priority of an EMBRYO
    pub(crate) fn setup(&mut self, slot: Slot, name: &str, priority: Priority) {
        let proc = self.get_mut(slot);
        proc.name = ProcName::new(name);
        proc.priority = priority;
    }

    /// Copy name, parent link and current priority from `parent` to a new
    /// `child`
    pub(crate) fn inherit(&mut self, child: Slot, parent: Slot) {
        let from = *self.get(parent);
        let proc = self.get_mut(child);
        proc.name = from.name;
        proc.priority = from.priority;
        proc.parent = Some(parent);
    }

    pub(crate) fn set_init(&mut self, slot: Slot) {
        self.init = Some(slot);
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Make `slot` RUNNABLE and append it to the queue of its priority
    ///
    /// Valid from EMBRYO, RUNNING and SLEEPING.
    pub(crate) fn make_runnable(&mut self, slot: Slot) {
        let proc = self.get_mut(slot);
        proc.transition(slot, ProcState::Runnable);
        let priority = proc.priority;
        self.ready.enqueue(slot, priority);
    }

    /// Remove a specific RUNNABLE slot from its queue and mark it RUNNING
    pub(crate) fn run(&mut self, slot: Slot, cpu: usize) {
        let priority = self.get(slot).priority;
        self.ready.dequeue(slot, priority);
        self.get_mut(slot).transition(slot, ProcState::Running { cpu });
    }

    /// Pick the next process (HIGH head, else NORMAL head) and mark it
    /// RUNNING on `cpu`
    pub(crate) fn dispatch(&mut self, cpu: usize) -> Option<Slot> {
        let (slot, _) = self.ready.select()?;
        self.run(slot, cpu);
        Some(slot)
    }

    /// Park a RUNNING process on `chan`
    pub(crate) fn block(&mut self, slot: Slot, chan: Channel) {
        self.get_mut(slot).transition(slot, ProcState::Sleeping { chan });
    }

    /// Wake every process sleeping on `chan`, in slot order
    pub(crate) fn wakeup(&mut self, chan: Channel) -> usize {
        let mut woken = 0;
        for slot in Slot::all() {
            if self.get(slot).state().channel() == Some(chan) {
                self.make_runnable(slot);
                woken += 1;
            }
        }
        woken
    }

    // ========================================================================
    // Signals and Priority
    // ========================================================================

    /// Set the killed flag of `pid`, forcing a sleeper back to RUNNABLE
    pub(crate) fn kill(&mut self, pid: Pid) -> Result<Slot, ProcError> {
        let slot = self.find(pid).ok_or(ProcError::NoSuchProcess)?;
        let proc = self.get_mut(slot);
        proc.killed = true;
        if proc.state().channel().is_some() {
            self.make_runnable(slot);
        }
        Ok(slot)
    }

    /// Mark the process in `slot` killed without waking it
    pub(crate) fn mark_killed(&mut self, slot: Slot) {
        self.get_mut(slot).killed = true;
    }

    pub fn getprio(&self, pid: Pid) -> Result<Priority, ProcError> {
        self.find(pid)
            .map(|slot| self.get(slot).priority)
            .ok_or(ProcError::NoSuchProcess)
    }

    /// Change the priority of `pid`
    ///
    /// A queued process moves to the tail of its new queue in the same
    /// critical section, so it is never observable outside both queues.
    pub(crate) fn setprio(&mut self, pid: Pid, priority: Priority) -> Result<Priority, ProcError> {
        let slot = self.find(pid).ok_or(ProcError::NoSuchProcess)?;
        let old = self.get(slot).priority;
        if old == priority {
            return Ok(old);
        }

        if self.get(slot).state() == ProcState::Runnable {
            self.ready.dequeue(slot, old);
            self.get_mut(slot).priority = priority;
            self.ready.enqueue(slot, priority);
        } else {
            self.get_mut(slot).priority = priority;
        }
        Ok(old)
    }

    // ========================================================================
    // Exit and Reaping
    // ========================================================================

    /// Turn the RUNNING process in `slot` into a zombie
    ///
    /// Wakes the parent, hands every child to the root process and wakes
    /// the root process if one of them already exited.
    pub(crate) fn zombify(&mut self, slot: Slot, status: i32) {
        if let Some(parent) = self.get(slot).parent {
            self.wakeup(Channel::Wait(parent));
        }

        let init = self.init;
        let mut orphaned_zombie = false;
        for child in Slot::all() {
            let proc = self.get_mut(child);
            if proc.is_live() && proc.parent == Some(slot) {
                proc.parent = init;
                if proc.state().exit_status().is_some() {
                    orphaned_zombie = true;
                }
            }
        }
        if orphaned_zombie {
            if let Some(init) = init {
                self.wakeup(Channel::Wait(init));
            }
        }

        self.get_mut(slot).transition(slot, ProcState::Zombie { status });
    }

    /// Look for a child of `parent` to reap
    pub fn scan_children(&self, parent: Slot) -> ChildScan {
        let mut found = false;
        for (slot, proc) in self.live() {
            if proc.parent != Some(parent) {
                continue;
            }
            if proc.state().exit_status().is_some() {
                return ChildScan::Zombie(slot);
            }
            found = true;
        }
        if found {
            ChildScan::Running
        } else {
            ChildScan::None
        }
    }

    /// Free a zombie, returning its pid and exit status
    pub(crate) fn reap(&mut self, slot: Slot) -> (Pid, i32) {
        let proc = self.get(slot);
        let (pid, status) = match (proc.pid, proc.state().exit_status()) {
            (Some(pid), Some(status)) => (pid, status),
            _ => bugcheck(codes::INVALID_STATE_TRANSITION, slot.index() as u64),
        };
        self.get_mut(slot).clear(slot);
        (pid, status)
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Check every table invariant from scratch
    pub fn verify(&self) -> Result<(), TableFault> {
        self.ready.verify().map_err(|_| TableFault::Queues)?;

        for slot in Slot::all() {
            let proc = self.get(slot);
            let runnable = proc.state() == ProcState::Runnable;
            if runnable != self.ready.is_queued(slot) {
                return Err(TableFault::Membership(slot));
            }
            if runnable && self.ready.queue_of(slot) != Some(proc.priority) {
                return Err(TableFault::WrongLevel(slot));
            }
            if !proc.is_live()
                && (proc.pid.is_some()
                    || proc.parent.is_some()
                    || proc.killed
                    || !proc.name.is_empty()
                    || proc.priority != FREE_SLOT_PRIORITY)
            {
                return Err(TableFault::DirtyFreeSlot(slot));
            }
        }
        Ok(())
    }

    /// [`verify`](Self::verify), bug-checking on failure
    pub fn check(&self) {
        if let Err(fault) = self.verify() {
            log::error!("process table: {:?}", fault);
            let slot = match fault {
                TableFault::Queues => u64::MAX,
                TableFault::Membership(slot)
                | TableFault::WrongLevel(slot)
                | TableFault::DirtyFreeSlot(slot) => slot.index() as u64,
            };
            bugcheck(codes::PROCESS_TABLE_CORRUPTED, slot);
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Console process listing, one line per allocated slot
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for (slot, proc) in self.live() {
            write!(
                out,
                "{} {} {} {}",
                proc.pid.map_or(0, Pid::as_u32),
                proc.state().kind().label(),
                proc.priority.name(),
                proc.name
            )?;
            match proc.state() {
                ProcState::Sleeping { chan } => write!(out, " on {:?}", chan)?,
                ProcState::Running { cpu } => write!(out, " cpu {}", cpu)?,
                _ => {}
            }
            if proc.killed {
                out.write_str(" killed")?;
            }
            writeln!(out, " [{}]", slot)?;
        }
        Ok(())
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}
