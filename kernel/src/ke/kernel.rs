//! Kernel Instance
//!
//! [`Kernel`] ties the shared scheduler state together:
//! - the process table behind its table-wide spinlock
//! - one [`Prcb`] per configured processor
//! - the clock tick counter behind its own spinlock
//! - the [`Machine`] that provides processors and contexts
//!
//! Operations are spread over the `ke` and `ps` modules as further `impl`
//! blocks on this type. The embedding boot code creates one instance, keeps
//! it in a `static` (or leaks it), calls
//! [`spawn_init`](Kernel::spawn_init) and then runs
//! [`scheduler`](Kernel::scheduler) on every processor.

use core::fmt;

use crate::config::constants::MAX_CPUS;
use crate::config::KernelConfig;
use crate::hal::Machine;
use crate::ps::{Pid, ProcInfo, ProcTable, Slot};

use super::bugcheck::{bugcheck, codes};
use super::prcb::Prcb;
use super::spinlock::{Processor, SpinLock};

/// The scheduler core
pub struct Kernel<M: Machine> {
    pub(crate) table: SpinLock<ProcTable>,
    pub(crate) ticks: SpinLock<u64>,
    prcbs: [Prcb; MAX_CPUS],
    config: KernelConfig,
    pub(crate) machine: M,
}

impl<M: Machine> Kernel<M> {
    /// Create the kernel state with an empty process table
    ///
    /// An invalid configuration is fatal.
    pub fn new(config: KernelConfig, machine: M) -> Self {
        if !config.is_valid() {
            log::error!("invalid kernel configuration: {:?}", config);
            bugcheck(codes::INVALID_CONFIGURATION, config.ncpu as u64);
        }

        const PRCB: Prcb = Prcb::new();
        Self {
            table: SpinLock::new("proc", ProcTable::new()),
            ticks: SpinLock::new("time", 0),
            prcbs: [PRCB; MAX_CPUS],
            config,
            machine,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    // ========================================================================
    // Processor Control Blocks
    // ========================================================================

    /// Control block of the executing processor
    ///
    /// Only meaningful with interrupts disabled.
    pub(crate) fn prcb(&self) -> &Prcb {
        let cpu = self.machine.cpu_id();
        self.prcb_of(cpu)
            .unwrap_or_else(|| bugcheck(codes::UNKNOWN_PROCESSOR, cpu as u64))
    }

    /// Control block of processor `cpu`
    pub fn prcb_of(&self, cpu: usize) -> Option<&Prcb> {
        if cpu < self.config.ncpu {
            self.prcbs.get(cpu)
        } else {
            None
        }
    }

    /// Total context switches into processes across all processors
    pub fn context_switches(&self) -> u64 {
        self.prcbs[..self.config.ncpu]
            .iter()
            .map(Prcb::context_switches)
            .sum()
    }

    // ========================================================================
    // Current Process
    // ========================================================================

    /// Process running on the executing processor
    pub fn current(&self) -> Option<Slot> {
        self.push_off();
        let slot = self.prcb().current();
        self.pop_off();
        slot
    }

    /// Process running on the executing processor, for operations that only
    /// make sense in process context
    #[track_caller]
    pub(crate) fn current_slot(&self) -> Slot {
        self.current()
            .unwrap_or_else(|| bugcheck(codes::NO_CURRENT_PROCESS, self.machine.cpu_id() as u64))
    }

    /// Pid of the calling process
    pub fn getpid(&self) -> Pid {
        let slot = self.current_slot();
        let table = self.table.lock(self);
        table
            .get(slot)
            .pid()
            .unwrap_or_else(|| bugcheck(codes::PROCESS_TABLE_CORRUPTED, slot.index() as u64))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Whether the executing processor holds the process table lock
    ///
    /// For [`Machine`] implementations checking their calling contract.
    pub fn holds_table(&self) -> bool {
        self.table.holding(self)
    }

    /// Observable fields of the live process `pid`
    pub fn info(&self, pid: Pid) -> Option<ProcInfo> {
        self.table.lock(self).info(pid)
    }

    /// Copy of the whole process table
    pub fn snapshot(&self) -> ProcTable {
        self.table.lock(self).clone()
    }

    /// Write the console process listing
    pub fn procdump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.table.lock(self).dump(out)
    }
}

/// Run the full table check in debug builds
#[inline]
pub(crate) fn audit(table: &ProcTable) {
    if cfg!(debug_assertions) {
        table.check();
    }
}

impl<M: Machine> Processor for Kernel<M> {
    fn cpu_id(&self) -> usize {
        self.machine.cpu_id()
    }

    fn push_off(&self) {
        let enabled = self.machine.interrupts_enabled();
        self.machine.disable_interrupts();
        self.prcb().push(enabled);
    }

    fn pop_off(&self) {
        if self.machine.interrupts_enabled() {
            bugcheck(codes::POP_OFF_INTERRUPTIBLE, self.machine.cpu_id() as u64);
        }

        let prcb = self.prcb();
        match prcb.pop() {
            None => bugcheck(codes::POP_OFF_UNBALANCED, self.machine.cpu_id() as u64),
            Some(0) if prcb.intena() => self.machine.enable_interrupts(),
            Some(_) => {}
        }
    }
}
