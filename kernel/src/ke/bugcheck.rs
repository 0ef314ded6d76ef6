//! Kernel Bug Check
//!
//! A bug check is raised when the kernel detects that the process table, a
//! ready queue or the lock discipline around them can no longer be trusted.
//! There is no local recovery: the stop code is logged and the kernel
//! panics, and the panic handler of the embedding image halts the machine.
//!
//! The panic message always has the form
//! `*** STOP: 0x000000NN (NAME) parameter 0x...`, so a crash log names the
//! violated invariant directly.

use core::sync::atomic::{AtomicU32, Ordering};

/// Stop code of the most recent bug check (0 if none)
static LAST_BUGCHECK: AtomicU32 = AtomicU32::new(0);

// ============================================================================
// Bug Check Codes (STOP Codes)
// ============================================================================

pub mod codes {
    //! Stop codes for every fatal condition of the scheduler core.

    /// A ready queue link does not point back, or a lone entry is not the head
    pub const READY_QUEUE_CORRUPTED: u32 = 0x0000_0001;
    /// Enqueue of a process that is already linked into a ready queue
    pub const DOUBLE_ENQUEUE: u32 = 0x0000_0002;
    /// Dequeue from a ready queue that has no members
    pub const EMPTY_READY_QUEUE: u32 = 0x0000_0003;
    /// Dequeue of a process that carries no queue linkage
    pub const PROCESS_NOT_QUEUED: u32 = 0x0000_0004;
    /// A process state change outside the lifecycle graph
    pub const INVALID_STATE_TRANSITION: u32 = 0x0000_0005;
    /// sched() entered without the process table lock
    pub const SCHED_NOT_LOCKED: u32 = 0x0000_0010;
    /// sched() entered with other locks held
    pub const SCHED_LOCKS: u32 = 0x0000_0011;
    /// sched() entered by a process still marked RUNNING
    pub const SCHED_RUNNING: u32 = 0x0000_0012;
    /// sched() entered with interrupts enabled
    pub const SCHED_INTERRUPTIBLE: u32 = 0x0000_0013;
    /// The root process tried to exit
    pub const INIT_EXITING: u32 = 0x0000_0020;
    /// A zombie was scheduled again
    pub const ZOMBIE_EXIT: u32 = 0x0000_0021;
    /// A process-context operation ran with no current process
    pub const NO_CURRENT_PROCESS: u32 = 0x0000_0022;
    /// Spinlock acquired twice by the same processor
    pub const SPIN_LOCK_ALREADY_OWNED: u32 = 0x0000_0030;
    /// Spinlock released by a processor that does not hold it
    pub const SPIN_LOCK_NOT_OWNED: u32 = 0x0000_0031;
    /// Interrupt nesting popped while interrupts were enabled
    pub const POP_OFF_INTERRUPTIBLE: u32 = 0x0000_0032;
    /// Interrupt nesting popped more often than pushed
    pub const POP_OFF_UNBALANCED: u32 = 0x0000_0033;
    /// The machine reported a processor number without a control block
    pub const UNKNOWN_PROCESSOR: u32 = 0x0000_0040;
    /// Boot configuration outside the compile-time limits
    pub const INVALID_CONFIGURATION: u32 = 0x0000_0041;
    /// Process table consistency check failed
    pub const PROCESS_TABLE_CORRUPTED: u32 = 0x0000_0042;
}

/// Get the human-readable name for a bug check code
pub fn bugcheck_code_name(code: u32) -> &'static str {
    match code {
        codes::READY_QUEUE_CORRUPTED => "READY_QUEUE_CORRUPTED",
        codes::DOUBLE_ENQUEUE => "DOUBLE_ENQUEUE",
        codes::EMPTY_READY_QUEUE => "EMPTY_READY_QUEUE",
        codes::PROCESS_NOT_QUEUED => "PROCESS_NOT_QUEUED",
        codes::INVALID_STATE_TRANSITION => "INVALID_STATE_TRANSITION",
        codes::SCHED_NOT_LOCKED => "SCHED_NOT_LOCKED",
        codes::SCHED_LOCKS => "SCHED_LOCKS",
        codes::SCHED_RUNNING => "SCHED_RUNNING",
        codes::SCHED_INTERRUPTIBLE => "SCHED_INTERRUPTIBLE",
        codes::INIT_EXITING => "INIT_EXITING",
        codes::ZOMBIE_EXIT => "ZOMBIE_EXIT",
        codes::NO_CURRENT_PROCESS => "NO_CURRENT_PROCESS",
        codes::SPIN_LOCK_ALREADY_OWNED => "SPIN_LOCK_ALREADY_OWNED",
        codes::SPIN_LOCK_NOT_OWNED => "SPIN_LOCK_NOT_OWNED",
        codes::POP_OFF_INTERRUPTIBLE => "POP_OFF_INTERRUPTIBLE",
        codes::POP_OFF_UNBALANCED => "POP_OFF_UNBALANCED",
        codes::UNKNOWN_PROCESSOR => "UNKNOWN_PROCESSOR",
        codes::INVALID_CONFIGURATION => "INVALID_CONFIGURATION",
        codes::PROCESS_TABLE_CORRUPTED => "PROCESS_TABLE_CORRUPTED",
        _ => "UNKNOWN_BUGCHECK",
    }
}

// ============================================================================
// Bug Check Functions
// ============================================================================

/// Crash the kernel with a stop code and one diagnostic parameter
///
/// The parameter's meaning depends on the code; for queue and table
/// violations it is the slot index involved.
///
/// # Never Returns
/// Logs the stop code and panics.
#[cold]
#[track_caller]
pub fn bugcheck(code: u32, parameter: u64) -> ! {
    LAST_BUGCHECK.store(code, Ordering::SeqCst);

    let name = bugcheck_code_name(code);
    log::error!("*** STOP: 0x{:08X} ({}) parameter 0x{:X}", code, name, parameter);

    panic!("*** STOP: 0x{:08X} ({}) parameter 0x{:X}", code, name, parameter);
}

/// Stop code of the most recent bug check, if any
pub fn last_bugcheck() -> Option<u32> {
    match LAST_BUGCHECK.load(Ordering::SeqCst) {
        0 => None,
        code => Some(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_names() {
        assert_eq!(bugcheck_code_name(codes::DOUBLE_ENQUEUE), "DOUBLE_ENQUEUE");
        assert_eq!(bugcheck_code_name(codes::SCHED_LOCKS), "SCHED_LOCKS");
        assert_eq!(bugcheck_code_name(0xDEAD), "UNKNOWN_BUGCHECK");
    }

    #[test]
    #[should_panic(expected = "INIT_EXITING")]
    fn test_bugcheck_panics_with_name() {
        bugcheck(codes::INIT_EXITING, 1);
    }
}
