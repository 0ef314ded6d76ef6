//! Hardware Abstraction Layer (hal)
//!
//! The scheduler core never touches registers, stacks or page tables itself.
//! Everything machine-specific is reached through the [`Machine`] trait:
//!
//! - **Processor**: current processor number, interrupt flag, idle hint
//! - **Contexts**: kernel stack and first-return frame of each table slot
//! - **Resources**: initial image, address-space duplication, release on exit
//! - **Switching**: scheduler-to-process and process-to-scheduler transfers
//!
//! # Context switch protocol
//!
//! The process table lock is held across every switch. A process dispatched
//! for the first time must call [`Kernel::fork_return`](crate::Kernel::fork_return)
//! before running any process code, which releases the lock taken by the
//! scheduler on its own stack. A process resuming inside
//! [`Kernel::sched`](crate::Kernel) simply returns into the kernel, which
//! releases the lock there.

use crate::ps::{ProcError, Slot};

/// Machine services used by the scheduler core
///
/// All context methods are keyed by table slot. The core calls them with the
/// process table lock held unless noted otherwise.
pub trait Machine: Sync {
    // ========================================================================
    // Processor
    // ========================================================================

    /// Number of the executing processor, `0..ncpu`
    ///
    /// Called with interrupts disabled.
    fn cpu_id(&self) -> usize;

    /// Whether interrupts are enabled on the executing processor
    fn interrupts_enabled(&self) -> bool;

    fn enable_interrupts(&self);

    fn disable_interrupts(&self);

    /// Wait for work when no process is runnable
    ///
    /// Called with interrupts enabled and no locks held.
    fn idle(&self) {
        core::hint::spin_loop();
    }

    // ========================================================================
    // Process contexts
    // ========================================================================

    /// Allocate the kernel stack of `slot` and arrange for its first dispatch
    /// to enter [`Kernel::fork_return`](crate::Kernel::fork_return)
    fn prepare_context(&self, slot: Slot) -> Result<(), ProcError>;

    /// Build the initial user image of the root process in `slot`
    fn setup_init(&self, slot: Slot) -> Result<(), ProcError>;

    /// Copy the address space and open resources of `parent` into `child`
    ///
    /// The child must observe a zero return value from fork. Called without
    /// the process table lock.
    fn duplicate(&self, parent: Slot, child: Slot) -> Result<(), ProcError>;

    /// Free the kernel stack and address space of `slot`
    ///
    /// Called when a zombie is reaped or a fork is rolled back, always with
    /// the process table lock held and before the slot returns to UNUSED,
    /// so a concurrent fork cannot prepare the slot again in between.
    fn release_context(&self, slot: Slot);

    /// Close files and other resources of an exiting process
    ///
    /// Called without the process table lock.
    fn release_resources(&self, slot: Slot);

    // ========================================================================
    // Switching
    // ========================================================================

    /// Switch from the scheduler of `cpu` into the process in `slot`
    ///
    /// Returns once that process switches back.
    ///
    /// # Safety
    /// The process table lock must be held, `slot` must be RUNNING on `cpu`
    /// and its context must be prepared.
    unsafe fn switch_to_process(&self, cpu: usize, slot: Slot);

    /// Switch from the process in `slot` back to the scheduler of `cpu`
    ///
    /// Returns when the process is next dispatched, possibly on another
    /// processor. Never returns for a zombie.
    ///
    /// # Safety
    /// The process table lock must be held with interrupts disabled, and
    /// `slot` must no longer be RUNNING.
    unsafe fn switch_to_scheduler(&self, cpu: usize, slot: Slot);
}
