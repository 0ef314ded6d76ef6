//! Kernel Executive (ke)
//!
//! The scheduling half of the kernel:
//!
//! - **Ready Queues**: one circular list per priority plus a summary bit set
//! - **Scheduler**: per-processor dispatch loop, sched(), yield
//! - **Spinlocks**: owner-tracked locks with interrupt push/pop
//! - **Sleep/Wakeup**: channel-keyed blocking, kill
//! - **Clock**: tick counter and tick sleeps
//! - **Traps**: killed-process checkpoints and timer-driven yield
//! - **Bug Checks**: the single fatal error path
//!
//! # Key Structures
//!
//! - [`Kernel`]: shared state and every kernel operation
//! - [`Prcb`]: per-processor control block
//! - [`ReadyQueues`]: the priority queues inside the process table

// Core modules
pub mod bugcheck;
pub mod kernel;
pub mod list;
pub mod prcb;
pub mod ready;
pub mod scheduler;

// Synchronization primitives
pub mod spinlock;
pub mod wait;

// Clock and traps
pub mod timer;
pub mod trap;

// Re-export key types
pub use kernel::Kernel;
pub use list::{Link, ListFault, Ring};
pub use prcb::Prcb;
pub use ready::{ReadyQueues, ReadySummary};
pub use spinlock::{Processor, SpinLock, SpinLockGuard};
