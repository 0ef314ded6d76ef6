//! Prio Kernel
//!
//! The process scheduler of a small teaching kernel: a fixed process table,
//! two priority ready queues, and the fork/exit/wait/sleep/wakeup/kill
//! lifecycle on top of them, for one or more processors.
//!
//! # Architecture Overview
//!
//! - **ke** - Kernel Executive: ready queues, dispatcher, spinlocks,
//!   sleep/wakeup, clock, trap checkpoints, bug checks
//! - **ps** - Process Manager: process control blocks, process table,
//!   creation, termination, priority
//! - **hal** - Hardware Abstraction Layer: the [`Machine`] trait the embedding
//!   image implements
//! - **syscall** - integer-returning system call wrappers
//! - **config** - compile-time limits and boot configuration
//!
//! # Initialization
//!
//! - Build a [`Kernel`] from a [`KernelConfig`] and a [`Machine`].
//! - Call [`Kernel::spawn_init`] once.
//! - Run [`Kernel::scheduler`] on every configured processor.

#![cfg_attr(not(test), no_std)]
// Kernel-specific lint configurations:
// - declare_interior_mutable_const: array initialization of per-CPU blocks
// - new_without_default: const constructors are the primary interface
#![allow(clippy::declare_interior_mutable_const)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod hal;
pub mod ke;
pub mod ps;
pub mod syscall;

pub use config::KernelConfig;
pub use hal::Machine;
pub use ke::bugcheck::{bugcheck, last_bugcheck};
pub use ke::{Kernel, Processor, SpinLock, SpinLockGuard};
pub use ps::{Channel, ExitStatus, Pid, Priority, ProcError, ProcInfo, ProcState, ProcTable, Slot};
