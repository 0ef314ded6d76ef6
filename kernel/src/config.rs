//! Kernel Configuration
//!
//! Compile-time limits live in [`constants`]; the handful of knobs that
//! differ between boards or test setups are carried in [`KernelConfig`],
//! which is handed to [`Kernel::new`](crate::Kernel::new) at boot.
//!
//! # Usage
//! ```
//! use prio_kernel::{KernelConfig, Priority};
//!
//! let config = KernelConfig::new()
//!     .with_cpus(2)
//!     .with_init_name("init")
//!     .with_init_priority(Priority::Normal);
//! assert_eq!(config.ncpu, 2);
//! ```

use crate::ps::Priority;

/// Scheduling and table limits
pub mod constants {
    use crate::ps::Priority;

    /// Number of process control blocks in the process table
    pub const NPROC: usize = 64;
    /// Maximum number of processors the kernel keeps control blocks for
    pub const MAX_CPUS: usize = 8;
    /// Process name capacity in bytes (including the terminator slot)
    pub const PROC_NAME_LEN: usize = 16;
    /// Priority stored in a slot while it is UNUSED
    ///
    /// The priority field of a freed slot is zeroed, which is the HIGH level.
    pub const FREE_SLOT_PRIORITY: Priority = Priority::High;
    /// First process id handed out by the allocator (0 marks a free slot)
    pub const FIRST_PID: u32 = 1;
    /// Last process id the allocator hands out
    ///
    /// Pids must stay positive when returned through the `i32` system call
    /// boundary; fork fails with `TableFull` once they run out.
    pub const MAX_PID: u32 = i32::MAX as u32;
}

/// Boot-time kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of processors that will run [`Kernel::scheduler`](crate::Kernel::scheduler)
    pub ncpu: usize,
    /// Name given to the root process by [`Kernel::spawn_init`](crate::Kernel::spawn_init)
    pub init_name: &'static str,
    /// Priority the root process starts with
    pub init_priority: Priority,
}

impl KernelConfig {
    /// Single processor, root process "initcode" at NORMAL priority
    pub const fn new() -> Self {
        Self {
            ncpu: 1,
            init_name: "initcode",
            init_priority: Priority::Normal,
        }
    }

    pub const fn with_cpus(mut self, ncpu: usize) -> Self {
        self.ncpu = ncpu;
        self
    }

    pub const fn with_init_name(mut self, name: &'static str) -> Self {
        self.init_name = name;
        self
    }

    pub const fn with_init_priority(mut self, priority: Priority) -> Self {
        self.init_priority = priority;
        self
    }

    /// Check the configuration against the compile-time limits
    pub const fn is_valid(&self) -> bool {
        self.ncpu > 0 && self.ncpu <= constants::MAX_CPUS
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
