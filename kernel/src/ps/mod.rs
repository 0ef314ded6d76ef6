//! Process Manager (ps)
//!
//! The process manager owns the process table and the process lifecycle:
//!
//! - **Process Control Block**: identity, state, priority, parent link
//! - **Process Table**: fixed slot array, pid allocation, ready queue upkeep
//! - **Creation**: root process at boot, fork with priority inheritance
//! - **Termination**: exit to ZOMBIE, orphan adoption, reaping in wait
//! - **Priority**: getprio/setprio with in-place requeue
//!
//! # Key Structures
//!
//! - [`Proc`]: one table slot
//! - [`ProcState`]: lifecycle state with per-state data
//! - [`ProcTable`]: the table guarded by the kernel's table lock

pub mod create;
pub mod error;
pub mod exit;
pub mod priority;
pub mod process;
pub mod status;
pub mod table;

pub use error::ProcError;
pub use process::{Channel, Pid, Priority, Proc, ProcInfo, ProcName, ProcState, Slot, StateKind};
pub use status::ExitStatus;
pub use table::{ChildScan, ProcTable, TableFault};
