//! Exit Status Encoding
//!
//! The process core stores whatever integer is passed to
//! [`Kernel::exit`](crate::Kernel::exit). The system-call and trap layers
//! agree on an encoding that keeps voluntary and trap-induced exits apart:
//!
//! - voluntary `exit(code)`: `code << 8`, low 7 bits zero
//! - killed at a trap checkpoint: `trapno + 1` in the low 7 bits, saturating
//!   at `0x7f` for trap numbers from 126 up
//!
//! # Usage
//! ```
//! use prio_kernel::ExitStatus;
//!
//! let status = ExitStatus::from_code(3);
//! assert!(status.exited());
//! assert_eq!(status.code(), 3);
//!
//! let status = ExitStatus::from_trap(14);
//! assert!(status.trapped());
//! assert_eq!(status.trap(), 14);
//! ```

use core::fmt;

/// Mask of the trap field
const TRAP_MASK: i32 = 0x7f;
/// Mask of the voluntary exit code field
const CODE_MASK: i32 = 0xff00;
/// Highest trap number with its own encoding
const MAX_TRAP: u32 = (TRAP_MASK - 1) as u32;

/// An encoded exit status as returned by `wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(i32);

impl ExitStatus {
    /// Wrap a raw status word
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Status of a voluntary exit with `code`
    pub const fn from_code(code: i32) -> Self {
        Self((code << 8) & CODE_MASK)
    }

    /// Status of a process killed at a checkpoint of trap `trapno`
    ///
    /// Trap numbers of 126 and above all encode as the last trap field
    /// value, so the low bits are never zero.
    pub const fn from_trap(trapno: u32) -> Self {
        if trapno >= MAX_TRAP {
            Self(TRAP_MASK)
        } else {
            Self(trapno as i32 + 1)
        }
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The process called exit itself
    pub const fn exited(self) -> bool {
        self.0 & TRAP_MASK == 0
    }

    /// Voluntary exit code
    pub const fn code(self) -> i32 {
        (self.0 & CODE_MASK) >> 8
    }

    /// The process was terminated at a trap
    pub const fn trapped(self) -> bool {
        self.0 & TRAP_MASK != 0
    }

    /// Trap number that terminated the process
    pub const fn trap(self) -> i32 {
        (self.0 & TRAP_MASK) - 1
    }
}

impl From<i32> for ExitStatus {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exited() {
            write!(f, "exited with {}", self.code())
        } else {
            write!(f, "terminated by trap {}", self.trap())
        }
    }
}
