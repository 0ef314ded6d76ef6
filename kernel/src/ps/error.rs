//! Process Manager Errors

use core::fmt;

/// Recoverable errors of the process operations
///
/// Invariant violations are not errors; they end in a bug check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ProcError {
    /// No free slot in the process table
    TableFull = -1,
    /// Kernel stack or address space could not be allocated
    OutOfMemory = -2,
    /// No live process has the given pid
    NoSuchProcess = -3,
    /// Priority value outside {HIGH, NORMAL}
    InvalidPriority = -4,
    /// wait() by a process without children
    NoChildren = -5,
    /// The caller was killed while blocked
    Killed = -6,
    /// System call argument out of range
    InvalidArgument = -7,
}

impl ProcError {
    /// Integer error code
    pub const fn as_errno(self) -> i32 {
        self as i32
    }

    pub const fn message(self) -> &'static str {
        match self {
            ProcError::TableFull => "process table full",
            ProcError::OutOfMemory => "out of memory",
            ProcError::NoSuchProcess => "no such process",
            ProcError::InvalidPriority => "invalid priority",
            ProcError::NoChildren => "no children",
            ProcError::Killed => "killed",
            ProcError::InvalidArgument => "invalid argument",
        }
    }
}

impl fmt::Display for ProcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
