//! System Call Boundary
//!
//! Integer-returning wrappers around the process operations, in the shape
//! user programs see them. Argument fetching is the trap layer's job; these
//! take already decoded arguments.
//!
//! Every error is reported as `-1`.

use crate::hal::Machine;
use crate::ke::Kernel;
use crate::ps::{ExitStatus, Pid, Priority, ProcError};

/// Flatten a result into a system call return value
fn ret(result: Result<i32, ProcError>) -> i32 {
    result.unwrap_or(-1)
}

/// Convert a user-supplied pid
fn pid_arg(raw: i32) -> Result<Pid, ProcError> {
    u32::try_from(raw)
        .ok()
        .filter(|&pid| pid != 0)
        .map(Pid::new)
        .ok_or(ProcError::NoSuchProcess)
}

fn pid_ret(pid: Pid) -> i32 {
    i32::try_from(pid.as_u32()).unwrap_or(-1)
}

impl<M: Machine> Kernel<M> {
    pub fn sys_fork(&self) -> i32 {
        ret(self.fork().map(pid_ret))
    }

    /// Exit with `code` in the voluntary exit encoding
    pub fn sys_exit(&self, code: i32) -> ! {
        self.exit(ExitStatus::from_code(code).raw())
    }

    pub fn sys_wait(&self, status: Option<&mut i32>) -> i32 {
        ret(self.wait(status).map(pid_ret))
    }

    pub fn sys_kill(&self, pid: i32) -> i32 {
        ret(pid_arg(pid).and_then(|pid| self.kill(pid)).map(|()| 0))
    }

    pub fn sys_getpid(&self) -> i32 {
        pid_ret(self.getpid())
    }

    pub fn sys_getprio(&self, pid: i32) -> i32 {
        ret(pid_arg(pid)
            .and_then(|pid| self.getprio(pid))
            .map(i32::from))
    }

    pub fn sys_setprio(&self, pid: i32, priority: i32) -> i32 {
        let result = Priority::try_from(priority)
            .and_then(|priority| pid_arg(pid).and_then(|pid| self.setprio(pid, priority)));
        ret(result.map(|()| 0))
    }

    /// Sleep for `n` ticks; negative counts are rejected
    pub fn sys_sleep(&self, n: i32) -> i32 {
        let result = u64::try_from(n)
            .map_err(|_| ProcError::InvalidArgument)
            .and_then(|n| self.sleep_ticks(n));
        ret(result.map(|()| 0))
    }

    pub fn sys_uptime(&self) -> i32 {
        i32::try_from(self.uptime()).unwrap_or(i32::MAX)
    }
}
