//! Process Control Block
//!
//! A [`Proc`] is one slot of the process table. Everything the scheduler
//! knows about a process lives here except its ready-queue linkage, which the
//! table keeps in a separate link array (see [`crate::ke::ready`]), and its
//! execution context, which belongs to the [`Machine`](crate::hal::Machine).
//!
//! # Lifecycle
//!
//! ```text
//!   UNUSED --alloc--> EMBRYO --ready--> RUNNABLE --dispatch--> RUNNING
//!     ^                 |                  ^  ^                 | | |
//!     |   fork failed   |                  |  +-----yield-------+ | |
//!     +-----------------+                  +--wakeup/kill-- SLEEPING |
//!     |                                                        <-----+ sleep
//!     +------------------reap------------------ ZOMBIE <--------exit--+
//! ```
//!
//! The state is a sum type: a channel exists only while SLEEPING and an exit
//! status only while ZOMBIE, so neither can be read stale after a change.

use core::fmt;

use crate::config::constants::{FREE_SLOT_PRIORITY, NPROC, PROC_NAME_LEN};
use crate::ke::bugcheck::{bugcheck, codes};

use super::ProcError;

// ============================================================================
// Identifiers
// ============================================================================

/// Process ID as seen by user programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a process control block inside the process table
///
/// Slots are stable for the whole life of a process; relationships and
/// queue links are expressed as slots, never as references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(usize);

impl Slot {
    /// Wrap a table index, or None if it is out of range
    pub const fn new(index: usize) -> Option<Self> {
        if index < NPROC {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0
    }

    /// Every slot of the table, in scan order
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..NPROC).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Scheduling priority
///
/// HIGH processes are always selected before NORMAL ones. The numeric values
/// are the ones used at the system-call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Drained first at every scheduling decision
    High = 0,
    /// Considered only when no HIGH process is runnable
    Normal = 1,
}

impl Priority {
    /// Number of priority levels (one ready queue each)
    pub const COUNT: usize = 2;

    /// Levels in selection order
    pub const ALL: [Priority; Priority::COUNT] = [Priority::High, Priority::Normal];

    /// Ready-queue index of this level
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

impl TryFrom<i32> for Priority {
    type Error = ProcError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Priority::High),
            1 => Ok(Priority::Normal),
            _ => Err(ProcError::InvalidPriority),
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> i32 {
        priority as i32
    }
}

// ============================================================================
// Channels
// ============================================================================

/// Key that pairs a sleeping process with the event that wakes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A parent blocked in wait(), keyed by its own slot
    Wait(Slot),
    /// The clock tick counter
    Ticks,
    /// Any kernel object, keyed by its address
    Addr(usize),
}

impl Channel {
    /// Channel keyed by the address of `object`
    pub fn of<T>(object: &T) -> Self {
        Channel::Addr(object as *const T as usize)
    }
}

// ============================================================================
// Process Name
// ============================================================================

/// Fixed-capacity process name
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcName {
    bytes: [u8; PROC_NAME_LEN],
    len: u8,
}

impl ProcName {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; PROC_NAME_LEN],
            len: 0,
        }
    }

    /// Copy `name`, truncated to fit with room for a terminator
    ///
    /// Truncation happens on a character boundary.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(PROC_NAME_LEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0; PROC_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a &str cut on a char boundary
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("?")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ProcName {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Process State
// ============================================================================

/// Process states, each carrying only the data valid in that state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Free table slot
    Unused,
    /// Allocated, execution context being set up
    Embryo,
    /// Linked into the ready queue of its priority
    Runnable,
    /// Executing on a processor
    Running {
        /// Processor the process was dispatched on
        cpu: usize,
    },
    /// Blocked until a wakeup on `chan` (or a kill)
    Sleeping {
        chan: Channel,
    },
    /// Exited, waiting for the parent to reap it
    Zombie {
        status: i32,
    },
}

/// Discriminant of [`ProcState`] without the per-state data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StateKind {
    Unused = 0,
    Embryo = 1,
    Sleeping = 2,
    Runnable = 3,
    Running = 4,
    Zombie = 5,
}

impl StateKind {
    /// Six-column label used by the process dump
    pub const fn label(self) -> &'static str {
        match self {
            StateKind::Unused => "unused",
            StateKind::Embryo => "embryo",
            StateKind::Sleeping => "sleep ",
            StateKind::Runnable => "runble",
            StateKind::Running => "run   ",
            StateKind::Zombie => "zombie",
        }
    }
}

impl ProcState {
    pub const fn kind(&self) -> StateKind {
        match self {
            ProcState::Unused => StateKind::Unused,
            ProcState::Embryo => StateKind::Embryo,
            ProcState::Runnable => StateKind::Runnable,
            ProcState::Running { .. } => StateKind::Running,
            ProcState::Sleeping { .. } => StateKind::Sleeping,
            ProcState::Zombie { .. } => StateKind::Zombie,
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub const fn can_become(&self, next: &ProcState) -> bool {
        matches!(
            (self.kind(), next.kind()),
            (StateKind::Unused, StateKind::Embryo)
                | (StateKind::Embryo, StateKind::Runnable)
                | (StateKind::Embryo, StateKind::Unused)
                | (StateKind::Runnable, StateKind::Running)
                | (StateKind::Running, StateKind::Runnable)
                | (StateKind::Running, StateKind::Sleeping)
                | (StateKind::Running, StateKind::Zombie)
                | (StateKind::Sleeping, StateKind::Runnable)
                | (StateKind::Zombie, StateKind::Unused)
        )
    }

    /// Channel of a sleeping process
    pub const fn channel(&self) -> Option<Channel> {
        match self {
            ProcState::Sleeping { chan } => Some(*chan),
            _ => None,
        }
    }

    /// Exit status of a zombie
    pub const fn exit_status(&self) -> Option<i32> {
        match self {
            ProcState::Zombie { status } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// Process Control Block
// ============================================================================

/// Process control block
#[derive(Debug, Clone, Copy)]
pub struct Proc {
    /// Process id, None while the slot is free
    pub(crate) pid: Option<Pid>,
    pub(crate) name: ProcName,
    state: ProcState,
    pub(crate) priority: Priority,
    /// Weak back-reference to the parent's slot
    pub(crate) parent: Option<Slot>,
    /// Set by kill(), observed at checkpoints
    pub(crate) killed: bool,
}

impl Proc {
    /// A free slot
    pub const fn new() -> Self {
        Self {
            pid: None,
            name: ProcName::empty(),
            state: ProcState::Unused,
            priority: FREE_SLOT_PRIORITY,
            parent: None,
            killed: false,
        }
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn name(&self) -> &ProcName {
        &self.name
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn parent(&self) -> Option<Slot> {
        self.parent
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Allocated and not yet reaped
    pub fn is_live(&self) -> bool {
        self.state != ProcState::Unused
    }

    /// Move to `next`, bug-checking on an edge outside the lifecycle graph
    ///
    /// Returns the old state so callers can pick up its data.
    pub(crate) fn transition(&mut self, slot: Slot, next: ProcState) -> ProcState {
        if !self.state.can_become(&next) {
            log::error!(
                "slot {}: illegal transition {:?} -> {:?}",
                slot,
                self.state.kind(),
                next.kind()
            );
            bugcheck(codes::INVALID_STATE_TRANSITION, slot.index() as u64);
        }
        core::mem::replace(&mut self.state, next)
    }

    /// Return every field to its free-slot value
    ///
    /// Only valid from ZOMBIE (reap) or EMBRYO (failed fork).
    pub(crate) fn clear(&mut self, slot: Slot) {
        self.transition(slot, ProcState::Unused);
        *self = Self::new();
    }

    /// Summary for diagnostics and tests
    pub fn info(&self) -> ProcInfo {
        ProcInfo {
            pid: self.pid,
            name: self.name,
            state: self.state,
            priority: self.priority,
            parent: self.parent,
            killed: self.killed,
        }
    }
}

impl Default for Proc {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the observable fields of one process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: Option<Pid>,
    pub name: ProcName,
    pub state: ProcState,
    pub priority: Priority,
    pub parent: Option<Slot>,
    pub killed: bool,
}
