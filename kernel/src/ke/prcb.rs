//! Processor Control Block (PRCB)
//!
//! Per-processor scheduling state:
//! - the process currently running on the processor
//! - interrupt-disable nesting depth and the interrupt state before it
//! - context switch counter
//!
//! Fields are atomics so the control blocks can live in a shared kernel
//! structure, but each one is only written by its own processor with
//! interrupts disabled.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::ps::Slot;

/// Encodes "no current process"
const IDLE: usize = usize::MAX;

/// Processor Control Block
pub struct Prcb {
    /// Slot of the running process, or IDLE
    current: AtomicUsize,
    /// Depth of push_off nesting
    ncli: AtomicUsize,
    /// Were interrupts enabled before the outermost push_off?
    intena: AtomicBool,
    /// Processes dispatched on this processor
    context_switches: AtomicU64,
}

impl Prcb {
    pub const fn new() -> Self {
        Self {
            current: AtomicUsize::new(IDLE),
            ncli: AtomicUsize::new(0),
            intena: AtomicBool::new(false),
            context_switches: AtomicU64::new(0),
        }
    }

    /// Process running on this processor
    #[inline]
    pub fn current(&self) -> Option<Slot> {
        match self.current.load(Ordering::Relaxed) {
            IDLE => None,
            index => Slot::new(index),
        }
    }

    #[inline]
    pub(crate) fn set_current(&self, slot: Option<Slot>) {
        let raw = slot.map_or(IDLE, Slot::index);
        self.current.store(raw, Ordering::Relaxed);
    }

    #[inline]
    pub fn ncli(&self) -> usize {
        self.ncli.load(Ordering::Relaxed)
    }

    /// One more level of interrupt-disable nesting
    ///
    /// `enabled` is the interrupt state before this push; it is only kept
    /// for the outermost level.
    pub(crate) fn push(&self, enabled: bool) {
        if self.ncli.load(Ordering::Relaxed) == 0 {
            self.intena.store(enabled, Ordering::Relaxed);
        }
        self.ncli.fetch_add(1, Ordering::Relaxed);
    }

    /// One level less; returns the new depth, or None if already at zero
    pub(crate) fn pop(&self) -> Option<usize> {
        let depth = self.ncli.load(Ordering::Relaxed).checked_sub(1)?;
        self.ncli.store(depth, Ordering::Relaxed);
        Some(depth)
    }

    #[inline]
    pub fn intena(&self) -> bool {
        self.intena.load(Ordering::Relaxed)
    }

    /// Overwrite the saved interrupt state
    ///
    /// The saved state belongs to the running process; sched() carries it
    /// across a switch.
    #[inline]
    pub(crate) fn set_intena(&self, enabled: bool) {
        self.intena.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn context_switches(&self) -> u64 {
        self.context_switches.load(Ordering::Relaxed)
    }

    pub(crate) fn count_switch(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Prcb {
    fn default() -> Self {
        Self::new()
    }
}
