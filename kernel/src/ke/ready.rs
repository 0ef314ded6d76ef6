//! Priority Ready Queues
//!
//! One circular list of RUNNABLE slots per [`Priority`], plus a summary bit
//! set recording which lists are non-empty so the dispatcher finds work in
//! constant time, like the ready summary of an NT processor control block.
//!
//! Every structural violation is fatal: the queues are only ever touched
//! with the process table lock held, so a broken link means memory
//! corruption or a logic error in the lifecycle code.

use bitflags::bitflags;

use crate::config::constants::NPROC;
use crate::ps::{Priority, Slot};

use super::bugcheck::{bugcheck, codes};
use super::list::{Link, ListFault, Ring, RingIter};

bitflags! {
    /// Non-empty ready queues, one bit per priority level
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReadySummary: u32 {
        /// HIGH queue has members
        const HIGH = 1 << 0;
        /// NORMAL queue has members
        const NORMAL = 1 << 1;
    }
}

impl ReadySummary {
    /// Bit of one priority level
    pub const fn of(priority: Priority) -> Self {
        match priority {
            Priority::High => Self::HIGH,
            Priority::Normal => Self::NORMAL,
        }
    }
}

/// The ready queues and the link array backing them
#[derive(Debug, Clone)]
pub struct ReadyQueues {
    links: [Link; NPROC],
    rings: [Ring; Priority::COUNT],
    summary: ReadySummary,
}

impl ReadyQueues {
    pub const fn new() -> Self {
        Self {
            links: [Link::UNLINKED; NPROC],
            rings: [Ring::new(); Priority::COUNT],
            summary: ReadySummary::empty(),
        }
    }

    /// Append `slot` to the tail of the `priority` queue
    pub fn enqueue(&mut self, slot: Slot, priority: Priority) {
        let ring = &mut self.rings[priority.index()];
        if let Err(fault) = ring.insert_tail(&mut self.links, slot) {
            fatal(fault, priority);
        }
        self.summary.insert(ReadySummary::of(priority));
    }

    /// Remove `slot` from the `priority` queue
    pub fn dequeue(&mut self, slot: Slot, priority: Priority) {
        let ring = &mut self.rings[priority.index()];
        if let Err(fault) = ring.remove(&mut self.links, slot) {
            fatal(fault, priority);
        }
        if ring.is_empty() {
            self.summary.remove(ReadySummary::of(priority));
        }
    }

    /// Head of the highest non-empty queue
    ///
    /// Levels are tried in [`Priority::ALL`] order, so HIGH always wins.
    pub fn select(&self) -> Option<(Slot, Priority)> {
        if self.summary.is_empty() {
            return None;
        }
        Priority::ALL.into_iter().find_map(|priority| {
            self.rings[priority.index()]
                .head()
                .map(|slot| (slot, priority))
        })
    }

    pub fn head(&self, priority: Priority) -> Option<Slot> {
        self.rings[priority.index()].head()
    }

    pub fn len(&self, priority: Priority) -> usize {
        self.rings[priority.index()].len()
    }

    /// Number of queued slots across all levels
    pub fn total(&self) -> usize {
        self.rings.iter().map(Ring::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    pub fn summary(&self) -> ReadySummary {
        self.summary
    }

    /// Linkage of one slot
    pub fn link(&self, slot: Slot) -> Link {
        self.links[slot.index()]
    }

    pub fn is_queued(&self, slot: Slot) -> bool {
        self.links[slot.index()].is_linked()
    }

    /// Members of one queue in dispatch order
    pub fn iter(&self, priority: Priority) -> RingIter<'_> {
        self.rings[priority.index()].iter(&self.links)
    }

    /// Priority level whose queue holds `slot`
    pub fn queue_of(&self, slot: Slot) -> Option<Priority> {
        Priority::ALL
            .into_iter()
            .find(|&priority| self.iter(priority).any(|member| member == slot))
    }

    /// Full structural check of every queue
    ///
    /// Each list must be a consistent ring, the summary must match, and no
    /// slot outside the rings may carry linkage.
    pub fn verify(&self) -> Result<(), ListFault> {
        for priority in Priority::ALL {
            let ring = &self.rings[priority.index()];
            ring.verify(&self.links)?;
            if self.summary.contains(ReadySummary::of(priority)) == ring.is_empty() {
                return Err(ListFault::Empty);
            }
        }

        let linked = self.links.iter().filter(|link| !link.is_unlinked()).count();
        if linked != self.total() {
            let stray = Slot::all()
                .find(|&slot| !self.links[slot.index()].is_unlinked() && self.queue_of(slot).is_none());
            return Err(stray.map_or(ListFault::Empty, ListFault::Corrupted));
        }
        Ok(())
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a list fault into the matching bug check
#[cold]
#[track_caller]
fn fatal(fault: ListFault, priority: Priority) -> ! {
    let (code, slot) = match fault {
        ListFault::AlreadyLinked(slot) => (codes::DOUBLE_ENQUEUE, Some(slot)),
        ListFault::Empty => (codes::EMPTY_READY_QUEUE, None),
        ListFault::NotLinked(slot) => (codes::PROCESS_NOT_QUEUED, Some(slot)),
        ListFault::Corrupted(slot) => (codes::READY_QUEUE_CORRUPTED, Some(slot)),
    };
    log::error!("{} ready queue: {:?}", priority.name(), fault);
    bugcheck(code, slot.map_or(u64::MAX, |slot| slot.index() as u64));
}
