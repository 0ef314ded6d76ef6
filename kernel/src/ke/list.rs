//! Circular doubly-linked index lists
//!
//! The ready queues are circular doubly-linked lists whose members are
//! process table slots. Instead of pointers embedded in the process control
//! block, every slot owns one [`Link`] in a link array, and a [`Ring`] names
//! the head member of one list.
//!
//! - An unlinked slot has both links absent.
//! - A sole member links to itself in both directions and is the head.
//! - Otherwise `links[links[s].next].prev == s` and vice versa.
//!
//! Operations never panic; a violated invariant is reported as a
//! [`ListFault`] and the caller decides how fatal it is.

use crate::ps::Slot;

/// Queue linkage of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Link {
    pub next: Option<Slot>,
    pub prev: Option<Slot>,
}

impl Link {
    pub const UNLINKED: Link = Link {
        next: None,
        prev: None,
    };

    /// Both links present
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.next.is_some() && self.prev.is_some()
    }

    /// Both links absent
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }
}

/// Structural violation found by a list operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFault {
    /// Insert of a slot that is already a member of some list
    AlreadyLinked(Slot),
    /// Remove from a list with no members
    Empty,
    /// Remove of a slot with no linkage
    NotLinked(Slot),
    /// Linkage of the slot is inconsistent
    Corrupted(Slot),
}

/// Head of one circular list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ring {
    head: Option<Slot>,
    len: usize,
}

impl Ring {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[inline]
    pub fn head(&self) -> Option<Slot> {
        self.head
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append `slot` at the tail (just before the head)
    ///
    /// The head only changes when the list was empty.
    pub fn insert_tail(&mut self, links: &mut [Link], slot: Slot) -> Result<(), ListFault> {
        let link = links[slot.index()];
        if link.is_linked() {
            return Err(ListFault::AlreadyLinked(slot));
        }
        if !link.is_unlinked() {
            return Err(ListFault::Corrupted(slot));
        }

        match self.head {
            None => {
                links[slot.index()] = Link {
                    next: Some(slot),
                    prev: Some(slot),
                };
                self.head = Some(slot);
            }
            Some(head) => {
                let tail = links[head.index()].prev.ok_or(ListFault::Corrupted(head))?;
                links[slot.index()] = Link {
                    next: Some(head),
                    prev: Some(tail),
                };
                links[tail.index()].next = Some(slot);
                links[head.index()].prev = Some(slot);
            }
        }

        self.len += 1;
        Ok(())
    }

    /// Splice `slot` out of the list and clear its links
    ///
    /// If `slot` was the head, the head advances to its successor.
    pub fn remove(&mut self, links: &mut [Link], slot: Slot) -> Result<(), ListFault> {
        let head = self.head.ok_or(ListFault::Empty)?;

        let link = links[slot.index()];
        if link.is_unlinked() {
            return Err(ListFault::NotLinked(slot));
        }
        let (next, prev) = match (link.next, link.prev) {
            (Some(next), Some(prev)) => (next, prev),
            _ => return Err(ListFault::Corrupted(slot)),
        };

        let next_is_self = next == slot;
        let prev_is_self = prev == slot;
        if next_is_self != prev_is_self {
            return Err(ListFault::Corrupted(slot));
        }

        if next_is_self {
            // Sole member
            if head != slot || self.len != 1 {
                return Err(ListFault::Corrupted(slot));
            }
            self.head = None;
        } else {
            if links[next.index()].prev != Some(slot) || links[prev.index()].next != Some(slot) {
                return Err(ListFault::Corrupted(slot));
            }
            // Linked, but possibly into another list sharing `links`
            if !self.contains(links, slot) {
                return Err(ListFault::Corrupted(slot));
            }
            links[prev.index()].next = Some(next);
            links[next.index()].prev = Some(prev);
            if head == slot {
                self.head = Some(next);
            }
        }

        links[slot.index()] = Link::UNLINKED;
        self.len -= 1;
        Ok(())
    }

    /// Whether `slot` is a member of this list
    ///
    /// Walks at most `len` links from the head.
    pub fn contains(&self, links: &[Link], slot: Slot) -> bool {
        self.iter(links).any(|member| member == slot)
    }

    /// Walk the list from the head
    pub fn iter<'a>(&self, links: &'a [Link]) -> RingIter<'a> {
        RingIter {
            links,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Check the whole list
    ///
    /// Walking `len` steps forward from the head must visit members whose
    /// neighbours link back, and arrive at the head again.
    pub fn verify(&self, links: &[Link]) -> Result<(), ListFault> {
        let head = match self.head {
            Some(head) => head,
            None if self.len == 0 => return Ok(()),
            None => return Err(ListFault::Empty),
        };

        let mut cursor = head;
        for _ in 0..self.len {
            let link = links[cursor.index()];
            let next = link.next.ok_or(ListFault::Corrupted(cursor))?;
            let prev = link.prev.ok_or(ListFault::Corrupted(cursor))?;
            if links[next.index()].prev != Some(cursor) || links[prev.index()].next != Some(cursor) {
                return Err(ListFault::Corrupted(cursor));
            }
            cursor = next;
        }

        if cursor != head {
            return Err(ListFault::Corrupted(cursor));
        }
        Ok(())
    }
}

/// Forward iterator over the members of a [`Ring`]
pub struct RingIter<'a> {
    links: &'a [Link],
    cursor: Option<Slot>,
    remaining: usize,
}

impl Iterator for RingIter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.cursor?;
        self.cursor = self.links[slot.index()].next;
        self.remaining -= 1;
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::NPROC;

    fn s(index: usize) -> Slot {
        Slot::new(index).unwrap()
    }

    fn members(ring: &Ring, links: &[Link]) -> Vec<usize> {
        ring.iter(links).map(Slot::index).collect()
    }

    #[test]
    fn test_sole_member_self_loops() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();

        ring.insert_tail(&mut links, s(4)).unwrap();
        assert_eq!(ring.head(), Some(s(4)));
        assert_eq!(links[4].next, Some(s(4)));
        assert_eq!(links[4].prev, Some(s(4)));

        ring.remove(&mut links, s(4)).unwrap();
        assert!(ring.is_empty());
        assert!(links[4].is_unlinked());
    }

    #[test]
    fn test_insert_tail_keeps_head() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();
        for i in [7, 2, 9] {
            ring.insert_tail(&mut links, s(i)).unwrap();
        }
        assert_eq!(ring.head(), Some(s(7)));
        assert_eq!(members(&ring, &links), vec![7, 2, 9]);
        assert_eq!(links[7].prev, Some(s(9)));
        ring.verify(&links).unwrap();
    }

    #[test]
    fn test_remove_head_advances() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();
        for i in [1, 2, 3] {
            ring.insert_tail(&mut links, s(i)).unwrap();
        }
        ring.remove(&mut links, s(1)).unwrap();
        assert_eq!(ring.head(), Some(s(2)));
        ring.remove(&mut links, s(3)).unwrap();
        assert_eq!(members(&ring, &links), vec![2]);
        ring.verify(&links).unwrap();
    }

    #[test]
    fn test_faults() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();

        assert_eq!(ring.remove(&mut links, s(0)), Err(ListFault::Empty));

        ring.insert_tail(&mut links, s(0)).unwrap();
        assert_eq!(
            ring.insert_tail(&mut links, s(0)),
            Err(ListFault::AlreadyLinked(s(0)))
        );
        assert_eq!(ring.remove(&mut links, s(1)), Err(ListFault::NotLinked(s(1))));

        // Half-linked slot
        links[5].next = Some(s(0));
        assert_eq!(ring.insert_tail(&mut links, s(5)), Err(ListFault::Corrupted(s(5))));
        assert_eq!(ring.remove(&mut links, s(5)), Err(ListFault::Corrupted(s(5))));
    }

    #[test]
    fn test_self_loop_that_is_not_head() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();
        ring.insert_tail(&mut links, s(0)).unwrap();

        links[3] = Link {
            next: Some(s(3)),
            prev: Some(s(3)),
        };
        assert_eq!(ring.remove(&mut links, s(3)), Err(ListFault::Corrupted(s(3))));
    }

    #[test]
    fn test_broken_back_link() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut ring = Ring::new();
        for i in [0, 1, 2] {
            ring.insert_tail(&mut links, s(i)).unwrap();
        }
        links[2].prev = Some(s(0));
        assert!(ring.verify(&links).is_err());
        assert_eq!(ring.remove(&mut links, s(1)), Err(ListFault::Corrupted(s(1))));
    }

    #[test]
    fn test_remove_member_of_other_list() {
        let mut links = [Link::UNLINKED; NPROC];
        let mut normal = Ring::new();
        let mut high = Ring::new();
        normal.insert_tail(&mut links, s(0)).unwrap();
        normal.insert_tail(&mut links, s(1)).unwrap();
        high.insert_tail(&mut links, s(2)).unwrap();

        assert!(!high.contains(&links, s(0)));
        assert_eq!(high.remove(&mut links, s(0)), Err(ListFault::Corrupted(s(0))));

        // Both lists untouched
        assert_eq!(members(&normal, &links), vec![0, 1]);
        assert_eq!(members(&high, &links), vec![2]);
        normal.verify(&links).unwrap();
        high.verify(&links).unwrap();
    }
}
