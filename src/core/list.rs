//! Index-linked doubly linked lists
//!
//! Every queue in the kernel (ready lists, wait queues, message boxes, the
//! message free list, the active timer list, the tick wheel and the
//! user-visible element lists) is a [`List`]
//! of slot indices. The links live in a separate `[Link]` table indexed by
//! slot, one table per object kind and queue family. An object sharing a link
//! table can therefore sit in at most one of that family's lists at a time,
//! which is checked on every insert.

use crate::arena::Idx;

/// End of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum End {
    Head,
    Tail,
}

/// Per-slot list links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    prev: Option<Idx>,
    next: Option<Idx>,
    linked: bool,
}

impl Link {
    pub const UNLINKED: Link = Link { prev: None, next: None, linked: false };

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Successor in the list, valid while linked
    #[inline]
    pub fn next(&self) -> Option<Idx> {
        self.next
    }
}

/// List head
#[derive(Debug, Clone, Copy)]
pub(crate) struct List {
    head: Option<Idx>,
    tail: Option<Idx>,
    len: u16,
}

impl List {
    pub const fn new() -> Self {
        List { head: None, tail: None, len: 0 }
    }

    #[inline]
    pub fn head(&self) -> Option<Idx> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Insert at the tail (FIFO order)
    pub fn insert_tail(&mut self, links: &mut [Link], idx: Idx) {
        self.insert_before(links, None, idx);
    }

    /// Insert at the head (LIFO order)
    pub fn insert_head(&mut self, links: &mut [Link], idx: Idx) {
        let head = self.head;
        self.insert_before(links, head, idx);
    }

    /// Insert before the first element for which `goes_before` holds,
    /// or at the tail if there is none. Elements that compare equal keep
    /// their arrival order.
    pub fn insert_by(
        &mut self,
        links: &mut [Link],
        idx: Idx,
        mut goes_before: impl FnMut(Idx) -> bool,
    ) {
        let mut cursor = self.head;
        while let Some(cur) = cursor {
            if goes_before(cur) {
                break;
            }
            cursor = links[cur as usize].next;
        }
        self.insert_before(links, cursor, idx);
    }

    /// Insert `idx` in front of `at`; `None` means at the tail
    fn insert_before(&mut self, links: &mut [Link], at: Option<Idx>, idx: Idx) {
        debug_assert!(!links[idx as usize].linked, "element already in a list");

        let prev = match at {
            Some(at) => links[at as usize].prev,
            None => self.tail,
        };

        links[idx as usize] = Link { prev, next: at, linked: true };

        match prev {
            Some(p) => links[p as usize].next = Some(idx),
            None => self.head = Some(idx),
        }
        match at {
            Some(n) => links[n as usize].prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.len += 1;
    }

    /// Unlink a known element in O(1)
    pub fn remove(&mut self, links: &mut [Link], idx: Idx) {
        let link = links[idx as usize];
        debug_assert!(link.linked, "element not in a list");

        match link.prev {
            Some(prev) => links[prev as usize].next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => links[next as usize].prev = link.prev,
            None => self.tail = link.prev,
        }

        links[idx as usize] = Link::UNLINKED;
        self.len = self.len.saturating_sub(1);
    }

    /// Take the first element
    pub fn pop_head(&mut self, links: &mut [Link]) -> Option<Idx> {
        let idx = self.head?;
        self.remove(links, idx);
        Some(idx)
    }

    /// Take the last element
    pub fn pop_tail(&mut self, links: &mut [Link]) -> Option<Idx> {
        let idx = self.tail?;
        self.remove(links, idx);
        Some(idx)
    }

    /// Take the element at `end`
    #[inline]
    pub fn pop(&mut self, links: &mut [Link], end: End) -> Option<Idx> {
        match end {
            End::Head => self.pop_head(links),
            End::Tail => self.pop_tail(links),
        }
    }

    /// Move every element of `other` into this list at `end`.
    /// `other` is empty afterwards.
    pub fn join(&mut self, links: &mut [Link], end: End, other: &mut List) {
        let (Some(o_head), Some(o_tail)) = (other.head, other.tail) else {
            return;
        };

        match (end, self.head, self.tail) {
            (End::Tail, _, Some(tail)) => {
                links[tail as usize].next = Some(o_head);
                links[o_head as usize].prev = Some(tail);
                self.tail = Some(o_tail);
            }
            (End::Head, Some(head), _) => {
                links[o_tail as usize].next = Some(head);
                links[head as usize].prev = Some(o_tail);
                self.head = Some(o_head);
            }
            _ => {
                self.head = Some(o_head);
                self.tail = Some(o_tail);
            }
        }

        self.len += other.len;
        *other = List::new();
    }

    /// Walk the list from head to tail
    pub fn iter<'a>(&self, links: &'a [Link]) -> Iter<'a> {
        Iter { links, cursor: self.head }
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Iter<'a> {
    links: &'a [Link],
    cursor: Option<Idx>,
}

impl Iterator for Iter<'_> {
    type Item = Idx;

    fn next(&mut self) -> Option<Idx> {
        let cur = self.cursor?;
        self.cursor = self.links[cur as usize].next;
        Some(cur)
    }
}
