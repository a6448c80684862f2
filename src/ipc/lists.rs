//! Element lists
//!
//! General purpose doubly linked lists for passing items between tasks and
//! interrupt handlers. Elements are kernel objects carrying one word of user
//! data, typically a buffer index or address. An element sits in at most one
//! list at a time. Tasks may wait for an element to arrive at an empty list;
//! interrupt handlers only add or poll.

use crate::arena::{kind, Arena, Handle, Idx};
use crate::config::{CFG_MAX_LISTS, CFG_MAX_LIST_ELEMS};
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::{End, Link, List};
use crate::port::Port;
use crate::task::PendOn;
use crate::time::check_timeout;
use crate::types::{OsPendStatus, Pend, Timeout};

/// List handle
pub type ListId = Handle<kind::List>;

/// List element handle
pub type ElemId = Handle<kind::ListElem>;

/// List control block
pub(crate) struct OsList {
    items: List,
    /// Tasks waiting for an element, most urgent first
    pub(crate) pend_list: List,
}

struct OsListElem {
    data: usize,
    /// Slot of the list holding the element
    owner: Option<Idx>,
}

/// List heads, elements and the element links
pub(crate) struct ListTables {
    pub(crate) heads: Arena<kind::List, OsList, CFG_MAX_LISTS>,
    elems: Arena<kind::ListElem, OsListElem, CFG_MAX_LIST_ELEMS>,
    links: [Link; CFG_MAX_LIST_ELEMS],
}

impl ListTables {
    pub const fn new() -> Self {
        ListTables {
            heads: Arena::new(),
            elems: Arena::new(),
            links: [Link::UNLINKED; CFG_MAX_LIST_ELEMS],
        }
    }

    /// Take an element out of the list holding it. Returns whether it was
    /// in a list.
    fn unlink(&mut self, elem: Idx) -> bool {
        match self.elems.at_mut(elem).owner.take() {
            Some(owner) => {
                self.heads.at_mut(owner).items.remove(&mut self.links, elem);
                true
            }
            None => false,
        }
    }

    /// Take the element at `end` of a list and hand out its handle
    fn take(&mut self, list: Idx, end: End) -> Option<ElemId> {
        let elem = self.heads.at_mut(list).items.pop(&mut self.links, end)?;
        self.elems.at_mut(elem).owner = None;
        Some(self.elems.handle_at(elem))
    }
}

impl<P: Port> Kernel<P> {
    /// Create an empty list
    pub fn list_create(&mut self) -> OsResult<ListId> {
        let list = OsList { items: List::new(), pend_list: List::new() };
        self.lists.heads.insert(list).ok_or(OsError::ObjPoolFull)
    }

    /// Destroy a list. Its elements are unlinked and stay valid. Tasks
    /// waiting on it wake up and get [`OsError::ObjDel`] from
    /// [`list_result`](Self::list_result).
    pub fn list_destroy(&mut self, list: ListId) -> OsResult<()> {
        let Some(mut l) = self.lists.heads.remove(list) else {
            misuse!(OsError::ObjInvalid, "list destroyed twice or stale");
        };

        while let Some(elem) = l.items.pop_head(&mut self.lists.links) {
            self.lists.elems.at_mut(elem).owner = None;
        }
        while let Some(idx) = l.pend_list.pop_head(&mut self.qlinks) {
            self.wake(idx, OsPendStatus::Del);
        }
        self.sched();
        Ok(())
    }

    /// Create a list element carrying `data`
    pub fn list_elem_create(&mut self, data: usize) -> OsResult<ElemId> {
        self.lists
            .elems
            .insert(OsListElem { data, owner: None })
            .ok_or(OsError::ObjPoolFull)
    }

    /// Destroy an element, taking it out of its list first
    pub fn list_elem_destroy(&mut self, elem: ElemId) -> OsResult<()> {
        if !self.lists.elems.contains(elem) {
            misuse!(OsError::ObjInvalid, "list element destroyed twice or stale");
        }
        self.lists.unlink(elem.idx());
        self.lists.elems.remove(elem);
        Ok(())
    }

    /// User data of an element
    pub fn list_elem_data(&self, elem: ElemId) -> OsResult<usize> {
        self.lists.elems.get(elem).map(|e| e.data).ok_or(OsError::ObjInvalid)
    }

    pub fn list_elem_set_data(&mut self, elem: ElemId, data: usize) -> OsResult<()> {
        let e = self.lists.elems.get_mut(elem).ok_or(OsError::ObjInvalid)?;
        e.data = data;
        Ok(())
    }

    /// Add an element at one end of a list
    ///
    /// A task waiting on the list receives the element directly.
    /// May be called from interrupt context.
    ///
    /// # Returns
    /// * `Err(OsError::ListElemBusy)` - The element is already in a list
    pub fn list_add(&mut self, list: ListId, end: End, elem: ElemId) -> OsResult<()> {
        if !self.lists.heads.contains(list) {
            misuse!(OsError::ObjInvalid, "add to stale list");
        }
        let Some(e) = self.lists.elems.get_mut(elem) else {
            misuse!(OsError::ObjInvalid, "add of stale list element");
        };
        if e.owner.is_some() {
            return Err(OsError::ListElemBusy);
        }
        e.owner = Some(list.idx());

        let l = self.lists.heads.at_mut(list.idx());
        match end {
            End::Head => l.items.insert_head(&mut self.lists.links, elem.idx()),
            End::Tail => l.items.insert_tail(&mut self.lists.links, elem.idx()),
        }

        self.list_serve_waiters(list.idx());
        Ok(())
    }

    /// Take an element from a list without a time limit
    pub fn list_get(&mut self, list: ListId, end: End) -> OsResult<Pend<ElemId>> {
        self.list_wait(list, end, Timeout::Infinite)
    }

    /// Take the element at one end of a list
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(elem))` - An element was taken
    /// * `Ok(Pend::Timeout)` - Polled and the list was empty
    /// * `Ok(Pend::Blocked)` - The caller now waits; collect the element
    ///   with [`list_result`](Self::list_result)
    pub fn list_wait(&mut self, list: ListId, end: End, timeout: impl Into<Timeout>) -> OsResult<Pend<ElemId>> {
        let timeout = check_timeout(timeout.into())?;
        if !self.lists.heads.contains(list) {
            misuse!(OsError::ObjInvalid, "wait on stale list");
        }

        if let Some(elem) = self.lists.take(list.idx(), end) {
            return Ok(Pend::Ready(elem));
        }
        if timeout == Timeout::Poll {
            return Ok(Pend::Timeout);
        }

        self.block_current(PendOn::List(list, end), timeout)?;
        self.sched();
        Ok(Pend::Blocked)
    }

    /// Element delivered to the running task's last blocking list wait
    pub fn list_result(&mut self) -> OsResult<Pend<ElemId>> {
        let (cur, status) = self.take_pend(|on| matches!(on, PendOn::List(..)))?;
        match status {
            OsPendStatus::Pending => Ok(Pend::Blocked),
            OsPendStatus::Ok => self
                .tasks
                .at_mut(cur)
                .list_elem
                .take()
                .map(Pend::Ready)
                .ok_or(OsError::PendNone),
            OsPendStatus::Timeout => Ok(Pend::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }

    /// Take an element out of whatever list holds it. Returns whether it
    /// was in a list. May be called from interrupt context.
    pub fn list_remove(&mut self, elem: ElemId) -> OsResult<bool> {
        if !self.lists.elems.contains(elem) {
            misuse!(OsError::ObjInvalid, "remove of stale list element");
        }
        Ok(self.lists.unlink(elem.idx()))
    }

    /// Move every element of `other` into `base` at `end`, keeping their
    /// order. `other` is empty afterwards.
    pub fn list_join(&mut self, base: ListId, end: End, other: ListId) -> OsResult<()> {
        if !self.lists.heads.contains(base) || !self.lists.heads.contains(other) {
            misuse!(OsError::ObjInvalid, "join of stale list");
        }
        if base == other {
            return Ok(());
        }

        let mut moved = core::mem::take(&mut self.lists.heads.at_mut(other.idx()).items);
        for elem in moved.iter(&self.lists.links) {
            self.lists.elems.at_mut(elem).owner = Some(base.idx());
        }
        self.lists
            .heads
            .at_mut(base.idx())
            .items
            .join(&mut self.lists.links, end, &mut moved);

        self.list_serve_waiters(base.idx());
        Ok(())
    }

    /// Number of elements in a list
    pub fn list_len(&self, list: ListId) -> OsResult<usize> {
        self.lists.heads.get(list).map(|l| l.items.len()).ok_or(OsError::ObjInvalid)
    }

    /// Hand elements to waiting tasks while both are there, each from the
    /// end the task asked for
    fn list_serve_waiters(&mut self, list: Idx) {
        let mut woke = false;
        loop {
            let l = self.lists.heads.at_mut(list);
            if l.items.is_empty() {
                break;
            }
            let Some(task) = l.pend_list.pop_head(&mut self.qlinks) else {
                break;
            };
            let end = match self.tasks.at(task).pend_on {
                PendOn::List(_, end) => end,
                _ => End::Head,
            };
            let elem = self.lists.take(list, end);
            self.tasks.at_mut(task).list_elem = elem;
            self.wake(task, OsPendStatus::Ok);
            woke = true;
        }
        if woke {
            self.sched();
        }
    }
}
