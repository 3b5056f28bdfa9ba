use std::io;
use std::os::unix::io::RawFd;

use indexmap::IndexMap;
use slab::Slab;

use crate::slot::{NativeRegistration, Slot, SlotHandler};
use crate::sys;
use crate::sys::epoll::Epoll;

/// Epoll fd, slot table, and fd→slot registry — the mutable state that only the
/// loop thread is ever allowed to touch.
///
/// Wrapped in a `Mutex` solely so registration/unregistration closures captured on
/// foreign threads (and routed through the submission queue) are `Send`; by
/// construction only the loop thread ever calls `lock()`, so contention never
/// actually happens. A real cross-thread caller wanting to register a socket still
/// has to go through `execute`, not through a borrowed `&Inner`.
pub(crate) struct Inner {
    epoll: Epoll,
    slots: Slab<Slot>,
    registry: IndexMap<RawFd, usize>,
}

impl Inner {
    pub fn new() -> io::Result<Inner> {
        Ok(Inner {
            epoll: Epoll::new()?,
            slots: Slab::new(),
            registry: IndexMap::new(),
        })
    }

    pub fn epoll(&self) -> &Epoll {
        &self.epoll
    }

    /// Allocates a slot, registers `fd` for readability with the kernel, and
    /// records `fd -> index` in the registry. On `epoll_ctl` failure the slot
    /// allocation is rolled back so the slab's vacant list doesn't leak a dead
    /// entry.
    ///
    /// `fd` is forced non-blocking first: `recvmmsg` on a blocking socket can wait
    /// for the full batch to fill rather than returning whatever is already
    /// available, which would stall the loop thread behind a single socket.
    pub fn register_slot(&mut self, fd: RawFd, handler: SlotHandler) -> io::Result<usize> {
        sys::set_nonblocking(fd)?;

        let index = self.slots.insert(Slot::new(fd, handler));

        if let Err(err) = self.epoll.add(fd, index) {
            log::warn!("epoll_ctl(ADD) failed for fd {}: {}", fd, err);
            self.slots.remove(index);
            return Err(err);
        }

        self.slots[index].native = Some(Box::new(NativeRegistration { fd }));
        self.registry.insert(fd, index);
        Ok(index)
    }

    /// Removes a slot by its epoll-carried index: deletes the kernel registration,
    /// drops the slot (running its handler's `on_remove` is the caller's job, since
    /// that needs `&mut` access the caller already holds), and removes the fd from
    /// the registry.
    pub fn unregister_slot(&mut self, index: usize) -> Option<Slot> {
        if !self.slots.contains(index) {
            return None;
        }
        let slot = self.slots.remove(index);
        debug_assert!(slot.native.is_some(), "live slot must own a native registration");
        if let Err(err) = self.epoll.delete(slot.fd) {
            log::warn!("epoll_ctl(DEL) failed for fd {}: {}", slot.fd, err);
        }
        self.registry.shift_remove(&slot.fd);
        Some(slot)
    }

    pub fn unregister_by_fd(&mut self, fd: RawFd) -> Option<Slot> {
        let index = self.registry.get(&fd).copied()?;
        self.unregister_slot(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// Drains every remaining slot, in arbitrary order, for use at shutdown. The
    /// caller is responsible for invoking each handler's `on_remove`.
    pub fn drain(&mut self) -> Vec<Slot> {
        self.registry.clear();
        let slots: Vec<Slot> = self.slots.drain().collect();
        for slot in &slots {
            if let Err(err) = self.epoll.delete(slot.fd) {
                log::warn!("epoll_ctl(DEL) failed for fd {} during shutdown: {}", slot.fd, err);
            }
        }
        slots
    }
}
