// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable container pool.
//!
//! [`RowPool`] keeps every container it ever created and hands out
//! generational [`PoolHandle`]s instead of the containers themselves. Releasing
//! a handle resets its container and puts the slot back on the free list, so
//! rebuilding a view does not allocate fresh containers every frame.
//!
//! Handles are checked on every access:
//!
//! - Releasing twice, or releasing a handle obtained before [`RowPool::clear`],
//!   is a no-op that returns `false`.
//! - A released slot gets a new generation when it is acquired again, so a
//!   stale handle never aliases the new owner's container.

use alloc::vec::Vec;
use core::fmt;

/// Creates and resets the containers of a [`RowPool`].
pub trait Recycle {
    /// The pooled container type.
    type Item;

    /// Allocates a fresh container in its reset state.
    fn create(&mut self) -> Self::Item;

    /// Restores `item` to the state [`create`](Self::create) produces.
    fn reset(&mut self, item: &mut Self::Item);
}

/// A [`Recycle`] built from two closures.
pub struct FnRecycle<C, R> {
    create: C,
    reset: R,
}

impl<C, R> FnRecycle<C, R> {
    /// Wraps a `create` and a `reset` closure.
    pub fn new(create: C, reset: R) -> Self {
        Self { create, reset }
    }
}

impl<C, R> fmt::Debug for FnRecycle<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRecycle").finish_non_exhaustive()
    }
}

impl<T, C, R> Recycle for FnRecycle<C, R>
where
    C: FnMut() -> T,
    R: FnMut(&mut T),
{
    type Item = T;

    fn create(&mut self) -> T {
        (self.create)()
    }

    fn reset(&mut self, item: &mut T) {
        (self.reset)(item);
    }
}

/// Handle to a container lent out by a [`RowPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
    epoch: u32,
}

/// Occupancy of a [`RowPool`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Containers on the free list.
    pub available: usize,
    /// Containers currently lent out.
    pub in_use: usize,
    /// All containers owned by the pool.
    pub total: usize,
}

struct Slot<T> {
    item: T,
    generation: u32,
    in_use: bool,
}

/// Object pool lending reusable containers through [`PoolHandle`]s.
///
/// ```rust
/// use understory_outline::{FnRecycle, RowPool};
///
/// let mut pool = RowPool::new(FnRecycle::new(Vec::<u32>::new, Vec::clear), 2);
/// assert_eq!(pool.stats().available, 2);
///
/// let h = pool.acquire();
/// pool.get_mut(h).unwrap().push(7);
/// assert!(pool.release(h));
/// assert!(!pool.release(h), "double release is ignored");
///
/// let again = pool.acquire();
/// assert!(pool.get(again).unwrap().is_empty());
/// assert_eq!(pool.get(h), None);
/// ```
pub struct RowPool<R: Recycle> {
    recycler: R,
    slots: Vec<Slot<R::Item>>,
    free: Vec<u32>,
    in_use: usize,
    epoch: u32,
}

impl<R: Recycle> fmt::Debug for RowPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowPool")
            .field("stats", &self.stats())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<R: Recycle> RowPool<R> {
    /// Creates a pool with `initial_size` containers ready on the free list.
    pub fn new(recycler: R, initial_size: usize) -> Self {
        let mut pool = Self {
            recycler,
            slots: Vec::new(),
            free: Vec::new(),
            in_use: 0,
            epoch: 0,
        };
        pool.reserve(initial_size);
        pool
    }

    /// Creates `additional` containers and puts them on the free list.
    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
        self.free.reserve(additional);
        for _ in 0..additional {
            let index = self.push_slot();
            self.free.push(index);
        }
    }

    /// Lends out a container, creating one if the free list is empty.
    pub fn acquire(&mut self) -> PoolHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.push_slot(),
        };
        let slot = &mut self.slots[index as usize];
        slot.in_use = true;
        self.in_use += 1;
        PoolHandle {
            index,
            generation: slot.generation,
            epoch: self.epoch,
        }
    }

    /// Resets the container behind `handle` and returns it to the free list.
    ///
    /// Returns `false`, without touching the pool, if `handle` is not
    /// currently lent out by this pool.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        if !self.is_live(handle) {
            log::trace!("ignoring release of {handle:?}: not in use");
            return false;
        }
        let slot = &mut self.slots[handle.index as usize];
        self.recycler.reset(&mut slot.item);
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.in_use -= 1;
        true
    }

    /// Releases each handle independently and returns how many were live.
    pub fn release_all<I>(&mut self, handles: I) -> usize
    where
        I: IntoIterator<Item = PoolHandle>,
    {
        handles
            .into_iter()
            .filter(|&handle| self.release(handle))
            .count()
    }

    /// Returns `true` if `handle` is currently lent out by this pool.
    #[must_use]
    pub fn is_live(&self, handle: PoolHandle) -> bool {
        handle.epoch == self.epoch
            && self
                .slots
                .get(handle.index as usize)
                .is_some_and(|slot| slot.in_use && slot.generation == handle.generation)
    }

    /// The container behind a live handle.
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&R::Item> {
        if self.is_live(handle) {
            Some(&self.slots[handle.index as usize].item)
        } else {
            None
        }
    }

    /// Mutable access to the container behind a live handle.
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut R::Item> {
        if self.is_live(handle) {
            Some(&mut self.slots[handle.index as usize].item)
        } else {
            None
        }
    }

    /// Drops every container without resetting it.
    ///
    /// Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.in_use = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Current occupancy.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free.len(),
            in_use: self.in_use,
            total: self.slots.len(),
        }
    }

    /// The container factory.
    #[must_use]
    pub fn recycler(&self) -> &R {
        &self.recycler
    }

    /// Swaps the container factory and drops every pooled container, since
    /// they were made by the old one.
    pub(crate) fn reprovision(&mut self, recycler: R) {
        self.recycler = recycler;
        self.clear();
    }

    fn push_slot(&mut self) -> u32 {
        let index = u32::try_from(self.slots.len()).expect("too many pooled containers for u32");
        self.slots.push(Slot {
            item: self.recycler.create(),
            generation: 0,
            in_use: false,
        });
        index
    }
}
