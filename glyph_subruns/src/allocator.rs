// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena accounting for sub-runs and their containers.
//!
//! Every sub-run, glyph array and position array of a container is created
//! through a [`SubRunAllocator`]. Owners borrow the allocator, so the borrow
//! checker guarantees the allocator outlives every container and every
//! reference derived from one. The allocator tracks bytes handed out (which
//! only ever grows, as in a bump arena) and the number of live owners, so a
//! caller can verify size estimates and observe teardown.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt::{Debug, Formatter};
use core::ops::Deref;

/// Arena handle that sub-runs and containers are allocated in.
///
/// Not `Sync`: an allocator and everything created in it belong to one thread.
#[derive(Default)]
pub struct SubRunAllocator {
    /// Bytes the caller expects to need; purely advisory.
    reserved: Cell<usize>,
    /// Bytes handed out so far.
    allocated: Cell<usize>,
    /// Owners created and not yet dropped.
    live: Cell<usize>,
}

impl SubRunAllocator {
    /// Creates an allocator with no reservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that expects to hand out about `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        let alloc = Self::new();
        alloc.reserved.set(bytes);
        alloc
    }

    /// Raises the reservation by `bytes`.
    pub fn reserve(&self, bytes: usize) {
        self.reserved.set(self.reserved.get().saturating_add(bytes));
    }

    /// Bytes the allocator was told to expect.
    pub fn reserved(&self) -> usize {
        self.reserved.get()
    }

    /// Bytes handed out so far.
    pub fn bytes_allocated(&self) -> usize {
        self.allocated.get()
    }

    /// Number of [`ArenaBox`] owners that have not been dropped yet.
    pub fn live_objects(&self) -> usize {
        self.live.get()
    }

    fn account(&self, bytes: usize) {
        let reserved = self.reserved.get();
        let before = self.allocated.get();
        let after = before.saturating_add(bytes);
        self.allocated.set(after);
        if before <= reserved && after > reserved && reserved != 0 {
            log::trace!("sub-run allocator grew past its {reserved} byte reservation");
        }
    }

    /// Moves `value` into the arena, returning its owner.
    pub fn make_unique<T>(&self, value: T) -> ArenaBox<'_, T> {
        self.account(size_of::<T>());
        self.live.set(self.live.get() + 1);
        ArenaBox {
            value: Box::new(value),
            alloc: self,
        }
    }

    /// Collects `items` into an arena-accounted slice.
    ///
    /// Slices are owned by the object they are stored in; they are released
    /// together with it.
    pub fn make_slice<T>(&self, items: impl IntoIterator<Item = T>) -> Box<[T]> {
        let items: Vec<T> = items.into_iter().collect();
        self.account(items.len() * size_of::<T>());
        items.into_boxed_slice()
    }
}

impl Debug for SubRunAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubRunAllocator")
            .field("reserved", &self.reserved.get())
            .field("allocated", &self.allocated.get())
            .field("live", &self.live.get())
            .finish()
    }
}

/// Owner of one object created by a [`SubRunAllocator`].
///
/// Dropping the owner runs the object's destructor and tells the allocator
/// the object is gone; the bytes stay accounted until the allocator itself
/// is dropped.
pub struct ArenaBox<'a, T> {
    value: Box<T>,
    alloc: &'a SubRunAllocator,
}

impl<'a, T> ArenaBox<'a, T> {
    /// The allocator this object was created in.
    pub fn allocator(this: &Self) -> &'a SubRunAllocator {
        this.alloc
    }
}

impl<T> Deref for ArenaBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for ArenaBox<'_, T> {
    fn drop(&mut self) {
        self.alloc.live.set(self.alloc.live.get().saturating_sub(1));
    }
}

impl<T: Debug> Debug for ArenaBox<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&*self.value, f)
    }
}
