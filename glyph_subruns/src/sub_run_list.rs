// Copyright 2025 the Parley Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Append-only list of sub-runs.

use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use core::iter::FusedIterator;

use crate::sub_run::{SubRunOwner, SubRunVariant};

struct Node<'a> {
    sub_run: SubRunOwner<'a>,
    next: Option<usize>,
}

/// Sub-runs in the order they were appended, which is also drawing order.
///
/// Nodes are linked by index. Links are only ever written by
/// [`SubRunList::append`], so every node has exactly one predecessor and the
/// chain has no cycles. Nothing can be removed.
#[derive(Default)]
pub struct SubRunList<'a> {
    nodes: Vec<Node<'a>>,
    head: Option<usize>,
    /// Node whose `next` slot holds the terminator; `None` means the head
    /// slot itself.
    tail: Option<usize>,
}

impl<'a> SubRunList<'a> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `sub_run`, taking ownership of it.
    pub fn append(&mut self, sub_run: SubRunOwner<'a>) {
        let index = self.nodes.len();
        self.nodes.push(Node {
            sub_run,
            next: None,
        });
        let slot = match self.tail {
            Some(tail) => &mut self.nodes[tail].next,
            None => &mut self.head,
        };
        debug_assert!(slot.is_none(), "tail slot must hold the terminator");
        *slot = Some(index);
        self.tail = Some(index);
    }

    /// Whether nothing was ever appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of sub-runs.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The first sub-run, if any.
    pub fn front(&self) -> Option<&SubRunVariant> {
        self.head.map(|index| &*self.nodes[index].sub_run)
    }

    /// Iterates over the sub-runs in insertion order.
    pub fn iter(&self) -> SubRunIter<'_, 'a> {
        SubRunIter {
            list: self,
            next: self.head,
        }
    }
}

impl Debug for SubRunList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'l, 'a> IntoIterator for &'l SubRunList<'a> {
    type Item = &'l SubRunVariant;
    type IntoIter = SubRunIter<'l, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward iterator over a [`SubRunList`].
#[derive(Clone)]
pub struct SubRunIter<'l, 'a> {
    list: &'l SubRunList<'a>,
    next: Option<usize>,
}

impl<'l> Iterator for SubRunIter<'l, '_> {
    type Item = &'l SubRunVariant;

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        let node = &list.nodes[self.next?];
        self.next = node.next;
        Some(&*node.sub_run)
    }
}

impl FusedIterator for SubRunIter<'_, '_> {}

impl Debug for SubRunIter<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubRunIter")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
