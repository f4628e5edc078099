// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caller-owned source tree nodes.

use alloc::rc::Rc;
use alloc::vec::Vec;

/// A node of the caller's hierarchical data set.
///
/// Nodes are owned by the caller and shared with the outline through [`Rc`].
/// [`TreeViewCache`](crate::TreeViewCache) only keeps [`Weak`](alloc::rc::Weak)
/// references into the tree, so dropping the tree invalidates any toggles that
/// still reference its keys.
///
/// `data` is opaque to this crate; it is cloned into each [`FlatRow`](crate::FlatRow)
/// and, through [`FieldSource`](crate::FieldSource), copied field by field into
/// pooled [`Record`](crate::Record)s.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceNode<K, D> {
    /// Unique identifier, stable across rebuilds.
    pub key: K,
    /// Ordered children; empty for leaves.
    pub children: Vec<Rc<Self>>,
    /// Marks the node as a branch even when it currently has no children
    /// (for example a summary row whose children are loaded lazily).
    pub forces_branch: bool,
    /// Domain payload.
    pub data: D,
}

impl<K, D> SourceNode<K, D> {
    /// Creates a leaf node with no children.
    #[must_use]
    pub fn new(key: K, data: D) -> Self {
        Self {
            key,
            children: Vec::new(),
            forces_branch: false,
            data,
        }
    }

    /// Replaces the children of this node.
    #[must_use]
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        self.children = children.into_iter().map(Rc::new).collect();
        self
    }

    /// Marks this node as expandable regardless of its child count.
    #[must_use]
    pub fn forcing_branch(mut self) -> Self {
        self.forces_branch = true;
        self
    }

    /// Returns `true` if the node has children or is forced to be a branch.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty() || self.forces_branch
    }

    /// Wraps the node in an [`Rc`], ready to be passed as a root.
    #[must_use]
    pub fn into_rc(self) -> Rc<Self> {
        Rc::new(self)
    }
}
