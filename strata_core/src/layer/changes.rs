// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input change tracking between assignment passes.
//!
//! Every mutation on [`LayerTree`] marks a dirty channel. Before an
//! assignment pass, a driver calls [`LayerTree::take_changes`] to drain
//! those channels:
//!
//! 1. **GEOMETRY** — bounds or clip changed (local only).
//! 2. **REASONS** — compositing reasons or any other per-layer input that
//!    feeds the squashing checks changed (local only). Assignment also marks
//!    this channel when it defers a squashing rejection to the next pass.
//! 3. **ANCESTRY** — ancestor pointers changed; the affected set includes
//!    every descendant through the dependency graph.
//! 4. **TOPOLOGY** — drained and reduced to a single flag.
//!
//! [`CompositingChanges`] uses raw slot indices (`u32`) like the tree's
//! internal arrays, so diagnostics can report them without generation checks.

use alloc::vec::Vec;

use super::id::BackingId;
use super::store::LayerTree;
use crate::dirty;

/// Changes recorded since the previous [`LayerTree::take_changes`] call.
#[derive(Clone, Debug, Default)]
pub struct CompositingChanges {
    /// Layers whose bounds or clip changed.
    pub geometry: Vec<u32>,
    /// Layers whose compositing reasons or other assignment inputs changed.
    pub reasons: Vec<u32>,
    /// Layers whose ancestor pointers changed, directly or through an ancestor.
    pub ancestry: Vec<u32>,
    /// Layers added since the last call.
    pub added: Vec<u32>,
    /// Layers removed since the last call.
    pub removed: Vec<u32>,
    /// Backings destroyed by layer removal since the last call.
    pub released_backings: Vec<BackingId>,
    /// Whether the tree topology or paint order changed.
    pub topology_changed: bool,
}

impl CompositingChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.geometry.clear();
        self.reasons.clear();
        self.ancestry.clear();
        self.added.clear();
        self.removed.clear();
        self.released_backings.clear();
        self.topology_changed = false;
    }

    /// Returns `true` if nothing that affects assignment changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
            && self.reasons.is_empty()
            && self.ancestry.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.released_backings.is_empty()
            && !self.topology_changed
    }

    /// Returns `true` if only geometry changed, so the existing assignment
    /// still holds but squashing geometry must be refreshed.
    #[must_use]
    pub fn is_geometry_only(&self) -> bool {
        !self.geometry.is_empty()
            && self.reasons.is_empty()
            && self.ancestry.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.released_backings.is_empty()
            && !self.topology_changed
    }
}

impl LayerTree {
    /// Drains all dirty channels and returns what changed.
    pub fn take_changes(&mut self) -> CompositingChanges {
        let mut changes = CompositingChanges::default();
        self.take_changes_into(&mut changes);
        changes
    }

    /// Like [`take_changes`](Self::take_changes), but reuses a caller-provided
    /// buffer.
    pub fn take_changes_into(&mut self, changes: &mut CompositingChanges) {
        changes.clear();

        changes.geometry = self
            .dirty
            .drain(dirty::GEOMETRY)
            .deterministic()
            .run()
            .collect();

        changes.reasons = self
            .dirty
            .drain(dirty::REASONS)
            .deterministic()
            .run()
            .collect();

        // Ancestor pointers are inherited, so include dependents.
        changes.ancestry = self
            .dirty
            .drain(dirty::ANCESTRY)
            .affected()
            .deterministic()
            .run()
            .collect();

        let topology: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        changes.topology_changed = !topology.is_empty();

        // Drop entries for slots that were freed after being marked.
        let alive = &self.alive;
        changes.geometry.retain(|&idx| alive[idx as usize]);
        changes.reasons.retain(|&idx| alive[idx as usize]);
        changes.ancestry.retain(|&idx| alive[idx as usize]);

        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);
        core::mem::swap(
            &mut self.pending_released_backings,
            &mut changes.released_backings,
        );
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::*;
    use crate::layer::LayerAncestry;
    use crate::reasons::CompositingReasons;

    #[test]
    fn new_tree_has_no_changes() {
        let mut tree = LayerTree::new();
        assert!(tree.take_changes().is_empty());
    }

    #[test]
    fn second_take_is_empty() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_bounds(root, Rect::new(0.0, 0.0, 10.0, 10.0));
        let first = tree.take_changes();
        assert!(!first.is_empty());
        assert_eq!(first.added, [root.index()]);

        assert!(tree.take_changes().is_empty());
    }

    #[test]
    fn bounds_change_is_geometry_only() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let _ = tree.take_changes();

        tree.set_bounds(root, Rect::new(0.0, 0.0, 10.0, 10.0));
        let changes = tree.take_changes();
        assert!(changes.is_geometry_only());
        assert_eq!(changes.geometry, [root.index()]);
    }

    #[test]
    fn reasons_change_is_reported() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let _ = tree.take_changes();

        tree.set_compositing_reasons(root, CompositingReasons::ROOT);
        let changes = tree.take_changes();
        assert_eq!(changes.reasons, [root.index()]);
        assert!(!changes.is_geometry_only());
    }

    #[test]
    fn ancestry_change_reaches_descendants() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let mid = tree.create_layer();
        let leaf = tree.create_layer();
        tree.add_child(root, mid);
        tree.add_child(mid, leaf);
        let _ = tree.take_changes();

        tree.set_ancestry(
            mid,
            LayerAncestry {
                opacity_ancestor: Some(root),
                ..LayerAncestry::default()
            },
        );
        let changes = tree.take_changes();
        assert!(changes.ancestry.contains(&mid.index()));
        assert!(changes.ancestry.contains(&leaf.index()));
        assert!(!changes.ancestry.contains(&root.index()));
    }

    #[test]
    fn topology_change_sets_flag() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let child = tree.create_layer();
        let _ = tree.take_changes();

        tree.add_child(root, child);
        assert!(tree.take_changes().topology_changed);
    }

    #[test]
    fn destroyed_layer_is_reported_removed() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_bounds(root, Rect::new(0.0, 0.0, 1.0, 1.0));
        tree.destroy_layer(root);

        let changes = tree.take_changes();
        assert_eq!(changes.removed, [root.index()]);
        assert!(changes.geometry.is_empty());
    }

    #[test]
    fn take_changes_into_reuses_buffer() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        let mut changes = CompositingChanges::default();
        tree.take_changes_into(&mut changes);
        assert_eq!(changes.added, [root.index()]);

        tree.take_changes_into(&mut changes);
        assert!(changes.is_empty());
    }
}
