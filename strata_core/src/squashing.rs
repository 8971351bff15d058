// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Running state of the squashing backing that is currently accepting layers.

use kurbo::Rect;

use crate::layer::{BackingId, LayerId};

/// Tracks the most recent layer with its own backing while assignment walks
/// the tree in paint order.
///
/// Squashable layers later in paint order join this backing until a new
/// owner is found or a candidate is rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SquashingState {
    /// Backing that squashed layers currently join.
    pub most_recent_backing: Option<BackingId>,
    /// Owner of [`most_recent_backing`](Self::most_recent_backing).
    pub most_recent_owner: Option<LayerId>,
    /// Whether [`most_recent_backing`](Self::most_recent_backing) still
    /// accepts squashed layers this pass.
    pub has_most_recent_backing: bool,
    /// Set once the owner's whole subtree has been assigned, so later layers
    /// can squash into its backing without breaking paint order.
    pub have_assigned_backings_to_entire_squashing_layer_subtree: bool,
    /// Index the next squashed layer will occupy.
    pub next_squashed_layer_index: usize,
    /// Union of the non-empty bounds of the layers squashed so far.
    pub bounding_rect: Rect,
    /// Sum of the areas of the layers squashed so far.
    pub total_area_of_squashed_rects: f64,
}

impl SquashingState {
    /// Switches to a new squashing backing, owned by `owner`, and resets the
    /// accumulated bounds and member index.
    ///
    /// The caller finishes the previous backing first, using
    /// [`next_squashed_layer_index`](Self::next_squashed_layer_index) as its
    /// final member count.
    pub fn update_for_new_mapping(
        &mut self,
        backing: BackingId,
        owner: LayerId,
        has_new_backing: bool,
    ) {
        self.most_recent_backing = Some(backing);
        self.most_recent_owner = Some(owner);
        self.has_most_recent_backing = has_new_backing;
        self.next_squashed_layer_index = 0;
        self.bounding_rect = Rect::ZERO;
        self.total_area_of_squashed_rects = 0.0;
        self.have_assigned_backings_to_entire_squashing_layer_subtree = false;
    }

    /// Records that a layer with `bounds` was squashed into the current backing.
    pub fn accumulate(&mut self, bounds: Rect) {
        self.next_squashed_layer_index += 1;
        self.total_area_of_squashed_rects += bounds.area();
        self.bounding_rect = unite(self.bounding_rect, bounds);
    }

    /// Returns `true` if a backing can currently accept squashed layers.
    #[must_use]
    pub fn can_accept(&self) -> bool {
        self.has_most_recent_backing && self.most_recent_backing.is_some()
    }
}

/// Union of two rects, where an empty rect contributes nothing.
#[must_use]
pub fn unite(a: Rect, b: Rect) -> Rect {
    match (a.is_zero_area(), b.is_zero_area()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.union(b),
    }
}
