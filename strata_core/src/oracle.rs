// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Squashing eligibility checks.
//!
//! These are pure functions of the layer tree and the current
//! [`SquashingState`]. Checks run in a fixed order and the first failing
//! check decides the reported reason.

use kurbo::Rect;

use crate::config::AssignerConfig;
use crate::layer::{BlendMode, ContentKind, LayerId, LayerTree};
use crate::reasons::{CompositingReasons, SquashingDisallowedReasons as Disallowed};
use crate::squashing::{SquashingState, unite};

/// Returns `true` if adding `bounds` to the current squashing backing would
/// make its surface more than `tolerance` times larger than the area its
/// members cover.
#[must_use]
pub fn squashing_would_exceed_sparsity_tolerance(
    bounds: Rect,
    state: &SquashingState,
    tolerance: f64,
) -> bool {
    let new_bounding_rect = unite(state.bounding_rect, bounds);
    let new_squashed_area = state.total_area_of_squashed_rects + bounds.area();
    new_bounding_rect.area() > tolerance * new_squashed_area
}

/// Returns why `candidate` may not join the squashing backing tracked by
/// `state`, or an empty set if it may.
///
/// # Panics
///
/// Panics if `candidate` is stale. In debug builds, also panics if the
/// candidate is itself fixed-position, since such layers are composited
/// directly and never reach this check.
#[must_use]
pub fn reasons_preventing_squashing(
    tree: &LayerTree,
    candidate: LayerId,
    state: &SquashingState,
    config: &AssignerConfig,
) -> Disallowed {
    tree.validate(candidate);

    if !state.can_accept() || !state.have_assigned_backings_to_entire_squashing_layer_subtree {
        return Disallowed::WOULD_BREAK_PAINT_ORDER;
    }
    let Some(owner) = state.most_recent_owner.filter(|owner| tree.is_alive(*owner)) else {
        return Disallowed::WOULD_BREAK_PAINT_ORDER;
    };

    let c = candidate.idx as usize;
    let o = owner.idx as usize;

    if tree.content[c] == ContentKind::Video || tree.content[o] == ContentKind::Video {
        return Disallowed::VIDEO;
    }

    if tree.content[c] == ContentKind::Plugin || tree.content[o] == ContentKind::Plugin {
        return Disallowed::LAYOUT_PART;
    }

    if tree.reflection[c] != crate::layer::INVALID {
        return Disallowed::REFLECTION;
    }

    if squashing_would_exceed_sparsity_tolerance(tree.bounds[c], state, config.sparsity_tolerance)
    {
        return Disallowed::SPARSITY_EXCEEDED;
    }

    if tree.blend_mode[c] != BlendMode::Normal || tree.blend_mode[c] != tree.blend_mode[o] {
        return Disallowed::BLENDING;
    }

    let candidate_ancestry = &tree.ancestry[c];
    let owner_ancestry = &tree.ancestry[o];

    if candidate_ancestry.clipping_container != owner_ancestry.clipping_container {
        let supplied_by_member = candidate_ancestry.clipping_container.is_some_and(|container| {
            state
                .most_recent_backing
                .and_then(|id| tree.backing(id))
                .and_then(|backing| {
                    backing.containing_squashed_layer(
                        tree,
                        container,
                        state.next_squashed_layer_index,
                    )
                })
                .is_some()
        });
        if !supplied_by_member {
            return Disallowed::CLIPPING_CONTAINER_MISMATCH;
        }
    }

    let flags = tree.flags[c];
    if tree.clip[c].is_some() && flags.has_compositing_descendant {
        return Disallowed::CLIPS_COMPOSITING_DESCENDANTS;
    }

    if candidate_ancestry.ancestor_scrolling_layer != owner_ancestry.ancestor_scrolling_layer {
        return Disallowed::SCROLLS_WITH_RESPECT_TO_SQUASHING_LAYER;
    }

    if candidate_ancestry.scroll_parent.is_some() && flags.has_compositing_descendant {
        return Disallowed::SCROLL_CHILD_WITH_COMPOSITED_DESCENDANTS;
    }

    if candidate_ancestry.opacity_ancestor != owner_ancestry.opacity_ancestor {
        return Disallowed::OPACITY_ANCESTOR_MISMATCH;
    }

    if candidate_ancestry.transform_ancestor != owner_ancestry.transform_ancestor {
        return Disallowed::TRANSFORM_ANCESTOR_MISMATCH;
    }

    if flags.filter_inducing || candidate_ancestry.filter_ancestor != owner_ancestry.filter_ancestor
    {
        return Disallowed::FILTER_MISMATCH;
    }

    if !tree.transform[c].is_2d_translation() {
        return Disallowed::NON_TRANSLATION_TRANSFORM;
    }

    if candidate_ancestry.rendering_context_root != owner_ancestry.rendering_context_root {
        return Disallowed::RENDERING_CONTEXT_MISMATCH;
    }

    debug_assert!(
        !flags.fixed_position,
        "fixed-position layers are composited directly"
    );
    if candidate_ancestry.nearest_fixed_position_layer
        != owner_ancestry.nearest_fixed_position_layer
    {
        return Disallowed::NEAREST_FIXED_POSITION_MISMATCH;
    }

    let owner_flags = tree.flags[o];
    if (owner_flags.subtree_will_change_contents && owner_flags.animating_on_compositor)
        || tree.reasons[o].contains(CompositingReasons::ACTIVE_ANIMATION)
    {
        return Disallowed::SQUASHING_LAYER_IS_ANIMATING;
    }

    if candidate_ancestry.enclosing_pagination_layer.is_some() {
        return Disallowed::FRAGMENTED_CONTENT;
    }

    Disallowed::empty()
}
