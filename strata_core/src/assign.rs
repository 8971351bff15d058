// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Assignment of layers to composited backings.
//!
//! [`Assigner::assign`] walks a layer subtree in paint order and decides, for
//! every layer, whether it paints into its own backing, into the squashing
//! backing of an earlier layer, or into whatever its ancestors paint into.
//! Decisions are local and made once per pass, based on the layer's
//! compositing reasons and on the [`SquashingState`] accumulated so far.
//!
//! Per layer, in order:
//!
//! 1. If the layer only asks for squashing, ask the
//!    [oracle](crate::oracle::reasons_preventing_squashing) whether the
//!    current squashing backing can take it; record any rejection.
//! 2. Compute a [`CompositingStateTransition`] and hand it to the
//!    [`BackingFactory`].
//! 3. Assign the layer's reflection, if any.
//! 4. Join or leave a squashing backing, and accumulate the layer's bounds
//!    if it ends up squashed.
//! 5. Visit negative-z children.
//! 6. If the layer owns a backing, finish the previous squashing backing and
//!    start accumulating into this one.
//! 7. Visit normal-flow and positive-z children, after which the layer's
//!    backing (if it is the current one) may accept later layers.

use alloc::vec::Vec;

use crate::config::{AssignerConfig, RejectionFeedback};
use crate::factory::BackingFactory;
use crate::layer::{CompositingState, CompositingStateTransition, INVALID, LayerId, LayerTree};
use crate::oracle::reasons_preventing_squashing;
use crate::reasons::SquashingDisallowedReasons;
use crate::squashing::SquashingState;
use crate::trace::{
    AssignBeginEvent, AssignSummary, AssignSummaryBuilder, SquashingDisallowedEvent,
    SquashingFinishedEvent, Tracer, TransitionEvent,
};

/// Result of one [`Assigner::assign`] pass.
#[derive(Clone, Debug, Default)]
pub struct AssignmentOutcome {
    /// Whether any backing was created or destroyed, or any squashing
    /// membership changed.
    pub layers_changed: bool,
    /// Layers whose paint must be invalidated, in the order they were found.
    /// A layer may appear more than once.
    pub needs_paint_invalidation: Vec<LayerId>,
    /// Counters for the pass.
    pub summary: AssignSummary,
}

/// Walks layer trees and assigns their layers to backings.
///
/// The assigner itself holds only configuration and a pass counter; all
/// per-pass state lives on the stack of [`assign`](Self::assign).
#[derive(Clone, Debug, Default)]
pub struct Assigner {
    config: AssignerConfig,
    passes: u64,
}

impl Assigner {
    /// Creates an assigner with the given configuration.
    #[must_use]
    pub fn new(config: AssignerConfig) -> Self {
        Self { config, passes: 0 }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AssignerConfig {
        &self.config
    }

    /// Replaces the configuration for subsequent passes.
    pub fn set_config(&mut self, config: AssignerConfig) {
        self.config = config;
    }

    /// Returns how many passes have run.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    /// Assigns every layer in the subtree rooted at `root` to a backing.
    ///
    /// # Panics
    ///
    /// Panics if `root` is stale.
    pub fn assign(
        &mut self,
        tree: &mut LayerTree,
        root: LayerId,
        factory: &mut dyn BackingFactory,
        tracer: &mut Tracer<'_>,
    ) -> AssignmentOutcome {
        tree.validate(root);
        let pass = self.passes;
        self.passes += 1;

        log::debug!(
            "assignment pass {pass} from {root} (squashing {})",
            if self.config.squashing_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        tracer.assign_begin(&AssignBeginEvent {
            pass,
            root,
            squashing_enabled: self.config.squashing_enabled,
        });

        let mut ctx = AssignContext {
            stale_in_compositing_mode: tree.in_compositing_mode(),
            tree,
            factory,
            tracer,
            config: self.config,
            pass,
            state: SquashingState::default(),
            layers_changed: false,
            invalidations: Vec::new(),
            summary: AssignSummaryBuilder::new(pass),
            paint_order_index: 0,
        };
        ctx.visit(root.idx);
        ctx.finish_current_backing();

        let summary = ctx
            .summary
            .finish(ctx.layers_changed, ctx.invalidations.len());
        ctx.tracer.assign_end(&summary);
        log::debug!(
            "assignment pass {pass} done: {} visited, {} allocated, {} removed, {} squashed, \
             {} unsquashed, {} disallowed, changed={}",
            summary.visited,
            summary.allocated,
            summary.removed,
            summary.squashed,
            summary.unsquashed,
            summary.disallowed,
            summary.layers_changed
        );

        AssignmentOutcome {
            layers_changed: ctx.layers_changed,
            needs_paint_invalidation: ctx.invalidations,
            summary,
        }
    }

    /// Returns the transition `layer` would get right now, assuming any
    /// squashing request would be accepted.
    ///
    /// `stale_in_compositing_mode` is whether the tree was in compositing
    /// mode before the pass started; the root layer then keeps a backing.
    #[must_use]
    pub fn compute_transition(
        &self,
        tree: &LayerTree,
        layer: LayerId,
        stale_in_compositing_mode: bool,
    ) -> CompositingStateTransition {
        tree.validate(layer);
        compute_composited_layer_update(
            tree,
            layer.idx,
            &self.config,
            stale_in_compositing_mode,
            true,
        )
    }
}

/// Returns `true` if the layer needs a backing of its own.
fn needs_own_backing(
    tree: &LayerTree,
    idx: u32,
    config: &AssignerConfig,
    stale_in_compositing_mode: bool,
) -> bool {
    let reasons = tree.reasons[idx as usize];
    let needs_own_backing_for_disabled_squashing =
        !config.squashing_enabled && reasons.requires_squashing();
    reasons.requires_compositing()
        || needs_own_backing_for_disabled_squashing
        || (stale_in_compositing_mode && tree.is_root_layer_idx(idx))
}

fn compute_composited_layer_update(
    tree: &LayerTree,
    idx: u32,
    config: &AssignerConfig,
    stale_in_compositing_mode: bool,
    squashing_allowed: bool,
) -> CompositingStateTransition {
    let i = idx as usize;
    let has_own_backing = tree.own_backing[i].is_some();

    if needs_own_backing(tree, idx, config, stale_in_compositing_mode) {
        if has_own_backing {
            return CompositingStateTransition::NoChange;
        }
        return CompositingStateTransition::AllocateOwnBacking;
    }

    let mut update = CompositingStateTransition::NoChange;
    if has_own_backing {
        update = CompositingStateTransition::RemoveOwnBacking;
    }

    if config.squashing_enabled {
        if squashing_allowed
            && !tree.flags[i].subtree_invisible
            && tree.reasons[i].requires_squashing()
        {
            // Whether this is a no-op is only known once the member list is
            // compared against the layer's index.
            update = CompositingStateTransition::PutInSquashingLayer;
        } else if tree.grouped_backing[i].is_some() || tree.lost_grouped_mapping[i] {
            update = CompositingStateTransition::RemoveFromSquashingLayer;
        }
    }
    update
}

struct AssignContext<'a, 't> {
    tree: &'a mut LayerTree,
    factory: &'a mut dyn BackingFactory,
    tracer: &'a mut Tracer<'t>,
    config: AssignerConfig,
    pass: u64,
    stale_in_compositing_mode: bool,
    state: SquashingState,
    layers_changed: bool,
    invalidations: Vec<LayerId>,
    summary: AssignSummaryBuilder,
    paint_order_index: usize,
}

impl AssignContext<'_, '_> {
    fn visit(&mut self, idx: u32) {
        let Some(layer) = self.tree.handle(idx) else {
            return;
        };
        self.summary.visit();
        let paint_order_index = self.paint_order_index;
        self.paint_order_index += 1;

        let rejected = self.check_squashing(layer);
        let transition = match self.config.rejection_feedback {
            RejectionFeedback::SamePass => {
                if !rejected.is_empty() {
                    self.tree.record_squashing_disallowed(idx, rejected, false);
                }
                self.compute(idx, true)
            }
            RejectionFeedback::NextPass => {
                let transition = self.compute(idx, rejected.is_empty());
                if !rejected.is_empty() {
                    self.tree.record_squashing_disallowed(idx, rejected, true);
                }
                transition
            }
        };

        let backing_changed = self.apply(layer, transition);
        if transition != CompositingStateTransition::PutInSquashingLayer {
            self.record(layer, transition, backing_changed);
        }

        let reflection = self.tree.reflection[idx as usize];
        if reflection != INVALID {
            self.visit_reflection(reflection);
        }

        let membership_changed =
            self.update_squashing_assignment(layer, transition, paint_order_index);
        // Re-squashing a layer at the index it already holds is not a change.
        if transition == CompositingStateTransition::PutInSquashingLayer
            && (membership_changed || backing_changed)
        {
            self.record(layer, transition, backing_changed);
        }

        let layer_is_squashed = transition == CompositingStateTransition::PutInSquashingLayer
            || (transition == CompositingStateTransition::NoChange
                && self.tree.grouped_backing[idx as usize].is_some());
        if layer_is_squashed {
            self.accumulate(idx);
        }

        for child in self.tree.negative_z_children_idx(idx) {
            self.visit(child);
        }

        // Once the negative-z children have been visited, later layers in
        // paint order can squash into this layer's backing.
        if let Some(backing) = self.tree.own_backing[idx as usize] {
            debug_assert_eq!(
                self.tree.compositing_state_idx(idx),
                CompositingState::PaintsIntoOwnBacking
            );
            self.finish_current_backing();
            self.state.update_for_new_mapping(backing, layer, true);
            if let Some(b) = self.tree.backings.get_mut(backing) {
                b.owner_paint_order_index = paint_order_index;
            }
        }

        for child in self.tree.normal_flow_and_positive_z_children_idx(idx) {
            self.visit(child);
        }

        if self.state.has_most_recent_backing && self.state.most_recent_owner == Some(layer) {
            self.state
                .have_assigned_backings_to_entire_squashing_layer_subtree = true;
        }
    }

    /// Runs the squashing checks for layers that only ask for squashing.
    fn check_squashing(&mut self, layer: LayerId) -> SquashingDisallowedReasons {
        let i = layer.idx as usize;
        if !self.config.squashing_enabled || !self.tree.reasons[i].requires_squashing() {
            return SquashingDisallowedReasons::empty();
        }
        let rejected = reasons_preventing_squashing(self.tree, layer, &self.state, &self.config);
        if !rejected.is_empty() {
            log::trace!("{layer} cannot be squashed: {rejected}");
            self.summary.disallowed();
            self.tracer.squashing_disallowed(&SquashingDisallowedEvent {
                pass: self.pass,
                layer,
                owner: self.state.most_recent_owner,
                reasons: rejected,
            });
        }
        rejected
    }

    fn compute(&self, idx: u32, squashing_allowed: bool) -> CompositingStateTransition {
        compute_composited_layer_update(
            self.tree,
            idx,
            &self.config,
            self.stale_in_compositing_mode,
            squashing_allowed,
        )
    }

    /// Hands the transition to the factory and records structural changes.
    ///
    /// Returns whether the layer's own backing was created or destroyed.
    fn apply(&mut self, layer: LayerId, transition: CompositingStateTransition) -> bool {
        let backing_changed = self.factory.allocate_or_clear(self.tree, layer, transition);
        if backing_changed {
            self.invalidations.push(layer);
            self.layers_changed = true;
        }
        backing_changed
    }

    /// Counts an effective transition in the summary and reports it.
    fn record(
        &mut self,
        layer: LayerId,
        transition: CompositingStateTransition,
        backing_changed: bool,
    ) {
        self.summary.transition(transition);
        if transition != CompositingStateTransition::NoChange {
            log::trace!("{layer}: {transition:?} (backing changed: {backing_changed})");
            self.tracer.transition(&TransitionEvent {
                pass: self.pass,
                layer,
                transition,
                backing_changed,
            });
        }
    }

    /// Reflections get their own backing decision but never squash.
    fn visit_reflection(&mut self, idx: u32) {
        let Some(layer) = self.tree.handle(idx) else {
            return;
        };
        self.summary.visit();
        let transition = self.compute(idx, false);
        let backing_changed = self.apply(layer, transition);
        match transition {
            CompositingStateTransition::NoChange => {}
            CompositingStateTransition::RemoveFromSquashingLayer => {
                self.update_squashing_assignment(layer, transition, 0);
            }
            _ if !backing_changed => {
                self.invalidations.push(layer);
                self.layers_changed = true;
            }
            _ => {}
        }
        self.record(layer, transition, backing_changed);
    }

    /// Updates squashing-backing membership for `transition`.
    ///
    /// Returns whether membership changed.
    fn update_squashing_assignment(
        &mut self,
        layer: LayerId,
        transition: CompositingStateTransition,
        paint_order_index: usize,
    ) -> bool {
        let idx = layer.idx as usize;
        match transition {
            CompositingStateTransition::PutInSquashingLayer => {
                let Some(backing) = self.state.most_recent_backing else {
                    debug_assert!(false, "{layer} squashed with no squashing backing");
                    return false;
                };
                let changed = self.tree.update_squashing_layer_assignment(
                    backing,
                    layer,
                    self.state.next_squashed_layer_index,
                    paint_order_index,
                    &mut self.invalidations,
                );
                if changed {
                    if let Some(b) = self.tree.backings.get_mut(backing) {
                        b.needs_geometry_update = true;
                    }
                    self.tree.lost_grouped_mapping[idx] = false;
                    self.layers_changed = true;
                }
                changed
            }
            CompositingStateTransition::RemoveFromSquashingLayer => {
                if let Some(grouped) = self.tree.grouped_backing[idx] {
                    // Invalidate while the layer still paints into the shared surface.
                    self.invalidations.push(layer);
                    if let Some(b) = self.tree.backings.get_mut(grouped) {
                        b.needs_geometry_update = true;
                    }
                    self.tree.set_grouped_backing(layer.idx, None);
                }
                self.invalidations.push(layer);
                self.layers_changed = true;
                self.tree.lost_grouped_mapping[idx] = false;
                true
            }
            _ => false,
        }
    }

    fn accumulate(&mut self, idx: u32) {
        self.state.accumulate(self.tree.bounds[idx as usize]);
        #[cfg(feature = "trace-rich")]
        if let Some(backing) = self.state.most_recent_backing {
            self.tracer.squash_bounds(&crate::trace::SquashBoundsEvent {
                pass: self.pass,
                backing,
                index: self.state.next_squashed_layer_index - 1,
                bounding_rect: self.state.bounding_rect,
                total_area: self.state.total_area_of_squashed_rects,
            });
        }
    }

    /// Truncates the current squashing backing to the members confirmed
    /// this pass.
    fn finish_current_backing(&mut self) {
        if !self.state.has_most_recent_backing {
            return;
        }
        let (Some(backing), Some(owner)) =
            (self.state.most_recent_backing, self.state.most_recent_owner)
        else {
            return;
        };
        let count = self.state.next_squashed_layer_index;
        self.tree
            .finish_accumulating_squashing_layers(backing, count, &mut self.invalidations);
        self.tracer.squashing_finished(&SquashingFinishedEvent {
            pass: self.pass,
            backing,
            owner,
            member_count: count,
        });
        self.state.has_most_recent_backing = false;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Rect;

    use super::*;
    use crate::factory::DefaultBackingFactory;
    use crate::layer::{BackingId, ContentKind, LayerAncestry, LayerFlags};
    use crate::reasons::CompositingReasons;
    use crate::squashing::unite;
    use crate::transform::Transform3d;

    /// A root, a composited `base` that later siblings can squash into, and
    /// `count` squashable siblings 10x10 apart along the x axis.
    struct Scene {
        tree: LayerTree,
        root: LayerId,
        base: LayerId,
        layers: Vec<LayerId>,
    }

    fn scene(count: usize) -> Scene {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_compositing_reasons(root, CompositingReasons::ROOT);
        tree.set_bounds(root, Rect::new(0.0, 0.0, 800.0, 600.0));

        let base = tree.create_layer();
        tree.add_child(root, base);
        tree.set_compositing_reasons(base, CompositingReasons::WILL_CHANGE_COMPOSITING_HINT);
        tree.set_bounds(base, Rect::new(0.0, 0.0, 30.0, 30.0));

        let mut layers = Vec::new();
        for i in 0..count {
            let layer = tree.create_layer();
            tree.add_child(root, layer);
            tree.set_compositing_reasons(layer, CompositingReasons::OVERLAP);
            let x = 10.0 * i as f64;
            tree.set_bounds(layer, Rect::new(x, 0.0, x + 10.0, 10.0));
            layers.push(layer);
        }
        Scene {
            tree,
            root,
            base,
            layers,
        }
    }

    fn run(assigner: &mut Assigner, s: &mut Scene) -> AssignmentOutcome {
        assigner.assign(
            &mut s.tree,
            s.root,
            &mut DefaultBackingFactory,
            &mut Tracer::none(),
        )
    }

    fn members(tree: &LayerTree, backing: BackingId) -> Vec<LayerId> {
        tree.backing(backing)
            .unwrap()
            .squashed_layers()
            .iter()
            .map(|m| m.layer)
            .collect()
    }

    /// Checks the structural invariants every assignment must satisfy.
    fn assert_invariants(tree: &LayerTree, root: LayerId, tolerance: f64) {
        let order = tree.paint_order(root);
        let position = |layer: LayerId| order.iter().position(|l| *l == layer).unwrap();

        for (id, backing) in tree.backings() {
            let members = backing.squashed_layers();
            if members.is_empty() {
                continue;
            }
            let owner_pos = position(backing.owner());
            let first = tree.ancestry(members[0].layer);

            let mut bounds = Rect::ZERO;
            let mut area = 0.0;
            for member in members {
                assert_eq!(tree.grouped_backing(member.layer), Some(id));
                assert!(member.paint_order_index > backing.owner_paint_order_index());

                let member_pos = position(member.layer);
                assert!(member_pos > owner_pos, "{} squashed before its owner", member.layer);
                for between in &order[owner_pos + 1..member_pos] {
                    assert!(
                        tree.own_backing(*between).is_none(),
                        "{between} owns a backing between {} and {}",
                        backing.owner(),
                        member.layer
                    );
                }

                let ancestry = tree.ancestry(member.layer);
                assert_eq!(ancestry.opacity_ancestor, first.opacity_ancestor);
                assert_eq!(ancestry.transform_ancestor, first.transform_ancestor);
                assert_eq!(ancestry.filter_ancestor, first.filter_ancestor);

                let b = tree.bounds(member.layer);
                bounds = unite(bounds, b);
                area += b.area();
            }
            assert!(bounds.area() <= tolerance * area, "{id:?} is too sparse");
        }
    }

    #[test]
    fn nearby_siblings_share_one_squashing_backing() {
        let mut s = scene(3);
        let mut assigner = Assigner::default();
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed);
        let backing = s.tree.own_backing(s.base).unwrap();
        assert_eq!(members(&s.tree, backing), s.layers);
        assert_eq!(outcome.summary.squashed, 3);
        for layer in &s.layers {
            assert_eq!(
                s.tree.compositing_state(*layer),
                CompositingState::PaintsIntoGroupedBacking
            );
        }
        let indices: Vec<usize> = s
            .tree
            .backing(backing)
            .unwrap()
            .squashed_layers()
            .iter()
            .map(|m| m.paint_order_index)
            .collect();
        assert_eq!(indices, vec![2, 3, 4]);
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn squashing_finished_reports_final_member_count() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Finished(Vec<usize>);
        impl TraceSink for Finished {
            fn on_squashing_finished(&mut self, e: &SquashingFinishedEvent) {
                self.0.push(e.member_count);
            }
        }

        let mut s = scene(3);
        let mut sink = Finished::default();
        let mut tracer = Tracer::new(&mut sink);
        let _ = Assigner::default().assign(
            &mut s.tree,
            s.root,
            &mut DefaultBackingFactory,
            &mut tracer,
        );
        drop(tracer);
        if cfg!(feature = "trace") {
            // Root's backing never accepts layers; base's ends with three.
            assert_eq!(sink.0, vec![0, 3]);
        } else {
            assert!(sink.0.is_empty());
        }
    }

    #[test]
    fn non_translation_transform_splits_squashing() {
        let mut s = scene(3);
        s.tree
            .set_transform(s.layers[1], Transform3d::from_rotation_z(0.3));
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        let [first, middle, third] = [s.layers[0], s.layers[1], s.layers[2]];
        assert_eq!(
            s.tree.compositing_state(middle),
            CompositingState::PaintsIntoOwnBacking
        );
        assert_eq!(
            s.tree.squashing_disallowed_reasons(middle),
            SquashingDisallowedReasons::NON_TRANSLATION_TRANSFORM
        );
        assert!(
            s.tree
                .compositing_reasons(middle)
                .contains(CompositingReasons::SQUASHING_DISALLOWED)
        );

        let base_backing = s.tree.own_backing(s.base).unwrap();
        let middle_backing = s.tree.own_backing(middle).unwrap();
        assert_eq!(s.tree.grouped_backing(first), Some(base_backing));
        assert_eq!(s.tree.grouped_backing(third), Some(middle_backing));
        assert_ne!(s.tree.grouped_backing(first), s.tree.grouped_backing(third));
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn distant_candidate_exceeds_sparsity() {
        let mut s = scene(2);
        s.tree
            .set_bounds(s.layers[1], Rect::new(500.0, 500.0, 510.0, 510.0));
        let mut assigner = Assigner::default();
        let outcome = run(&mut assigner, &mut s);

        let far = s.layers[1];
        assert_eq!(
            s.tree.squashing_disallowed_reasons(far),
            SquashingDisallowedReasons::SPARSITY_EXCEEDED
        );
        assert_ne!(
            s.tree.compositing_state(far),
            CompositingState::PaintsIntoGroupedBacking
        );
        assert_eq!(outcome.summary.disallowed, 1);
        let backing = s.tree.own_backing(s.base).unwrap();
        assert_eq!(members(&s.tree, backing), vec![s.layers[0]]);
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn invisible_layer_leaves_squashing_backing() {
        let mut s = scene(3);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);
        let backing = s.tree.own_backing(s.base).unwrap();

        let hidden = s.layers[1];
        s.tree.set_flags(
            hidden,
            LayerFlags {
                subtree_invisible: true,
                ..LayerFlags::default()
            },
        );
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed);
        assert_eq!(outcome.summary.unsquashed, 1);
        assert!(outcome.needs_paint_invalidation.contains(&hidden));
        assert_eq!(s.tree.grouped_backing(hidden), None);
        assert_eq!(
            s.tree.compositing_state(hidden),
            CompositingState::NotComposited
        );
        assert_eq!(members(&s.tree, backing), vec![s.layers[0], s.layers[2]]);
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn video_never_joins_a_squashing_backing() {
        let mut s = scene(3);
        let video = s.layers[1];
        s.tree.set_content(video, ContentKind::Video);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        assert_eq!(s.tree.grouped_backing(video), None);
        assert_eq!(
            s.tree.compositing_state(video),
            CompositingState::PaintsIntoOwnBacking
        );
        assert_eq!(
            s.tree.squashing_disallowed_reasons(video),
            SquashingDisallowedReasons::VIDEO
        );
        // The layer after the video cannot squash into the video's backing either.
        assert_eq!(
            s.tree.squashing_disallowed_reasons(s.layers[2]),
            SquashingDisallowedReasons::VIDEO
        );
        for (_, backing) in s.tree.backings() {
            assert!(backing.squashed_layers().iter().all(|m| m.layer != video));
        }
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn second_pass_without_changes_is_idempotent() {
        let mut s = scene(3);
        s.tree
            .set_transform(s.layers[1], Transform3d::from_scale(2.0, 2.0, 1.0));
        let mut assigner = Assigner::default();
        assert!(run(&mut assigner, &mut s).layers_changed);

        let outcome = run(&mut assigner, &mut s);
        assert!(!outcome.layers_changed);
        assert!(outcome.needs_paint_invalidation.is_empty());
        assert_eq!(outcome.summary.squashed, 0, "members kept their slots");
        assert_eq!(outcome.summary.allocated, 0);
        assert_eq!(assigner.pass_count(), 2);
    }

    #[test]
    fn unchanged_members_emit_no_transitions() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Transitions(Vec<(LayerId, CompositingStateTransition)>);
        impl TraceSink for Transitions {
            fn on_transition(&mut self, e: &TransitionEvent) {
                self.0.push((e.layer, e.transition));
            }
        }

        let mut s = scene(3);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        let mut sink = Transitions::default();
        let mut tracer = Tracer::new(&mut sink);
        let outcome = assigner.assign(
            &mut s.tree,
            s.root,
            &mut DefaultBackingFactory,
            &mut tracer,
        );
        drop(tracer);
        assert!(!outcome.layers_changed);
        assert_eq!(outcome.summary.squashed, 0);
        assert!(sink.0.is_empty(), "got {:?}", sink.0);
    }

    #[test]
    fn disabled_squashing_gives_every_layer_its_own_backing() {
        let mut s = scene(3);
        let mut assigner = Assigner::new(AssignerConfig::no_squashing());
        let outcome = run(&mut assigner, &mut s);

        assert_eq!(outcome.summary.allocated, 5);
        assert_eq!(outcome.summary.disallowed, 0);
        for layer in &s.layers {
            assert_eq!(
                s.tree.compositing_state(*layer),
                CompositingState::PaintsIntoOwnBacking
            );
            assert!(s.tree.squashing_disallowed_reasons(*layer).is_empty());
        }
    }

    #[test]
    fn turning_squashing_off_moves_members_to_own_backings() {
        let mut s = scene(2);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        assigner.set_config(AssignerConfig::no_squashing());
        let outcome = run(&mut assigner, &mut s);
        assert!(outcome.layers_changed);
        let backing = s.tree.own_backing(s.base).unwrap();
        assert!(members(&s.tree, backing).is_empty());
        for layer in &s.layers {
            assert_eq!(s.tree.grouped_backing(*layer), None);
            assert!(s.tree.own_backing(*layer).is_some());
        }
    }

    #[test]
    fn removed_owner_backing_hands_members_to_new_owner() {
        let mut s = scene(3);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        s.tree
            .set_compositing_reasons(s.base, CompositingReasons::empty());
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed);
        assert_eq!(outcome.summary.removed, 1);
        assert_eq!(s.tree.own_backing(s.base), None);
        assert_eq!(s.tree.take_changes().released_backings.len(), 1);

        // The first layer can't squash into the root's unfinished backing and
        // takes one of its own; the others follow it.
        let first = s.layers[0];
        assert_eq!(
            s.tree.squashing_disallowed_reasons(first),
            SquashingDisallowedReasons::WOULD_BREAK_PAINT_ORDER
        );
        let backing = s.tree.own_backing(first).unwrap();
        assert_eq!(members(&s.tree, backing), vec![s.layers[1], s.layers[2]]);
        for layer in &s.layers {
            assert!(!s.tree.lost_grouped_mapping(*layer));
        }
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn lost_grouped_mapping_is_cleared_by_removal() {
        let mut s = scene(1);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);
        let layer = s.layers[0];

        // The layer stops asking for squashing at the same time its owner
        // loses its backing.
        s.tree
            .set_compositing_reasons(s.base, CompositingReasons::empty());
        s.tree
            .set_compositing_reasons(layer, CompositingReasons::empty());
        let outcome = run(&mut assigner, &mut s);

        assert_eq!(outcome.summary.unsquashed, 1);
        assert!(!s.tree.lost_grouped_mapping(layer));
        assert_eq!(
            s.tree.compositing_state(layer),
            CompositingState::NotComposited
        );
    }

    #[test]
    fn squashed_layer_promoted_to_own_backing() {
        let mut s = scene(2);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);
        let base_backing = s.tree.own_backing(s.base).unwrap();

        s.tree
            .set_compositing_reasons(s.layers[0], CompositingReasons::TRANSFORM_3D);
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed);
        assert!(s.tree.own_backing(s.layers[0]).is_some());
        assert_eq!(s.tree.grouped_backing(s.layers[0]), None);
        assert!(members(&s.tree, base_backing).is_empty());
        let promoted = s.tree.own_backing(s.layers[0]).unwrap();
        assert_eq!(members(&s.tree, promoted), vec![s.layers[1]]);
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn reflection_is_assigned_with_its_reflectee() {
        let mut s = scene(0);
        let reflection = s.tree.create_layer();
        s.tree.set_reflection(s.base, Some(reflection));
        s.tree.set_compositing_reasons(
            reflection,
            CompositingReasons::REFLECTION_OF_COMPOSITED_PARENT,
        );
        let mut assigner = Assigner::default();
        let outcome = run(&mut assigner, &mut s);

        assert!(s.tree.own_backing(reflection).is_some());
        assert!(outcome.needs_paint_invalidation.contains(&reflection));
        assert_eq!(outcome.summary.visited, 3);

        s.tree
            .set_compositing_reasons(reflection, CompositingReasons::empty());
        let outcome = run(&mut assigner, &mut s);
        assert!(s.tree.own_backing(reflection).is_none());
        assert_eq!(outcome.summary.removed, 1);
    }

    #[test]
    fn squashed_layer_turned_reflection_leaves_its_backing() {
        let mut s = scene(1);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);
        let member = s.layers[0];
        let backing = s.tree.own_backing(s.base).unwrap();
        assert_eq!(s.tree.grouped_backing(member), Some(backing));

        s.tree.remove_from_parent(member);
        s.tree.set_reflection(s.base, Some(member));
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed, "leaving a backing is a change");
        assert!(outcome.needs_paint_invalidation.contains(&member));
        assert_eq!(outcome.summary.unsquashed, 1);
        assert_eq!(s.tree.grouped_backing(member), None);
        assert_eq!(
            s.tree.compositing_state(member),
            CompositingState::NotComposited
        );
        assert!(members(&s.tree, backing).is_empty());

        let outcome = run(&mut assigner, &mut s);
        assert!(!outcome.layers_changed);
        assert_eq!(outcome.summary.unsquashed, 0);
    }

    #[test]
    fn rejection_takes_effect_next_pass_when_deferred() {
        let mut s = scene(2);
        s.tree
            .set_bounds(s.layers[1], Rect::new(500.0, 500.0, 510.0, 510.0));
        let mut assigner = Assigner::new(
            AssignerConfig::DEFAULT.with_rejection_feedback(RejectionFeedback::NextPass),
        );
        let _ = s.tree.take_changes();

        let first = run(&mut assigner, &mut s);
        assert!(first.layers_changed);
        let far = s.layers[1];
        assert_eq!(
            s.tree.compositing_state(far),
            CompositingState::NotComposited
        );
        assert!(
            s.tree
                .compositing_reasons(far)
                .contains(CompositingReasons::SQUASHING_DISALLOWED)
        );
        assert_eq!(s.tree.take_changes().reasons, vec![far.index()]);

        let second = run(&mut assigner, &mut s);
        assert!(second.layers_changed);
        assert_eq!(
            s.tree.compositing_state(far),
            CompositingState::PaintsIntoOwnBacking
        );
        assert!(s.tree.take_changes().reasons.is_empty());

        let third = run(&mut assigner, &mut s);
        assert!(!third.layers_changed);
    }

    #[test]
    fn stale_root_keeps_its_backing() {
        let mut s = scene(0);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        s.tree
            .set_compositing_reasons(s.root, CompositingReasons::empty());
        assert_eq!(
            assigner.compute_transition(&s.tree, s.root, true),
            CompositingStateTransition::NoChange
        );
        assert_eq!(
            assigner.compute_transition(&s.tree, s.root, false),
            CompositingStateTransition::RemoveOwnBacking
        );
        let outcome = run(&mut assigner, &mut s);
        assert!(s.tree.own_backing(s.root).is_some());
        assert_eq!(outcome.summary.removed, 0);
    }

    #[test]
    fn negative_z_child_squashes_before_its_parent_takes_over() {
        let mut s = scene(1);
        let parent = s.layers[0];
        s.tree
            .set_compositing_reasons(parent, CompositingReasons::TRANSFORM_3D);
        let below = s.tree.create_layer();
        s.tree.add_child(parent, below);
        s.tree.set_z_order(below, crate::layer::ZOrder::Negative(-1));
        s.tree.set_compositing_reasons(below, CompositingReasons::OVERLAP);
        s.tree.set_bounds(below, Rect::new(0.0, 10.0, 10.0, 20.0));
        let above = s.tree.create_layer();
        s.tree.add_child(parent, above);
        s.tree.set_compositing_reasons(above, CompositingReasons::OVERLAP);
        s.tree.set_bounds(above, Rect::new(0.0, 20.0, 10.0, 30.0));

        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        // `below` paints before `parent`, so it joins the previous backing.
        let base_backing = s.tree.own_backing(s.base).unwrap();
        assert_eq!(s.tree.grouped_backing(below), Some(base_backing));
        // `above` is inside the parent's unfinished subtree.
        assert_eq!(
            s.tree.squashing_disallowed_reasons(above),
            SquashingDisallowedReasons::WOULD_BREAK_PAINT_ORDER
        );
        assert!(s.tree.own_backing(above).is_some());
        assert_invariants(&s.tree, s.root, 6.0);
    }

    #[test]
    fn mixed_ancestry_keeps_backings_consistent() {
        let mut s = scene(6);
        let group = s.tree.create_layer();
        s.tree.add_child(s.root, group);
        s.tree.set_bounds(group, Rect::new(0.0, 0.0, 60.0, 10.0));
        for layer in [s.layers[2], s.layers[3], s.layers[5]] {
            s.tree.set_ancestry(
                layer,
                LayerAncestry {
                    opacity_ancestor: Some(group),
                    ..LayerAncestry::default()
                },
            );
        }
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);

        assert_eq!(
            s.tree.squashing_disallowed_reasons(s.layers[2]),
            SquashingDisallowedReasons::OPACITY_ANCESTOR_MISMATCH
        );
        assert_eq!(
            s.tree.grouped_backing(s.layers[3]),
            s.tree.own_backing(s.layers[2])
        );
        assert_invariants(&s.tree, s.root, 6.0);

        // A second pass agrees with the first.
        assert!(!run(&mut assigner, &mut s).layers_changed);
    }

    #[test]
    fn reordering_siblings_rewrites_member_list() {
        let mut s = scene(3);
        let mut assigner = Assigner::default();
        let _ = run(&mut assigner, &mut s);
        let backing = s.tree.own_backing(s.base).unwrap();

        // Move the last layer to directly after `base`.
        let moved = s.layers[2];
        s.tree.remove_from_parent(moved);
        s.tree.insert_before(moved, s.layers[0]);
        let outcome = run(&mut assigner, &mut s);

        assert!(outcome.layers_changed);
        assert_eq!(
            members(&s.tree, backing),
            vec![s.layers[2], s.layers[0], s.layers[1]]
        );
        for layer in &s.layers {
            assert_eq!(s.tree.grouped_backing(*layer), Some(backing));
        }
        assert_invariants(&s.tree, s.root, 6.0);
    }
}
