// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation, topology, and compositing inputs.

use alloc::vec::Vec;

use kurbo::Rect;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::backing::BackingArena;
use super::clip::ClipShape;
use super::id::{BackingId, INVALID, LayerId};
use super::traverse::Children;
use crate::dirty;
use crate::reasons::{CompositingReasons, SquashingDisallowedReasons};
use crate::transform::Transform3d;

/// Where a layer sits in its parent's paint order.
///
/// Children with a negative z-index paint before their parent's own content,
/// normal-flow children paint after it in tree order, and children with a
/// non-negative z-index paint last. Within the negative and positive
/// buckets, children are ordered by z-index, ties broken by tree order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ZOrder {
    /// Painted beneath the parent's content. The value should be negative.
    Negative(i32),
    /// Painted in tree order after the parent's content.
    #[default]
    NormalFlow,
    /// Painted above normal-flow content. The value should be zero or positive.
    Positive(i32),
}

/// What kind of content a layer paints.
///
/// Some content is backed by a native surface that cannot be re-targeted
/// to a sub-rectangle of a shared surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Ordinary painted content.
    #[default]
    Normal,
    /// A video element.
    Video,
    /// A plugin or nested browsing context.
    Plugin,
}

/// Blend mode a layer composites with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Standard source-over alpha compositing.
    #[default]
    Normal,
    /// Multiply blend.
    Multiply,
    /// Screen blend.
    Screen,
    /// Overlay blend.
    Overlay,
    /// Difference blend.
    Difference,
}

/// Per-layer boolean inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// Nothing in the layer's subtree is visible.
    pub subtree_invisible: bool,
    /// The layer itself is fixed-position.
    pub fixed_position: bool,
    /// The layer has a filter or another filter-like effect.
    pub filter_inducing: bool,
    /// Some descendant is composited.
    pub has_compositing_descendant: bool,
    /// A compositor-driven animation is running on the layer.
    pub animating_on_compositor: bool,
    /// The layer's subtree is expected to change contents (e.g. `will-change: contents`).
    pub subtree_will_change_contents: bool,
}

/// References from a layer to the ancestors whose effects apply to it.
///
/// These are back-references computed upstream; they never own anything.
/// Two squashed layers can share a surface only if the effects applied
/// outside that surface are the same for both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerAncestry {
    /// Nearest ancestor with opacity below one.
    pub opacity_ancestor: Option<LayerId>,
    /// Nearest ancestor with a transform.
    pub transform_ancestor: Option<LayerId>,
    /// Nearest ancestor with a filter.
    pub filter_ancestor: Option<LayerId>,
    /// Nearest ancestor that clips this layer.
    pub clipping_container: Option<LayerId>,
    /// Nearest ancestor scroller.
    pub ancestor_scrolling_layer: Option<LayerId>,
    /// Scroller this layer scrolls with without being its descendant.
    pub scroll_parent: Option<LayerId>,
    /// Root of the 3-D rendering context this layer participates in.
    pub rendering_context_root: Option<LayerId>,
    /// Nearest fixed-position ancestor (or self).
    pub nearest_fixed_position_layer: Option<LayerId>,
    /// Nearest ancestor establishing a fragmentation context.
    pub enclosing_pagination_layer: Option<LayerId>,
}

/// How a layer is currently composited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositingState {
    /// Painted into whichever backing its ancestors paint into.
    NotComposited,
    /// Owns a dedicated backing.
    PaintsIntoOwnBacking,
    /// Shares a squashing backing owned by an earlier layer.
    PaintsIntoGroupedBacking,
}

/// Struct-of-arrays storage for all layers and their backings.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer occupies
/// a slot in parallel arrays. Destroyed layers are recycled via a free list,
/// and generation counters prevent stale handle access.
#[derive(Debug)]
pub struct LayerTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    pub(crate) z_order: Vec<ZOrder>,

    // -- Inputs (set by callers) --
    pub(crate) bounds: Vec<Rect>,
    pub(crate) clip: Vec<Option<ClipShape>>,
    pub(crate) transform: Vec<Transform3d>,
    pub(crate) reasons: Vec<CompositingReasons>,
    pub(crate) content: Vec<ContentKind>,
    pub(crate) blend_mode: Vec<BlendMode>,
    pub(crate) flags: Vec<LayerFlags>,
    pub(crate) ancestry: Vec<LayerAncestry>,
    pub(crate) reflection: Vec<u32>,
    pub(crate) is_reflection: Vec<bool>,

    // -- Assignment state (written by the assigner) --
    pub(crate) own_backing: Vec<Option<BackingId>>,
    pub(crate) grouped_backing: Vec<Option<BackingId>>,
    pub(crate) lost_grouped_mapping: Vec<bool>,
    pub(crate) squashing_disallowed: Vec<SquashingDisallowedReasons>,

    // -- Backings --
    pub(crate) backings: BackingArena,
    pub(crate) compositing_mode: bool,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,
    pub(crate) pending_released_backings: Vec<BackingId>,
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTree {
    /// Creates an empty layer tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            z_order: Vec::new(),
            bounds: Vec::new(),
            clip: Vec::new(),
            transform: Vec::new(),
            reasons: Vec::new(),
            content: Vec::new(),
            blend_mode: Vec::new(),
            flags: Vec::new(),
            ancestry: Vec::new(),
            reflection: Vec::new(),
            is_reflection: Vec::new(),
            own_backing: Vec::new(),
            grouped_backing: Vec::new(),
            lost_grouped_mapping: Vec::new(),
            squashing_disallowed: Vec::new(),
            backings: BackingArena::default(),
            compositing_mode: false,
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
            pending_released_backings: Vec::new(),
        }
    }

    // -- Allocation API --

    /// Creates a new layer and returns its handle.
    ///
    /// The layer starts detached, in normal flow, with empty bounds, no
    /// compositing reasons, and no backing.
    pub fn create_layer(&mut self) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.alive[i] = true;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.z_order[i] = ZOrder::NormalFlow;
            self.bounds[i] = Rect::ZERO;
            self.clip[i] = None;
            self.transform[i] = Transform3d::IDENTITY;
            self.reasons[i] = CompositingReasons::empty();
            self.content[i] = ContentKind::Normal;
            self.blend_mode[i] = BlendMode::Normal;
            self.flags[i] = LayerFlags::default();
            self.ancestry[i] = LayerAncestry::default();
            self.reflection[i] = INVALID;
            self.is_reflection[i] = false;
            self.own_backing[i] = None;
            self.grouped_backing[i] = None;
            self.lost_grouped_mapping[i] = false;
            self.squashing_disallowed[i] = SquashingDisallowedReasons::empty();
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.z_order.push(ZOrder::NormalFlow);
            self.bounds.push(Rect::ZERO);
            self.clip.push(None);
            self.transform.push(Transform3d::IDENTITY);
            self.reasons.push(CompositingReasons::empty());
            self.content.push(ContentKind::Normal);
            self.blend_mode.push(BlendMode::Normal);
            self.flags.push(LayerFlags::default());
            self.ancestry.push(LayerAncestry::default());
            self.reflection.push(INVALID);
            self.is_reflection.push(false);
            self.own_backing.push(None);
            self.grouped_backing.push(None);
            self.lost_grouped_mapping.push(false);
            self.squashing_disallowed
                .push(SquashingDisallowedReasons::empty());
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        self.pending_added.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);

        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a layer, freeing its slot for reuse.
    ///
    /// Any backing the layer owns is released (its squashed members are
    /// detached and flagged as having lost their grouped backing), and the
    /// layer is removed from any squashing backing it paints into. Released
    /// backings are reported by the next [`take_changes`](Self::take_changes).
    ///
    /// # Panics
    ///
    /// Panics if the layer has children (remove them first) or if the handle
    /// is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy layer with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        let _ = self.clear_backing(idx);
        self.set_grouped_backing(idx, None);

        // A reflectee pointing at this layer loses its reflection.
        for slot in &mut self.reflection {
            if *slot == idx {
                *slot = INVALID;
            }
        }
        let reflected = self.reflection[idx as usize];
        if reflected != INVALID {
            self.is_reflection[reflected as usize] = false;
            self.reflection[idx as usize] = INVALID;
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;

        self.free_list.push(idx);
        self.pending_removed.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && self.alive[id.idx as usize]
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: LayerId, child: LayerId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        assert!(
            !self.is_reflection[c as usize],
            "reflection layers cannot be attached to the tree"
        );

        self.link_last_child(p, c);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_before(&mut self, child: LayerId, sibling: LayerId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            // `sibling` was the first child.
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        let _ = self.dirty.add_dependency(c, p, dirty::ANCESTRY);
        self.dirty.mark_with(c, dirty::ANCESTRY, &EagerPolicy);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer has no parent.
    pub fn remove_from_parent(&mut self, child: LayerId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "layer has no parent");

        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::ANCESTRY);
        self.dirty.mark_with(c, dirty::ANCESTRY, &EagerPolicy);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.parent[id.idx as usize])
    }

    /// Returns an iterator over the direct children of a layer, in tree order.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_descendant_of(&self, id: LayerId, ancestor: LayerId) -> bool {
        self.validate(id);
        self.validate(ancestor);
        self.is_descendant_of_idx(id.idx, ancestor.idx)
    }

    /// Returns `true` if the layer is the root of the tree: it has no parent
    /// and is not a reflection.
    #[must_use]
    pub fn is_root_layer(&self, id: LayerId) -> bool {
        self.validate(id);
        self.is_root_layer_idx(id.idx)
    }

    // -- Property getters --

    /// Returns the paint-order bucket of a layer.
    #[must_use]
    pub fn z_order(&self, id: LayerId) -> ZOrder {
        self.validate(id);
        self.z_order[id.idx as usize]
    }

    /// Returns the layer's clipped bounding box in absolute coordinates.
    #[must_use]
    pub fn bounds(&self, id: LayerId) -> Rect {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the clip the layer applies to its descendants.
    #[must_use]
    pub fn clip(&self, id: LayerId) -> Option<ClipShape> {
        self.validate(id);
        self.clip[id.idx as usize]
    }

    /// Returns the layer's local transform.
    #[must_use]
    pub fn transform(&self, id: LayerId) -> Transform3d {
        self.validate(id);
        self.transform[id.idx as usize]
    }

    /// Returns the layer's compositing reasons, including any
    /// [`SQUASHING_DISALLOWED`](CompositingReasons::SQUASHING_DISALLOWED)
    /// stamp added by assignment.
    #[must_use]
    pub fn compositing_reasons(&self, id: LayerId) -> CompositingReasons {
        self.validate(id);
        self.reasons[id.idx as usize]
    }

    /// Returns why squashing was last refused for this layer.
    #[must_use]
    pub fn squashing_disallowed_reasons(&self, id: LayerId) -> SquashingDisallowedReasons {
        self.validate(id);
        self.squashing_disallowed[id.idx as usize]
    }

    /// Returns what kind of content the layer paints.
    #[must_use]
    pub fn content(&self, id: LayerId) -> ContentKind {
        self.validate(id);
        self.content[id.idx as usize]
    }

    /// Returns the layer's blend mode.
    #[must_use]
    pub fn blend_mode(&self, id: LayerId) -> BlendMode {
        self.validate(id);
        self.blend_mode[id.idx as usize]
    }

    /// Returns the flags of a layer.
    #[must_use]
    pub fn flags(&self, id: LayerId) -> LayerFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the ancestor references of a layer.
    #[must_use]
    pub fn ancestry(&self, id: LayerId) -> LayerAncestry {
        self.validate(id);
        self.ancestry[id.idx as usize]
    }

    /// Returns the reflection layer attached to this layer, if any.
    #[must_use]
    pub fn reflection(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.reflection[id.idx as usize])
    }

    /// Returns whether the tree has ever allocated a backing.
    #[must_use]
    pub fn in_compositing_mode(&self) -> bool {
        self.compositing_mode
    }

    // -- Assignment state getters --

    /// Returns the backing the layer owns, if any.
    #[must_use]
    pub fn own_backing(&self, id: LayerId) -> Option<BackingId> {
        self.validate(id);
        self.own_backing[id.idx as usize]
    }

    /// Returns the squashing backing the layer paints into, if any.
    #[must_use]
    pub fn grouped_backing(&self, id: LayerId) -> Option<BackingId> {
        self.validate(id);
        self.grouped_backing[id.idx as usize]
    }

    /// Returns `true` if the layer's squashing backing was destroyed out
    /// from under it and assignment has not yet caught up.
    #[must_use]
    pub fn lost_grouped_mapping(&self, id: LayerId) -> bool {
        self.validate(id);
        self.lost_grouped_mapping[id.idx as usize]
    }

    /// Returns how the layer is currently composited.
    #[must_use]
    pub fn compositing_state(&self, id: LayerId) -> CompositingState {
        self.validate(id);
        self.compositing_state_idx(id.idx)
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the paint-order bucket of a layer.
    pub fn set_z_order(&mut self, id: LayerId, z_order: ZOrder) {
        self.validate(id);
        self.z_order[id.idx as usize] = z_order;
        let p = self.parent[id.idx as usize];
        self.dirty
            .mark(if p == INVALID { id.idx } else { p }, dirty::TOPOLOGY);
    }

    /// Sets the layer's clipped bounding box in absolute coordinates.
    pub fn set_bounds(&mut self, id: LayerId, bounds: Rect) {
        self.validate(id);
        self.bounds[id.idx as usize] = bounds;
        self.dirty.mark(id.idx, dirty::GEOMETRY);
    }

    /// Sets the clip the layer applies to its descendants.
    pub fn set_clip(&mut self, id: LayerId, clip: Option<ClipShape>) {
        self.validate(id);
        self.clip[id.idx as usize] = clip;
        self.dirty.mark(id.idx, dirty::GEOMETRY);
    }

    /// Sets the layer's local transform.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.transform[id.idx as usize] = transform;
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    /// Replaces the layer's compositing reasons.
    ///
    /// This is how the upstream requirements stage publishes fresh reasons
    /// for a new update cycle, so it also clears the squashing-disallowed
    /// reasons recorded by earlier assignment passes.
    pub fn set_compositing_reasons(&mut self, id: LayerId, reasons: CompositingReasons) {
        self.validate(id);
        self.reasons[id.idx as usize] = reasons;
        self.squashing_disallowed[id.idx as usize] = SquashingDisallowedReasons::empty();
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    /// Sets what kind of content the layer paints.
    pub fn set_content(&mut self, id: LayerId, content: ContentKind) {
        self.validate(id);
        self.content[id.idx as usize] = content;
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    /// Sets the layer's blend mode.
    pub fn set_blend_mode(&mut self, id: LayerId, blend_mode: BlendMode) {
        self.validate(id);
        self.blend_mode[id.idx as usize] = blend_mode;
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    /// Sets the flags of a layer.
    pub fn set_flags(&mut self, id: LayerId, flags: LayerFlags) {
        self.validate(id);
        self.flags[id.idx as usize] = flags;
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    /// Sets the ancestor references of a layer.
    ///
    /// Marks the ANCESTRY channel with eager propagation to descendants.
    pub fn set_ancestry(&mut self, id: LayerId, ancestry: LayerAncestry) {
        self.validate(id);
        self.ancestry[id.idx as usize] = ancestry;
        self.dirty.mark_with(id.idx, dirty::ANCESTRY, &EagerPolicy);
    }

    /// Attaches (or detaches, with `None`) a reflection layer.
    ///
    /// The reflection must be a detached layer; it is assigned right after
    /// its reflectee and never joins a squashing backing.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or the reflection layer has a parent.
    pub fn set_reflection(&mut self, id: LayerId, reflection: Option<LayerId>) {
        self.validate(id);
        let old = self.reflection[id.idx as usize];
        if old != INVALID {
            self.is_reflection[old as usize] = false;
        }
        match reflection {
            Some(r) => {
                self.validate(r);
                assert!(
                    self.parent[r.idx as usize] == INVALID,
                    "reflection layer must be detached"
                );
                self.reflection[id.idx as usize] = r.idx;
                self.is_reflection[r.idx as usize] = true;
            }
            None => self.reflection[id.idx as usize] = INVALID,
        }
        self.dirty.mark(id.idx, dirty::REASONS);
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: LayerId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale LayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Converts a raw slot index to a handle, mapping [`INVALID`] to `None`.
    pub(crate) fn handle(&self, idx: u32) -> Option<LayerId> {
        (idx != INVALID).then(|| LayerId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    pub(crate) fn is_root_layer_idx(&self, idx: u32) -> bool {
        self.parent[idx as usize] == INVALID && !self.is_reflection[idx as usize]
    }

    pub(crate) fn is_descendant_of_idx(&self, idx: u32, ancestor: u32) -> bool {
        let mut current = idx;
        while current != INVALID {
            if current == ancestor {
                return true;
            }
            current = self.parent[current as usize];
        }
        false
    }

    pub(crate) fn compositing_state_idx(&self, idx: u32) -> CompositingState {
        if self.own_backing[idx as usize].is_some() {
            CompositingState::PaintsIntoOwnBacking
        } else if self.grouped_backing[idx as usize].is_some() {
            CompositingState::PaintsIntoGroupedBacking
        } else {
            CompositingState::NotComposited
        }
    }

    /// Records the assigner's verdict on a squashing candidate.
    ///
    /// Stamps [`SQUASHING_DISALLOWED`](CompositingReasons::SQUASHING_DISALLOWED)
    /// so the layer takes the own-backing path. `mark_dirty` requests a
    /// further assignment pass for drivers that defer the verdict.
    pub(crate) fn record_squashing_disallowed(
        &mut self,
        idx: u32,
        reasons: SquashingDisallowedReasons,
        mark_dirty: bool,
    ) {
        let i = idx as usize;
        self.reasons[i] |= CompositingReasons::SQUASHING_DISALLOWED;
        self.squashing_disallowed[i] |= reasons;
        if mark_dirty {
            self.dirty.mark(idx, dirty::REASONS);
        }
    }

    fn link_last_child(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        // Ancestor pointers are inherited: the child's subtree re-evaluates
        // when the parent's change.
        let _ = self.dirty.add_dependency(c, p, dirty::ANCESTRY);
        self.dirty.mark_with(c, dirty::ANCESTRY, &EagerPolicy);
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}
