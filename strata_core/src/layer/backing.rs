// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composited backings and squashing-member bookkeeping.
//!
//! A [`Backing`] is created for each layer that paints into its own
//! composited surface. The same backing also carries an ordered list of
//! [`SquashedLayer`]s: later layers in paint order that share one extra
//! "squashing" surface attached to it.
//!
//! The member list is maintained incrementally across assignment passes.
//! During a pass, each squashed layer is assigned to an index. If the layer
//! already sits at that index nothing happens; otherwise it is inserted there
//! and any layer it displaces shifts later. When the pass moves on to the
//! next backing, everything past the last assigned index is truncated. A layer
//! can transiently appear twice in the list (at its new index and at a stale
//! later one); truncation only detaches layers that have no earlier entry.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use kurbo::{Rect, Vec2};

use super::id::{BackingId, INVALID, LayerId};
use super::store::LayerTree;
use crate::squashing::unite;

/// What assignment decided to do with a layer's backing this pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositingStateTransition {
    /// Nothing changes.
    #[default]
    NoChange,
    /// The layer gets a dedicated backing.
    AllocateOwnBacking,
    /// The layer's dedicated backing is destroyed.
    RemoveOwnBacking,
    /// The layer joins the current squashing backing.
    PutInSquashingLayer,
    /// The layer leaves the squashing backing it was in.
    RemoveFromSquashingLayer,
}

/// One layer painting into a squashing surface.
#[derive(Clone, Debug, PartialEq)]
pub struct SquashedLayer {
    /// The squashed layer.
    pub layer: LayerId,
    /// Clip applied when painting this layer, in squashing-surface
    /// coordinates. `None` when the layer shares the owner's clip.
    pub local_clip_rect: Option<Rect>,
    /// Offset of the layer's bounds from the squashing surface origin.
    pub offset_from_squashing_origin: Vec2,
    /// Whether [`offset_from_squashing_origin`](Self::offset_from_squashing_origin)
    /// has been computed at least once.
    pub offset_set: bool,
    /// Position of the layer in the assignment traversal that placed it.
    pub paint_order_index: usize,
}

impl SquashedLayer {
    fn new(layer: LayerId, paint_order_index: usize) -> Self {
        Self {
            layer,
            local_clip_rect: None,
            offset_from_squashing_origin: Vec2::ZERO,
            offset_set: false,
            paint_order_index,
        }
    }
}

/// A composited surface owned by one layer, plus its squashing members.
#[derive(Clone, Debug)]
pub struct Backing {
    pub(crate) owner: LayerId,
    pub(crate) owner_paint_order_index: usize,
    pub(crate) squashed: Vec<SquashedLayer>,
    pub(crate) squashing_bounds: Option<Rect>,
    pub(crate) needs_geometry_update: bool,
}

impl Backing {
    fn new(owner: LayerId) -> Self {
        Self {
            owner,
            owner_paint_order_index: 0,
            squashed: Vec::new(),
            squashing_bounds: None,
            needs_geometry_update: true,
        }
    }

    /// Returns the layer that owns this backing.
    #[must_use]
    pub fn owner(&self) -> LayerId {
        self.owner
    }

    /// Returns the owner's position in the assignment traversal.
    #[must_use]
    pub fn owner_paint_order_index(&self) -> usize {
        self.owner_paint_order_index
    }

    /// Returns the squashed members, in paint order.
    #[must_use]
    pub fn squashed_layers(&self) -> &[SquashedLayer] {
        &self.squashed
    }

    /// Returns `true` if any layer is squashed into this backing.
    #[must_use]
    pub fn has_squashing_layer(&self) -> bool {
        !self.squashed.is_empty()
    }

    /// Returns the absolute, integer-aligned bounds of the squashing surface
    /// as of the last geometry update.
    ///
    /// `None` until a geometry update finds a member with non-empty bounds.
    #[must_use]
    pub fn squashing_bounds(&self) -> Option<Rect> {
        self.squashing_bounds
    }

    /// Returns `true` if members changed since the last geometry update.
    #[must_use]
    pub fn needs_geometry_update(&self) -> bool {
        self.needs_geometry_update
    }

    /// Returns the first member whose subtree contains `layer`, looking only
    /// at the first `max_index` members.
    ///
    /// Members past `max_index` are left over from a previous pass and have
    /// not been confirmed yet.
    #[must_use]
    pub fn containing_squashed_layer(
        &self,
        tree: &LayerTree,
        layer: LayerId,
        max_index: usize,
    ) -> Option<&SquashedLayer> {
        if !tree.is_alive(layer) {
            return None;
        }
        self.squashed
            .iter()
            .take(max_index)
            .find(|member| {
                tree.is_alive(member.layer) && tree.is_descendant_of(layer, member.layer)
            })
    }

    /// Returns `true` if no entry before `index` refers to the same layer as
    /// the entry at `index`.
    fn has_no_preceding_entry(&self, index: usize) -> bool {
        let layer = self.squashed[index].layer;
        !self.squashed[..index].iter().any(|m| m.layer == layer)
    }
}

/// Generational slot storage for backings.
#[derive(Clone, Debug, Default)]
pub(crate) struct BackingArena {
    slots: Vec<Option<Backing>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
}

impl BackingArena {
    fn insert(&mut self, backing: Backing) -> BackingId {
        if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.slots[i] = Some(backing);
            BackingId {
                idx,
                generation: self.generation[i],
            }
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(INVALID);
            assert!(idx != INVALID, "backing arena exhausted");
            self.slots.push(Some(backing));
            self.generation.push(0);
            BackingId { idx, generation: 0 }
        }
    }

    fn remove(&mut self, id: BackingId) -> Option<Backing> {
        if !self.contains(id) {
            return None;
        }
        let taken = self.slots[id.idx as usize].take();
        self.free_list.push(id.idx);
        taken
    }

    fn contains(&self, id: BackingId) -> bool {
        (id.idx as usize) < self.slots.len()
            && self.generation[id.idx as usize] == id.generation
            && self.slots[id.idx as usize].is_some()
    }

    pub(crate) fn get(&self, id: BackingId) -> Option<&Backing> {
        if self.contains(id) {
            self.slots[id.idx as usize].as_ref()
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: BackingId) -> Option<&mut Backing> {
        if self.contains(id) {
            self.slots[id.idx as usize].as_mut()
        } else {
            None
        }
    }

    fn iter(&self) -> impl Iterator<Item = (BackingId, &Backing)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let backing = slot.as_ref()?;
            let idx = u32::try_from(i).ok()?;
            Some((
                BackingId {
                    idx,
                    generation: self.generation[i],
                },
                backing,
            ))
        })
    }

    fn ids(&self) -> Vec<BackingId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

impl LayerTree {
    /// Returns the backing for a handle, or `None` if it was destroyed.
    #[must_use]
    pub fn backing(&self, id: BackingId) -> Option<&Backing> {
        self.backings.get(id)
    }

    /// Returns every live backing.
    pub fn backings(&self) -> impl Iterator<Item = (BackingId, &Backing)> + '_ {
        self.backings.iter()
    }

    /// Returns a diagnostic name for the backing's squashing surface, derived
    /// from its first squashed member.
    #[must_use]
    pub fn squashing_layer_debug_name(&self, id: BackingId) -> Option<String> {
        let first = self.backings.get(id)?.squashed.first()?;
        Some(format!("Squashing Layer (first squashed layer: {})", first.layer))
    }

    /// Applies a backing transition with the default semantics.
    ///
    /// - [`AllocateOwnBacking`](CompositingStateTransition::AllocateOwnBacking)
    ///   enters compositing mode, detaches the layer from any squashing
    ///   backing, and creates its backing.
    /// - [`RemoveOwnBacking`](CompositingStateTransition::RemoveOwnBacking)
    ///   and [`PutInSquashingLayer`](CompositingStateTransition::PutInSquashingLayer)
    ///   destroy the layer's own backing if it has one. Its squashed members
    ///   are detached and flagged as having lost their grouped backing.
    ///
    /// Returns `true` if the layer's own backing was created or destroyed.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale. In debug builds, also panics if asked
    /// to allocate for a layer that already owns a backing.
    pub fn allocate_or_clear_backing(
        &mut self,
        layer: LayerId,
        transition: CompositingStateTransition,
    ) -> bool {
        self.validate(layer);
        let idx = layer.idx;
        match transition {
            CompositingStateTransition::AllocateOwnBacking => {
                debug_assert!(
                    self.own_backing[idx as usize].is_none(),
                    "layer already owns a backing"
                );
                self.compositing_mode = true;
                self.lost_grouped_mapping[idx as usize] = false;
                self.set_grouped_backing(idx, None);
                let id = self.backings.insert(Backing::new(layer));
                self.own_backing[idx as usize] = Some(id);
                log::trace!("allocated {id:?} for {layer}");
                true
            }
            CompositingStateTransition::RemoveOwnBacking
            | CompositingStateTransition::PutInSquashingLayer => self.clear_backing(idx),
            CompositingStateTransition::NoChange
            | CompositingStateTransition::RemoveFromSquashingLayer => false,
        }
    }

    /// Marks every backing for a geometry update.
    pub fn mark_all_backing_geometry_dirty(&mut self) {
        for id in self.backings.ids() {
            if let Some(backing) = self.backings.get_mut(id) {
                backing.needs_geometry_update = true;
            }
        }
    }

    /// Recomputes squashing geometry for every backing that needs it.
    ///
    /// Returns the squashed layers whose offset within their squashing
    /// surface moved, which need their paint invalidated.
    pub fn update_backing_geometry(&mut self) -> Vec<LayerId> {
        let mut invalidations = Vec::new();
        for id in self.backings.ids() {
            if self
                .backings
                .get(id)
                .is_some_and(|backing| backing.needs_geometry_update)
            {
                self.update_squashing_geometry(id, &mut invalidations);
            }
        }
        invalidations
    }

    /// Recomputes the squashing surface bounds, member offsets, and member
    /// clips of one backing.
    ///
    /// The surface is the smallest integer rect enclosing the members'
    /// non-empty bounds. A member clipped
    /// by a different container than the owner carries that container's
    /// clip, translated into surface coordinates.
    pub fn update_squashing_geometry(
        &mut self,
        id: BackingId,
        invalidations: &mut Vec<LayerId>,
    ) {
        let Some(backing) = self.backings.get(id) else {
            return;
        };
        let owner_container = if self.is_alive(backing.owner) {
            self.ancestry[backing.owner.idx as usize].clipping_container
        } else {
            None
        };

        let united = backing
            .squashed
            .iter()
            .filter(|member| self.is_alive(member.layer))
            .fold(Rect::ZERO, |acc, member| {
                unite(acc, self.bounds[member.layer.idx as usize])
            });
        let squashing_bounds = (!united.is_zero_area()).then(|| united.expand());
        let origin = squashing_bounds.map_or(Vec2::ZERO, |r| r.origin().to_vec2());

        let mut updated = Vec::with_capacity(backing.squashed.len());
        for member in &backing.squashed {
            let mut member = member.clone();
            if self.is_alive(member.layer) {
                let i = member.layer.idx as usize;
                let offset = self.bounds[i].origin().to_vec2() - origin;
                if member.offset_set && member.offset_from_squashing_origin != offset {
                    invalidations.push(member.layer);
                }
                member.offset_from_squashing_origin = offset;
                member.offset_set = true;

                let container = self.ancestry[i].clipping_container;
                member.local_clip_rect = match container {
                    Some(c) if container != owner_container && self.is_alive(c) => self.clip
                        [c.idx as usize]
                        .map(|clip| clip.bounding_rect() - origin),
                    _ => None,
                };
            }
            updated.push(member);
        }

        if let Some(backing) = self.backings.get_mut(id) {
            backing.squashed = updated;
            backing.squashing_bounds = squashing_bounds;
            backing.needs_geometry_update = false;
        }
    }

    /// Places `layer` at `index` in the backing's squashed-layer list.
    ///
    /// Returns `false` if the layer was already at that index. Otherwise the
    /// layer is inserted (or appended), its grouped backing is set, and it is
    /// queued for paint invalidation along with any displaced layer that has
    /// no earlier entry.
    pub(crate) fn update_squashing_layer_assignment(
        &mut self,
        id: BackingId,
        layer: LayerId,
        index: usize,
        paint_order_index: usize,
        invalidations: &mut Vec<LayerId>,
    ) -> bool {
        let Some(backing) = self.backings.get_mut(id) else {
            return false;
        };
        if index < backing.squashed.len() {
            if backing.squashed[index].layer == layer {
                backing.squashed[index].paint_order_index = paint_order_index;
                return false;
            }
            invalidations.push(layer);
            self.invalidate_layer_if_no_preceding_entry(id, index, invalidations);
            if let Some(backing) = self.backings.get_mut(id) {
                backing
                    .squashed
                    .insert(index, SquashedLayer::new(layer, paint_order_index));
            }
        } else {
            invalidations.push(layer);
            backing
                .squashed
                .push(SquashedLayer::new(layer, paint_order_index));
        }
        self.set_grouped_backing(layer.idx, Some(id));
        true
    }

    /// Truncates the backing's member list to `count`, detaching truncated
    /// layers that have no earlier entry and still point at this backing.
    /// Every truncated layer is queued for paint invalidation.
    pub(crate) fn finish_accumulating_squashing_layers(
        &mut self,
        id: BackingId,
        count: usize,
        invalidations: &mut Vec<LayerId>,
    ) {
        let len = match self.backings.get(id) {
            Some(backing) => backing.squashed.len(),
            None => return,
        };
        if count >= len {
            return;
        }
        for i in count..len {
            if self.invalidate_layer_if_no_preceding_entry(id, i, invalidations) {
                if let Some(layer) = self.backings.get(id).map(|b| b.squashed[i].layer) {
                    self.grouped_backing[layer.idx as usize] = None;
                }
            }
            if let Some(backing) = self.backings.get(id) {
                invalidations.push(backing.squashed[i].layer);
            }
        }
        if let Some(backing) = self.backings.get_mut(id) {
            backing.squashed.truncate(count);
            backing.needs_geometry_update = true;
        }
    }

    /// Removes the first entry for `layer` from the backing's member list.
    pub(crate) fn remove_layer_from_squashing_backing(&mut self, id: BackingId, layer: LayerId) {
        let Some(backing) = self.backings.get_mut(id) else {
            return;
        };
        let position = backing.squashed.iter().position(|m| m.layer == layer);
        debug_assert!(position.is_some(), "{layer} is not squashed into {id:?}");
        if let Some(position) = position {
            backing.squashed.remove(position);
            backing.needs_geometry_update = true;
        }
    }

    /// Returns `true` (and queues the layer for invalidation) if the member
    /// at `index` has no earlier entry and still points at this backing.
    fn invalidate_layer_if_no_preceding_entry(
        &self,
        id: BackingId,
        index: usize,
        invalidations: &mut Vec<LayerId>,
    ) -> bool {
        let Some(backing) = self.backings.get(id) else {
            return false;
        };
        let layer = backing.squashed[index].layer;
        if backing.has_no_preceding_entry(index)
            && self.is_alive(layer)
            && self.grouped_backing[layer.idx as usize] == Some(id)
        {
            invalidations.push(layer);
            return true;
        }
        false
    }

    /// Points a layer at a squashing backing (or none), removing it from the
    /// member list of the backing it previously pointed at.
    pub(crate) fn set_grouped_backing(&mut self, idx: u32, backing: Option<BackingId>) {
        let old = self.grouped_backing[idx as usize];
        if old == backing {
            return;
        }
        if let Some(old) = old {
            if let Some(layer) = self.handle(idx) {
                if self
                    .backings
                    .get(old)
                    .is_some_and(|b| b.squashed.iter().any(|m| m.layer == layer))
                {
                    self.remove_layer_from_squashing_backing(old, layer);
                }
            }
        }
        self.grouped_backing[idx as usize] = backing;
    }

    /// Destroys the layer's own backing, if any.
    ///
    /// Squashed members still pointing at the backing are detached and
    /// flagged with `lost_grouped_mapping`.
    pub(crate) fn clear_backing(&mut self, idx: u32) -> bool {
        let Some(id) = self.own_backing[idx as usize].take() else {
            return false;
        };
        if let Some(backing) = self.backings.remove(id) {
            for member in &backing.squashed {
                let m = member.layer.idx as usize;
                if self.is_alive(member.layer) && self.grouped_backing[m] == Some(id) {
                    self.grouped_backing[m] = None;
                    self.lost_grouped_mapping[m] = true;
                }
            }
            log::trace!("cleared {id:?} owned by {}", backing.owner);
        }
        self.pending_released_backings.push(id);
        true
    }
}
