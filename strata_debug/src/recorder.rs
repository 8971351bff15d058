// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Layer and backing handles cannot be rebuilt outside the tree that issued
//! them, so recordings store them as [`RecordedId`] (slot index plus
//! generation).

use std::fmt;

use kurbo::Rect;
use strata_core::layer::{BackingId, CompositingStateTransition, LayerId};
use strata_core::reasons::SquashingDisallowedReasons;
use strata_core::trace::{
    AssignBeginEvent, AssignSummary, SquashBoundsEvent, SquashingDisallowedEvent,
    SquashingFinishedEvent, TraceSink, TransitionEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_ASSIGN_BEGIN: u8 = 1;
const TAG_TRANSITION: u8 = 2;
const TAG_SQUASHING_DISALLOWED: u8 = 3;
const TAG_SQUASHING_FINISHED: u8 = 4;
const TAG_SQUASH_BOUNDS: u8 = 5;
const TAG_ASSIGN_END: u8 = 6;

// ---------------------------------------------------------------------------
// Recorded handles
// ---------------------------------------------------------------------------

/// A layer or backing handle as it appears in a recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordedId {
    /// Slot index.
    pub index: u32,
    /// Generation of the slot when the event was recorded.
    pub generation: u32,
}

impl From<LayerId> for RecordedId {
    fn from(id: LayerId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

impl From<BackingId> for RecordedId {
    fn from(id: BackingId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

impl fmt::Display for RecordedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_count(&mut self, v: usize) {
        self.write_u64(v as u64);
    }

    fn write_id(&mut self, id: impl Into<RecordedId>) {
        let id = id.into();
        self.write_u32(id.index);
        self.write_u32(id.generation);
    }

    fn write_option_id(&mut self, id: Option<LayerId>) {
        match id {
            Some(id) => {
                self.write_u8(1);
                self.write_id(id);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
                self.write_u32(0);
            }
        }
    }

    fn write_transition(&mut self, t: CompositingStateTransition) {
        self.write_u8(match t {
            CompositingStateTransition::NoChange => 0,
            CompositingStateTransition::AllocateOwnBacking => 1,
            CompositingStateTransition::RemoveOwnBacking => 2,
            CompositingStateTransition::PutInSquashingLayer => 3,
            CompositingStateTransition::RemoveFromSquashingLayer => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_assign_begin(&mut self, e: &AssignBeginEvent) {
        self.write_u8(TAG_ASSIGN_BEGIN);
        self.write_u64(e.pass);
        self.write_id(e.root);
        self.write_bool(e.squashing_enabled);
    }

    fn on_transition(&mut self, e: &TransitionEvent) {
        self.write_u8(TAG_TRANSITION);
        self.write_u64(e.pass);
        self.write_id(e.layer);
        self.write_transition(e.transition);
        self.write_bool(e.backing_changed);
    }

    fn on_squashing_disallowed(&mut self, e: &SquashingDisallowedEvent) {
        self.write_u8(TAG_SQUASHING_DISALLOWED);
        self.write_u64(e.pass);
        self.write_id(e.layer);
        self.write_option_id(e.owner);
        self.write_u32(e.reasons.bits());
    }

    fn on_squashing_finished(&mut self, e: &SquashingFinishedEvent) {
        self.write_u8(TAG_SQUASHING_FINISHED);
        self.write_u64(e.pass);
        self.write_id(e.backing);
        self.write_id(e.owner);
        self.write_count(e.member_count);
    }

    fn on_assign_end(&mut self, s: &AssignSummary) {
        self.write_u8(TAG_ASSIGN_END);
        self.write_u64(s.pass);
        self.write_count(s.visited);
        self.write_count(s.allocated);
        self.write_count(s.removed);
        self.write_count(s.squashed);
        self.write_count(s.unsquashed);
        self.write_count(s.disallowed);
        self.write_count(s.invalidations);
        self.write_bool(s.layers_changed);
    }

    fn on_squash_bounds(&mut self, e: &SquashBoundsEvent) {
        self.write_u8(TAG_SQUASH_BOUNDS);
        self.write_u64(e.pass);
        self.write_id(e.backing);
        self.write_count(e.index);
        self.write_f64(e.bounding_rect.x0);
        self.write_f64(e.bounding_rect.y0);
        self.write_f64(e.bounding_rect.x1);
        self.write_f64(e.bounding_rect.y1);
        self.write_f64(e.total_area);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// An [`AssignBeginEvent`].
    AssignBegin {
        /// Pass counter.
        pass: u64,
        /// Root of the traversal.
        root: RecordedId,
        /// Whether squashing was enabled.
        squashing_enabled: bool,
    },
    /// A [`TransitionEvent`].
    Transition {
        /// Pass counter.
        pass: u64,
        /// The layer.
        layer: RecordedId,
        /// What was decided.
        transition: CompositingStateTransition,
        /// Whether the layer's own backing was created or destroyed.
        backing_changed: bool,
    },
    /// A [`SquashingDisallowedEvent`].
    SquashingDisallowed {
        /// Pass counter.
        pass: u64,
        /// The rejected candidate.
        layer: RecordedId,
        /// Owner of the backing it tried to join.
        owner: Option<RecordedId>,
        /// Why it was rejected.
        reasons: SquashingDisallowedReasons,
    },
    /// A [`SquashingFinishedEvent`].
    SquashingFinished {
        /// Pass counter.
        pass: u64,
        /// The finished backing.
        backing: RecordedId,
        /// Its owner.
        owner: RecordedId,
        /// Layers squashed into it this pass.
        member_count: usize,
    },
    /// A [`SquashBoundsEvent`].
    SquashBounds {
        /// Pass counter.
        pass: u64,
        /// The backing being accumulated.
        backing: RecordedId,
        /// Index the layer occupies.
        index: usize,
        /// Union of member bounds so far.
        bounding_rect: Rect,
        /// Sum of member areas so far.
        total_area: f64,
    },
    /// The [`AssignSummary`] that ends a pass.
    AssignEnd(AssignSummary),
}

impl RecordedEvent {
    /// Returns the pass the event belongs to.
    #[must_use]
    pub fn pass(&self) -> u64 {
        match self {
            Self::AssignBegin { pass, .. }
            | Self::Transition { pass, .. }
            | Self::SquashingDisallowed { pass, .. }
            | Self::SquashingFinished { pass, .. }
            | Self::SquashBounds { pass, .. } => *pass,
            Self::AssignEnd(s) => s.pass,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
///
/// Iteration stops at the first unknown tag or truncated record.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u64()?).ok()
    }

    fn read_id(&mut self) -> Option<RecordedId> {
        Some(RecordedId {
            index: self.read_u32()?,
            generation: self.read_u32()?,
        })
    }

    fn read_option_id(&mut self) -> Option<Option<RecordedId>> {
        let present = self.read_u8()?;
        let id = self.read_id()?;
        Some((present != 0).then_some(id))
    }

    fn read_transition(&mut self) -> Option<CompositingStateTransition> {
        Some(match self.read_u8()? {
            0 => CompositingStateTransition::NoChange,
            1 => CompositingStateTransition::AllocateOwnBacking,
            2 => CompositingStateTransition::RemoveOwnBacking,
            3 => CompositingStateTransition::PutInSquashingLayer,
            4 => CompositingStateTransition::RemoveFromSquashingLayer,
            _ => return None,
        })
    }

    fn decode_assign_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::AssignBegin {
            pass: self.read_u64()?,
            root: self.read_id()?,
            squashing_enabled: self.read_bool()?,
        })
    }

    fn decode_transition(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Transition {
            pass: self.read_u64()?,
            layer: self.read_id()?,
            transition: self.read_transition()?,
            backing_changed: self.read_bool()?,
        })
    }

    fn decode_squashing_disallowed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SquashingDisallowed {
            pass: self.read_u64()?,
            layer: self.read_id()?,
            owner: self.read_option_id()?,
            reasons: SquashingDisallowedReasons::from_bits_retain(self.read_u32()?),
        })
    }

    fn decode_squashing_finished(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SquashingFinished {
            pass: self.read_u64()?,
            backing: self.read_id()?,
            owner: self.read_id()?,
            member_count: self.read_count()?,
        })
    }

    fn decode_squash_bounds(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SquashBounds {
            pass: self.read_u64()?,
            backing: self.read_id()?,
            index: self.read_count()?,
            bounding_rect: Rect::new(
                self.read_f64()?,
                self.read_f64()?,
                self.read_f64()?,
                self.read_f64()?,
            ),
            total_area: self.read_f64()?,
        })
    }

    fn decode_assign_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::AssignEnd(AssignSummary {
            pass: self.read_u64()?,
            visited: self.read_count()?,
            allocated: self.read_count()?,
            removed: self.read_count()?,
            squashed: self.read_count()?,
            unsquashed: self.read_count()?,
            disallowed: self.read_count()?,
            invalidations: self.read_count()?,
            layers_changed: self.read_bool()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_ASSIGN_BEGIN => self.decode_assign_begin(),
            TAG_TRANSITION => self.decode_transition(),
            TAG_SQUASHING_DISALLOWED => self.decode_squashing_disallowed(),
            TAG_SQUASHING_FINISHED => self.decode_squashing_finished(),
            TAG_SQUASH_BOUNDS => self.decode_squash_bounds(),
            TAG_ASSIGN_END => self.decode_assign_end(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_pass, squashing_scene};

    #[test]
    fn records_a_full_pass() {
        let mut scene = squashing_scene();
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(
            matches!(
                events.first(),
                Some(RecordedEvent::AssignBegin {
                    pass: 0,
                    squashing_enabled: true,
                    ..
                })
            ),
            "got {events:?}"
        );
        let Some(RecordedEvent::AssignEnd(summary)) = events.last() else {
            panic!("expected AssignEnd last, got {events:?}");
        };
        assert_eq!(summary.allocated, 2, "root and base get backings");
        assert_eq!(summary.squashed, 3, "three overlap layers squash");
        assert!(summary.layers_changed, "first pass changes structure");
        assert!(events.iter().all(|e| e.pass() == 0), "single pass");
    }

    #[test]
    fn squashed_layers_are_recorded_in_order() {
        let mut scene = squashing_scene();
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let squashed: Vec<RecordedId> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::Transition {
                    layer,
                    transition: CompositingStateTransition::PutInSquashingLayer,
                    ..
                } => Some(layer),
                _ => None,
            })
            .collect();
        let expected: Vec<RecordedId> = scene.layers.iter().map(|&l| l.into()).collect();
        assert_eq!(squashed, expected);
    }

    #[test]
    fn squash_bounds_grow_monotonically() {
        let mut scene = squashing_scene();
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let areas: Vec<(usize, f64)> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::SquashBounds {
                    index, total_area, ..
                } => Some((index, total_area)),
                _ => None,
            })
            .collect();
        assert_eq!(areas, [(0, 100.0), (1, 200.0), (2, 300.0)]);
    }

    #[test]
    fn finished_events_report_member_counts() {
        let mut scene = squashing_scene();
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let counts: Vec<usize> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::SquashingFinished { member_count, .. } => Some(member_count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, [0, 3]);
    }

    #[test]
    fn disallowed_reasons_survive_recording() {
        let mut scene = squashing_scene();
        scene.make_video(2);
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let rejected: Vec<_> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::SquashingDisallowed {
                    layer,
                    owner,
                    reasons,
                    ..
                } => Some((layer, owner, reasons)),
                _ => None,
            })
            .collect();
        assert_eq!(
            rejected,
            [(
                scene.layers[2].into(),
                Some(scene.base.into()),
                SquashingDisallowedReasons::VIDEO
            )]
        );
    }

    #[test]
    fn truncated_recording_stops_cleanly() {
        let mut scene = squashing_scene();
        let mut rec = RecorderSink::new();
        record_pass(&mut scene, &mut rec);

        let bytes = rec.into_bytes();
        let full = decode(&bytes).count();
        let truncated = decode(&bytes[..bytes.len() - 1]).count();
        assert_eq!(truncated, full - 1);
    }

    #[test]
    fn unknown_tag_stops_iteration() {
        assert_eq!(decode(&[0xff, 0, 0, 0]).count(), 0);
        assert_eq!(decode(&[]).count(), 0);
    }
}
