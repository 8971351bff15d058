// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared scene for the sink tests.

use kurbo::Rect;
use strata_core::config::AssignerConfig;
use strata_core::factory::DefaultBackingFactory;
use strata_core::layer::{ContentKind, LayerId, LayerTree};
use strata_core::reasons::CompositingReasons;
use strata_core::trace::{TraceSink, Tracer};
use strata_core::{Assigner, AssignmentOutcome};

pub(crate) struct Scene {
    pub(crate) tree: LayerTree,
    pub(crate) root: LayerId,
    pub(crate) base: LayerId,
    pub(crate) layers: Vec<LayerId>,
}

impl Scene {
    pub(crate) fn make_video(&mut self, i: usize) {
        self.tree.set_content(self.layers[i], ContentKind::Video);
    }
}

/// A composited root, one composited base layer, and three adjacent 10x10
/// layers that overlap the base and can share its backing.
pub(crate) fn squashing_scene() -> Scene {
    let mut tree = LayerTree::new();
    let root = tree.create_layer();
    tree.set_compositing_reasons(root, CompositingReasons::ROOT);
    tree.set_bounds(root, Rect::new(0.0, 0.0, 800.0, 600.0));

    let base = tree.create_layer();
    tree.add_child(root, base);
    tree.set_compositing_reasons(base, CompositingReasons::WILL_CHANGE_COMPOSITING_HINT);
    tree.set_bounds(base, Rect::new(0.0, 0.0, 30.0, 30.0));

    let mut layers = Vec::new();
    for x in [0.0, 10.0, 20.0] {
        let layer = tree.create_layer();
        tree.add_child(root, layer);
        tree.set_compositing_reasons(layer, CompositingReasons::OVERLAP);
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

/// Runs one assignment pass over `scene`, reporting to `sink`.
pub(crate) fn record_pass(scene: &mut Scene, sink: &mut dyn TraceSink) -> AssignmentOutcome {
    let mut assigner = Assigner::new(AssignerConfig::DEFAULT);
    let mut tracer = Tracer::new(sink);
    assigner.assign(
        &mut scene.tree,
        scene.root,
        &mut DefaultBackingFactory,
        &mut tracer,
    )
}
