// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backing factory contract.
//!
//! Assignment decides *what* should happen to each layer's backing; a
//! [`BackingFactory`] carries it out. Integrations that mirror backings into
//! a native compositor (a `CALayer` tree, a DOM tree, a GPU scene graph)
//! implement this trait to create and destroy their native surfaces at the
//! same time the [`LayerTree`] bookkeeping changes.
//!
//! # Update cycle
//!
//! A typical driver wires the pieces together like this:
//!
//! ```rust,ignore
//! fn update_compositing(tree: &mut LayerTree, root: LayerId) {
//!     // Inputs: the requirements stage publishes fresh reasons.
//!     tree.set_compositing_reasons(layer, reasons);
//!
//!     // Skip the pass entirely if nothing relevant changed.
//!     if tree.take_changes().is_empty() {
//!         return;
//!     }
//!
//!     // Assign: decide and apply backing transitions.
//!     let outcome = assigner.assign(tree, root, &mut factory, &mut Tracer::none());
//!
//!     // Geometry: recompute squashing surfaces and member offsets.
//!     let moved = tree.update_backing_geometry();
//!
//!     // Hand off to paint invalidation and surface-tree building.
//!     invalidate(&outcome.needs_paint_invalidation, &moved);
//! }
//! ```

use crate::layer::{CompositingStateTransition, LayerId, LayerTree};

/// Creates and destroys composited backings on behalf of the
/// [`Assigner`](crate::Assigner).
pub trait BackingFactory {
    /// Applies `transition` to `layer`'s own backing.
    ///
    /// Implementations must keep `tree` consistent, normally by calling
    /// [`LayerTree::allocate_or_clear_backing`]. Returns `true` if the
    /// layer's own backing was created or destroyed.
    fn allocate_or_clear(
        &mut self,
        tree: &mut LayerTree,
        layer: LayerId,
        transition: CompositingStateTransition,
    ) -> bool;
}

/// A [`BackingFactory`] that only updates the [`LayerTree`] bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBackingFactory;

impl BackingFactory for DefaultBackingFactory {
    fn allocate_or_clear(
        &mut self,
        tree: &mut LayerTree,
        layer: LayerId,
        transition: CompositingStateTransition,
    ) -> bool {
        tree.allocate_or_clear_backing(layer, transition)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    /// Records every call and forwards to the tree.
    #[derive(Default)]
    struct LoggingFactory {
        calls: Vec<(LayerId, CompositingStateTransition, bool)>,
    }

    impl BackingFactory for LoggingFactory {
        fn allocate_or_clear(
            &mut self,
            tree: &mut LayerTree,
            layer: LayerId,
            transition: CompositingStateTransition,
        ) -> bool {
            let changed = tree.allocate_or_clear_backing(layer, transition);
            self.calls.push((layer, transition, changed));
            changed
        }
    }

    #[test]
    fn default_factory_forwards_to_tree() {
        let mut tree = LayerTree::new();
        let layer = tree.create_layer();
        let mut factory = DefaultBackingFactory;

        assert!(factory.allocate_or_clear(
            &mut tree,
            layer,
            CompositingStateTransition::AllocateOwnBacking
        ));
        assert!(tree.own_backing(layer).is_some());
        assert!(factory.allocate_or_clear(
            &mut tree,
            layer,
            CompositingStateTransition::RemoveOwnBacking
        ));
        assert!(tree.own_backing(layer).is_none());
    }

    #[test]
    fn factories_are_usable_as_trait_objects() {
        let mut tree = LayerTree::new();
        let layer = tree.create_layer();
        let mut logging = LoggingFactory::default();
        let factory: &mut dyn BackingFactory = &mut logging;

        assert!(!factory.allocate_or_clear(
            &mut tree,
            layer,
            CompositingStateTransition::RemoveOwnBacking
        ));
        assert_eq!(
            logging.calls,
            [(layer, CompositingStateTransition::RemoveOwnBacking, false)]
        );
    }
}
