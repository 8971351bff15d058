// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.
//!
//! Paint order within a parent is: negative-z children (ascending z), the
//! parent's own content, normal-flow children in tree order, then
//! positive-z children (ascending z). Sorting is stable, so equal z-indices
//! keep their tree order.

use alloc::vec::Vec;

use super::id::{INVALID, LayerId};
use super::store::{LayerTree, ZOrder};

/// An iterator over the direct children of a layer.
///
/// Created by [`LayerTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a LayerTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a LayerTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(LayerId {
            idx,
            generation: self.tree.generation[idx as usize],
        })
    }
}

impl LayerTree {
    /// Returns the negative-z children of `id`, in paint order.
    #[must_use]
    pub fn negative_z_children(&self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        self.negative_z_children_idx(id.idx)
            .into_iter()
            .filter_map(|idx| self.handle(idx))
            .collect()
    }

    /// Returns the normal-flow children of `id` followed by its positive-z
    /// children, in paint order.
    #[must_use]
    pub fn normal_flow_and_positive_z_children(&self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        self.normal_flow_and_positive_z_children_idx(id.idx)
            .into_iter()
            .filter_map(|idx| self.handle(idx))
            .collect()
    }

    /// Returns the subtree rooted at `root` flattened into paint order.
    #[must_use]
    pub fn paint_order(&self, root: LayerId) -> Vec<LayerId> {
        self.validate(root);
        let mut out = Vec::new();
        self.collect_paint_order(root.idx, &mut out);
        out
    }

    pub(crate) fn negative_z_children_idx(&self, idx: u32) -> Vec<u32> {
        let mut negative: Vec<(i32, u32)> = self
            .child_indices(idx)
            .filter_map(|c| match self.z_order[c as usize] {
                ZOrder::Negative(z) => Some((z, c)),
                _ => None,
            })
            .collect();
        negative.sort_by_key(|&(z, _)| z);
        negative.into_iter().map(|(_, c)| c).collect()
    }

    pub(crate) fn normal_flow_and_positive_z_children_idx(&self, idx: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .child_indices(idx)
            .filter(|&c| self.z_order[c as usize] == ZOrder::NormalFlow)
            .collect();
        let mut positive: Vec<(i32, u32)> = self
            .child_indices(idx)
            .filter_map(|c| match self.z_order[c as usize] {
                ZOrder::Positive(z) => Some((z, c)),
                _ => None,
            })
            .collect();
        positive.sort_by_key(|&(z, _)| z);
        out.extend(positive.into_iter().map(|(_, c)| c));
        out
    }

    fn child_indices(&self, idx: u32) -> impl Iterator<Item = u32> + '_ {
        let mut current = self.first_child[idx as usize];
        core::iter::from_fn(move || {
            if current == INVALID {
                return None;
            }
            let c = current;
            current = self.next_sibling[c as usize];
            Some(c)
        })
    }

    fn collect_paint_order(&self, idx: u32, out: &mut Vec<LayerId>) {
        for c in self.negative_z_children_idx(idx) {
            self.collect_paint_order(c, out);
        }
        if let Some(id) = self.handle(idx) {
            out.push(id);
        }
        for c in self.normal_flow_and_positive_z_children_idx(idx) {
            self.collect_paint_order(c, out);
        }
    }
}
