//! Dynamic bounding volume hierarchy
//!
//! A binary tree over world-space AABBs stored in a flat, index-addressed
//! node array. Leaves are inserted by greedy descent (the child whose volume
//! grows least), refit in place when an entity moves, and removed by
//! swap-and-pop so the array never has holes.
//!
//! Traversals are iterative. The frustum query uses a growable stack; ray
//! queries use a stack with a fixed capacity and report
//! [`BvhError::TraversalStackOverflow`] instead of growing past it.

use crate::ecs::Entity;
use crate::scene::bounds::{Ray, AABB};
use crate::scene::frustum::Frustum;
use log::{debug, trace};
use slotmap::SecondaryMap;

/// Ray stack capacity used by [`Bvh::new`]
pub const DEFAULT_RAY_STACK_CAPACITY: usize = 64;

/// Result type for BVH operations
pub type BvhResult<T> = Result<T, BvhError>;

/// Errors raised by BVH traversal and validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BvhError {
    /// A ray query needed more stack entries than configured
    #[error("ray traversal stack overflow (capacity {capacity})")]
    TraversalStackOverflow {
        /// Configured stack capacity
        capacity: usize,
    },

    /// [`Bvh::validate`] found a broken structural invariant
    #[error("BVH invariant violated at node {node}: {reason}")]
    InvariantViolated {
        /// Index of the offending node
        node: usize,
        /// Which invariant failed
        reason: &'static str,
    },
}

/// Leaf or internal payload of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// References one entity
    Leaf(Entity),
    /// Encloses two children
    Internal {
        /// Index of the left child
        left: usize,
        /// Index of the right child
        right: usize,
    },
}

/// Single node in the flat node array
#[derive(Debug, Clone)]
pub struct BvhNode {
    /// World-space bounds; for internal nodes the union of both children
    pub bounds: AABB,

    /// Parent index, `None` for the root
    pub parent: Option<usize>,

    /// Leaf or internal payload
    pub kind: NodeKind,
}

impl BvhNode {
    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }
}

/// What a ray visitor wants the traversal to do next
enum RayStep {
    Continue,
    ClipTo(f32),
    Stop,
}

/// Bounding volume hierarchy over entity AABBs
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<usize>,
    leaves: SecondaryMap<Entity, usize>,
    ray_stack_capacity: usize,
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

impl Bvh {
    /// Create an empty BVH with the default ray stack capacity
    pub fn new() -> Self {
        Self::with_ray_stack_capacity(DEFAULT_RAY_STACK_CAPACITY)
    }

    /// Create an empty BVH whose ray queries may hold at most `capacity`
    /// pending nodes. With a capacity of zero every ray that reaches the
    /// root fails with [`BvhError::TraversalStackOverflow`].
    pub fn with_ray_stack_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            leaves: SecondaryMap::new(),
            ray_stack_capacity: capacity,
        }
    }

    /// Number of leaves (indexed entities)
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Number of nodes in the flat array
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no entity is indexed
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Flat node array
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Index of the root node
    pub fn root(&self) -> Option<usize> {
        self.root
    }

    /// Bounds enclosing every indexed entity
    pub fn root_bounds(&self) -> Option<&AABB> {
        self.root.map(|root| &self.nodes[root].bounds)
    }

    /// Whether `entity` has a leaf
    pub fn contains(&self, entity: Entity) -> bool {
        self.leaves.contains_key(entity)
    }

    /// Leaf bounds of `entity`
    pub fn leaf_bounds(&self, entity: Entity) -> Option<&AABB> {
        self.leaves.get(entity).map(|&index| &self.nodes[index].bounds)
    }

    /// Ray stack capacity
    pub fn ray_stack_capacity(&self) -> usize {
        self.ray_stack_capacity
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = None;
    }

    /// Insert a new leaf or refit an existing one
    pub fn insert_or_update(&mut self, entity: Entity, bounds: AABB) {
        match self.leaves.get(entity) {
            Some(&index) => self.update_leaf(index, bounds),
            None => self.insert(entity, bounds),
        }
    }

    /// Insert a leaf for an entity that has none
    fn insert(&mut self, entity: Entity, bounds: AABB) {
        let leaf = self.nodes.len();
        self.nodes.push(BvhNode { bounds, parent: None, kind: NodeKind::Leaf(entity) });
        self.leaves.insert(entity, leaf);

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let sibling = self.choose_sibling(root, &bounds);
        let old_parent = self.nodes[sibling].parent;

        let branch = self.nodes.len();
        let branch_bounds = self.nodes[sibling].bounds.union(&bounds);
        self.nodes.push(BvhNode {
            bounds: branch_bounds,
            parent: old_parent,
            kind: NodeKind::Internal { left: sibling, right: leaf },
        });
        self.nodes[sibling].parent = Some(branch);
        self.nodes[leaf].parent = Some(branch);

        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, branch),
            None => self.root = Some(branch),
        }

        self.refit_from(old_parent);
    }

    /// Descend from `root` towards the node whose volume grows least
    fn choose_sibling(&self, root: usize, bounds: &AABB) -> usize {
        let growth = |index: usize| {
            let current = &self.nodes[index].bounds;
            let merged = current.union(bounds);
            (merged.volume() - current.volume(), merged.half_area() - current.half_area())
        };

        let mut index = root;
        while let NodeKind::Internal { left, right } = self.nodes[index].kind {
            let (left_volume, left_area) = growth(left);
            let (right_volume, right_area) = growth(right);

            // Flat boxes have no volume, so fall back to area
            index = if left_volume < right_volume
                || (left_volume == right_volume && left_area <= right_area)
            {
                left
            } else {
                right
            };
        }
        index
    }

    /// Replace the leaf bounds and refit its ancestors
    fn update_leaf(&mut self, index: usize, bounds: AABB) {
        if self.nodes[index].bounds == bounds {
            return;
        }
        self.nodes[index].bounds = bounds;
        self.refit_from(self.nodes[index].parent);
    }

    /// Recompute internal bounds from `start` up to the root, stopping early
    /// once a node's bounds are unchanged
    fn refit_from(&mut self, start: Option<usize>) {
        let mut current = start;
        while let Some(index) = current {
            if let NodeKind::Internal { left, right } = self.nodes[index].kind {
                let refit = self.nodes[left].bounds.union(&self.nodes[right].bounds);
                if refit == self.nodes[index].bounds {
                    return;
                }
                self.nodes[index].bounds = refit;
            }
            current = self.nodes[index].parent;
        }
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let NodeKind::Internal { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Remove the leaf of `entity`. Returns false if it had none.
    ///
    /// The leaf's sibling takes its parent's place, then the leaf and the
    /// parent are swap-removed from the array.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(leaf) = self.leaves.remove(entity) else {
            return false;
        };

        let mut dead = vec![leaf];
        match self.nodes[leaf].parent {
            None => self.root = None,
            Some(parent) => {
                let sibling = match self.nodes[parent].kind {
                    NodeKind::Internal { left, right } => {
                        if left == leaf {
                            right
                        } else {
                            left
                        }
                    }
                    NodeKind::Leaf(_) => unreachable!("leaf parent is always internal"),
                };
                let grandparent = self.nodes[parent].parent;

                self.nodes[sibling].parent = grandparent;
                match grandparent {
                    Some(grandparent) => {
                        self.replace_child(grandparent, parent, sibling);
                        self.refit_from(Some(grandparent));
                    }
                    None => self.root = Some(sibling),
                }
                dead.push(parent);
            }
        }

        // Highest index first so the second removal never moves the first
        dead.sort_unstable_by(|a, b| b.cmp(a));
        for index in dead {
            self.swap_remove_node(index);
        }
        true
    }

    /// Swap-remove a detached node and repoint everything that referenced
    /// the node moved into its slot
    fn swap_remove_node(&mut self, index: usize) {
        let last = self.nodes.len() - 1;
        self.nodes.swap_remove(index);
        if index == last {
            return;
        }

        match self.nodes[index].parent {
            Some(parent) => self.replace_child(parent, last, index),
            None => {
                if self.root == Some(last) {
                    self.root = Some(index);
                }
            }
        }

        match self.nodes[index].kind {
            NodeKind::Leaf(entity) => {
                self.leaves.insert(entity, index);
            }
            NodeKind::Internal { left, right } => {
                self.nodes[left].parent = Some(index);
                self.nodes[right].parent = Some(index);
            }
        }
    }

    /// Visit every leaf whose bounds pass the lazy frustum test.
    ///
    /// Subtrees whose bounds fail are skipped wholesale.
    pub fn query_frustum(
        &self,
        frustum: &Frustum,
        tolerance: f32,
        mut on_visible: impl FnMut(Entity),
    ) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack = Vec::with_capacity(64);
        stack.push(root);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !frustum.test_world_aabb(&node.bounds, tolerance) {
                continue;
            }

            match node.kind {
                NodeKind::Leaf(entity) => on_visible(entity),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Visit every leaf the ray enters within `[t_min, t_max]`, roughly
    /// nearest first. `on_hit` receives the entry distance and the leaf
    /// bounds; returning false ends the query.
    pub fn ray_cast(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        mut on_hit: impl FnMut(Entity, f32, &AABB) -> bool,
    ) -> BvhResult<()> {
        self.traverse_ray(ray, t_min, t_max, |entity, t, bounds| {
            if on_hit(entity, t, bounds) {
                RayStep::Continue
            } else {
                RayStep::Stop
            }
        })
    }

    /// Nearest leaf along the ray among those `accept` approves
    pub fn ray_cast_closest(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        mut accept: impl FnMut(Entity) -> bool,
    ) -> BvhResult<Option<(Entity, f32)>> {
        let mut closest: Option<(Entity, f32)> = None;

        self.traverse_ray(ray, t_min, t_max, |entity, t, _| {
            if !accept(entity) {
                return RayStep::Continue;
            }
            if closest.map_or(true, |(_, best)| t < best) {
                closest = Some((entity, t));
            }
            RayStep::ClipTo(t)
        })?;

        Ok(closest)
    }

    /// Shared ray traversal over a bounded explicit stack.
    ///
    /// Entries carry their entry distance so that nodes beyond a clipped
    /// `t_max` are dropped when popped. When both children are hit the
    /// farther one is pushed first.
    fn traverse_ray(
        &self,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        mut visit: impl FnMut(Entity, f32, &AABB) -> RayStep,
    ) -> BvhResult<()> {
        let Some(root) = self.root else {
            return Ok(());
        };
        let Some(root_t) = self.nodes[root].bounds.intersect_ray(ray, t_min, t_max) else {
            return Ok(());
        };

        let capacity = self.ray_stack_capacity;
        let mut limit = t_max;
        let mut stack: Vec<(usize, f32)> = Vec::with_capacity(capacity);
        let push = |stack: &mut Vec<(usize, f32)>, entry: (usize, f32)| {
            if stack.len() >= capacity {
                return Err(BvhError::TraversalStackOverflow { capacity });
            }
            stack.push(entry);
            Ok(())
        };

        push(&mut stack, (root, root_t))?;

        while let Some((index, t_entry)) = stack.pop() {
            if t_entry > limit {
                continue;
            }

            let node = &self.nodes[index];
            match node.kind {
                NodeKind::Leaf(entity) => match visit(entity, t_entry, &node.bounds) {
                    RayStep::Continue => {}
                    RayStep::ClipTo(t) => limit = limit.min(t),
                    RayStep::Stop => return Ok(()),
                },
                NodeKind::Internal { left, right } => {
                    let left_hit = self.nodes[left].bounds.intersect_ray(ray, t_min, limit);
                    let right_hit = self.nodes[right].bounds.intersect_ray(ray, t_min, limit);

                    match (left_hit, right_hit) {
                        (Some(left_t), Some(right_t)) => {
                            let (near, far) = if left_t <= right_t {
                                ((left, left_t), (right, right_t))
                            } else {
                                ((right, right_t), (left, left_t))
                            };
                            push(&mut stack, far)?;
                            push(&mut stack, near)?;
                        }
                        (Some(left_t), None) => push(&mut stack, (left, left_t))?,
                        (None, Some(right_t)) => push(&mut stack, (right, right_t))?,
                        (None, None) => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        let mut deepest = 0;
        let mut stack = vec![(root, 1)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let NodeKind::Internal { left, right } = self.nodes[index].kind {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Whether the tree is deep enough that [`Bvh::rebuild`] is worthwhile:
    /// depth exceeds `factor * log2(leaves)`
    pub fn needs_rebuild(&self, factor: f32) -> bool {
        let leaves = self.leaf_count();
        if leaves < 4 {
            return false;
        }
        let threshold = factor * (leaves as f32).log2();
        self.depth() as f32 > threshold.ceil()
    }

    /// Rebuild the whole tree top-down, splitting at the median centroid
    /// along the widest axis
    pub fn rebuild(&mut self) {
        let mut items: Vec<(Entity, AABB)> = self
            .nodes
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Leaf(entity) => Some((entity, node.bounds)),
                NodeKind::Internal { .. } => None,
            })
            .collect();

        let depth_before = self.depth();
        self.clear();
        if items.is_empty() {
            return;
        }

        self.nodes.reserve(items.len() * 2 - 1);
        let root = self.build_range(&mut items, None);
        self.root = Some(root);

        debug!(
            "BVH rebuilt over {} leaves, depth {} -> {}",
            self.leaf_count(),
            depth_before,
            self.depth()
        );
    }

    fn build_range(&mut self, items: &mut [(Entity, AABB)], parent: Option<usize>) -> usize {
        if let &mut [(entity, bounds)] = items {
            let index = self.nodes.len();
            self.nodes.push(BvhNode { bounds, parent, kind: NodeKind::Leaf(entity) });
            self.leaves.insert(entity, index);
            return index;
        }

        let bounds = items[1..]
            .iter()
            .fold(items[0].1, |acc, (_, bounds)| acc.union(bounds));
        let extents = bounds.extents();
        let axis = if extents.x >= extents.y && extents.x >= extents.z {
            0
        } else if extents.y >= extents.z {
            1
        } else {
            2
        };
        items.sort_unstable_by(|(_, a), (_, b)| a.center()[axis].total_cmp(&b.center()[axis]));

        // Children are written after the parent, so reserve its slot first
        let index = self.nodes.len();
        self.nodes.push(BvhNode {
            bounds,
            parent,
            kind: NodeKind::Internal { left: index, right: index },
        });

        let (left_items, right_items) = items.split_at_mut(items.len() / 2);
        let left = self.build_range(left_items, Some(index));
        let right = self.build_range(right_items, Some(index));
        self.nodes[index].kind = NodeKind::Internal { left, right };
        index
    }

    /// Check every structural invariant: parent links, enclosure, the
    /// entity map, and that every node is reachable from the root
    pub fn validate(&self) -> BvhResult<()> {
        let violation = |node, reason| Err(BvhError::InvariantViolated { node, reason });

        let Some(root) = self.root else {
            if !self.nodes.is_empty() || !self.leaves.is_empty() {
                return violation(0, "empty tree still holds nodes");
            }
            return Ok(());
        };
        if self.nodes[root].parent.is_some() {
            return violation(root, "root has a parent");
        }

        let mut visited = 0;
        let mut leaves = 0;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            visited += 1;
            if visited > self.nodes.len() {
                return violation(index, "cycle in child links");
            }

            let node = &self.nodes[index];
            match node.kind {
                NodeKind::Leaf(entity) => {
                    leaves += 1;
                    if self.leaves.get(entity) != Some(&index) {
                        return violation(index, "entity map does not point at leaf");
                    }
                }
                NodeKind::Internal { left, right } => {
                    for child in [left, right] {
                        if child >= self.nodes.len() {
                            return violation(index, "child index out of range");
                        }
                        if self.nodes[child].parent != Some(index) {
                            return violation(child, "parent link mismatch");
                        }
                        if !node.bounds.contains(&self.nodes[child].bounds) {
                            return violation(index, "bounds do not enclose child");
                        }
                        stack.push(child);
                    }
                }
            }
        }

        if visited != self.nodes.len() {
            return violation(root, "unreachable nodes in array");
        }
        if leaves != self.leaves.len() {
            return violation(root, "entity map size differs from leaf count");
        }
        trace!("BVH validated: {} nodes, {} leaves", visited, leaves);
        Ok(())
    }
}
