//! Region quadtree over entity positions.
//!
//! Nodes live in a flat arena (`Vec<Node>`) and refer to their children by
//! index. A leaf accepts entries until it holds more than `capacity`, at
//! which point it grows four children; its existing entries stay where they
//! are and only later inserts descend into the children. Nodes are never
//! merged back: the tree only shrinks through [`QuadTree::clear`].
//!
//! Each entry records the position observed at insert time. The tree is a
//! disposable cache over positions, so queries answer against those recorded
//! positions until the next rebuild.

use std::collections::HashSet;

use crate::entity::EntityId;

use super::bounds::{Bounds, Position};

type NodeIdx = u32;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    bounds: Bounds,
    depth: u32,
    entries: Vec<(EntityId, Position)>,
    children: Option<[NodeIdx; 4]>,
}

impl Node {
    fn leaf(bounds: Bounds, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }
}

/// Quadtree covering a fixed rectangle.
#[derive(Debug, Clone)]
pub struct QuadTree {
    capacity: usize,
    nodes: Vec<Node>,
    indexed: HashSet<EntityId>,
}

impl QuadTree {
    /// Create an empty tree over `bounds`. A `capacity` of zero is treated
    /// as one.
    pub fn new(bounds: Bounds, capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            nodes: vec![Node::leaf(bounds, 0)],
            indexed: HashSet::new(),
        }
    }

    /// The covering rectangle.
    pub fn bounds(&self) -> Bounds {
        self.nodes[ROOT].bounds
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.indexed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest node level (the root is depth 0).
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.indexed.contains(&entity)
    }

    /// Drop every entry and every subdivision.
    pub fn clear(&mut self) {
        let bounds = self.bounds();
        self.nodes.clear();
        self.nodes.push(Node::leaf(bounds, 0));
        self.indexed.clear();
    }

    /// Index `entity` at `pos`.
    ///
    /// Returns `false` without changing the tree if `pos` lies outside the
    /// covering rectangle (or is not finite), or if `entity` is already
    /// indexed.
    pub fn insert(&mut self, entity: EntityId, pos: Position) -> bool {
        if !self.bounds().contains(pos) || self.indexed.contains(&entity) {
            return false;
        }

        let mut idx = ROOT;
        while let Some(children) = self.nodes[idx].children {
            idx = children[self.nodes[idx].bounds.quadrant_of(pos)] as usize;
        }

        self.nodes[idx].entries.push((entity, pos));
        if self.nodes[idx].entries.len() > self.capacity {
            self.subdivide(idx);
        }
        self.indexed.insert(entity);
        true
    }

    fn subdivide(&mut self, idx: usize) {
        let depth = self.nodes[idx].depth + 1;
        let first = self.nodes.len() as NodeIdx;
        for quadrant in self.nodes[idx].bounds.quadrants() {
            self.nodes.push(Node::leaf(quadrant, depth));
        }
        self.nodes[idx].children = Some([first, first + 1, first + 2, first + 3]);
    }

    /// Call `visit` for every entry whose recorded position lies in `region`.
    fn visit_region<F>(&self, region: &Bounds, mut visit: F)
    where
        F: FnMut(EntityId, Position),
    {
        let mut stack = vec![ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bounds.intersects(region) {
                continue;
            }
            for &(entity, pos) in &node.entries {
                if region.contains(pos) {
                    visit(entity, pos);
                }
            }
            if let Some(children) = node.children {
                stack.extend(children.iter().map(|&c| c as usize));
            }
        }
    }

    /// Entities whose recorded position lies inside `region` (inclusive).
    pub fn query_region(&self, region: &Bounds) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.visit_region(region, |entity, _| out.push(entity));
        out
    }

    /// Entities within distance `r` of `(x, y)` (inclusive).
    ///
    /// Candidates come from the circle's bounding square and are filtered by
    /// squared distance.
    pub fn query_radius(&self, x: f32, y: f32, r: f32) -> Vec<EntityId> {
        if r.is_nan() || r < 0.0 || !x.is_finite() || !y.is_finite() {
            return Vec::new();
        }
        let r_sq = r * r;
        let mut out = Vec::new();
        self.visit_region(&Bounds::around(x, y, r), |entity, pos| {
            if pos.distance_sq(x, y) <= r_sq {
                out.push(entity);
            }
        });
        out
    }
}
