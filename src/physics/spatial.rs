//! Spatial Index (broad phase)
//!
//! Region-bounded quadtree, cleared and rebuilt every tick. Entries that do
//! not fit a child quadrant stay on the node that contains them; entries
//! outside the root region are kept on the root so they are still found.

use crate::core::vec2::{Bounds, Vec2};

/// Entries per node before it splits.
pub const DEFAULT_NODE_CAPACITY: usize = 8;

/// Maximum subdivision depth.
pub const DEFAULT_MAX_DEPTH: usize = 6;

#[derive(Debug)]
struct Node<T> {
    region: Bounds,
    depth: usize,
    entries: Vec<(Bounds, T)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy> Node<T> {
    fn new(region: Bounds, depth: usize) -> Self {
        Self {
            region,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn child_index(&self, bounds: &Bounds) -> Option<usize> {
        let children = self.children.as_ref()?;
        children.iter().position(|c| c.region.contains(bounds))
    }

    fn split(&mut self) {
        let half = self.region.size.scale(0.5);
        let p = self.region.position;
        let d = self.depth + 1;
        self.children = Some(Box::new([
            Node::new(Bounds::new(p, half), d),
            Node::new(Bounds::new(Vec2::new(p.x + half.x, p.y), half), d),
            Node::new(Bounds::new(Vec2::new(p.x, p.y + half.y), half), d),
            Node::new(Bounds::new(p + half, half), d),
        ]));

        let entries = std::mem::take(&mut self.entries);
        for (bounds, item) in entries {
            self.insert(bounds, item, usize::MAX, usize::MAX);
        }
    }

    fn insert(&mut self, bounds: Bounds, item: T, capacity: usize, max_depth: usize) {
        if let Some(i) = self.child_index(&bounds) {
            if let Some(children) = self.children.as_mut() {
                children[i].insert(bounds, item, capacity, max_depth);
                return;
            }
        }

        self.entries.push((bounds, item));

        if self.children.is_none() && self.entries.len() > capacity && self.depth < max_depth {
            self.split();
        }
    }

    fn query(&self, region: &Bounds, out: &mut Vec<T>) {
        for (bounds, item) in &self.entries {
            if bounds.intersects(region) {
                out.push(*item);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                if child.region.intersects(region) || child.region.contains(region) {
                    child.query(region, out);
                }
            }
        }
    }
}

/// Quadtree over a fixed world region.
#[derive(Debug)]
pub struct QuadTree<T> {
    root: Node<T>,
    capacity: usize,
    max_depth: usize,
    len: usize,
}

impl<T: Copy> QuadTree<T> {
    /// Create an empty tree over `region`.
    pub fn new(region: Bounds) -> Self {
        Self::with_limits(region, DEFAULT_NODE_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    /// Create with explicit node capacity and depth limits.
    pub fn with_limits(region: Bounds, capacity: usize, max_depth: usize) -> Self {
        Self {
            root: Node::new(region, 0),
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    /// World region covered by the tree.
    pub fn region(&self) -> Bounds {
        self.root.region
    }

    /// Remove every entry. Call at the start of each tick.
    pub fn clear(&mut self) {
        self.root = Node::new(self.root.region, 0);
        self.len = 0;
    }

    /// Register an item with its bounds.
    pub fn insert(&mut self, bounds: Bounds, item: T) {
        self.root.insert(bounds, item, self.capacity, self.max_depth);
        self.len += 1;
    }

    /// All items whose bounds strictly intersect `region`.
    pub fn query(&self, region: &Bounds) -> Vec<T> {
        let mut out = Vec::new();
        self.root.query(region, &mut out);
        out
    }

    /// Number of inserted items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Bounds {
        Bounds::from_xywh(0.0, 0.0, 1000.0, 1000.0)
    }

    #[test]
    fn test_query_finds_overlapping() {
        let mut tree = QuadTree::new(world());
        tree.insert(Bounds::from_xywh(10.0, 10.0, 20.0, 20.0), 1u32);
        tree.insert(Bounds::from_xywh(500.0, 500.0, 20.0, 20.0), 2u32);

        let hits = tree.query(&Bounds::from_xywh(0.0, 0.0, 50.0, 50.0));
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_split_keeps_everything_queryable() {
        let mut tree = QuadTree::with_limits(world(), 2, 4);
        for i in 0..50u32 {
            let x = (i * 19 % 950) as f32;
            let y = (i * 37 % 950) as f32;
            tree.insert(Bounds::from_xywh(x, y, 10.0, 10.0), i);
        }
        assert_eq!(tree.len(), 50);
        let mut all = tree.query(&world());
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_straddling_entry_found_from_both_sides() {
        let mut tree = QuadTree::with_limits(world(), 1, 4);
        tree.insert(Bounds::from_xywh(490.0, 490.0, 20.0, 20.0), 7u32);
        tree.insert(Bounds::from_xywh(10.0, 10.0, 5.0, 5.0), 8u32);
        tree.insert(Bounds::from_xywh(900.0, 900.0, 5.0, 5.0), 9u32);
        assert!(tree.query(&Bounds::from_xywh(480.0, 480.0, 15.0, 15.0)).contains(&7));
        assert!(tree.query(&Bounds::from_xywh(505.0, 505.0, 15.0, 15.0)).contains(&7));
    }

    #[test]
    fn test_outside_region_still_found() {
        let mut tree = QuadTree::new(world());
        tree.insert(Bounds::from_xywh(-100.0, -100.0, 10.0, 10.0), 3u32);
        assert_eq!(tree.query(&Bounds::from_xywh(-105.0, -105.0, 10.0, 10.0)), vec![3]);
    }

    #[test]
    fn test_clear() {
        let mut tree = QuadTree::new(world());
        tree.insert(Bounds::from_xywh(1.0, 1.0, 1.0, 1.0), 1u32);
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.query(&world()).is_empty());
    }
}
