//! Union-Find (disjoint set) with path compression and union by rank.
//!
//! Used to cluster buffer areas whose envelopes overlap, so that only
//! touching buffers go through polygon boolean operations.

use std::collections::HashMap;
use std::hash::Hash;

/// Disjoint-set forest over arbitrary hashable items.
#[derive(Debug, Clone)]
pub struct UnionFind<T> {
    parent: HashMap<T, T>,
    rank: HashMap<T, u32>,
}

impl<T: Hash + Eq + Clone> Default for UnionFind<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> UnionFind<T> {
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: HashMap::with_capacity(capacity),
            rank: HashMap::with_capacity(capacity),
        }
    }

    /// Add `item` as its own singleton set. No-op if already present.
    pub fn make_set(&mut self, item: T) {
        if !self.parent.contains_key(&item) {
            self.parent.insert(item.clone(), item.clone());
            self.rank.insert(item, 0);
        }
    }

    /// Root of the set containing `item`. Unknown items are their own root.
    pub fn find(&mut self, item: &T) -> T {
        let parent = match self.parent.get(item) {
            Some(p) => p.clone(),
            None => return item.clone(),
        };
        if parent == *item {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(item.clone(), root.clone());
        root
    }

    /// Merge the sets containing `a` and `b`.
    pub fn union(&mut self, a: &T, b: &T) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        let rank_a = self.rank.get(&root_a).copied().unwrap_or(0);
        let rank_b = self.rank.get(&root_b).copied().unwrap_or(0);

        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b, root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }
    }

    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

impl<T: Hash + Eq + Clone + Ord> UnionFind<T> {
    /// All sets, each sorted, ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<T>> {
        let items: Vec<T> = self.parent.keys().cloned().collect();
        let mut by_root: HashMap<T, Vec<T>> = HashMap::new();
        for item in items {
            let root = self.find(&item);
            by_root.entry(root).or_default().push(item);
        }

        let mut groups: Vec<Vec<T>> = by_root
            .into_values()
            .map(|mut g| {
                g.sort();
                g
            })
            .collect();
        groups.sort();
        groups
    }
}
