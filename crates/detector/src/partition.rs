//! Partition engine
//!
//! Union-find over the submissions of one (question, language) unit.
//! Elements live in a per-unit arena: ids are mapped to dense indices once
//! at construction and never shared across units.

use cheatscan_common::SubmissionId;
use std::collections::{BTreeMap, HashMap};

/// Result of a union request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionOutcome {
    /// Two distinct components were merged
    Merged,
    /// Both elements already shared a root
    AlreadyMerged,
}

/// Disjoint-set forest with path compression and union by size
#[derive(Debug, Clone)]
pub struct Partition {
    /// Submission id -> arena index
    index: HashMap<SubmissionId, usize>,
    /// Arena index -> submission id
    members: Vec<SubmissionId>,
    parent: Vec<usize>,
    /// Component size, only meaningful at roots
    size: Vec<usize>,
}

impl Partition {
    /// Create a partition where every id is its own singleton component.
    /// Duplicate ids are collapsed.
    pub fn new(ids: impl IntoIterator<Item = SubmissionId>) -> Self {
        let mut index = HashMap::new();
        let mut members = Vec::new();

        for id in ids {
            index.entry(id).or_insert_with(|| {
                members.push(id);
                members.len() - 1
            });
        }

        let n = members.len();
        Self {
            index,
            members,
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the id belongs to this unit
    pub fn contains(&self, id: SubmissionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Representative of the component containing `id`, or `None` for an
    /// id outside the unit
    pub fn find(&mut self, id: SubmissionId) -> Option<SubmissionId> {
        let i = *self.index.get(&id)?;
        let root = self.find_index(i);
        Some(self.members[root])
    }

    /// Merge the components containing `x` and `y`.
    ///
    /// Returns `None` when either id is outside the unit.
    pub fn union(&mut self, x: SubmissionId, y: SubmissionId) -> Option<UnionOutcome> {
        let xi = *self.index.get(&x)?;
        let yi = *self.index.get(&y)?;

        let mut root_x = self.find_index(xi);
        let mut root_y = self.find_index(yi);
        if root_x == root_y {
            return Some(UnionOutcome::AlreadyMerged);
        }

        // Compare the sizes of the roots, not of the passed-in elements
        if self.size[root_x] < self.size[root_y] {
            std::mem::swap(&mut root_x, &mut root_y);
        }
        self.parent[root_y] = root_x;
        self.size[root_x] += self.size[root_y];

        Some(UnionOutcome::Merged)
    }

    /// Whether both ids are in the same component
    pub fn connected(&mut self, x: SubmissionId, y: SubmissionId) -> bool {
        match (self.find(x), self.find(y)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Size of the component containing `id`
    pub fn component_size(&mut self, id: SubmissionId) -> Option<usize> {
        let i = *self.index.get(&id)?;
        let root = self.find_index(i);
        Some(self.size[root])
    }

    /// Every component, singletons included.
    ///
    /// Members are sorted ascending and components are ordered by their
    /// smallest member.
    pub fn groups(&mut self) -> Vec<Vec<SubmissionId>> {
        let mut by_root: BTreeMap<usize, Vec<SubmissionId>> = BTreeMap::new();
        for i in 0..self.members.len() {
            let root = self.find_index(i);
            by_root.entry(root).or_default().push(self.members[i]);
        }

        let mut groups: Vec<Vec<SubmissionId>> = by_root
            .into_values()
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect();
        groups.sort_unstable_by_key(|members| members[0]);
        groups
    }

    fn find_index(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Path compression
        let mut current = i;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    #[test]
    fn test_singletons_on_construction() {
        let mut partition = Partition::new([3, 1, 2, 1]);
        assert_eq!(partition.len(), 3);
        assert_eq!(partition.groups(), vec![vec![1], vec![2], vec![3]]);
        for id in [1, 2, 3] {
            assert_eq!(partition.find(id), Some(id));
        }
    }

    #[test]
    fn test_find_is_stable_and_self_union_is_noop() {
        let mut partition = Partition::new(1..=4);
        partition.union(1, 2);

        let root = partition.find(1);
        assert_eq!(partition.find(1), root);
        assert_eq!(partition.union(3, 3), Some(UnionOutcome::AlreadyMerged));
        assert_eq!(partition.groups(), vec![vec![1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_union_reports_already_merged() {
        let mut partition = Partition::new(1..=3);
        assert_eq!(partition.union(1, 2), Some(UnionOutcome::Merged));
        assert_eq!(partition.union(2, 3), Some(UnionOutcome::Merged));
        assert_eq!(partition.union(1, 3), Some(UnionOutcome::AlreadyMerged));
        assert_eq!(partition.component_size(3), Some(3));
    }

    #[test]
    fn test_unknown_ids() {
        let mut partition = Partition::new([10, 20]);
        assert!(!partition.contains(30));
        assert_eq!(partition.find(30), None);
        assert_eq!(partition.union(10, 30), None);
        assert!(!partition.connected(10, 30));
        assert_eq!(partition.groups().len(), 2);
    }

    #[test]
    fn test_larger_root_stays_root() {
        let mut partition = Partition::new(1..=5);
        partition.union(1, 2);
        partition.union(1, 3);
        partition.union(1, 4);
        let big_root = partition.find(1);

        // 5 is a singleton; the four-element component keeps its root
        partition.union(5, 2);
        assert_eq!(partition.find(5), big_root);
        assert_eq!(partition.component_size(5), Some(5));
    }

    #[test]
    fn test_transitive_closure_is_order_independent() {
        let edges = vec![(1, 2), (2, 3), (3, 4), (10, 11), (11, 12), (20, 21), (4, 1)];
        let ids: Vec<SubmissionId> = vec![1, 2, 3, 4, 10, 11, 12, 20, 21, 30];

        let mut expected = Partition::new(ids.clone());
        for &(a, b) in &edges {
            expected.union(a, b);
        }
        let expected = expected.groups();
        assert_eq!(
            expected,
            vec![vec![1, 2, 3, 4], vec![10, 11, 12], vec![20, 21], vec![30]]
        );

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut shuffled = edges.clone();
            shuffled.shuffle(&mut rng);
            let mut partition = Partition::new(ids.clone());
            for (a, b) in shuffled {
                partition.union(a, b);
            }
            assert_eq!(partition.groups(), expected);
            assert!(partition.connected(1, 3));
            assert!(partition.connected(12, 10));
            assert!(!partition.connected(4, 10));
        }
    }

    #[test]
    fn test_long_chain_compresses() {
        let n = 10_000;
        let mut partition = Partition::new(0..n);
        for i in 1..n {
            partition.union(i - 1, i);
        }
        let root = partition.find(n - 1);
        assert_eq!(partition.find(0), root);
        assert_eq!(partition.component_size(0), Some(n as usize));
        assert_eq!(partition.groups().len(), 1);
    }
}
