use crate::models::{Index, IndexIdentifier};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sort key for the eviction walk: ascending `num_uses / size`. The ratio is
/// compared by integer cross-multiplication so zero sizes and float rounding
/// cannot reorder entries; identifiers break ties.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EvictionKey {
    num_uses: i64,
    size: i64,
    ident: IndexIdentifier,
}

impl Ord for EvictionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num_uses as i128 * other.size as i128;
        let rhs = other.num_uses as i128 * self.size as i128;
        lhs.cmp(&rhs)
            .then_with(|| self.ident.cmp(&other.ident))
            .then_with(|| (self.num_uses, self.size).cmp(&(other.num_uses, other.size)))
    }
}

impl PartialOrd for EvictionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Existing real indexes ordered by how little use they earn per byte. The
/// head of the queue is the first candidate for replacement when a proposed
/// index does not fit the storage budget.
#[derive(Default)]
pub struct EvictionQueue {
    queue: BTreeMap<EvictionKey, Index>,
    keys: HashMap<IndexIdentifier, EvictionKey>,
}

impl EvictionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: Index) {
        let key = EvictionKey {
            num_uses: index.num_uses,
            size: index.size,
            ident: index.ident.clone(),
        };
        self.keys.insert(index.ident.clone(), key.clone());
        self.queue.insert(key, index);
    }

    pub fn contains(&self, ident: &IndexIdentifier) -> bool {
        self.keys.contains_key(ident)
    }

    pub fn remove(&mut self, ident: &IndexIdentifier) -> Option<Index> {
        let key = self.keys.remove(ident)?;
        self.queue.remove(&key)
    }

    /// Ascending by `num_uses / size`.
    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.queue.values()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &IndexIdentifier> {
        self.keys.keys()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(name: &str, columns: &[&str], num_uses: i64, size: i64) -> Index {
        Index::existing(
            IndexIdentifier::new("t", columns.iter().map(|c| c.to_string()).collect()),
            name,
            num_uses,
            size,
        )
    }

    #[test]
    fn iterates_in_ascending_use_per_byte_order() {
        let mut queue = EvictionQueue::new();
        queue.insert(index("mid", &["b"], 10, 100)); // 0.1
        queue.insert(index("cold", &["a"], 1, 100)); // 0.01
        queue.insert(index("hot", &["c"], 1, 5)); // 0.2

        let names: Vec<String> = queue.iter().map(Index::index_name).collect();
        assert_eq!(names, vec!["cold", "mid", "hot"]);
    }

    #[test]
    fn zero_size_indexes_sort_after_finite_ratios() {
        let mut queue = EvictionQueue::new();
        queue.insert(index("degenerate", &["a"], 5, 0));
        queue.insert(index("normal", &["b"], 1000, 10));

        let names: Vec<String> = queue.iter().map(Index::index_name).collect();
        assert_eq!(names, vec!["normal", "degenerate"]);
    }

    #[test]
    fn removal_is_by_identifier() {
        let mut queue = EvictionQueue::new();
        queue.insert(index("one", &["a"], 1, 10));
        queue.insert(index("two", &["b"], 2, 10));

        let removed = queue.remove(&IndexIdentifier::new("t", vec!["a".into()]));
        assert_eq!(removed.map(|idx| idx.index_name()), Some("one".into()));
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains(&IndexIdentifier::new("t", vec!["a".into()])));
    }

    #[test]
    fn equal_ratios_fall_back_to_identifier_order() {
        let mut queue = EvictionQueue::new();
        queue.insert(index("b_idx", &["b"], 2, 20)); // 0.1
        queue.insert(index("a_idx", &["a"], 1, 10)); // 0.1

        let names: Vec<String> = queue.iter().map(Index::index_name).collect();
        assert_eq!(names, vec!["a_idx", "b_idx"]);
    }
}
