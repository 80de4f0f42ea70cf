use crate::models::{IndexIdentifier, Table};
use indexmap::IndexSet;
use itertools::Itertools;
use std::collections::BTreeMap;

/// The set of column tuples eligible to become indexes. Iteration order is
/// insertion order, which keeps candidate scans deterministic across rounds.
pub struct CandidateSet {
    idents: IndexSet<IndexIdentifier>,
}

impl CandidateSet {
    /// Seeds every combination (not permutation) of `1..=max_width`
    /// referenced columns drawn from a single table, each tuple in the
    /// table's declared column order. Identifiers already taken by a real
    /// index are excluded.
    pub fn seed(
        tables: &BTreeMap<String, Table>,
        max_width: usize,
        taken: impl Fn(&IndexIdentifier) -> bool,
    ) -> Self {
        let mut idents = IndexSet::new();
        for table in tables.values() {
            let referenced: Vec<_> = table.referenced_columns().collect();
            for width in 1..=max_width.min(referenced.len()) {
                for combo in referenced.iter().copied().combinations(width) {
                    let ident = IndexIdentifier::from_columns(&combo);
                    if !taken(&ident) {
                        idents.insert(ident);
                    }
                }
            }
        }
        Self { idents }
    }

    /// Appends each referenced column of the accepted tuple's table that the
    /// tuple does not already contain, producing width+1 extensions. This
    /// grows the search only along prefixes that already proved themselves.
    pub fn extend_prefix(
        &mut self,
        accepted: &IndexIdentifier,
        table: &Table,
        max_width: usize,
        taken: impl Fn(&IndexIdentifier) -> bool,
    ) {
        if accepted.width() >= max_width {
            return;
        }
        for col in table.referenced_columns() {
            if accepted.columns.iter().any(|c| *c == col.name) {
                continue;
            }
            let mut columns = accepted.columns.clone();
            columns.push(col.name.clone());
            let ident = IndexIdentifier::new(&accepted.table, columns);
            if !taken(&ident) {
                self.idents.insert(ident);
            }
        }
    }

    pub fn insert(&mut self, ident: IndexIdentifier) -> bool {
        self.idents.insert(ident)
    }

    /// Removes while preserving the iteration order of the remainder.
    pub fn remove(&mut self, ident: &IndexIdentifier) -> bool {
        self.idents.shift_remove(ident)
    }

    pub fn contains(&self, ident: &IndexIdentifier) -> bool {
        self.idents.contains(ident)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexIdentifier> {
        self.idents.iter()
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }
}
