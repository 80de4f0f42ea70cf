use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Process-local query handle. Assigned in registration order by the engine.
pub type QueryId = u64;

/// Column references extracted from a single statement, partitioned by the
/// clause they appeared in. Every entry is a qualified `table.column` string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAttributes {
    pub selects: Vec<String>,
    pub filters: Vec<String>,
    pub groups: Vec<String>,
    pub orders: Vec<String>,
    pub sets: Vec<String>,
}

impl QueryAttributes {
    /// Columns eligible to appear in an index for this query: WHERE and JOIN
    /// predicates, GROUP BY and ORDER BY targets. `selects` and `sets` are
    /// carried for parser symmetry and never feed candidate generation.
    pub fn indexable_columns(&self) -> BTreeSet<&str> {
        self.filters
            .iter()
            .chain(self.groups.iter())
            .chain(self.orders.iter())
            .map(String::as_str)
            .collect()
    }
}

/// A workload statement together with its most recent planner estimate.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: QueryId,
    pub text: String,
    pub attrs: QueryAttributes,
    /// Best estimated cost under the currently accepted index set. Written
    /// during initial costing and re-written whenever an accepted index
    /// improves this query.
    pub best_cost: f64,
}

impl Query {
    pub fn new(id: QueryId, text: String, attrs: QueryAttributes) -> Self {
        Self {
            id,
            text,
            attrs,
            best_cost: 0.0,
        }
    }
}

/// A table column plus the queries that reference it as an indexable
/// predicate. Populated once during setup and not mutated during selection.
#[derive(Debug, Clone)]
pub struct Column {
    pub table: String,
    pub name: String,
    /// Declared position within the table. Canonical tuple order.
    pub ordinal: usize,
    pub queries: BTreeSet<QueryId>,
}

/// A user table and its columns. Columns live in an arena indexed by ordinal;
/// `referenced` holds the ordinals of columns appearing in any query's
/// indexable set and bounds candidate generation for this table.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    referenced: BTreeSet<usize>,
}

impl Table {
    pub fn new(name: &str, column_names: &[String]) -> Self {
        let columns: Vec<Column> = column_names
            .iter()
            .enumerate()
            .map(|(ordinal, col)| Column {
                table: name.to_string(),
                name: col.clone(),
                ordinal,
                queries: BTreeSet::new(),
            })
            .collect();
        let by_name = columns
            .iter()
            .map(|col| (col.name.clone(), col.ordinal))
            .collect();
        Self {
            name: name.to_string(),
            columns,
            by_name,
            referenced: BTreeSet::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&ordinal| &self.columns[ordinal])
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Records that `query` references `column` as an indexable predicate.
    /// Returns false when the column does not belong to this table.
    pub fn add_reference(&mut self, column: &str, query: QueryId) -> bool {
        match self.by_name.get(column) {
            Some(&ordinal) => {
                self.columns[ordinal].queries.insert(query);
                self.referenced.insert(ordinal);
                true
            }
            None => false,
        }
    }

    /// Referenced columns in declared order.
    pub fn referenced_columns(&self) -> impl Iterator<Item = &Column> {
        self.referenced.iter().map(|&ordinal| &self.columns[ordinal])
    }
}

/// Canonical key of an index: the table plus the ordered column tuple.
/// Equality, hashing, and ordering are defined on this alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexIdentifier {
    pub table: String,
    pub columns: Vec<String>,
}

impl IndexIdentifier {
    pub fn new(table: &str, columns: Vec<String>) -> Self {
        assert!(!columns.is_empty(), "index tuple must be non-empty");
        Self {
            table: table.to_string(),
            columns,
        }
    }

    /// Builds the identifier from column arena entries, which must all belong
    /// to the same table.
    pub fn from_columns(columns: &[&Column]) -> Self {
        assert!(!columns.is_empty(), "index tuple must be non-empty");
        let table = &columns[0].table;
        assert!(
            columns.iter().all(|col| col.table == *table),
            "index columns must share one table"
        );
        Self {
            table: table.clone(),
            columns: columns.iter().map(|col| col.name.clone()).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Deterministic emitted name: `tune_<table>__<col1>_<col2>...`.
    pub fn index_name(&self) -> String {
        format!("tune_{}__{}", self.table, self.columns.join("_"))
    }
}

impl fmt::Display for IndexIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns.join(", "))
    }
}

/// A real or candidate secondary index. `name` is set only for pre-existing
/// indexes; `oid` holds the hypothetical handle while the index is simulated.
#[derive(Debug, Clone)]
pub struct Index {
    pub ident: IndexIdentifier,
    pub name: Option<String>,
    pub oid: Option<i64>,
    pub size: i64,
    pub num_uses: i64,
}

impl Index {
    pub fn candidate(ident: IndexIdentifier) -> Self {
        Self {
            ident,
            name: None,
            oid: None,
            size: 0,
            num_uses: 0,
        }
    }

    pub fn existing(ident: IndexIdentifier, name: &str, num_uses: i64, size: i64) -> Self {
        Self {
            ident,
            name: Some(name.to_string()),
            oid: None,
            size,
            num_uses,
        }
    }

    /// Emitted or catalog name, depending on provenance.
    pub fn index_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.ident.index_name())
    }

    pub fn create_stmt(&self) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.index_name(),
            self.ident.table,
            self.ident.columns.join(", ")
        )
    }

    pub fn drop_stmt(&self) -> String {
        format!("DROP INDEX {}", self.index_name())
    }
}
