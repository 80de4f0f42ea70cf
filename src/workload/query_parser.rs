use crate::models::QueryAttributes;
use snafu::{ResultExt, Snafu};
use sqlparser::ast::{
    Assignment, BinaryOperator, Expr, GroupByExpr, Join, JoinConstraint, JoinOperator, ObjectName,
    OrderByExpr, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("Failed to parse statement: {}", source))]
    Sql {
        source: sqlparser::parser::ParserError,
    },

    #[snafu(display("Expected a single statement, got {}", count))]
    MultipleStatements { count: usize },

    #[snafu(display("Statement kind is not SELECT or UPDATE"))]
    Unsupported,

    #[snafu(display("Cannot bind column {} to any table in the query", column))]
    UnboundColumn { column: String },

    #[snafu(display("Column {} is ambiguous across the query's tables", column))]
    AmbiguousColumn { column: String },
}

type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Projects one SELECT or UPDATE statement onto its indexable column
/// references. Table schemas (table name to declared columns) resolve
/// unqualified references the way the planner would.
pub struct QueryParser<'a> {
    schemas: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> QueryParser<'a> {
    pub fn new(schemas: &'a BTreeMap<String, Vec<String>>) -> Self {
        Self { schemas }
    }

    pub fn parse(&self, sql: &str) -> Result<QueryAttributes> {
        let dialect = PostgreSqlDialect {};
        let mut statements = Parser::parse_sql(&dialect, sql).context(SqlSnafu)?;
        if statements.len() != 1 {
            return MultipleStatementsSnafu {
                count: statements.len(),
            }
            .fail();
        }

        let mut collector = Collector::default();
        match statements.pop().expect("length checked above") {
            Statement::Query(query) => collector.collect_query(&query),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => {
                collector.collect_table_with_joins(&table);
                if let Some(from) = &from {
                    collector.collect_table_with_joins(from);
                }
                for assignment in &assignments {
                    collector.collect_assignment(assignment);
                }
                if let Some(selection) = &selection {
                    collector.collect_search_expr(selection, ColumnKind::Filter);
                }
            }
            _ => return UnsupportedSnafu.fail(),
        }

        collector.into_attrs(self.schemas)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Select,
    Filter,
    Group,
    Order,
    Set,
}

impl ColumnKind {
    /// Indexable references must qualify; `selects` and `sets` are advisory
    /// and silently skipped when they cannot be bound.
    fn requires_binding(self) -> bool {
        matches!(self, ColumnKind::Filter | ColumnKind::Group | ColumnKind::Order)
    }
}

#[derive(Debug)]
struct PendingColumn {
    relation: Option<String>,
    name: String,
    kind: ColumnKind,
}

#[derive(Default)]
struct Collector {
    tables: Vec<String>,
    alias_map: HashMap<String, String>,
    pending: Vec<PendingColumn>,
}

impl Collector {
    fn collect_query(&mut self, query: &Query) {
        self.collect_set_expr(&query.body);
        for order in &query.order_by {
            self.collect_order_by(order);
        }
    }

    fn collect_set_expr(&mut self, set_expr: &SetExpr) {
        match set_expr {
            SetExpr::Select(select) => self.collect_select(select),
            SetExpr::Query(query) => self.collect_query(query.as_ref()),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_set_expr(left.as_ref());
                self.collect_set_expr(right.as_ref());
            }
            _ => {}
        }
    }

    fn collect_select(&mut self, select: &Select) {
        for table in &select.from {
            self.collect_table_with_joins(table);
        }

        if let Some(selection) = &select.selection {
            self.collect_search_expr(selection, ColumnKind::Filter);
        }

        if let GroupByExpr::Expressions(exprs) = &select.group_by {
            for expr in exprs {
                self.push_column_if_applicable(expr, ColumnKind::Group);
            }
        }

        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.push_column_if_applicable(expr, ColumnKind::Select);
                }
                _ => {}
            }
        }
    }

    fn collect_table_with_joins(&mut self, table: &TableWithJoins) {
        let mut left_tables = Vec::new();
        if let Some(table_name) = self.collect_table_factor(&table.relation) {
            left_tables.push(table_name);
        }

        for join in &table.joins {
            if let Some(table_name) = self.collect_join(join, &left_tables) {
                left_tables.push(table_name);
            }
        }
    }

    fn collect_table_factor(&mut self, table_factor: &TableFactor) -> Option<String> {
        match table_factor {
            TableFactor::Table { name, alias, .. } => {
                let table = object_table_name(name);
                self.tables.push(table.clone());
                self.alias_map.insert(table.clone(), table.clone());
                if let Some(alias) = alias {
                    self.alias_map.insert(alias.name.value.clone(), table.clone());
                }
                Some(table)
            }
            TableFactor::Derived { subquery, .. } => {
                self.collect_query(subquery.as_ref());
                None
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.collect_table_with_joins(table_with_joins.as_ref());
                None
            }
            _ => None,
        }
    }

    fn collect_join(&mut self, join: &Join, left_tables: &[String]) -> Option<String> {
        let right_table = self.collect_table_factor(&join.relation);

        match &join.join_operator {
            JoinOperator::Inner(constraint)
            | JoinOperator::LeftOuter(constraint)
            | JoinOperator::RightOuter(constraint)
            | JoinOperator::FullOuter(constraint) => match constraint {
                JoinConstraint::On(expr) => self.collect_search_expr(expr, ColumnKind::Filter),
                JoinConstraint::Using(columns) => {
                    for column in columns {
                        for table in left_tables {
                            self.pending.push(PendingColumn {
                                relation: Some(table.clone()),
                                name: column.value.clone(),
                                kind: ColumnKind::Filter,
                            });
                        }
                        if let Some(table) = &right_table {
                            self.pending.push(PendingColumn {
                                relation: Some(table.clone()),
                                name: column.value.clone(),
                                kind: ColumnKind::Filter,
                            });
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }

        right_table
    }

    /// Collects column operands of WHERE and JOIN predicates.
    fn collect_search_expr(&mut self, expr: &Expr, kind: ColumnKind) {
        match expr {
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And | BinaryOperator::Or => {
                    self.collect_search_expr(left, kind);
                    self.collect_search_expr(right, kind);
                }
                BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq => {
                    self.push_column_if_applicable(left, kind);
                    self.push_column_if_applicable(right, kind);
                }
                _ => {}
            },
            Expr::InList { expr, .. } | Expr::InSubquery { expr, .. } => {
                self.push_column_if_applicable(expr, kind)
            }
            Expr::Between { expr, .. } => self.push_column_if_applicable(expr, kind),
            Expr::Like { expr, .. } | Expr::ILike { expr, .. } => {
                self.push_column_if_applicable(expr, kind)
            }
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => {
                self.push_column_if_applicable(expr, kind)
            }
            Expr::Nested(expr) => self.collect_search_expr(expr, kind),
            _ => {}
        }
    }

    fn collect_order_by(&mut self, order: &OrderByExpr) {
        self.push_column_if_applicable(&order.expr, ColumnKind::Order);
    }

    fn collect_assignment(&mut self, assignment: &Assignment) {
        if let Some(column) = column_ref_from_idents(&assignment.id) {
            self.pending.push(PendingColumn {
                relation: column.relation,
                name: column.name,
                kind: ColumnKind::Set,
            });
        }
        self.push_column_if_applicable(&assignment.value, ColumnKind::Set);
    }

    fn push_column_if_applicable(&mut self, expr: &Expr, kind: ColumnKind) {
        if let Some(column) = column_ref_from_expr(expr) {
            self.pending.push(PendingColumn {
                relation: column.relation,
                name: column.name,
                kind,
            });
        }
    }

    fn into_attrs(self, schemas: &BTreeMap<String, Vec<String>>) -> Result<QueryAttributes> {
        let mut attrs = QueryAttributes::default();

        for pending in &self.pending {
            let resolved = match &pending.relation {
                Some(relation) => match self.alias_map.get(relation) {
                    Some(table) => Some(table.clone()),
                    None if pending.kind.requires_binding() => {
                        return UnboundColumnSnafu {
                            column: format!("{}.{}", relation, pending.name),
                        }
                        .fail()
                    }
                    None => None,
                },
                None => match self.bind_unqualified(&pending.name, schemas) {
                    Binding::One(table) => Some(table),
                    Binding::Missing if pending.kind.requires_binding() => {
                        return UnboundColumnSnafu {
                            column: pending.name.clone(),
                        }
                        .fail()
                    }
                    Binding::Ambiguous if pending.kind.requires_binding() => {
                        return AmbiguousColumnSnafu {
                            column: pending.name.clone(),
                        }
                        .fail()
                    }
                    _ => None,
                },
            };

            let Some(table) = resolved else { continue };

            let qualified = format!("{}.{}", table, pending.name);
            let target = match pending.kind {
                ColumnKind::Select => &mut attrs.selects,
                ColumnKind::Filter => &mut attrs.filters,
                ColumnKind::Group => &mut attrs.groups,
                ColumnKind::Order => &mut attrs.orders,
                ColumnKind::Set => &mut attrs.sets,
            };
            push_unique(target, &qualified);
        }

        Ok(attrs)
    }

    /// Binds an unqualified column by scanning the query's tables for one
    /// whose schema declares it.
    fn bind_unqualified(&self, column: &str, schemas: &BTreeMap<String, Vec<String>>) -> Binding {
        let mut owners: Vec<&String> = self
            .tables
            .iter()
            .filter(|table| {
                schemas
                    .get(table.as_str())
                    .is_some_and(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(column)))
            })
            .collect();
        owners.sort();
        owners.dedup();

        match owners.as_slice() {
            [] => Binding::Missing,
            [table] => Binding::One((*table).clone()),
            _ => Binding::Ambiguous,
        }
    }
}

enum Binding {
    One(String),
    Missing,
    Ambiguous,
}

#[derive(Debug)]
struct ColumnRef {
    relation: Option<String>,
    name: String,
}

fn column_ref_from_expr(expr: &Expr) -> Option<ColumnRef> {
    match expr {
        Expr::Identifier(ident) => Some(ColumnRef {
            relation: None,
            name: ident.value.clone(),
        }),
        Expr::CompoundIdentifier(idents) => column_ref_from_idents(idents),
        _ => None,
    }
}

fn column_ref_from_idents(idents: &[sqlparser::ast::Ident]) -> Option<ColumnRef> {
    match idents.len() {
        0 => None,
        1 => Some(ColumnRef {
            relation: None,
            name: idents[0].value.clone(),
        }),
        // schema qualifiers collapse to the table segment
        len => Some(ColumnRef {
            relation: Some(idents[len - 2].value.clone()),
            name: idents[len - 1].value.clone(),
        }),
    }
}

fn object_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(value))
    {
        values.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epinions_schemas() -> BTreeMap<String, Vec<String>> {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "item".to_string(),
            vec!["i_id".into(), "creation_date".into(), "title".into()],
        );
        schemas.insert(
            "review".to_string(),
            vec![
                "rating".into(),
                "u_id".into(),
                "i_id".into(),
                "creation_date".into(),
            ],
        );
        schemas
    }

    #[test]
    fn qualifies_filters_and_orders_through_aliases() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse(
                "SELECT * FROM review r, item i WHERE i.i_id = r.i_id AND r.i_id = 112 \
                 ORDER BY rating DESC, r.creation_date DESC LIMIT 10",
            )
            .expect("parse");

        assert_eq!(attrs.filters, vec!["item.i_id", "review.i_id"]);
        assert_eq!(attrs.orders, vec!["review.rating", "review.creation_date"]);
    }

    #[test]
    fn binds_unqualified_column_via_schema() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse("SELECT * FROM item WHERE title = 'x' GROUP BY creation_date")
            .expect("parse");

        assert_eq!(attrs.filters, vec!["item.title"]);
        assert_eq!(attrs.groups, vec!["item.creation_date"]);
    }

    #[test]
    fn ambiguous_unqualified_column_is_an_error() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let err = parser
            .parse("SELECT * FROM review r, item i WHERE creation_date > '2020-01-01'")
            .expect_err("ambiguous");
        assert!(matches!(err, ParseError::AmbiguousColumn { .. }));
    }

    #[test]
    fn join_predicates_count_as_filters() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse("SELECT * FROM review r JOIN item i ON r.i_id = i.i_id WHERE r.rating = 5")
            .expect("parse");

        assert_eq!(attrs.filters, vec!["review.i_id", "item.i_id", "review.rating"]);
    }

    #[test]
    fn using_join_qualifies_both_sides() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse("SELECT * FROM review JOIN item USING (i_id)")
            .expect("parse");

        assert!(attrs.filters.contains(&"review.i_id".to_string()));
        assert!(attrs.filters.contains(&"item.i_id".to_string()));
    }

    #[test]
    fn update_collects_set_targets_and_filters() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse("UPDATE item SET title = 'new' WHERE i_id = 214")
            .expect("parse");

        assert_eq!(attrs.sets, vec!["item.title"]);
        assert_eq!(attrs.filters, vec!["item.i_id"]);
        assert!(attrs.indexable_columns().contains("item.i_id"));
        assert!(!attrs.indexable_columns().contains("item.title"));
    }

    #[test]
    fn rejects_multiple_statements() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let err = parser
            .parse("SELECT 1; SELECT 2")
            .expect_err("two statements");
        assert!(matches!(err, ParseError::MultipleStatements { count: 2 }));
    }

    #[test]
    fn rejects_ddl() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let err = parser.parse("DROP TABLE item").expect_err("ddl");
        assert!(matches!(err, ParseError::Unsupported));
    }

    #[test]
    fn in_and_between_operands_are_filters() {
        let schemas = epinions_schemas();
        let parser = QueryParser::new(&schemas);
        let attrs = parser
            .parse(
                "SELECT * FROM review WHERE rating IN (4, 5) AND creation_date \
                 BETWEEN '2020-01-01' AND '2021-01-01'",
            )
            .expect("parse");

        assert_eq!(attrs.filters, vec!["review.rating", "review.creation_date"]);
    }
}
