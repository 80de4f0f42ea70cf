use crate::config::JobConfig;
use async_trait::async_trait;
use snafu::{ResultExt, Snafu};
use sqlx::postgres::types::Oid;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use tracing::{debug, info, warn};

#[derive(Debug, Snafu)]
pub enum OracleError {
    #[snafu(display("Failed to connect to database: {}", source))]
    Connection { source: sqlx::Error },

    #[snafu(display("Failed to execute statement: {}", statement))]
    Statement {
        statement: String,
        source: sqlx::Error,
    },

    #[snafu(display("Planner returned an unreadable plan for: {}", statement))]
    Plan { statement: String },
}

type Result<T, E = OracleError> = std::result::Result<T, E>;

/// A user table and its columns in declared order.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
}

/// A pre-existing real index: catalog name, owning table, ordered columns,
/// observed scan count, and on-disk size in bytes.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub num_uses: i64,
    pub size: i64,
}

/// The fixed vocabulary of operations the selection engine needs from the
/// target database. Implementations must keep `get_cost` free of data side
/// effects and make `drop_simulated_index` idempotent.
#[async_trait]
pub trait CostOracle: Send {
    async fn get_table_info(&mut self) -> Result<Vec<TableInfo>>;
    async fn get_index_info(&mut self) -> Result<Vec<IndexInfo>>;
    async fn get_cost(&mut self, query: &str) -> Result<f64>;
    /// Creates a hypothetical index from its DDL and returns the opaque
    /// handle identifying it.
    async fn simulate_index(&mut self, create_stmt: &str) -> Result<i64>;
    async fn size_simulated_index(&mut self, oid: i64) -> Result<i64>;
    async fn drop_simulated_index(&mut self, oid: i64) -> Result<()>;
    /// Hides a real index from the planner without touching its data.
    async fn simulate_drop(&mut self, name: &str) -> Result<()>;
    async fn undo_simulate_drop(&mut self, name: &str) -> Result<()>;
    async fn refresh_stats(&mut self) -> Result<()>;
}

/// Oracle backed by a live PostgreSQL connection with the HypoPG extension.
/// Holds a single-connection pool; the engine owns it exclusively.
pub struct HypoPgOracle {
    pool: Pool<Postgres>,
}

impl HypoPgOracle {
    pub async fn connect(config: &JobConfig) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL at {}:{}",
            config.host, config.port
        );

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.connection_string())
            .await
            .context(ConnectionSnafu)?;

        if !config.autocommit {
            warn!("AUTOCOMMIT=false requested; statements still commit individually");
        }

        let statement = "CREATE EXTENSION IF NOT EXISTS hypopg";
        sqlx::query(statement)
            .execute(&pool)
            .await
            .context(StatementSnafu { statement })?;
        debug!("Enabled HypoPG");

        info!("Successfully connected to database: {}", config.database);
        Ok(Self { pool })
    }
}

#[async_trait]
impl CostOracle for HypoPgOracle {
    async fn get_table_info(&mut self) -> Result<Vec<TableInfo>> {
        const QUERY: &str = r#"
            SELECT
                c.relname AS table_name,
                array_agg(a.attname ORDER BY a.attnum) AS columns
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_attribute a ON a.attrelid = c.oid
            WHERE c.relkind = 'r'
              AND n.nspname NOT IN ('pg_catalog', 'information_schema')
              AND a.attnum > 0
              AND NOT a.attisdropped
            GROUP BY c.relname
            ORDER BY c.relname
        "#;

        let rows = sqlx::query(QUERY)
            .fetch_all(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(TableInfo {
                name: row.get("table_name"),
                columns: row.get("columns"),
            });
        }

        debug!("Fetched metadata for {} user tables", tables.len());
        Ok(tables)
    }

    async fn get_index_info(&mut self) -> Result<Vec<IndexInfo>> {
        const QUERY: &str = r#"
            SELECT
                s.indexrelname AS index_name,
                s.relname AS table_name,
                array_agg(a.attname ORDER BY arr.ord) AS columns,
                s.idx_scan AS num_uses,
                pg_relation_size(s.indexrelid) AS size_bytes
            FROM pg_stat_user_indexes s
            JOIN pg_index i ON i.indexrelid = s.indexrelid
            JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS arr(attnum, ord)
                ON arr.attnum > 0
            JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = arr.attnum
            GROUP BY s.indexrelname, s.relname, s.idx_scan, s.indexrelid
            ORDER BY s.indexrelname
        "#;

        let rows = sqlx::query(QUERY)
            .fetch_all(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            indexes.push(IndexInfo {
                name: row.get("index_name"),
                table: row.get("table_name"),
                columns: row.get("columns"),
                num_uses: row.get("num_uses"),
                size: row.get("size_bytes"),
            });
        }

        debug!("Fetched metadata for {} existing indexes", indexes.len());
        Ok(indexes)
    }

    async fn get_cost(&mut self, query: &str) -> Result<f64> {
        let statement = format!("EXPLAIN (FORMAT JSON) {query}");
        let row = sqlx::query(&statement)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| OracleError::Statement {
                statement: statement.clone(),
                source,
            })?;

        let plan: serde_json::Value =
            row.try_get(0).map_err(|source| OracleError::Statement {
                statement: statement.clone(),
                source,
            })?;

        plan.get(0)
            .and_then(|entry| entry.get("Plan"))
            .and_then(|node| node.get("Total Cost"))
            .and_then(serde_json::Value::as_f64)
            .ok_or(OracleError::Plan { statement })
    }

    async fn simulate_index(&mut self, create_stmt: &str) -> Result<i64> {
        const QUERY: &str = "SELECT indexrelid::bigint FROM hypopg_create_index($1)";
        let row = sqlx::query(QUERY)
            .bind(create_stmt)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| OracleError::Statement {
                statement: format!("hypopg_create_index({create_stmt})"),
                source,
            })?;

        let oid: i64 = row.try_get(0).map_err(|source| OracleError::Statement {
            statement: QUERY.to_string(),
            source,
        })?;
        debug!(oid, "Simulated index: {}", create_stmt);
        Ok(oid)
    }

    async fn size_simulated_index(&mut self, oid: i64) -> Result<i64> {
        const QUERY: &str = "SELECT hypopg_relation_size($1)::bigint";
        let row = sqlx::query(QUERY)
            .bind(Oid(oid as u32))
            .fetch_one(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        row.try_get(0).map_err(|source| OracleError::Statement {
            statement: QUERY.to_string(),
            source,
        })
    }

    async fn drop_simulated_index(&mut self, oid: i64) -> Result<()> {
        // The oid filter keeps this a no-op for already-dropped handles.
        const QUERY: &str =
            "SELECT hypopg_drop_index(indexrelid) FROM hypopg() WHERE indexrelid = $1";
        let rows = sqlx::query(QUERY)
            .bind(Oid(oid as u32))
            .fetch_all(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        if rows.is_empty() {
            debug!(oid, "Hypothetical index already dropped");
        }
        Ok(())
    }

    async fn simulate_drop(&mut self, name: &str) -> Result<()> {
        const QUERY: &str = "SELECT hypopg_hide_index(to_regclass($1))";
        let row = sqlx::query(QUERY)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        let hidden: Option<bool> = row.try_get(0).ok().flatten();
        if hidden != Some(true) {
            warn!("Index {} could not be hidden from the planner", name);
        }
        Ok(())
    }

    async fn undo_simulate_drop(&mut self, name: &str) -> Result<()> {
        const QUERY: &str = "SELECT hypopg_unhide_index(to_regclass($1))";
        let row = sqlx::query(QUERY)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context(StatementSnafu { statement: QUERY })?;

        let unhidden: Option<bool> = row.try_get(0).ok().flatten();
        if unhidden != Some(true) {
            warn!("Index {} was not hidden from the planner", name);
        }
        Ok(())
    }

    async fn refresh_stats(&mut self) -> Result<()> {
        let statement = "ANALYZE";
        sqlx::query(statement)
            .execute(&self.pool)
            .await
            .context(StatementSnafu { statement })?;
        info!("Refreshed planner statistics");
        Ok(())
    }
}
