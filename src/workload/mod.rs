use crate::models::QueryAttributes;
use query_parser::QueryParser;
use snafu::{ResultExt, Snafu};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

pub mod query_parser;

/// PostgreSQL csvlog field positions for the session id and the log message.
const SESSION_FIELD: usize = 5;
const MESSAGE_FIELD: usize = 13;

/// Sessions contributing fewer statements than this fraction of the busiest
/// session are treated as noise and discarded.
const SESSION_KEEP_FRACTION: f64 = 0.1;

const STATEMENT_PREFIX: &str = "statement: ";

#[derive(Debug, Snafu)]
pub enum WorkloadError {
    #[snafu(display("Failed to read workload log {}: {}", path, source))]
    ReadLog { path: String, source: csv::Error },
}

type Result<T, E = WorkloadError> = std::result::Result<T, E>;

/// Statements that survived log filtering, paired with their parsed column
/// attributes, plus bookkeeping about what was thrown away.
#[derive(Debug, Default)]
pub struct ParsedWorkload {
    pub queries: Vec<(String, QueryAttributes)>,
    pub parse_failures: usize,
    pub discarded_sessions: usize,
}

/// Turns a captured csvlog into `(statement, attributes)` pairs. Needs the
/// table schemas so unqualified column references can be bound.
pub struct WorkloadParser<'a> {
    schemas: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> WorkloadParser<'a> {
    pub fn new(schemas: &'a BTreeMap<String, Vec<String>>) -> Self {
        Self { schemas }
    }

    pub fn parse_log(&self, path: &Path) -> Result<ParsedWorkload> {
        let display_path = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .context(ReadLogSnafu {
                path: display_path.as_str(),
            })?;

        let mut entries: Vec<(String, String)> = Vec::new();
        for record in reader.records() {
            let record = record.context(ReadLogSnafu {
                path: display_path.as_str(),
            })?;
            let (Some(session), Some(message)) =
                (record.get(SESSION_FIELD), record.get(MESSAGE_FIELD))
            else {
                continue;
            };
            entries.push((session.to_string(), message.to_string()));
        }

        let mut session_counts: HashMap<&str, usize> = HashMap::new();
        for (session, _) in &entries {
            *session_counts.entry(session.as_str()).or_default() += 1;
        }
        let busiest = session_counts.values().copied().max().unwrap_or(0);
        let threshold = SESSION_KEEP_FRACTION * busiest as f64;
        let discarded_sessions = session_counts
            .values()
            .filter(|&&count| (count as f64) < threshold)
            .count();

        let parser = QueryParser::new(self.schemas);
        let mut parsed = ParsedWorkload {
            discarded_sessions,
            ..Default::default()
        };

        for (session, message) in &entries {
            if (session_counts[session.as_str()] as f64) < threshold {
                continue;
            }
            let Some(statement) = extract_statement(message) else {
                continue;
            };
            if is_excluded(statement) {
                continue;
            }
            match parser.parse(statement) {
                Ok(attrs) => parsed.queries.push((statement.to_string(), attrs)),
                Err(err) => {
                    warn!("Dropping unparseable workload query ({err}): {statement}");
                    parsed.parse_failures += 1;
                }
            }
        }

        debug!(
            "Parsed {} workload queries ({} parse failures, {} quiet sessions discarded)",
            parsed.queries.len(),
            parsed.parse_failures,
            parsed.discarded_sessions
        );
        Ok(parsed)
    }
}

fn extract_statement(message: &str) -> Option<&str> {
    message
        .find(STATEMENT_PREFIX)
        .map(|pos| message[pos + STATEMENT_PREFIX.len()..].trim())
}

/// Transaction control, DDL aliased via AS, and anything that is neither a
/// SELECT nor an UPDATE is not worth costing.
fn is_excluded(statement: &str) -> bool {
    let mut has_dml = false;
    for token in statement.split_whitespace() {
        match token {
            "AS" | "BEGIN" | "COMMIT" => return true,
            "SELECT" | "UPDATE" => has_dml = true,
            _ => {}
        }
    }
    !has_dml
}
