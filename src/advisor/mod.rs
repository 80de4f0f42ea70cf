use crate::config::JobConfig;
use crate::oracle::{CostOracle, HypoPgOracle, OracleError};
use crate::workload::{WorkloadError, WorkloadParser};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use tracing::info;

pub mod candidates;
pub mod engine;
pub mod rebalance;
pub mod script;

pub use engine::{AdvisorError, EngineSettings, SelectionEngine, SelectionSummary, StopReason};

#[derive(Debug, Snafu)]
pub enum JobError {
    #[snafu(display("{}", source))]
    Oracle { source: OracleError },

    #[snafu(display("{}", source))]
    Workload { source: WorkloadError },

    #[snafu(display("{}", source))]
    Script { source: script::ScriptError },

    #[snafu(display("{}", source))]
    Selection { source: AdvisorError },
}

/// Runs one advise job end to end: connect, fetch the schema, parse the
/// workload against it, then iterate selection until a stop condition. The
/// action script is flushed per line, so a timeout mid-run still leaves a
/// valid prefix behind.
pub async fn run_job(job: &JobConfig) -> Result<SelectionSummary, JobError> {
    let mut oracle = HypoPgOracle::connect(job).await.context(OracleSnafu)?;
    let table_info = oracle.get_table_info().await.context(OracleSnafu)?;

    let schemas: BTreeMap<String, Vec<String>> = table_info
        .iter()
        .map(|t| (t.name.clone(), t.columns.clone()))
        .collect();
    let parsed = WorkloadParser::new(&schemas)
        .parse_log(&job.workload)
        .context(WorkloadSnafu)?;
    info!(
        "Parsed {} workload queries ({} unparseable, {} quiet sessions discarded)",
        parsed.queries.len(),
        parsed.parse_failures,
        parsed.discarded_sessions
    );

    let script = script::ActionScript::create(&job.output).context(ScriptSnafu)?;
    let mut engine = SelectionEngine::setup(
        oracle,
        script,
        job.engine_settings(),
        table_info,
        parsed.queries,
    )
    .await
    .context(SelectionSnafu)?;

    engine.run().await.context(SelectionSnafu)
}
