//! Sequential ETL driver over a [`Warehouse`]

use crate::adapter::{ExecError, Warehouse};
use serde::{Deserialize, Serialize};
use sparkify_sql::{CatalogStatement, Phase, QueryCatalog};
use std::time::Instant;

/// Which part of the catalog a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Drop, create, copy, insert
    Full,

    /// Drop and create only
    Reset,

    /// Copy and insert into existing tables
    Load,

    /// Reload staging and append to the dimensions and fact
    Incremental,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reset => "reset",
            Self::Load => "load",
            Self::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "reset" => Ok(Self::Reset),
            "load" => Ok(Self::Load),
            "incremental" => Ok(Self::Incremental),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

/// One executed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub phase: Phase,
    pub label: String,
    pub rows_affected: usize,
    pub elapsed_ms: u64,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,

    /// Fingerprint of the catalog that ran
    pub fingerprint: String,

    /// Warehouse name
    pub warehouse: String,

    /// RFC 3339 start time
    pub started_at: String,

    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Rows written by all statements of one phase
    pub fn rows_in(&self, phase: Phase) -> usize {
        self.steps
            .iter()
            .filter(|s| s.phase == phase)
            .map(|s| s.rows_affected)
            .sum()
    }

    /// Rows written by the statement with this label
    pub fn rows_for(&self, label: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.rows_affected)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Warehouse unavailable: {0}")]
    Connection(#[source] ExecError),

    #[error("{label} ({phase}) failed after {completed} statements: {source}")]
    Statement {
        label: String,
        phase: Phase,
        completed: usize,
        #[source]
        source: ExecError,
    },
}

/// Runs catalog statements in order, stopping at the first failure
pub struct EtlPipeline {
    catalog: QueryCatalog,
}

impl EtlPipeline {
    pub fn new(catalog: QueryCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    /// Statements a mode executes, in order
    pub fn plan(&self, mode: RunMode) -> Vec<CatalogStatement> {
        let phases = |phases: &[Phase]| -> Vec<CatalogStatement> {
            phases
                .iter()
                .flat_map(|p| self.catalog.phase(*p).iter().cloned())
                .collect()
        };

        match mode {
            RunMode::Full => phases(&Phase::ORDER),
            RunMode::Reset => phases(&[Phase::Drop, Phase::Create]),
            RunMode::Load => phases(&[Phase::Copy, Phase::Insert]),
            RunMode::Incremental => {
                let mut plan: Vec<_> = self
                    .catalog
                    .staging_refresh()
                    .into_iter()
                    .filter(|s| s.phase == Phase::Drop)
                    .collect();
                plan.extend(phases(&[Phase::Create, Phase::Copy, Phase::Insert]));
                plan
            }
        }
    }

    /// Execute a mode against a warehouse
    pub async fn run(&self, warehouse: &dyn Warehouse, mode: RunMode) -> Result<RunReport, PipelineError> {
        warehouse
            .test_connection()
            .await
            .map_err(PipelineError::Connection)?;

        let plan = self.plan(mode);
        tracing::info!(
            warehouse = warehouse.name(),
            mode = %mode,
            statements = plan.len(),
            "Starting pipeline run"
        );

        let mut report = RunReport {
            mode,
            fingerprint: self.catalog.fingerprint(),
            warehouse: warehouse.name().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            steps: Vec::with_capacity(plan.len()),
        };

        let mut current_phase = None;
        for statement in &plan {
            if current_phase != Some(statement.phase) {
                tracing::info!(phase = %statement.phase, "Running phase");
                current_phase = Some(statement.phase);
            }

            let label = statement.label();
            tracing::debug!(label = %label, sql = %statement.sql, "Executing statement");

            let started = Instant::now();
            let outcome = match warehouse.execute(statement).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    tracing::error!(label = %label, error = %source, "Statement failed");
                    return Err(PipelineError::Statement {
                        label,
                        phase: statement.phase,
                        completed: report.steps.len(),
                        source,
                    });
                }
            };

            report.steps.push(StepReport {
                phase: statement.phase,
                label,
                rows_affected: outcome.rows_affected,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        tracing::info!(steps = report.steps.len(), "Pipeline run complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkify_core::Config;

    fn pipeline() -> EtlPipeline {
        EtlPipeline::new(QueryCatalog::build(&Config::default()))
    }

    fn labels(plan: &[CatalogStatement]) -> Vec<String> {
        plan.iter().map(|s| s.label()).collect()
    }

    #[test]
    fn plan_sizes() {
        let pipeline = pipeline();
        assert_eq!(pipeline.plan(RunMode::Full).len(), 21);
        assert_eq!(pipeline.plan(RunMode::Reset).len(), 14);
        assert_eq!(pipeline.plan(RunMode::Load).len(), 7);
        assert_eq!(pipeline.plan(RunMode::Incremental).len(), 16);
    }

    #[test]
    fn incremental_only_drops_staging() {
        let plan = pipeline().plan(RunMode::Incremental);
        let drops: Vec<_> = plan.iter().filter(|s| s.phase == Phase::Drop).cloned().collect();
        assert_eq!(
            labels(&drops),
            vec!["staging_events_table_drop", "staging_songs_table_drop"]
        );
        assert_eq!(plan[2].label(), "staging_events_table_create");
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Incremental".parse::<RunMode>().unwrap(), RunMode::Incremental);
        assert!("partial".parse::<RunMode>().is_err());
    }
}
