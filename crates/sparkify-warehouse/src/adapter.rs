//! Warehouse trait for executing catalog statements

use sparkify_sql::CatalogStatement;

/// Result of a successfully executed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Rows written by COPY/INSERT, zero for DDL
    pub rows_affected: usize,
}

impl ExecOutcome {
    pub fn rows(rows_affected: usize) -> Self {
        Self { rows_affected }
    }
}

/// Errors a warehouse reports for a single statement
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Constraint violation on {table}.{column}: {reason}")]
    Constraint {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Cast failed on {table}.{column}: {reason}")]
    Cast {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Load into {table} failed: {reason}")]
    Load { table: String, reason: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Unsupported statement: {0}")]
    Unsupported(String),
}

impl ExecError {
    pub fn load(table: &str, reason: impl Into<String>) -> Self {
        Self::Load {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

/// A warehouse that can execute catalog statements
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync {
    /// Warehouse name used in logs and reports
    fn name(&self) -> &'static str;

    /// Execute one statement
    ///
    /// A statement either applies completely or not at all.
    async fn execute(&self, statement: &CatalogStatement) -> Result<ExecOutcome, ExecError>;

    /// Check the warehouse is reachable before running anything
    async fn test_connection(&self) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = ExecError::Constraint {
            table: "songs".to_string(),
            column: "title".to_string(),
            reason: "NULL in NOT NULL column".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Constraint violation on songs.title: NULL in NOT NULL column"
        );
        assert_eq!(
            ExecError::load("staging_events", "no objects").to_string(),
            "Load into staging_events failed: no objects"
        );
    }
}
