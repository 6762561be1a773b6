//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Catalog structure (1xxx)
    /// A table is created before a table it references
    CatalogCreateOrder,

    /// An insert reads from a table that is populated later in the run
    CatalogInsertOrder,

    /// A drop statement is not of the form `DROP TABLE IF EXISTS <table>`
    CatalogDropForm,

    /// A create statement is not guarded by `IF NOT EXISTS`
    CatalogCreateForm,

    // Transform semantics (2xxx)
    /// A dimension insert has no anti-join against existing keys
    InsertUnguardedDimension,

    /// An insert names a column the target table does not have
    InsertColumnMismatch,

    // SQL issues (3xxx)
    /// Failed to parse SQL
    SqlParseError,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogCreateOrder => "CATALOG_CREATE_ORDER",
            Self::CatalogInsertOrder => "CATALOG_INSERT_ORDER",
            Self::CatalogDropForm => "CATALOG_DROP_FORM",
            Self::CatalogCreateForm => "CATALOG_CREATE_FORM",
            Self::InsertUnguardedDimension => "INSERT_UNGUARDED_DIMENSION",
            Self::InsertColumnMismatch => "INSERT_COLUMN_MISMATCH",
            Self::SqlParseError => "SQL_PARSE_ERROR",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Where in the catalog a diagnostic points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Execution phase (drop, create, copy, insert)
    pub phase: String,

    /// Position of the statement within its phase (0-indexed)
    pub index: usize,

    /// Target table of the statement
    pub table: String,
}

impl Location {
    pub fn new(phase: impl Into<String>, index: usize, table: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            index,
            table: table.into(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}] {}", self.phase, self.index, self.table)
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Statement the diagnostic refers to
    pub location: Option<Location>,

    /// Expected value (for comparison diagnostics)
    pub expected: Option<String>,

    /// Actual value (for comparison diagnostics)
    pub actual: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            expected: None,
            actual: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::CatalogCreateOrder.as_str(), "CATALOG_CREATE_ORDER");
        assert_eq!(
            DiagnosticCode::InsertUnguardedDimension.as_str(),
            "INSERT_UNGUARDED_DIMENSION"
        );
    }

    #[test]
    fn serde_name_matches_as_str() {
        let json = serde_json::to_string(&DiagnosticCode::CatalogInsertOrder).unwrap();
        assert_eq!(json, "\"CATALOG_INSERT_ORDER\"");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::InsertUnguardedDimension,
            Severity::Warn,
            "songs insert has no NOT IN guard",
        )
        .with_location(Location::new("insert", 1, "songs"));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("INSERT_UNGUARDED_DIMENSION"));
        assert!(json.contains("\"warn\""));
        assert_eq!(diag.location.unwrap().to_string(), "insert[1] songs");
    }
}
