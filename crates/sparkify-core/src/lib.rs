//! Sparkify Core
//!
//! Domain model shared by the catalog, the warehouse and the CLI.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod schema;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use schema::{ColumnDef, ColumnType, ForeignKey, Identity, TableDef, TableKind};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, IamRoleConfig, S3Config};
