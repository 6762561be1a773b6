//! Structural checks over a query catalog
//!
//! The checker never rewrites statements. Known gaps in the transforms (the
//! unguarded songs insert) are reported as warnings and left in place.

use crate::catalog::{CatalogStatement, Phase, QueryCatalog, StatementKind};
use crate::ddl;
use crate::parser::SqlParser;
use sparkify_core::schema::{self, TableKind};
use sparkify_core::{Diagnostic, DiagnosticCode, Location, Report, Severity};
use std::collections::HashMap;

/// Runs every catalog check and collects diagnostics
pub struct CatalogChecker {
    parser: SqlParser,
}

impl CatalogChecker {
    pub fn new() -> Self {
        Self {
            parser: SqlParser::new(),
        }
    }

    /// Check a catalog and wrap the findings in a report
    pub fn report(&self, catalog: &QueryCatalog) -> Report {
        Report::from_diagnostics(self.check(catalog))
            .with_fingerprint(catalog.fingerprint())
            .with_statements_checked(catalog.len())
    }

    /// Check a catalog
    pub fn check(&self, catalog: &QueryCatalog) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        diagnostics.extend(self.check_drops(&catalog.drops));
        diagnostics.extend(check_creates(&catalog.creates));
        diagnostics.extend(self.check_inserts(&catalog.inserts));
        diagnostics
    }

    fn check_drops(&self, drops: &[CatalogStatement]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for (index, statement) in drops.iter().enumerate() {
            let location = location(Phase::Drop, index, statement);

            let expected = ddl::drop_table(&statement.table);
            if statement.sql.trim() != expected {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::CatalogDropForm,
                        Severity::Error,
                        format!("Drop of '{}' must be exactly '{}'", statement.table, expected),
                    )
                    .with_location(location.clone())
                    .with_comparison(expected, statement.sql.trim()),
                );
            }

            match self.parser.parse_with_diagnostic(&statement.sql, location.clone()) {
                Ok(parsed) => {
                    if let Some((names, false)) = parsed.dropped_tables() {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::CatalogDropForm,
                                Severity::Error,
                                format!("Drop of {} errors when the table is absent", names.join(", ")),
                            )
                            .with_location(location),
                        );
                    }
                }
                Err(diag) => diagnostics.push(diag),
            }
        }

        diagnostics
    }

    fn check_inserts(&self, inserts: &[CatalogStatement]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        // Position of the insert that populates each table
        let populated_at: HashMap<&str, usize> = inserts
            .iter()
            .enumerate()
            .map(|(i, s)| (s.table.as_str(), i))
            .collect();

        for (index, statement) in inserts.iter().enumerate() {
            let location = location(Phase::Insert, index, statement);

            if let StatementKind::Insert { transform } = &statement.kind {
                let mut depends_on: Vec<&str> = transform.sources().to_vec();
                if let Some(target) = schema::table(transform.target()) {
                    depends_on.extend(
                        target
                            .referenced_tables()
                            .into_iter()
                            .filter_map(|t| populated_at.get_key_value(t).map(|(k, _)| *k)),
                    );

                    if transform.guard_key().is_none() && target.kind == TableKind::Dimension {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::InsertUnguardedDimension,
                                Severity::Warn,
                                format!(
                                    "Insert into '{}' has no anti-join on its key; re-running it appends duplicate rows",
                                    target.name
                                ),
                            )
                            .with_location(location.clone()),
                        );
                    }
                }

                for dependency in depends_on {
                    if let Some(&at) = populated_at.get(dependency) {
                        if at > index {
                            diagnostics.push(
                                Diagnostic::new(
                                    DiagnosticCode::CatalogInsertOrder,
                                    Severity::Error,
                                    format!(
                                        "Insert into '{}' runs before the insert into '{}' it depends on",
                                        statement.table, dependency
                                    ),
                                )
                                .with_location(location.clone()),
                            );
                        }
                    }
                }
            }

            match self.parser.parse_with_diagnostic(&statement.sql, location.clone()) {
                Ok(parsed) => {
                    if let Some(insert) = parsed.as_insert() {
                        diagnostics.extend(check_insert_columns(
                            &statement.table,
                            &insert.table_name.to_string(),
                            insert.columns.iter().map(|c| c.value.as_str()),
                            &location,
                        ));
                    }
                }
                Err(diag) => diagnostics.push(diag),
            }
        }

        diagnostics
    }
}

impl Default for CatalogChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn location(phase: Phase, index: usize, statement: &CatalogStatement) -> Location {
    Location::new(phase.as_str(), index, statement.table.clone())
}

/// Create statements must be guarded and ordered after the tables they reference
fn check_creates(creates: &[CatalogStatement]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let created_at: HashMap<&str, usize> = creates
        .iter()
        .enumerate()
        .map(|(i, s)| (s.table.as_str(), i))
        .collect();

    for (index, statement) in creates.iter().enumerate() {
        let location = location(Phase::Create, index, statement);

        if !statement.sql.trim_start().starts_with("CREATE TABLE IF NOT EXISTS ") {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::CatalogCreateForm,
                    Severity::Error,
                    format!("Create of '{}' is not guarded by IF NOT EXISTS", statement.table),
                )
                .with_location(location.clone()),
            );
        }

        let StatementKind::Create { definition } = &statement.kind else {
            continue;
        };

        for referenced in definition.referenced_tables() {
            match created_at.get(referenced) {
                Some(&at) if at < index => {}
                Some(&at) => diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::CatalogCreateOrder,
                        Severity::Error,
                        format!(
                            "'{}' is created before '{}', which it references",
                            statement.table, referenced
                        ),
                    )
                    .with_location(location.clone())
                    .with_comparison(format!("index < {}", index), format!("index {}", at)),
                ),
                None => diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::CatalogCreateOrder,
                        Severity::Error,
                        format!(
                            "'{}' references '{}', which the catalog never creates",
                            statement.table, referenced
                        ),
                    )
                    .with_location(location.clone()),
                ),
            }
        }
    }

    diagnostics
}

fn check_insert_columns<'a>(
    expected_table: &str,
    parsed_table: &str,
    columns: impl Iterator<Item = &'a str>,
    location: &Location,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(target) = schema::table(expected_table) else {
        return diagnostics;
    };

    if parsed_table != expected_table {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticCode::InsertColumnMismatch,
                Severity::Error,
                format!("Insert registered for '{}' writes to '{}'", expected_table, parsed_table),
            )
            .with_location(location.clone())
            .with_comparison(expected_table, parsed_table),
        );
        return diagnostics;
    }

    for column in columns {
        if target.find_column(column).is_none() {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::InsertColumnMismatch,
                    Severity::Error,
                    format!("Table '{}' has no column '{}'", expected_table, column),
                )
                .with_location(location.clone()),
            );
        }
    }

    diagnostics
}
