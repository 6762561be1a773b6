//! SQL parsing using datafusion-sqlparser-rs
//!
//! Parses catalog statements into an AST and turns failures into diagnostics.
//! Only portable statements (drops, inserts) go through here; the Redshift
//! DDL hints and COPY options are not understood by sqlparser.

use sparkify_core::{Diagnostic, DiagnosticCode, Location, Severity};
use sqlparser::ast::{Insert, ObjectType, Statement};
use sqlparser::dialect::{Dialect, GenericDialect};
use sqlparser::parser::{Parser, ParserError};

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the default (generic) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Parse SQL string into AST
    pub fn parse(&self, sql: &str) -> Result<ParsedSql, ParseError> {
        match Parser::parse_sql(&*self.dialect, sql) {
            Ok(statements) => Ok(ParsedSql {
                sql: sql.to_string(),
                statements,
            }),
            Err(error) => Err(ParseError {
                sql: sql.to_string(),
                error,
            }),
        }
    }

    /// Parse SQL and return diagnostic on error
    pub fn parse_with_diagnostic(
        &self,
        sql: &str,
        location: Location,
    ) -> Result<ParsedSql, Diagnostic> {
        self.parse(sql).map_err(|e| e.to_diagnostic(location))
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL with AST
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Original SQL string
    pub sql: String,

    /// Parsed statements
    pub statements: Vec<Statement>,
}

impl ParsedSql {
    /// Get the first statement
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    /// Count the number of statements
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Get the insert if this is an INSERT statement
    pub fn as_insert(&self) -> Option<&Insert> {
        match self.first_statement() {
            Some(Statement::Insert(insert)) => Some(insert),
            _ => None,
        }
    }

    /// Tables named by a `DROP TABLE` statement and whether it is `IF EXISTS`
    pub fn dropped_tables(&self) -> Option<(Vec<String>, bool)> {
        match self.first_statement() {
            Some(Statement::Drop {
                object_type: ObjectType::Table,
                if_exists,
                names,
                ..
            }) => Some((names.iter().map(|n| n.to_string()).collect(), *if_exists)),
            _ => None,
        }
    }
}

/// SQL parsing error with diagnostic information
#[derive(Debug)]
pub struct ParseError {
    /// Original SQL string
    pub sql: String,

    /// Parser error from sqlparser
    pub error: ParserError,
}

impl ParseError {
    /// Convert to a diagnostic pointing at a catalog statement
    pub fn to_diagnostic(&self, location: Location) -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::SqlParseError,
            Severity::Error,
            format!("Failed to parse SQL: {}", self.error),
        )
        .with_location(location)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SQL parse error: {}", self.error)
    }
}

impl std::error::Error for ParseError {}
