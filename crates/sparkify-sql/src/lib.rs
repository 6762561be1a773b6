//! SQL catalog for the Sparkify warehouse
//!
//! This crate handles:
//! - Rendering table DDL (drop / create) with Redshift storage hints
//! - Building COPY statements from an explicit configuration
//! - The dimensional insert statements
//! - Grouping everything into an ordered [`QueryCatalog`]
//! - Checking a catalog for ordering and form problems

pub mod catalog;
pub mod copy;
pub mod ddl;
pub mod lint;
pub mod parser;
pub mod transform;

pub use catalog::{CatalogStatement, Phase, QueryCatalog, StatementKind};
pub use copy::{CopySpec, JsonFormat};
pub use lint::CatalogChecker;
pub use parser::{ParseError, ParsedSql, SqlParser};
pub use transform::{Transform, NEXT_SONG_PAGE};
