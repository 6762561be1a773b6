//! The query catalog: four ordered statement lists
//!
//! A driver executes the phases in [`Phase::ORDER`]: drop, create, copy,
//! insert. Every statement carries both its SQL text and a typed description
//! of what it does, so executors that do not speak SQL can evaluate the
//! same plan.

use crate::copy::CopySpec;
use crate::ddl;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sparkify_core::schema::{self, TableKind};
use sparkify_core::{Config, TableDef};

/// Execution phase of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Drop,
    Create,
    Copy,
    Insert,
}

impl Phase {
    /// Execution order
    pub const ORDER: [Phase; 4] = [Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::Copy => "copy",
            Self::Insert => "insert",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "create" => Ok(Self::Create),
            "copy" => Ok(Self::Copy),
            "insert" => Ok(Self::Insert),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// What a statement does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StatementKind {
    /// `DROP TABLE IF EXISTS`
    Drop { table: String },

    /// `CREATE TABLE IF NOT EXISTS`
    Create { definition: TableDef },

    /// Bulk load from object storage
    Copy { spec: CopySpec },

    /// `INSERT INTO … SELECT DISTINCT …`
    Insert { transform: Transform },
}

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatement {
    /// Phase the statement belongs to
    pub phase: Phase,

    /// Table the statement acts on
    pub table: String,

    /// Typed description
    pub kind: StatementKind,

    /// SQL text sent to the warehouse
    pub sql: String,
}

impl CatalogStatement {
    pub fn drop_table(table: &str) -> Self {
        Self {
            phase: Phase::Drop,
            table: table.to_string(),
            kind: StatementKind::Drop {
                table: table.to_string(),
            },
            sql: ddl::drop_table(table),
        }
    }

    pub fn create(definition: TableDef) -> Self {
        Self {
            phase: Phase::Create,
            table: definition.name.clone(),
            sql: ddl::create_table(&definition),
            kind: StatementKind::Create { definition },
        }
    }

    pub fn copy(spec: CopySpec) -> Self {
        Self {
            phase: Phase::Copy,
            table: spec.table.clone(),
            sql: spec.to_sql(),
            kind: StatementKind::Copy { spec },
        }
    }

    pub fn insert(transform: Transform) -> Self {
        Self {
            phase: Phase::Insert,
            table: transform.target().to_string(),
            kind: StatementKind::Insert { transform },
            sql: transform.sql().to_string(),
        }
    }

    /// Short label used in logs, e.g. `staging_events_copy`
    pub fn label(&self) -> String {
        match self.phase {
            Phase::Drop => format!("{}_table_drop", self.table),
            Phase::Create => format!("{}_table_create", self.table),
            Phase::Copy => format!("{}_copy", self.table),
            Phase::Insert => format!("{}_table_insert", self.table),
        }
    }
}

/// Ordered statement lists for one warehouse configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCatalog {
    pub drops: Vec<CatalogStatement>,
    pub creates: Vec<CatalogStatement>,
    pub copies: Vec<CatalogStatement>,
    pub inserts: Vec<CatalogStatement>,
}

impl QueryCatalog {
    /// Build the catalog for a configuration
    ///
    /// The configuration only feeds the two COPY statements.
    pub fn build(config: &Config) -> Self {
        let drops = [
            schema::STAGING_EVENTS,
            schema::STAGING_SONGS,
            schema::SONGPLAYS,
            schema::USERS,
            schema::SONGS,
            schema::ARTISTS,
            schema::TIME,
        ]
        .into_iter()
        .map(CatalogStatement::drop_table)
        .collect();

        let creates = schema::warehouse_tables()
            .into_iter()
            .map(CatalogStatement::create)
            .collect();

        let copies = vec![
            CatalogStatement::copy(CopySpec::events(config)),
            CatalogStatement::copy(CopySpec::songs(config)),
        ];

        let inserts = Transform::ORDER
            .into_iter()
            .map(CatalogStatement::insert)
            .collect();

        Self {
            drops,
            creates,
            copies,
            inserts,
        }
    }

    /// Statements of one phase
    pub fn phase(&self, phase: Phase) -> &[CatalogStatement] {
        match phase {
            Phase::Drop => &self.drops,
            Phase::Create => &self.creates,
            Phase::Copy => &self.copies,
            Phase::Insert => &self.inserts,
        }
    }

    /// Phases in execution order with their statements
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &[CatalogStatement])> {
        Phase::ORDER.into_iter().map(move |phase| (phase, self.phase(phase)))
    }

    /// Every statement in execution order
    pub fn all(&self) -> impl Iterator<Item = &CatalogStatement> {
        Phase::ORDER.into_iter().flat_map(move |phase| self.phase(phase).iter())
    }

    /// Number of statements across all phases
    pub fn len(&self) -> usize {
        self.drops.len() + self.creates.len() + self.copies.len() + self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop + create of the staging tables only
    ///
    /// Staging is reloaded every run while dimensions and facts accumulate.
    pub fn staging_refresh(&self) -> Vec<CatalogStatement> {
        let is_staging = |statement: &&CatalogStatement| match &statement.kind {
            StatementKind::Drop { table } => schema::table(table)
                .map(|t| t.kind == TableKind::Staging)
                .unwrap_or(false),
            StatementKind::Create { definition } => definition.kind == TableKind::Staging,
            _ => false,
        };

        self.drops
            .iter()
            .filter(is_staging)
            .chain(self.creates.iter().filter(is_staging))
            .cloned()
            .collect()
    }

    /// Render the given phases as a `;`-terminated SQL script
    pub fn to_script(&self, phases: &[Phase]) -> String {
        let mut script = String::new();
        for phase in phases {
            script.push_str(&format!("-- {}\n", phase));
            for statement in self.phase(*phase) {
                script.push_str(&statement.sql);
                script.push_str(";\n\n");
            }
        }
        script
    }

    /// SHA-256 of the full script, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_script(&Phase::ORDER).as_bytes());
        hex::encode(hasher.finalize())
    }
}
