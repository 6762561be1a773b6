//! Table definitions for the star schema
//!
//! The warehouse holds two raw staging tables, four dimensions and one fact
//! table. Definitions are plain data; rendering to DDL lives in `sparkify-sql`.

use serde::{Deserialize, Serialize};

/// Table names, shared by every statement that touches the table
pub const STAGING_EVENTS: &str = "staging_events";
pub const STAGING_SONGS: &str = "staging_songs";
pub const SONGPLAYS: &str = "songplays";
pub const USERS: &str = "users";
pub const SONGS: &str = "songs";
pub const ARTISTS: &str = "artists";
pub const TIME: &str = "time";

/// Warehouse column type (Redshift spelling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnType {
    /// VARCHAR with optional length (Redshift default is 256)
    Varchar { length: Option<u16> },

    /// TEXT (Redshift stores it as VARCHAR(256))
    Text,

    SmallInt,
    Int,
    BigInt,
    Float,
}

impl ColumnType {
    /// Unbounded VARCHAR
    pub const VARCHAR: ColumnType = ColumnType::Varchar { length: None };

    /// Bounded VARCHAR
    pub const fn varchar(length: u16) -> Self {
        ColumnType::Varchar { length: Some(length) }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Varchar { length: Some(n) } => write!(f, "VARCHAR({})", n),
            Self::Varchar { length: None } => write!(f, "VARCHAR"),
            Self::Text => write!(f, "TEXT"),
            Self::SmallInt => write!(f, "SMALLINT"),
            Self::Int => write!(f, "INT"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Float => write!(f, "FLOAT"),
        }
    }
}

/// Auto-incrementing column seed and step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub seed: i64,
    pub step: i64,
}

/// Reference from a column to another table's key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// A column in a table definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,

    /// Declared type
    pub column_type: ColumnType,

    /// NOT NULL constraint (enforced by the warehouse)
    pub not_null: bool,

    /// Part of the primary key (informational only)
    pub primary_key: bool,

    /// IDENTITY(seed, step)
    pub identity: Option<Identity>,

    /// REFERENCES clause (informational only)
    pub references: Option<ForeignKey>,

    /// Column is the table's sort key
    pub sort_key: bool,

    /// Column is the table's distribution key
    pub dist_key: bool,
}

impl ColumnDef {
    /// Create a nullable column with no constraints
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            primary_key: false,
            identity: None,
            references: None,
            sort_key: false,
            dist_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn identity(mut self, seed: i64, step: i64) -> Self {
        self.identity = Some(Identity { seed, step });
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn sort_key(mut self) -> Self {
        self.sort_key = true;
        self
    }

    pub fn dist_key(mut self) -> Self {
        self.dist_key = true;
        self
    }
}

/// Role of a table in the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Raw landing zone, reloaded each run
    Staging,

    /// Deduplicated reference table
    Dimension,

    /// Event table referencing the dimensions
    Fact,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staging => write!(f, "staging"),
            Self::Dimension => write!(f, "dimension"),
            Self::Fact => write!(f, "fact"),
        }
    }
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, kind: TableKind, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            kind,
            columns,
        }
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key column names
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Tables this one references through foreign keys
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for fk in self.columns.iter().filter_map(|c| c.references.as_ref()) {
            if !tables.contains(&fk.table.as_str()) {
                tables.push(fk.table.as_str());
            }
        }
        tables
    }
}

/// Raw event log rows, one per playback/auth/page event
pub fn staging_events() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        STAGING_EVENTS,
        TableKind::Staging,
        vec![
            ColumnDef::new("artist", ColumnType::VARCHAR),
            ColumnDef::new("auth", ColumnType::VARCHAR),
            ColumnDef::new("first_name", ColumnType::VARCHAR),
            ColumnDef::new("gender", ColumnType::VARCHAR),
            ColumnDef::new("item_in_session", Int),
            ColumnDef::new("last_name", ColumnType::VARCHAR),
            ColumnDef::new("length", Float),
            ColumnDef::new("level", ColumnType::VARCHAR),
            ColumnDef::new("location", ColumnType::VARCHAR),
            ColumnDef::new("method", ColumnType::VARCHAR),
            ColumnDef::new("page", ColumnType::VARCHAR),
            ColumnDef::new("registration", Float),
            ColumnDef::new("session_id", Int),
            ColumnDef::new("song", ColumnType::VARCHAR),
            ColumnDef::new("status", Int),
            ColumnDef::new("start_time", BigInt),
            ColumnDef::new("user_agent", ColumnType::VARCHAR),
            ColumnDef::new("user_id", ColumnType::VARCHAR),
        ],
    )
}

/// Raw song metadata rows
pub fn staging_songs() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        STAGING_SONGS,
        TableKind::Staging,
        vec![
            ColumnDef::new("song_id", ColumnType::VARCHAR),
            ColumnDef::new("artist_id", ColumnType::VARCHAR),
            ColumnDef::new("artist_latitude", Float),
            ColumnDef::new("artist_longitude", Float),
            ColumnDef::new("artist_location", ColumnType::VARCHAR),
            ColumnDef::new("artist_name", ColumnType::VARCHAR),
            ColumnDef::new("title", ColumnType::VARCHAR),
            ColumnDef::new("duration", Float),
            ColumnDef::new("year", SmallInt),
        ],
    )
}

/// Fact table: one row per song play
pub fn songplays() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        SONGPLAYS,
        TableKind::Fact,
        vec![
            ColumnDef::new("songplay_id", Int).identity(0, 1).primary_key(),
            ColumnDef::new("start_time", BigInt).not_null().sort_key(),
            ColumnDef::new("user_id", Int).not_null().references(USERS, "user_id"),
            ColumnDef::new("level", Text).not_null(),
            ColumnDef::new("song_id", ColumnType::varchar(25))
                .not_null()
                .references(SONGS, "song_id")
                .dist_key(),
            ColumnDef::new("artist_id", ColumnType::varchar(25))
                .not_null()
                .references(ARTISTS, "artist_id"),
            ColumnDef::new("session_id", Int).not_null(),
            ColumnDef::new("location", Text),
            ColumnDef::new("user_agent", Text),
        ],
    )
}

pub fn users() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        USERS,
        TableKind::Dimension,
        vec![
            ColumnDef::new("user_id", Int).sort_key().primary_key(),
            ColumnDef::new("first_name", Text),
            ColumnDef::new("last_name", Text),
            ColumnDef::new("gender", ColumnType::varchar(5)),
            ColumnDef::new("level", Text),
        ],
    )
}

pub fn songs() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        SONGS,
        TableKind::Dimension,
        vec![
            ColumnDef::new("song_id", ColumnType::varchar(25)).sort_key().primary_key(),
            ColumnDef::new("title", Text).not_null(),
            ColumnDef::new("artist_id", ColumnType::varchar(25)).not_null(),
            ColumnDef::new("year", Int),
            ColumnDef::new("duration", Float),
        ],
    )
}

pub fn artists() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        ARTISTS,
        TableKind::Dimension,
        vec![
            ColumnDef::new("artist_id", ColumnType::varchar(25)).sort_key().primary_key(),
            ColumnDef::new("artist_name", Text).not_null(),
            ColumnDef::new("location", Text),
            ColumnDef::new("latitude", Float),
            ColumnDef::new("longitude", Float),
        ],
    )
}

/// Calendar dimension keyed by epoch milliseconds
pub fn time() -> TableDef {
    use ColumnType::*;
    TableDef::new(
        TIME,
        TableKind::Dimension,
        vec![
            ColumnDef::new("start_time", BigInt).sort_key().primary_key(),
            ColumnDef::new("hour", SmallInt).not_null(),
            ColumnDef::new("day", SmallInt).not_null(),
            ColumnDef::new("week", Int).not_null(),
            ColumnDef::new("month", SmallInt).not_null(),
            ColumnDef::new("year", Int).not_null(),
            ColumnDef::new("weekday", SmallInt).not_null(),
        ],
    )
}

/// All tables in create order
///
/// Referenced dimensions come before `songplays`.
pub fn warehouse_tables() -> Vec<TableDef> {
    vec![
        staging_events(),
        staging_songs(),
        users(),
        songs(),
        artists(),
        songplays(),
        time(),
    ]
}

/// Look up a table definition by name
pub fn table(name: &str) -> Option<TableDef> {
    warehouse_tables().into_iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_display() {
        assert_eq!(ColumnType::VARCHAR.to_string(), "VARCHAR");
        assert_eq!(ColumnType::varchar(25).to_string(), "VARCHAR(25)");
        assert_eq!(ColumnType::BigInt.to_string(), "BIGINT");
    }

    #[test]
    fn staging_tables_have_no_constraints() {
        for table in [staging_events(), staging_songs()] {
            assert_eq!(table.kind, TableKind::Staging);
            assert!(table.primary_key().is_empty());
            assert!(table.columns.iter().all(|c| !c.not_null && c.references.is_none()));
        }
    }

    #[test]
    fn songplays_references_dimensions() {
        let fact = songplays();
        assert_eq!(fact.referenced_tables(), vec![USERS, SONGS, ARTISTS]);
        assert_eq!(fact.primary_key(), vec!["songplay_id"]);

        let id = fact.find_column("songplay_id").unwrap();
        assert_eq!(id.identity, Some(Identity { seed: 0, step: 1 }));
        assert!(fact.find_column("song_id").unwrap().dist_key);
    }

    #[test]
    fn dimensions_are_keyed_on_natural_key() {
        assert_eq!(users().primary_key(), vec!["user_id"]);
        assert_eq!(songs().primary_key(), vec!["song_id"]);
        assert_eq!(artists().primary_key(), vec!["artist_id"]);
        assert_eq!(time().primary_key(), vec!["start_time"]);
    }

    #[test]
    fn create_order_places_references_first() {
        let tables = warehouse_tables();
        let position = |name: &str| tables.iter().position(|t| t.name == name).unwrap();

        for t in &tables {
            for referenced in t.referenced_tables() {
                assert!(position(referenced) < position(&t.name));
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(table(TIME).unwrap().column_names().len(), 7);
        assert!(table("nonexistent").is_none());
    }
}
