//! DDL rendering for table definitions
//!
//! Produces Redshift DDL: column-level `sortkey` / `distkey` hints,
//! `IDENTITY(seed,step)` surrogate keys and informational `REFERENCES`
//! and `PRIMARY KEY` constraints.

use sparkify_core::{ColumnDef, TableDef};

/// Render `DROP TABLE IF EXISTS <table>`
pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

/// Render `CREATE TABLE IF NOT EXISTS` for a table definition
///
/// One column per line, followed by the table-level primary key.
pub fn create_table(table: &TableDef) -> String {
    let mut lines: Vec<String> = table.columns.iter().map(column_definition).collect();

    let primary_key = table.primary_key();
    if !primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY({})", primary_key.join(", ")));
    }

    let body = lines
        .iter()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE IF NOT EXISTS {}\n(\n{}\n)", table.name, body)
}

fn column_definition(column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", column.name, column.column_type);

    if let Some(identity) = column.identity {
        sql.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.step));
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(fk) = &column.references {
        sql.push_str(&format!(" REFERENCES {}({})", fk.table, fk.column));
    }
    if column.sort_key {
        sql.push_str(" sortkey");
    }
    if column.dist_key {
        sql.push_str(" distkey");
    }

    sql
}
