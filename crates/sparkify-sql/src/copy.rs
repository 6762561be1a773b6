//! Bulk-load (COPY) statements for the staging tables
//!
//! Event JSON uses camelCase keys that do not match the staging columns, so
//! it is loaded through a JSONPaths document. Song JSON keys match the
//! column names and load with `'auto'`.

use serde::{Deserialize, Serialize};
use sparkify_core::schema::{STAGING_EVENTS, STAGING_SONGS};
use sparkify_core::Config;
use sqlparser::ast::Value;

/// How the warehouse maps JSON objects onto staging columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "uri", rename_all = "lowercase")]
pub enum JsonFormat {
    /// Keys are matched against column names
    Auto,

    /// Columns are filled positionally from the JSONPaths document at this URI
    JsonPaths(String),
}

/// A COPY from object storage into a staging table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    /// Target staging table
    pub table: String,

    /// Object storage prefix to load
    pub source: String,

    /// IAM role the warehouse assumes
    pub iam_role: String,

    /// Region of the source bucket
    pub region: String,

    /// JSON mapping mode
    pub format: JsonFormat,
}

impl CopySpec {
    /// COPY for the event log
    pub fn events(config: &Config) -> Self {
        Self {
            table: STAGING_EVENTS.to_string(),
            source: config.s3.log_data.clone(),
            iam_role: config.iam_role.arn.clone(),
            region: config.s3.region.clone(),
            format: JsonFormat::JsonPaths(config.s3.log_jsonpath.clone()),
        }
    }

    /// COPY for the song metadata
    pub fn songs(config: &Config) -> Self {
        Self {
            table: STAGING_SONGS.to_string(),
            source: config.s3.song_data.clone(),
            iam_role: config.iam_role.arn.clone(),
            region: config.s3.region.clone(),
            format: JsonFormat::Auto,
        }
    }

    /// Render the statement
    ///
    /// Every configured value is emitted as an escaped string literal.
    pub fn to_sql(&self) -> String {
        let format = match &self.format {
            JsonFormat::Auto => literal("auto"),
            JsonFormat::JsonPaths(uri) => literal(uri),
        };

        format!(
            "COPY {} FROM {}\nIAM_ROLE {}\nREGION {}\nFORMAT AS JSON {}",
            self.table,
            literal(&self.source),
            literal(&self.iam_role),
            literal(&self.region),
            format,
        )
    }
}

fn literal(value: &str) -> String {
    Value::SingleQuotedString(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        let mut config = Config::default();
        config.iam_role.arn = "arn:aws:iam::123456789012:role/dwhRole".to_string();
        config
    }

    #[test]
    fn events_copy_uses_jsonpaths() {
        let expected = "\
COPY staging_events FROM 's3://udacity-dend/log_data'
IAM_ROLE 'arn:aws:iam::123456789012:role/dwhRole'
REGION 'us-west-2'
FORMAT AS JSON 's3://udacity-dend/log_json_path.json'";
        assert_eq!(CopySpec::events(&config()).to_sql(), expected);
    }

    #[test]
    fn songs_copy_uses_auto() {
        let expected = "\
COPY staging_songs FROM 's3://udacity-dend/song_data'
IAM_ROLE 'arn:aws:iam::123456789012:role/dwhRole'
REGION 'us-west-2'
FORMAT AS JSON 'auto'";
        assert_eq!(CopySpec::songs(&config()).to_sql(), expected);
    }

    #[test]
    fn configured_values_are_escaped() {
        let mut config = config();
        config.s3.song_data = "s3://bucket/it's".to_string();

        let sql = CopySpec::songs(&config).to_sql();
        assert!(sql.starts_with("COPY staging_songs FROM 's3://bucket/it''s'\n"));
    }

    #[test]
    fn region_follows_config() {
        let mut config = config();
        config.s3.region = "eu-west-1".to_string();
        assert!(CopySpec::events(&config).to_sql().contains("REGION 'eu-west-1'"));
    }
}
