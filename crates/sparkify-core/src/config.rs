//! Configuration schema (dwh.toml)
//!
//! The file mirrors the `[S3]` / `[IAM_ROLE]` layout of the classic `dwh.cfg`
//! so existing key names keep working:
//!
//! ```toml
//! [S3]
//! LOG_DATA = "s3://udacity-dend/log_data"
//! SONG_DATA = "s3://udacity-dend/song_data"
//! LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
//!
//! [IAM_ROLE]
//! ARN = "arn:aws:iam::123456789012:role/dwhRole"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Region used by the COPY statements when the config does not name one
pub const DEFAULT_REGION: &str = "us-west-2";

/// Environment variables that override file values
pub const ENV_LOG_DATA: &str = "SPARKIFY_LOG_DATA";
pub const ENV_SONG_DATA: &str = "SPARKIFY_SONG_DATA";
pub const ENV_LOG_JSONPATH: &str = "SPARKIFY_LOG_JSONPATH";
pub const ENV_REGION: &str = "SPARKIFY_REGION";
pub const ENV_IAM_ROLE_ARN: &str = "SPARKIFY_IAM_ROLE_ARN";

static S3_URI_RE: OnceLock<Regex> = OnceLock::new();
static IAM_ARN_RE: OnceLock<Regex> = OnceLock::new();
static REGION_RE: OnceLock<Regex> = OnceLock::new();

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Object storage locations of the raw data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Prefix holding the event log JSON files
    #[serde(rename = "LOG_DATA")]
    pub log_data: String,

    /// Prefix holding the song metadata JSON files
    #[serde(rename = "SONG_DATA")]
    pub song_data: String,

    /// JSONPaths document mapping event JSON fields to staging columns
    #[serde(rename = "LOG_JSONPATH")]
    pub log_jsonpath: String,

    /// Bucket region
    #[serde(rename = "REGION", default = "default_region")]
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            log_data: "s3://udacity-dend/log_data".to_string(),
            song_data: "s3://udacity-dend/song_data".to_string(),
            log_jsonpath: "s3://udacity-dend/log_json_path.json".to_string(),
            region: default_region(),
        }
    }
}

/// Role the warehouse assumes to read object storage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IamRoleConfig {
    #[serde(rename = "ARN")]
    pub arn: String,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Object storage locations
    #[serde(rename = "S3", default)]
    pub s3: S3Config,

    /// Credentials reference for COPY
    #[serde(rename = "IAM_ROLE", default)]
    pub iam_role: IamRoleConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Empty values are ignored so an unset-but-exported variable does not
    /// blank out the file value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut String); 5] = [
            (ENV_LOG_DATA, &mut self.s3.log_data),
            (ENV_SONG_DATA, &mut self.s3.song_data),
            (ENV_LOG_JSONPATH, &mut self.s3.log_jsonpath),
            (ENV_REGION, &mut self.s3.region),
            (ENV_IAM_ROLE_ARN, &mut self.iam_role.arn),
        ];

        for (key, slot) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    /// Check that every value has the shape the COPY statements expect
    ///
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s3_uri = S3_URI_RE.get_or_init(|| {
            Regex::new(r"^s3://[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9](/[^'\s]*)?$").expect("valid regex")
        });
        let iam_arn = IAM_ARN_RE.get_or_init(|| {
            Regex::new(r"^arn:aws[a-z\-]*:iam::\d{12}:role/[\w+=,.@/\-]+$").expect("valid regex")
        });
        let region = REGION_RE
            .get_or_init(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("valid regex"));

        for (key, value) in [
            ("S3.LOG_DATA", &self.s3.log_data),
            ("S3.SONG_DATA", &self.s3.song_data),
            ("S3.LOG_JSONPATH", &self.s3.log_jsonpath),
        ] {
            if !s3_uri.is_match(value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("expected an s3:// URI, got '{}'", value),
                });
            }
        }

        if !region.is_match(&self.s3.region) {
            return Err(ConfigError::InvalidValue {
                key: "S3.REGION".to_string(),
                reason: format!("'{}' is not a region name", self.s3.region),
            });
        }

        if !iam_arn.is_match(&self.iam_role.arn) {
            return Err(ConfigError::InvalidValue {
                key: "IAM_ROLE.ARN".to_string(),
                reason: format!("'{}' is not an IAM role ARN", self.iam_role.arn),
            });
        }

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[S3]
LOG_DATA = "s3://udacity-dend/log_data"
SONG_DATA = "s3://udacity-dend/song_data"
LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"

[IAM_ROLE]
ARN = "arn:aws:iam::123456789012:role/dwhRole"
"#;

    #[test]
    fn parses_dwh_layout() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.s3.log_data, "s3://udacity-dend/log_data");
        assert_eq!(config.s3.log_jsonpath, "s3://udacity-dend/log_json_path.json");
        assert_eq!(config.s3.region, DEFAULT_REGION);
        assert_eq!(config.iam_role.arn, "arn:aws:iam::123456789012:role/dwhRole");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_region_is_kept() {
        let toml = SAMPLE.replace(
            "LOG_JSONPATH = \"s3://udacity-dend/log_json_path.json\"",
            "LOG_JSONPATH = \"s3://udacity-dend/log_json_path.json\"\nREGION = \"eu-central-1\"",
        );
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.s3.region, "eu-central-1");
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let err = Config::from_toml("[S3]\nLOG_DATA = \"s3://a/b\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn default_config_needs_a_role() {
        let err = Config::default().validate().unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "IAM_ROLE.ARN"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_quote_in_uri() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.s3.song_data = "s3://bucket/x' IAM_ROLE 'y".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("S3.SONG_DATA"));
    }

    #[test]
    fn overrides_replace_non_empty_values() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SONG_DATA, "s3://other-bucket/songs"),
            (ENV_REGION, ""),
        ]);

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.s3.song_data, "s3://other-bucket/songs");
        assert_eq!(config.s3.region, DEFAULT_REGION);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dwh.toml");

        let config = Config::from_toml(SAMPLE).unwrap();
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }
}
