//! JSON bulk loading for COPY
//!
//! Objects are JSON documents, one or more per object (JSON lines or
//! concatenated). Every object whose URI starts with the COPY source prefix
//! is loaded, in URI order.

use crate::adapter::ExecError;
use crate::value::{Row, Value};
use serde::Deserialize;
use sparkify_core::TableDef;
use sparkify_sql::{CopySpec, JsonFormat};
use std::collections::BTreeMap;

/// In-memory object storage keyed by full URI
pub type ObjectStore = BTreeMap<String, String>;

/// A parsed JSONPaths document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonPaths {
    pub jsonpaths: Vec<String>,
}

/// One step of a JSONPath expression
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// How record fields map onto table columns
enum Mapping {
    /// Top-level key per column, matched case-sensitively
    Auto(Vec<String>),

    /// Parsed path per column
    Paths(Vec<Vec<Segment>>),
}

/// Load every record under the COPY prefix into rows for `table`
pub fn load(store: &ObjectStore, spec: &CopySpec, table: &TableDef) -> Result<Vec<Row>, ExecError> {
    let mapping = match &spec.format {
        JsonFormat::Auto => Mapping::Auto(table.column_names().into_iter().map(str::to_string).collect()),
        JsonFormat::JsonPaths(uri) => Mapping::Paths(read_jsonpaths(store, uri, table)?),
    };

    let objects: Vec<(&String, &String)> = store
        .iter()
        .filter(|(uri, _)| uri.starts_with(&spec.source))
        .collect();

    if objects.is_empty() {
        return Err(ExecError::load(
            &table.name,
            format!("no objects found under '{}'", spec.source),
        ));
    }

    let mut rows = Vec::new();
    for (uri, body) in objects {
        let records = serde_json::Deserializer::from_str(body).into_iter::<serde_json::Value>();
        for record in records {
            let record = record
                .map_err(|e| ExecError::load(&table.name, format!("{}: invalid JSON: {}", uri, e)))?;
            if !record.is_object() {
                return Err(ExecError::load(
                    &table.name,
                    format!("{}: record is not a JSON object", uri),
                ));
            }
            rows.push(to_row(&record, &mapping, table)?);
        }
    }

    Ok(rows)
}

fn read_jsonpaths(
    store: &ObjectStore,
    uri: &str,
    table: &TableDef,
) -> Result<Vec<Vec<Segment>>, ExecError> {
    let body = store
        .get(uri)
        .ok_or_else(|| ExecError::load(&table.name, format!("jsonpaths file '{}' not found", uri)))?;

    let document: JsonPaths = serde_json::from_str(body)
        .map_err(|e| ExecError::load(&table.name, format!("invalid jsonpaths file: {}", e)))?;

    if document.jsonpaths.len() != table.columns.len() {
        return Err(ExecError::load(
            &table.name,
            format!(
                "jsonpaths file has {} expressions but the table has {} columns",
                document.jsonpaths.len(),
                table.columns.len()
            ),
        ));
    }

    document
        .jsonpaths
        .iter()
        .map(|path| parse_path(path).map_err(|reason| ExecError::load(&table.name, reason)))
        .collect()
}

fn to_row(record: &serde_json::Value, mapping: &Mapping, table: &TableDef) -> Result<Row, ExecError> {
    let raw: Vec<Value> = match mapping {
        Mapping::Auto(keys) => {
            let object = record.as_object();
            keys.iter()
                .map(|key| {
                    object
                        .and_then(|o| o.get(key))
                        .map(Value::from_json)
                        .unwrap_or(Value::Null)
                })
                .collect()
        }
        Mapping::Paths(paths) => paths
            .iter()
            .map(|path| resolve(record, path).map(Value::from_json).unwrap_or(Value::Null))
            .collect(),
    };

    raw.into_iter()
        .zip(&table.columns)
        .map(|(value, column)| {
            value.coerce(&column.column_type).map_err(|reason| ExecError::Cast {
                table: table.name.clone(),
                column: column.name.clone(),
                reason,
            })
        })
        .collect()
}

fn resolve<'a>(record: &'a serde_json::Value, path: &[Segment]) -> Option<&'a serde_json::Value> {
    path.iter().try_fold(record, |node, segment| match segment {
        Segment::Key(key) => node.get(key.as_str()),
        Segment::Index(i) => node.get(*i),
    })
}

/// Parse `$['a']`, `$["a"]`, `$.a.b` and `[n]` steps
fn parse_path(path: &str) -> Result<Vec<Segment>, String> {
    let invalid = || format!("invalid JSONPath expression '{}'", path);

    let mut rest = path.trim().strip_prefix('$').ok_or_else(invalid)?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(invalid());
            }
            segments.push(Segment::Key(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(invalid)?;
            let inner = after[..close].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));

            match quoted {
                Some(key) => segments.push(Segment::Key(key.to_string())),
                None => segments.push(Segment::Index(inner.parse().map_err(|_| invalid())?)),
            }
            rest = &after[close + 1..];
        } else {
            return Err(invalid());
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sparkify_core::schema;

    fn spec(source: &str, format: JsonFormat) -> CopySpec {
        CopySpec {
            table: "t".to_string(),
            source: source.to_string(),
            iam_role: "arn:aws:iam::123456789012:role/r".to_string(),
            region: "us-west-2".to_string(),
            format,
        }
    }

    #[test]
    fn path_forms() {
        assert_eq!(parse_path("$['userId']").unwrap(), vec![Segment::Key("userId".into())]);
        assert_eq!(parse_path("$[\"ts\"]").unwrap(), vec![Segment::Key("ts".into())]);
        assert_eq!(
            parse_path("$.a.b[2]").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(2)
            ]
        );
        assert!(parse_path("userId").is_err());
        assert!(parse_path("$").is_err());
        assert!(parse_path("$['open'").is_err());
    }

    #[test]
    fn auto_maps_keys_by_name() {
        let mut store = ObjectStore::new();
        store.insert(
            "s3://bucket/song_data/A/a.json".to_string(),
            r#"{"song_id": "S1", "title": "Tune", "artist_id": "A1", "artist_name": "Band", "year": 2004, "duration": 201.5, "extra": 1}"#.to_string(),
        );

        let rows = load(
            &store,
            &spec("s3://bucket/song_data", JsonFormat::Auto),
            &schema::staging_songs(),
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        let table = schema::staging_songs();
        let at = |name: &str| rows[0][table.column_index(name).unwrap()].clone();
        assert_eq!(at("song_id"), Value::from("S1"));
        assert_eq!(at("year"), Value::Int(2004));
        assert_eq!(at("duration"), Value::Float(201.5));
        assert_eq!(at("artist_location"), Value::Null);
    }

    #[test]
    fn auto_keys_are_case_sensitive() {
        let mut store = ObjectStore::new();
        store.insert(
            "s3://bucket/song_data/a.json".to_string(),
            r#"{"SONG_ID": "S1", "title": "Tune"}"#.to_string(),
        );

        let rows = load(
            &store,
            &spec("s3://bucket/song_data", JsonFormat::Auto),
            &schema::staging_songs(),
        )
        .unwrap();

        let table = schema::staging_songs();
        assert_eq!(rows[0][table.column_index("song_id").unwrap()], Value::Null);
        assert_eq!(rows[0][table.column_index("title").unwrap()], Value::from("Tune"));
    }

    #[test]
    fn multiple_records_per_object() {
        let mut store = ObjectStore::new();
        store.insert(
            "s3://bucket/song_data/a.json".to_string(),
            "{\"song_id\": \"S1\"}\n{\"song_id\": \"S2\"}\n".to_string(),
        );
        store.insert("s3://bucket/other/b.json".to_string(), "{\"song_id\": \"S3\"}".to_string());

        let rows = load(
            &store,
            &spec("s3://bucket/song_data", JsonFormat::Auto),
            &schema::staging_songs(),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn empty_prefix_fails() {
        let err = load(
            &ObjectStore::new(),
            &spec("s3://bucket/song_data", JsonFormat::Auto),
            &schema::staging_songs(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Load { .. }));
    }

    #[test]
    fn jsonpaths_length_must_match_columns() {
        let mut store = ObjectStore::new();
        store.insert("s3://bucket/paths.json".to_string(), r#"{"jsonpaths": ["$['a']"]}"#.to_string());
        store.insert("s3://bucket/log_data/x.json".to_string(), "{}".to_string());

        let err = load(
            &store,
            &spec(
                "s3://bucket/log_data",
                JsonFormat::JsonPaths("s3://bucket/paths.json".to_string()),
            ),
            &schema::staging_events(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 expressions"));
    }

    #[test]
    fn mistyped_value_is_a_cast_error() {
        let mut store = ObjectStore::new();
        store.insert(
            "s3://bucket/song_data/a.json".to_string(),
            r#"{"song_id": "S1", "year": "nineteen"}"#.to_string(),
        );

        let err = load(
            &store,
            &spec("s3://bucket/song_data", JsonFormat::Auto),
            &schema::staging_songs(),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Cast { ref column, .. } if column == "year"));
    }
}
