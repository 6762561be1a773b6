//! Evaluation of the insert transforms over in-memory tables
//!
//! Each function mirrors the SELECT of one insert statement and returns
//! distinct rows in the statement's column order, first occurrence first.

use crate::adapter::ExecError;
use crate::calendar;
use crate::value::{not_in, Row, Value};
use sparkify_core::schema::{ARTISTS, SONGPLAYS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS};
use sparkify_core::TableDef;
use sparkify_sql::{Transform, NEXT_SONG_PAGE};
use std::collections::HashSet;

/// A table's definition and rows, borrowed for reading
#[derive(Debug, Clone, Copy)]
pub struct Relation<'a> {
    pub definition: &'a TableDef,
    pub rows: &'a [Row],
}

impl<'a> Relation<'a> {
    /// Column accessor for rows of this relation
    fn column(&self, name: &str) -> Result<Column, ExecError> {
        self.definition
            .column_index(name)
            .map(Column)
            .ok_or_else(|| ExecError::Unsupported(format!("{}.{} does not exist", self.definition.name, name)))
    }

    /// Every value of one column
    fn values(&self, name: &str) -> Result<Vec<Value>, ExecError> {
        let column = self.column(name)?;
        Ok(self.rows.iter().map(|row| column.get(row).clone()).collect())
    }
}

#[derive(Debug, Clone, Copy)]
struct Column(usize);

impl Column {
    fn get<'r>(&self, row: &'r Row) -> &'r Value {
        row.get(self.0).unwrap_or(&Value::Null)
    }
}

/// Rows the SELECT of `transform` produces
pub fn select<'a, F>(transform: Transform, lookup: F) -> Result<Vec<Row>, ExecError>
where
    F: Fn(&str) -> Result<Relation<'a>, ExecError>,
{
    match transform {
        Transform::Users => users(lookup(STAGING_EVENTS)?, lookup(USERS)?),
        Transform::Songs => songs(lookup(STAGING_SONGS)?),
        Transform::Artists => artists(lookup(STAGING_SONGS)?, lookup(ARTISTS)?),
        Transform::Songplays => songplays(lookup(STAGING_EVENTS)?, lookup(STAGING_SONGS)?),
        Transform::Time => time(lookup(SONGPLAYS)?, lookup(TIME)?),
    }
}

fn is_true(result: Option<bool>) -> bool {
    result == Some(true)
}

fn cast_integer(value: &Value, table: &str, column: &str) -> Result<Value, ExecError> {
    value.cast_integer().map_err(|reason| ExecError::Cast {
        table: table.to_string(),
        column: column.to_string(),
        reason,
    })
}

fn distinct(rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(row.clone())).collect()
}

fn users(events: Relation<'_>, users: Relation<'_>) -> Result<Vec<Row>, ExecError> {
    let existing = users.values("user_id")?;
    let page = events.column("page")?;
    let user_id = events.column("user_id")?;
    let projected = ["first_name", "last_name", "gender", "level"]
        .iter()
        .map(|name| events.column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let next_song = Value::from(NEXT_SONG_PAGE);
    let mut rows = Vec::new();
    for row in events.rows {
        if !is_true(page.get(row).sql_eq(&next_song)) || !not_in(user_id.get(row), &existing) {
            continue;
        }

        let mut out = vec![cast_integer(user_id.get(row), STAGING_EVENTS, "user_id")?];
        out.extend(projected.iter().map(|c| c.get(row).clone()));
        rows.push(out);
    }

    Ok(distinct(rows))
}

fn songs(staged: Relation<'_>) -> Result<Vec<Row>, ExecError> {
    let columns = ["song_id", "title", "artist_id", "year", "duration"]
        .iter()
        .map(|name| staged.column(name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(distinct(
        staged
            .rows
            .iter()
            .map(|row| columns.iter().map(|c| c.get(row).clone()).collect()),
    ))
}

fn artists(staged: Relation<'_>, artists: Relation<'_>) -> Result<Vec<Row>, ExecError> {
    let existing = artists.values("artist_id")?;
    let artist_id = staged.column("artist_id")?;
    let columns = [
        "artist_id",
        "artist_name",
        "artist_location",
        "artist_latitude",
        "artist_longitude",
    ]
    .iter()
    .map(|name| staged.column(name))
    .collect::<Result<Vec<_>, _>>()?;

    Ok(distinct(
        staged
            .rows
            .iter()
            .filter(|row| not_in(artist_id.get(row), &existing))
            .map(|row| columns.iter().map(|c| c.get(row).clone()).collect()),
    ))
}

fn songplays(events: Relation<'_>, staged: Relation<'_>) -> Result<Vec<Row>, ExecError> {
    let song = events.column("song")?;
    let artist = events.column("artist")?;
    let page = events.column("page")?;
    let start_time = events.column("start_time")?;
    let user_id = events.column("user_id")?;
    let level = events.column("level")?;
    let session_id = events.column("session_id")?;
    let location = events.column("location")?;
    let user_agent = events.column("user_agent")?;

    let title = staged.column("title")?;
    let artist_name = staged.column("artist_name")?;
    let song_id = staged.column("song_id")?;
    let artist_id = staged.column("artist_id")?;

    let next_song = Value::from(NEXT_SONG_PAGE);
    let mut rows = Vec::new();
    for e in events.rows {
        if !is_true(page.get(e).sql_eq(&next_song)) {
            continue;
        }

        for s in staged.rows {
            let matched = is_true(song.get(e).sql_eq(title.get(s)))
                && is_true(artist.get(e).sql_eq(artist_name.get(s)));
            if !matched {
                continue;
            }

            rows.push(vec![
                start_time.get(e).clone(),
                cast_integer(user_id.get(e), STAGING_EVENTS, "user_id")?,
                level.get(e).clone(),
                song_id.get(s).clone(),
                artist_id.get(s).clone(),
                session_id.get(e).clone(),
                location.get(e).clone(),
                user_agent.get(e).clone(),
            ]);
        }
    }

    Ok(distinct(rows))
}

fn time(songplays: Relation<'_>, time: Relation<'_>) -> Result<Vec<Row>, ExecError> {
    let existing = time.values("start_time")?;
    let start_time = songplays.column("start_time")?;

    let mut rows = Vec::new();
    for row in songplays.rows {
        let value = start_time.get(row);
        if !not_in(value, &existing) {
            continue;
        }

        let ms = match cast_integer(value, SONGPLAYS, "start_time")? {
            Value::Int(ms) => ms,
            _ => {
                rows.push(vec![Value::Null; 7]);
                continue;
            }
        };
        let parts = calendar::from_epoch_millis(ms).ok_or_else(|| ExecError::Cast {
            table: SONGPLAYS.to_string(),
            column: "start_time".to_string(),
            reason: format!("timestamp out of range: {}", ms),
        })?;

        rows.push(vec![
            Value::Int(ms),
            Value::Int(parts.hour),
            Value::Int(parts.day),
            Value::Int(parts.week),
            Value::Int(parts.month),
            Value::Int(parts.year),
            Value::Int(parts.weekday),
        ]);
    }

    Ok(distinct(rows))
}
