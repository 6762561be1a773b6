//! Staging → star schema transforms
//!
//! Each target table is filled by one `INSERT INTO … SELECT DISTINCT …`.
//! The statements are append-only:
//! - `users`, `artists` and `time` skip keys already present (`NOT IN` anti-join)
//!   but never update existing rows, so a user's `level` change is not applied
//! - `songs` has no guard; re-running it appends duplicate rows
//! - `songplays` joins events to songs on exact title + artist name equality

use serde::{Deserialize, Serialize};
use sparkify_core::schema::{ARTISTS, SONGPLAYS, SONGS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS};

const USERS_INSERT: &str = "\
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT DISTINCT user_id::integer,
                first_name,
                last_name,
                gender,
                level
FROM staging_events
WHERE page = 'NextSong' AND user_id NOT IN (SELECT DISTINCT user_id FROM users)";

const SONGS_INSERT: &str = "\
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT DISTINCT song_id as song_id,
        title as title,
        artist_id as artist_id,
        year as year,
        duration as duration
FROM staging_songs";

const ARTISTS_INSERT: &str = "\
INSERT INTO artists (artist_id, artist_name, location, latitude, longitude)
SELECT DISTINCT s.artist_id as artist_id,
                s.artist_name as artist_name,
                s.artist_location as location,
                s.artist_latitude as latitude,
                s.artist_longitude as longitude
FROM staging_songs s
WHERE artist_id NOT IN (SELECT DISTINCT artist_id FROM artists)";

const SONGPLAYS_INSERT: &str = "\
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT start_time,
        user_id::integer,
        level,
        song_id,
        artist_id,
        session_id,
        location,
        user_agent
FROM staging_events e
JOIN staging_songs s ON (e.song = s.title and e.artist = s.artist_name) AND e.page = 'NextSong'";

const TIME_INSERT: &str = "\
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT  DISTINCT s.start_time as start_time,
                EXTRACT(hour from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as hour,
                EXTRACT(day from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as day,
                EXTRACT(week from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as week,
                EXTRACT(month from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as month,
                EXTRACT(year from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as year,
                EXTRACT(weekday from DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')) as weekday
FROM songplays s
WHERE start_time NOT IN (SELECT DISTINCT start_time FROM time)";

/// Page value that marks a song play in the event log
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One dimensional/fact insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Users,
    Songs,
    Artists,
    Songplays,
    Time,
}

impl Transform {
    /// Inserts in foreign-key order; `Time` reads the fact table so it runs last
    pub const ORDER: [Transform; 5] = [
        Transform::Users,
        Transform::Songs,
        Transform::Artists,
        Transform::Songplays,
        Transform::Time,
    ];

    /// Table the statement appends to
    pub fn target(&self) -> &'static str {
        match self {
            Self::Users => USERS,
            Self::Songs => SONGS,
            Self::Artists => ARTISTS,
            Self::Songplays => SONGPLAYS,
            Self::Time => TIME,
        }
    }

    /// Tables the SELECT reads rows from
    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            Self::Users => &[STAGING_EVENTS],
            Self::Songs | Self::Artists => &[STAGING_SONGS],
            Self::Songplays => &[STAGING_EVENTS, STAGING_SONGS],
            Self::Time => &[SONGPLAYS],
        }
    }

    /// Natural key checked with `NOT IN` against the target, if any
    pub fn guard_key(&self) -> Option<&'static str> {
        match self {
            Self::Users => Some("user_id"),
            Self::Artists => Some("artist_id"),
            Self::Time => Some("start_time"),
            Self::Songs | Self::Songplays => None,
        }
    }

    /// Target columns in insert order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Users => &["user_id", "first_name", "last_name", "gender", "level"],
            Self::Songs => &["song_id", "title", "artist_id", "year", "duration"],
            Self::Artists => &["artist_id", "artist_name", "location", "latitude", "longitude"],
            Self::Songplays => &[
                "start_time",
                "user_id",
                "level",
                "song_id",
                "artist_id",
                "session_id",
                "location",
                "user_agent",
            ],
            Self::Time => &["start_time", "hour", "day", "week", "month", "year", "weekday"],
        }
    }

    /// The statement text
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Users => USERS_INSERT,
            Self::Songs => SONGS_INSERT,
            Self::Artists => ARTISTS_INSERT,
            Self::Songplays => SONGPLAYS_INSERT,
            Self::Time => TIME_INSERT,
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_table_insert", self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkify_core::schema;

    #[test]
    fn columns_exist_on_target() {
        for transform in Transform::ORDER {
            let table = schema::table(transform.target()).unwrap();
            for column in transform.columns() {
                assert!(
                    table.find_column(column).is_some(),
                    "{} has no column {}",
                    table.name,
                    column
                );
            }
        }
    }

    #[test]
    fn sql_names_target_and_columns() {
        for transform in Transform::ORDER {
            let header = format!(
                "INSERT INTO {} ({})",
                transform.target(),
                transform.columns().join(", ")
            );
            assert!(transform.sql().starts_with(&header), "{}", transform);
        }
    }

    #[test]
    fn guarded_inserts_use_not_in() {
        for transform in Transform::ORDER {
            match transform.guard_key() {
                Some(key) => assert!(transform.sql().contains(&format!(
                    "{} NOT IN (SELECT DISTINCT {} FROM {})",
                    key,
                    key,
                    transform.target()
                ))),
                None => assert!(!transform.sql().contains("NOT IN")),
            }
        }
    }

    #[test]
    fn only_next_song_events_are_plays() {
        assert!(Transform::Songplays.sql().contains("e.page = 'NextSong'"));
        assert!(Transform::Users.sql().contains("page = 'NextSong'"));
    }

    #[test]
    fn time_converts_epoch_milliseconds() {
        let sql = Transform::Time.sql();
        assert_eq!(sql.matches("DATEADD(s, s.start_time / 1000, '1970-01-01 00:00:00')").count(), 6);
    }
}
