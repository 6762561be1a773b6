//! Test fixtures for pipeline integration tests
//!
//! Event records use the camelCase keys of the raw event log and are loaded
//! through a JSONPaths document. Song records use the staging column names.

#![allow(dead_code)]

use serde_json::json;
use sparkify_core::Config;
use sparkify_warehouse::MemoryWarehouse;

pub const LOG_DATA: &str = "s3://sparkify-test/log_data";
pub const SONG_DATA: &str = "s3://sparkify-test/song_data";
pub const LOG_JSONPATH: &str = "s3://sparkify-test/log_json_path.json";

/// 2018-11-12 02:40:00 UTC, a Monday
pub const MONDAY_TS: i64 = 1_541_990_400_000;

pub fn config() -> Config {
    let mut config = Config::default();
    config.s3.log_data = LOG_DATA.to_string();
    config.s3.song_data = SONG_DATA.to_string();
    config.s3.log_jsonpath = LOG_JSONPATH.to_string();
    config.iam_role.arn = "arn:aws:iam::123456789012:role/dwhRole".to_string();
    config
}

/// JSONPaths document in `staging_events` column order
pub fn jsonpaths() -> String {
    let keys = [
        "artist",
        "auth",
        "firstName",
        "gender",
        "itemInSession",
        "lastName",
        "length",
        "level",
        "location",
        "method",
        "page",
        "registration",
        "sessionId",
        "song",
        "status",
        "ts",
        "userAgent",
        "userId",
    ];
    let paths: Vec<String> = keys.iter().map(|k| format!("$['{}']", k)).collect();
    json!({ "jsonpaths": paths }).to_string()
}

/// An event log record
pub fn event(page: &str, user_id: &str, level: &str, song: &str, artist: &str, ts: i64) -> serde_json::Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Kaylee",
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Summers",
        "length": 223.60771,
        "level": level,
        "location": "Phoenix-Mesa-Scottsdale, AZ",
        "method": "PUT",
        "page": page,
        "registration": 1540344794796.0,
        "sessionId": 139,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id,
    })
}

/// A NextSong event for user 39 on the free level
pub fn play(song: &str, artist: &str, ts: i64) -> serde_json::Value {
    event("NextSong", "39", "free", song, artist, ts)
}

/// A song metadata record
pub fn song(song_id: &str, title: &str, artist_id: &str, artist_name: &str) -> serde_json::Value {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": null,
        "artist_longitude": null,
        "artist_location": "",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": 152.92036,
        "year": 0,
    })
}

/// Replace the objects under both prefixes
pub async fn stage(warehouse: &MemoryWarehouse, events: &[serde_json::Value], songs: &[serde_json::Value]) {
    warehouse.put_object(LOG_JSONPATH, jsonpaths()).await;
    warehouse
        .put_object(format!("{}/2018/11/2018-11-12-events.json", LOG_DATA), json_lines(events))
        .await;
    warehouse
        .put_object(format!("{}/A/A/A/songs.json", SONG_DATA), json_lines(songs))
        .await;
}

fn json_lines(records: &[serde_json::Value]) -> String {
    records
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
