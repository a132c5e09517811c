/**
 * Functions and data structures for reading and writing attempt records.
 *
 * Records live in a loosely-typed key-value store whose payloads may be stale,
 * hand-edited or corrupted, so every read goes through a defensive decoder and no
 * storage failure is ever returned to the caller.
 */
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::common::{Mode, QuizError, Result, Topic};

/// Key of the list of practice-mode records.
pub const PROGRESS_KEY: &str = "progress";
/// Key of the list of exam-mode records.
pub const EXAMS_KEY: &str = "exams";

/// The persisted outcome of one completed session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub topic: Topic,
    /// Always between 0 and 100.
    pub percentage: u8,
    pub mode: Mode,
    /// Distinct concept tags that were missed at least once.
    pub weak_areas: Vec<String>,
    #[serde(with = "iso_date")]
    pub date: DateTime<Utc>,
}

/// Durable storage of record lists.
///
/// Implementations must never fail loudly: `load` returns an empty vector when the key
/// is missing or its payload cannot be decoded, and `save` returns `false` when the
/// write did not happen.
pub trait RecordStore {
    fn load(&self, key: &str) -> Vec<Record>;
    fn save(&self, key: &str, records: &[Record]) -> bool;
}

/// The store key for records of the given mode.
pub fn key_for_mode(mode: Mode) -> &'static str {
    match mode {
        Mode::Practice => PROGRESS_KEY,
        Mode::Exam => EXAMS_KEY,
    }
}

/// Append `record` to the list under `key`. Returns `false` if the list could not be
/// written back.
pub fn append_record<S: RecordStore + ?Sized>(store: &S, key: &str, record: Record) -> bool {
    let mut records = store.load(key);
    records.push(record);
    let saved = store.save(key, &records);
    if saved {
        info!(key, total = records.len(), "record saved");
    } else {
        warn!(key, "record could not be saved and will not survive a restart");
    }
    saved
}

/// Decode a serialized list of records, dropping any entry that cannot be repaired.
/// `key` decides the mode of every entry; a stored mode that disagrees is overridden.
pub fn decode_records(key: &str, data: &str) -> Vec<Record> {
    let payload: serde_json::Value = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(key, error = %e, "discarding undecodable record payload");
            return Vec::new();
        }
    };

    let entries = match payload.as_array() {
        Some(entries) => entries,
        None => {
            warn!(key, "discarding record payload that is not an array");
            return Vec::new();
        }
    };

    let mode = if key == EXAMS_KEY { Mode::Exam } else { Mode::Practice };
    let mut records = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match decode_record(entry, mode) {
            Some(record) => records.push(record),
            None => warn!(key, index = i, "dropping malformed record"),
        }
    }
    records
}

pub fn encode_records(records: &[Record]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

fn decode_record(entry: &serde_json::Value, mode: Mode) -> Option<Record> {
    let object = entry.as_object()?;

    let topic = object
        .get("topic")
        .and_then(|topic| topic.as_str())
        .and_then(|topic| topic.parse::<Topic>().ok())?;

    let percentage = object.get("percentage").and_then(|p| p.as_f64())?;
    if !percentage.is_finite() {
        return None;
    }
    let percentage = percentage.round().max(0.0).min(100.0) as u8;

    let date = object
        .get("date")
        .and_then(|date| date.as_str())
        .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
        .map(|date| date.with_timezone(&Utc))?;

    // The key decides the mode so that each list only ever holds one kind of record.
    if let Some(stored) = object.get("mode").and_then(|m| m.as_str()) {
        if stored != mode.as_str() {
            debug!(stored, expected = %mode, "repairing record mode");
        }
    }

    let mut weak_areas: Vec<String> = Vec::new();
    if let Some(areas) = object.get("weakAreas").and_then(|areas| areas.as_array()) {
        for area in areas.iter().filter_map(|area| area.as_str()) {
            if !weak_areas.iter().any(|seen| seen == area) {
                weak_areas.push(area.to_string());
            }
        }
    }

    Some(Record {
        topic,
        percentage,
        mode,
        weak_areas,
        date,
    })
}

/// Dates are written in the `2024-01-01T12:00:00.000Z` form.
mod iso_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|date| date.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Format a date the way records store it.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Keeps each list as a pretty-printed JSON file in a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        JsonFileStore { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        let mut builder = self.dir.clone();
        builder.push(format!("{}.json", key));
        builder
    }

    fn write(&self, key: &str, records: &[Record]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), encode_records(records)?)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, key: &str) -> Vec<Record> {
        match fs::read_to_string(self.path(key)) {
            Ok(data) => decode_records(key, &data),
            Err(_) => Vec::new(),
        }
    }

    fn save(&self, key: &str, records: &[Record]) -> bool {
        match self.write(key, records) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to write record file");
                false
            }
        }
    }
}

/// Keeps each list as a JSON value in a single-table SQLite database.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self> {
        connection.execute(
            "
            CREATE TABLE IF NOT EXISTS store(
              key TEXT NOT NULL PRIMARY KEY CHECK(key != ''),
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
            [],
        )?;
        Ok(SqliteStore { connection })
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .connection
            .query_row("SELECT value FROM store WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, records: &[Record]) -> Result<()> {
        let value = encode_records(records)?;
        self.connection.execute(
            "
            INSERT INTO store(key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
              value = excluded.value,
              updated_at = CURRENT_TIMESTAMP
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Store a raw payload under `key`, bypassing encoding.
    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.connection.execute(
            "INSERT OR REPLACE INTO store(key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn load(&self, key: &str) -> Vec<Record> {
        match self.read(key) {
            Ok(Some(data)) => decode_records(key, &data),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "failed to read records from database");
                Vec::new()
            }
        }
    }

    fn save(&self, key: &str, records: &[Record]) -> bool {
        match self.write(key, records) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to write records to database");
                false
            }
        }
    }
}

/// An in-process store. Payloads are kept serialized so that reads exercise the same
/// decoder as the durable stores.
#[derive(Default)]
pub struct MemoryStore {
    data: RefCell<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store on which every save fails, as when the storage quota is exhausted.
    pub fn failing() -> Self {
        MemoryStore { data: RefCell::new(HashMap::new()), fail_writes: true }
    }

    /// Store a raw payload under `key`, bypassing encoding.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, key: &str) -> Vec<Record> {
        match self.data.borrow().get(key) {
            Some(data) => decode_records(key, data),
            None => Vec::new(),
        }
    }

    fn save(&self, key: &str, records: &[Record]) -> bool {
        if self.fail_writes {
            return false;
        }
        match encode_records(records) {
            Ok(data) => {
                self.data.borrow_mut().insert(key.to_string(), data);
                true
            }
            Err(_) => false,
        }
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn load(&self, key: &str) -> Vec<Record> {
        (**self).load(key)
    }

    fn save(&self, key: &str, records: &[Record]) -> bool {
        (**self).save(key, records)
    }
}

/// The default directory for application data.
pub fn get_app_dir_path() -> PathBuf {
    let mut dirpath = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    dirpath.push("selfcheck");
    dirpath
}

/// Create the application directory if it does not exist and return its path.
pub fn require_app_dir_path(dir: Option<&Path>) -> Result<PathBuf> {
    let dirpath = match dir {
        Some(dir) => dir.to_path_buf(),
        None => get_app_dir_path(),
    };
    if !dirpath.exists() {
        fs::create_dir_all(&dirpath).or(Err(QuizError::CannotMakeAppDir(dirpath.clone())))?;
    }
    Ok(dirpath)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn record(topic: Topic, percentage: u8) -> Record {
        Record {
            topic,
            percentage,
            mode: Mode::Practice,
            weak_areas: vec![String::from("division")],
            date: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn record_has_expected_wire_shape() {
        let json = serde_json::to_value(&record(Topic::Mathematics, 80)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "topic": "mathematics",
                "percentage": 80,
                "mode": "practice",
                "weakAreas": ["division"],
                "date": "2024-01-01T12:00:00.000Z"
            })
        );
    }

    #[test]
    fn malformed_payloads_decode_to_empty() {
        assert!(decode_records(PROGRESS_KEY, "not json").is_empty());
        assert!(decode_records(PROGRESS_KEY, "{\"topic\": \"science\"}").is_empty());
        assert!(decode_records(PROGRESS_KEY, "null").is_empty());
        assert!(decode_records(PROGRESS_KEY, "").is_empty());
    }

    #[test]
    fn malformed_entries_are_dropped_or_repaired() {
        let data = r#"[
          {"topic": "science", "percentage": 140, "weakAreas": ["cells", 4, "cells"],
           "date": "2024-03-01T08:00:00.000Z"},
          {"topic": "history", "percentage": 50, "date": "2024-03-01T08:00:00.000Z"},
          {"topic": "science", "percentage": "fifty", "date": "2024-03-01T08:00:00.000Z"},
          {"topic": "science", "percentage": 50, "date": "yesterday"},
          {"topic": "language", "percentage": -3.6, "mode": "exam",
           "date": "2024-03-02T08:00:00+02:00"},
          7
        ]"#;
        let records = decode_records(EXAMS_KEY, data);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].topic, Topic::Science);
        assert_eq!(records[0].percentage, 100);
        assert_eq!(records[0].mode, Mode::Exam);
        assert_eq!(records[0].weak_areas, vec![String::from("cells")]);

        assert_eq!(records[1].percentage, 0);
        assert_eq!(records[1].date, Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap());
    }

    #[test]
    fn list_key_decides_record_mode() {
        let data = r#"[
          {"topic": "science", "percentage": 90, "mode": "exam",
           "date": "2024-03-01T08:00:00.000Z"},
          {"topic": "science", "percentage": 60, "mode": "practice",
           "date": "2024-03-02T08:00:00.000Z"}
        ]"#;
        let progress = decode_records(PROGRESS_KEY, data);
        assert_eq!(progress.len(), 2);
        assert!(progress.iter().all(|r| r.mode == Mode::Practice));

        let exams = decode_records(EXAMS_KEY, data);
        assert!(exams.iter().all(|r| r.mode == Mode::Exam));
    }

    #[test]
    fn weak_areas_keep_their_order() {
        let store = MemoryStore::new();
        let mut r = record(Topic::Mathematics, 40);
        r.weak_areas = vec![String::from("roots"), String::from("algebra")];
        assert!(append_record(&store, PROGRESS_KEY, r.clone()));
        assert_eq!(store.load(PROGRESS_KEY), vec![r]);

        let data = r#"[{"topic": "science", "percentage": 50, "date": "2024-03-01T08:00:00.000Z",
                        "weakAreas": ["physics", "chemistry", "physics"]}]"#;
        let records = decode_records(PROGRESS_KEY, data);
        assert_eq!(records[0].weak_areas, vec!["physics", "chemistry"]);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load(PROGRESS_KEY).is_empty());

        let first = record(Topic::Science, 40);
        let second = record(Topic::Language, 90);
        assert!(append_record(&store, PROGRESS_KEY, first.clone()));
        assert!(append_record(&store, PROGRESS_KEY, second.clone()));
        assert_eq!(store.load(PROGRESS_KEY), vec![first, second]);
        assert!(store.load(EXAMS_KEY).is_empty());
    }

    #[test]
    fn failing_store_reports_false() {
        let store = MemoryStore::failing();
        assert!(!append_record(&store, EXAMS_KEY, record(Topic::Science, 40)));
        assert!(store.load(EXAMS_KEY).is_empty());
    }

    #[test]
    fn json_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data"));
        assert!(store.load(PROGRESS_KEY).is_empty());

        let r = record(Topic::Mathematics, 70);
        assert!(append_record(&store, PROGRESS_KEY, r.clone()));
        assert_eq!(store.load(PROGRESS_KEY), vec![r]);
        assert!(store.path(PROGRESS_KEY).exists());

        fs::write(store.path(EXAMS_KEY), "{corrupt").unwrap();
        assert!(store.load(EXAMS_KEY).is_empty());
    }

    #[test]
    fn sqlite_store_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record(Topic::Language, 55);
        assert!(append_record(&store, EXAMS_KEY, r.clone()));
        assert!(append_record(&store, EXAMS_KEY, r.clone()));
        assert_eq!(store.load(EXAMS_KEY).len(), 2);

        store.put_raw(PROGRESS_KEY, "[1, 2, 3]").unwrap();
        assert!(store.load(PROGRESS_KEY).is_empty());
    }
}
