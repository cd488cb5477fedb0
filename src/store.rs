//! SQLite-backed project storage.
//!
//! One project = one SQLite file holding everything the parsers extracted:
//! source files, deduplicated category/name strings, the shared tick table,
//! tags, and a single-row settings blob. Writes happen inside per-file
//! transactions driven by the ingest pipeline; reads stream back in
//! ascending epoch order so the series model can rebuild in one linear
//! pass.
//!
//! Failure semantics: open/validation returns a [`StoreError`], but every
//! add/iterate call captures SQL failures internally; they are logged and
//! surface as `false`/`None`/empty results, never as panics or `Err`.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::color::Color;
use crate::types::{EpochTime, SignalTag, SourceFile, TickKind};

/// SQLite's fixed 16-byte file header. Anything else is not a project.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS signal_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT UNIQUE NOT NULL
);
CREATE TABLE IF NOT EXISTS signal_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT UNIQUE NOT NULL
);
CREATE TABLE IF NOT EXISTS signal_names (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);
CREATE TABLE IF NOT EXISTS signal_ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    name_id INTEGER NOT NULL,
    epoch_time REAL NOT NULL,
    value REAL,
    string TEXT,
    status INTEGER NOT NULL DEFAULT 0,
    \"desc\" TEXT
);
CREATE TABLE IF NOT EXISTS signal_tags (
    epoch_time REAL UNIQUE NOT NULL,
    color TEXT NOT NULL,
    name TEXT NOT NULL,
    help TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS app_settings (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    settings TEXT NOT NULL
);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not a project file (bad magic header): {0}")]
    NotAProject(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One tick row as streamed back by [`SignalStore::for_each_tick`], with
/// category/name already joined to their strings.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRow {
    pub source_id: i64,
    pub category: String,
    pub name: String,
    pub time: EpochTime,
    pub value: Option<f64>,
    pub string: Option<String>,
    pub status: i64,
    pub desc: Option<String>,
}

/// Handle on an open project database.
pub struct SignalStore {
    conn: Connection,
}

impl SignalStore {
    /// Open (or create) a project file.
    ///
    /// An existing non-empty file must start with the SQLite magic header,
    /// otherwise it is rejected before SQLite ever touches it. The schema
    /// is created idempotently on every open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        validate_magic(path)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        apply_pragmas(&conn);
        conn.execute_batch(SCHEMA_SQL)?;

        log::info!("Project store open: {}", path.display());
        Ok(Self { conn })
    }

    /// Empty all data tables, preserving the settings row.
    ///
    /// Called at the start of every ingest run so the project reflects
    /// exactly the configured source files.
    pub fn clear_data(&self) -> bool {
        let result = self.conn.execute_batch(
            "DELETE FROM signal_ticks;
             DELETE FROM signal_tags;
             DELETE FROM signal_sources;
             DELETE FROM signal_categories;
             DELETE FROM signal_names;",
        );
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to clear project data: {}", e);
                false
            }
        }
    }

    /// Begin the transaction wrapping one source file's writes.
    ///
    /// Dropping the returned guard without [`StoreTx::commit`] rolls the
    /// whole file back.
    pub fn transaction(&mut self) -> Result<StoreTx<'_>, StoreError> {
        let tx = self.conn.transaction()?;
        Ok(StoreTx { tx })
    }

    /// Stream source files in insertion order.
    pub fn for_each_source<F: FnMut(SourceFile)>(&self, mut f: F) -> bool {
        let mut run = || -> rusqlite::Result<()> {
            let mut stmt = self
                .conn
                .prepare("SELECT id, source FROM signal_sources ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok(SourceFile {
                    id: row.get(0)?,
                    path: row.get(1)?,
                })
            })?;
            for row in rows {
                f(row?);
            }
            Ok(())
        };
        log_on_error(run(), "read source files")
    }

    /// Stream every tick in ascending epoch order.
    ///
    /// Ties are broken by rowid, i.e. insertion order, which is what makes
    /// same-epoch ticks from different files come back deterministically.
    pub fn for_each_tick<F: FnMut(TickRow)>(&self, mut f: F) -> bool {
        let mut run = || -> rusqlite::Result<()> {
            let mut stmt = self.conn.prepare(
                "SELECT t.source_id, c.category, n.name, t.epoch_time,
                        t.value, t.string, t.status, t.\"desc\"
                 FROM signal_ticks t
                 JOIN signal_categories c ON c.id = t.category_id
                 JOIN signal_names n ON n.id = t.name_id
                 ORDER BY t.epoch_time ASC, t.id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(TickRow {
                    source_id: row.get(0)?,
                    category: row.get(1)?,
                    name: row.get(2)?,
                    time: row.get(3)?,
                    value: row.get(4)?,
                    string: row.get(5)?,
                    status: row.get(6)?,
                    desc: row.get(7)?,
                })
            })?;
            for row in rows {
                f(row?);
            }
            Ok(())
        };
        log_on_error(run(), "read ticks")
    }

    /// Stream tags in ascending epoch order.
    pub fn for_each_tag<F: FnMut(SignalTag)>(&self, mut f: F) -> bool {
        let mut run = || -> rusqlite::Result<()> {
            let mut stmt = self.conn.prepare(
                "SELECT epoch_time, color, name, help
                 FROM signal_tags ORDER BY epoch_time ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let color: String = row.get(1)?;
                Ok(SignalTag {
                    time: row.get(0)?,
                    color: Color::from_rgba_string(&color),
                    name: row.get(2)?,
                    help: row.get(3)?,
                })
            })?;
            for row in rows {
                f(row?);
            }
            Ok(())
        };
        log_on_error(run(), "read tags")
    }

    /// Create-or-update the single settings row.
    pub fn save_settings(&self, settings: &str) -> bool {
        let result = self.conn.execute(
            "INSERT INTO app_settings (id, settings) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET settings = excluded.settings",
            params![settings],
        );
        match result {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to save settings: {}", e);
                false
            }
        }
    }

    /// Load the settings blob, `None` when never saved (or on error).
    pub fn load_settings(&self) -> Option<String> {
        let result = self
            .conn
            .query_row("SELECT settings FROM app_settings WHERE id = 0", [], |row| {
                row.get(0)
            })
            .optional();
        match result {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load settings: {}", e);
                None
            }
        }
    }
}

/// Transaction guard covering one source file. All add operations follow
/// the capture-and-log contract: a SQL failure returns `false`/`None` and
/// never unwinds into the parser.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl StoreTx<'_> {
    /// Insert-or-ignore the source path, returning its row id.
    pub fn add_source_file(&self, path: &str) -> Option<i64> {
        insert_or_get_id(
            &self.tx,
            "INSERT OR IGNORE INTO signal_sources (source) VALUES (?1)",
            "SELECT id FROM signal_sources WHERE source = ?1",
            path,
        )
    }

    /// Insert-or-ignore a category string, returning its row id.
    pub fn add_signal_category(&self, category: &str) -> Option<i64> {
        insert_or_get_id(
            &self.tx,
            "INSERT OR IGNORE INTO signal_categories (category) VALUES (?1)",
            "SELECT id FROM signal_categories WHERE category = ?1",
            category,
        )
    }

    /// Insert-or-ignore a signal name string, returning its row id.
    pub fn add_signal_name(&self, name: &str) -> Option<i64> {
        insert_or_get_id(
            &self.tx,
            "INSERT OR IGNORE INTO signal_names (name) VALUES (?1)",
            "SELECT id FROM signal_names WHERE name = ?1",
            name,
        )
    }

    /// Store one numeric sample, creating category/name rows as needed.
    pub fn add_signal_tick(
        &self,
        source_id: i64,
        category: &str,
        name: &str,
        time: EpochTime,
        value: f64,
        desc: &str,
    ) -> bool {
        let (Some(category_id), Some(name_id)) =
            (self.add_signal_category(category), self.add_signal_name(name))
        else {
            return false;
        };

        let desc = if desc.is_empty() { None } else { Some(desc) };
        let result = self.tx.execute(
            "INSERT INTO signal_ticks
             (source_id, category_id, name_id, epoch_time, value, string, status, \"desc\")
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0, ?6)",
            params![source_id, category_id, name_id, time, value, desc],
        );
        match result {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to store tick {}/{}: {}", category, name, e);
                false
            }
        }
    }

    /// Store one string sample. `kind` distinguishes plain states from
    /// zone start/end markers; memory-only kinds are rejected.
    pub fn add_signal_status(
        &self,
        source_id: i64,
        category: &str,
        name: &str,
        time: EpochTime,
        status: &str,
        kind: TickKind,
    ) -> bool {
        let Some(code) = kind.db_code() else {
            log::error!("Refusing to store memory-only tick kind {:?}", kind);
            return false;
        };
        let (Some(category_id), Some(name_id)) =
            (self.add_signal_category(category), self.add_signal_name(name))
        else {
            return false;
        };

        let result = self.tx.execute(
            "INSERT INTO signal_ticks
             (source_id, category_id, name_id, epoch_time, value, string, status, \"desc\")
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, NULL)",
            params![source_id, category_id, name_id, time, status, code],
        );
        match result {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to store status {}/{}: {}", category, name, e);
                false
            }
        }
    }

    /// Store one tag. Epochs are unique: a second tag at the same time is
    /// silently ignored, the first one wins.
    pub fn add_signal_tag(&self, time: EpochTime, color: Color, name: &str, help: &str) -> bool {
        let result = self.tx.execute(
            "INSERT OR IGNORE INTO signal_tags (epoch_time, color, name, help)
             VALUES (?1, ?2, ?3, ?4)",
            params![time, color.to_rgba_string(), name, help],
        );
        match result {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to store tag '{}': {}", name, e);
                false
            }
        }
    }

    /// Commit this file's writes. Returns false (logged) on failure, in
    /// which case the writes are gone.
    pub fn commit(self) -> bool {
        match self.tx.commit() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to commit file transaction: {}", e);
                false
            }
        }
    }
}

fn insert_or_get_id(conn: &Connection, insert: &str, select: &str, key: &str) -> Option<i64> {
    if let Err(e) = conn.execute(insert, params![key]) {
        log::error!("Dedup insert failed for '{}': {}", key, e);
        return None;
    }
    match conn.query_row(select, params![key], |row| row.get(0)) {
        Ok(id) => Some(id),
        Err(e) => {
            log::error!("Dedup lookup failed for '{}': {}", key, e);
            None
        }
    }
}

fn log_on_error(result: rusqlite::Result<()>, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to {}: {}", what, e);
            false
        }
    }
}

/// Tune the connection for bulk ingest. Best effort: a pragma failing
/// leaves the database usable, so failures only warn.
fn apply_pragmas(conn: &Connection) {
    let pragmas: [(&str, &str); 4] = [
        ("journal_mode", "WAL"),
        ("synchronous", "NORMAL"),
        ("temp_store", "MEMORY"),
        ("wal_autocheckpoint", "1000"),
    ];
    for (name, value) in pragmas {
        if let Err(e) = conn.pragma_update(None, name, value) {
            log::warn!("PRAGMA {}={} failed: {}", name, value, e);
        }
    }
}

/// Reject files that exist, are non-empty, and do not start with the
/// SQLite header, e.g. a raw log file picked by mistake.
fn validate_magic(path: &Path) -> Result<(), StoreError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        // Missing file: fresh project, SQLite will create it.
        Err(_) => return Ok(()),
    };
    if metadata.len() == 0 {
        return Ok(());
    }

    let mut header = [0u8; 16];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) if &header == SQLITE_MAGIC => Ok(()),
        Ok(()) => Err(StoreError::NotAProject(path.display().to_string())),
        // A file shorter than the header cannot be a valid database.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(StoreError::NotAProject(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> SignalStore {
        SignalStore::open(dir.path().join("project.db")).unwrap()
    }

    fn count(store: &SignalStore, sql: &str) -> i64 {
        store.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_category_dedup_idempotence() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        let tx = store.transaction().unwrap();
        let first = tx.add_signal_category("cpu").unwrap();
        let second = tx.add_signal_category("cpu").unwrap();
        assert_eq!(first, second);
        assert!(tx.commit());

        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_categories"), 1);
    }

    #[test]
    fn test_source_and_name_dedup() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        let tx = store.transaction().unwrap();
        assert_eq!(
            tx.add_source_file("/var/log/app.log"),
            tx.add_source_file("/var/log/app.log")
        );
        assert_eq!(tx.add_signal_name("usage"), tx.add_signal_name("usage"));
        assert!(tx.commit());

        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_sources"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_names"), 1);
    }

    #[test]
    fn test_tag_epoch_collision_keeps_first() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        let tx = store.transaction().unwrap();
        assert!(tx.add_signal_tag(50.0, Color::rgba(255, 0, 0, 255), "boot", "first"));
        assert!(tx.add_signal_tag(50.0, Color::rgba(0, 255, 0, 255), "late", "second"));
        assert!(tx.commit());

        let mut tags = Vec::new();
        assert!(store.for_each_tag(|tag| tags.push(tag)));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "boot");
        assert_eq!(tags[0].color, Color::rgba(255, 0, 0, 255));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        {
            let tx = store.transaction().unwrap();
            let source = tx.add_source_file("a.log").unwrap();
            assert!(tx.add_signal_tick(source, "cpu", "usage", 1.0, 10.0, ""));
            // no commit: guard drop rolls back
        }

        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_ticks"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_sources"), 0);
    }

    #[test]
    fn test_tick_read_back_ascending_with_stable_ties() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        let tx = store.transaction().unwrap();
        let source = tx.add_source_file("a.log").unwrap();
        assert!(tx.add_signal_tick(source, "cpu", "usage", 200.0, 2.0, ""));
        assert!(tx.add_signal_tick(source, "cpu", "usage", 100.0, 1.0, ""));
        assert!(tx.add_signal_status(source, "job", "state", 100.0, "RUN", TickKind::Status));
        assert!(tx.commit());

        let mut rows = Vec::new();
        assert!(store.for_each_tick(|row| rows.push(row)));
        assert_eq!(rows.len(), 3);
        // Ascending epoch; the two 100.0 rows keep insertion order.
        assert_eq!(rows[0].time, 100.0);
        assert_eq!(rows[0].value, Some(1.0));
        assert_eq!(rows[1].time, 100.0);
        assert_eq!(rows[1].string.as_deref(), Some("RUN"));
        assert_eq!(rows[2].time, 200.0);
    }

    #[test]
    fn test_settings_create_or_update() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.load_settings(), None);
        assert!(store.save_settings("{\"v\":1}"));
        assert!(store.save_settings("{\"v\":2}"));
        assert_eq!(store.load_settings().as_deref(), Some("{\"v\":2}"));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM app_settings"), 1);
    }

    #[test]
    fn test_clear_data_preserves_settings() {
        let dir = tempdir().unwrap();
        let mut store = open_store(&dir);

        assert!(store.save_settings("keep me"));
        let tx = store.transaction().unwrap();
        let source = tx.add_source_file("a.log").unwrap();
        assert!(tx.add_signal_tick(source, "cpu", "usage", 1.0, 1.0, ""));
        assert!(tx.add_signal_tag(1.0, Color::WHITE, "t", ""));
        assert!(tx.commit());

        assert!(store.clear_data());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_ticks"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_tags"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM signal_sources"), 0);
        assert_eq!(store.load_settings().as_deref(), Some("keep me"));
    }

    #[test]
    fn test_magic_header_rejects_non_project() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("notes.txt");
        std::fs::write(&bogus, "definitely not a database").unwrap();

        match SignalStore::open(&bogus) {
            Err(StoreError::NotAProject(_)) => {}
            other => panic!("expected NotAProject, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_magic_header_rejects_short_file() {
        let dir = tempdir().unwrap();
        let stub = dir.path().join("stub.db");
        // Non-empty but shorter than the 16-byte header.
        std::fs::write(&stub, "short").unwrap();

        match SignalStore::open(&stub) {
            Err(StoreError::NotAProject(_)) => {}
            other => panic!("expected NotAProject, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_magic_header_accepts_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.db");

        {
            let mut store = SignalStore::open(&path).unwrap();
            let tx = store.transaction().unwrap();
            tx.add_source_file("a.log").unwrap();
            assert!(tx.commit());
        }

        // Second open validates the magic header of the real file.
        let store = SignalStore::open(&path).unwrap();
        let mut sources = Vec::new();
        assert!(store.for_each_source(|s| sources.push(s)));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, "a.log");
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let journal_mode: String = store
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }
}
