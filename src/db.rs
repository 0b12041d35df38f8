use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::scoring::BandThresholds;

pub const DB_FILE_NAME: &str = "supervisi.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            id_number TEXT,
            role TEXT,
            supervisor_bucket INTEGER NOT NULL DEFAULT 1,
            active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_kind ON subjects(kind, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            semester TEXT NOT NULL,
            date TEXT NOT NULL,
            time_slot TEXT NOT NULL,
            supervisor TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            uploaded INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_semester ON schedules(semester, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_subject ON schedules(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instrument_results(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            instrument TEXT NOT NULL,
            semester TEXT NOT NULL,
            catatan TEXT,
            tindak_lanjut TEXT,
            feedback_auto INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT,
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(subject_id, instrument, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_subject ON instrument_results(subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_semester ON instrument_results(semester, instrument)",
        [],
    )?;
    // Early workspaces predate the observation recommendation field.
    ensure_results_rekomendasi(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instrument_items(
            result_id TEXT NOT NULL,
            item_no INTEGER NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY(result_id, item_no),
            FOREIGN KEY(result_id) REFERENCES instrument_results(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_result ON instrument_items(result_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_results_rekomendasi(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "instrument_results", "rekomendasi")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE instrument_results ADD COLUMN rekomendasi TEXT",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_all(
    conn: &Connection,
) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
    let mut rows = stmt.query([])?;
    let mut out = serde_json::Map::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
        out.insert(key, value);
    }
    Ok(out)
}

pub fn settings_get_string(conn: &Connection, key: &str, default: &str) -> String {
    match settings_get_json(conn, key) {
        Ok(Some(serde_json::Value::String(s))) => s,
        _ => default.to_string(),
    }
}

/// Band cut-offs from settings, default `{91, 81, 71}`.
pub fn band_thresholds(conn: &Connection) -> BandThresholds {
    let defaults = BandThresholds::default();
    let Ok(Some(v)) = settings_get_json(conn, "thresholds") else {
        return defaults;
    };
    BandThresholds {
        sangat_baik: v
            .get("sangatBaik")
            .and_then(|n| n.as_i64())
            .unwrap_or(defaults.sangat_baik),
        baik: v
            .get("baik")
            .and_then(|n| n.as_i64())
            .unwrap_or(defaults.baik),
        cukup: v
            .get("cukup")
            .and_then(|n| n.as_i64())
            .unwrap_or(defaults.cukup),
    }
}
