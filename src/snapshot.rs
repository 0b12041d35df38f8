use anyhow::Context;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;

/// Builds and applies the single sync document:
/// `{ settings, records, pttRecords, extraRecords, adminRecords,
///    instrumentResults, uploadedSchedules }`.
/// Instrument results are keyed `"{subjectId}-{instrument}-{semester}"`.
/// Applying a document is a wholesale replacement of the workspace content.

const RECORD_KINDS: [(&str, &str); 4] = [
    ("records", "guru"),
    ("pttRecords", "ptt"),
    ("extraRecords", "ekstra"),
    ("adminRecords", "admin"),
];

pub fn build_snapshot(conn: &Connection) -> anyhow::Result<Value> {
    let mut doc = serde_json::Map::new();
    doc.insert("settings".into(), Value::Object(db::settings_all(conn)?));

    for (key, kind) in RECORD_KINDS {
        doc.insert(key.into(), Value::Array(subject_rows(conn, kind)?));
    }

    let mut results = serde_json::Map::new();
    let mut stmt = conn.prepare(
        "SELECT id, subject_id, instrument, semester, catatan, tindak_lanjut,
                rekomendasi, feedback_auto
         FROM instrument_results",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let result_id: String = row.get(0)?;
        let subject_id: String = row.get(1)?;
        let instrument: String = row.get(2)?;
        let semester: String = row.get(3)?;
        let catatan: Option<String> = row.get(4)?;
        let tindak_lanjut: Option<String> = row.get(5)?;
        let rekomendasi: Option<String> = row.get(6)?;
        let feedback_auto: i64 = row.get(7)?;

        let mut scores = serde_json::Map::new();
        let mut item_stmt = conn.prepare(
            "SELECT item_no, value FROM instrument_items WHERE result_id = ? ORDER BY item_no",
        )?;
        let mut item_rows = item_stmt.query([&result_id])?;
        while let Some(item) = item_rows.next()? {
            let no: i64 = item.get(0)?;
            let value: String = item.get(1)?;
            scores.insert(no.to_string(), Value::String(value));
        }

        let key = format!("{}-{}-{}", subject_id, instrument, semester);
        results.insert(
            key,
            json!({
                "scores": scores,
                "catatan": catatan,
                "tindakLanjut": tindak_lanjut,
                "rekomendasi": rekomendasi,
                "feedbackAuto": feedback_auto != 0,
            }),
        );
    }
    doc.insert("instrumentResults".into(), Value::Object(results));

    let mut schedules = Vec::new();
    let mut sched_stmt = conn.prepare(
        "SELECT subject_id, semester, date, time_slot, supervisor, sort_order, uploaded
         FROM schedules ORDER BY semester, sort_order",
    )?;
    let mut sched_rows = sched_stmt.query([])?;
    while let Some(row) = sched_rows.next()? {
        schedules.push(json!({
            "subjectId": row.get::<_, String>(0)?,
            "semester": row.get::<_, String>(1)?,
            "date": row.get::<_, String>(2)?,
            "timeSlot": row.get::<_, String>(3)?,
            "supervisor": row.get::<_, String>(4)?,
            "sortOrder": row.get::<_, i64>(5)?,
            "uploaded": row.get::<_, i64>(6)? != 0,
        }));
    }
    doc.insert("uploadedSchedules".into(), Value::Array(schedules));

    Ok(Value::Object(doc))
}

fn subject_rows(conn: &Connection, kind: &str) -> anyhow::Result<Vec<Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, id_number, role, supervisor_bucket, active, sort_order
         FROM subjects WHERE kind = ? ORDER BY sort_order",
    )?;
    let mut rows = stmt.query([kind])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(json!({
            "id": row.get::<_, String>(0)?,
            "name": row.get::<_, String>(1)?,
            "idNumber": row.get::<_, Option<String>>(2)?,
            "role": row.get::<_, Option<String>>(3)?,
            "supervisorBucket": row.get::<_, i64>(4)?,
            "active": row.get::<_, i64>(5)? != 0,
            "sortOrder": row.get::<_, i64>(6)?,
        }));
    }
    Ok(out)
}

/// Replace the whole workspace content with one loaded document.
/// Unknown keys are ignored; missing collections load as empty.
pub fn apply_snapshot(conn: &mut Connection, doc: &Value) -> anyhow::Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM instrument_items", [])?;
    tx.execute("DELETE FROM instrument_results", [])?;
    tx.execute("DELETE FROM schedules", [])?;
    tx.execute("DELETE FROM subjects", [])?;
    tx.execute("DELETE FROM settings", [])?;

    if let Some(settings) = doc.get("settings").and_then(|v| v.as_object()) {
        for (key, value) in settings {
            tx.execute(
                "INSERT INTO settings(key, value) VALUES(?, ?)",
                (key, serde_json::to_string(value)?),
            )?;
        }
    }

    for (key, kind) in RECORD_KINDS {
        let Some(list) = doc.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for (i, rec) in list.iter().enumerate() {
            let id = rec
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let name = rec.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let id_number = rec.get("idNumber").and_then(|v| v.as_str());
            let role = rec.get("role").and_then(|v| v.as_str());
            let bucket = rec
                .get("supervisorBucket")
                .and_then(|v| v.as_i64())
                .unwrap_or(1);
            let active = rec.get("active").and_then(|v| v.as_bool()).unwrap_or(true);
            let sort_order = rec
                .get("sortOrder")
                .and_then(|v| v.as_i64())
                .unwrap_or(i as i64);
            tx.execute(
                "INSERT INTO subjects(id, kind, name, id_number, role, supervisor_bucket,
                                      active, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    kind,
                    name,
                    id_number,
                    role,
                    bucket,
                    active as i64,
                    sort_order,
                ),
            )?;
        }
    }

    if let Some(results) = doc.get("instrumentResults").and_then(|v| v.as_object()) {
        for (key, entry) in results {
            let Some((subject_id, instrument, semester)) = split_result_key(key) else {
                continue;
            };
            // Skip entries whose subject did not survive the collections above.
            let subject_exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM subjects WHERE id = ?",
                [subject_id],
                |r| r.get(0),
            )?;
            if subject_exists == 0 {
                continue;
            }

            let result_id = Uuid::new_v4().to_string();
            let catatan = entry.get("catatan").and_then(|v| v.as_str());
            let tindak_lanjut = entry.get("tindakLanjut").and_then(|v| v.as_str());
            let rekomendasi = entry.get("rekomendasi").and_then(|v| v.as_str());
            let feedback_auto = entry
                .get("feedbackAuto")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            tx.execute(
                "INSERT INTO instrument_results(id, subject_id, instrument, semester,
                                                catatan, tindak_lanjut, rekomendasi,
                                                feedback_auto)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &result_id,
                    subject_id,
                    instrument,
                    semester,
                    catatan,
                    tindak_lanjut,
                    rekomendasi,
                    feedback_auto as i64,
                ),
            )?;

            if let Some(scores) = entry.get("scores").and_then(|v| v.as_object()) {
                for (no, value) in scores {
                    let Ok(item_no) = no.parse::<i64>() else {
                        continue;
                    };
                    let raw = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => continue,
                    };
                    tx.execute(
                        "INSERT INTO instrument_items(result_id, item_no, value)
                         VALUES(?, ?, ?)",
                        (&result_id, item_no, raw),
                    )?;
                }
            }
        }
    }

    if let Some(schedules) = doc.get("uploadedSchedules").and_then(|v| v.as_array()) {
        for (i, row) in schedules.iter().enumerate() {
            let Some(subject_id) = row.get("subjectId").and_then(|v| v.as_str()) else {
                continue;
            };
            let subject_exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM subjects WHERE id = ?",
                [subject_id],
                |r| r.get(0),
            )?;
            if subject_exists == 0 {
                continue;
            }
            tx.execute(
                "INSERT INTO schedules(id, subject_id, semester, date, time_slot,
                                       supervisor, sort_order, uploaded)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    subject_id,
                    row.get("semester").and_then(|v| v.as_str()).unwrap_or(""),
                    row.get("date").and_then(|v| v.as_str()).unwrap_or(""),
                    row.get("timeSlot").and_then(|v| v.as_str()).unwrap_or(""),
                    row.get("supervisor").and_then(|v| v.as_str()).unwrap_or(""),
                    row.get("sortOrder").and_then(|v| v.as_i64()).unwrap_or(i as i64),
                    row.get("uploaded").and_then(|v| v.as_bool()).unwrap_or(false) as i64,
                ),
            )?;
        }
    }

    tx.commit().context("failed to commit loaded state")?;
    Ok(())
}

/// Composite keys are `"{subjectId}-{instrument}-{semester}"`. Subject ids are
/// UUIDs and instrument ids themselves contain dashes, so the key is resolved
/// from the right: the last segment is the semester, the instrument is matched
/// against the known catalog ids.
fn split_result_key(key: &str) -> Option<(&str, &str, &str)> {
    let (rest, semester) = key.rsplit_once('-')?;
    for def in crate::instruments::catalog() {
        let id = def.kind.as_str();
        if let Some(subject_id) = rest.strip_suffix(id) {
            let subject_id = subject_id.strip_suffix('-')?;
            if subject_id.is_empty() {
                return None;
            }
            return Some((subject_id, id, semester));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_keys_resolve_from_the_right() {
        let key = "3f2b-administrasi-ptt-Ganjil";
        let (subject, instrument, semester) = split_result_key(key).expect("split");
        assert_eq!(subject, "3f2b");
        assert_eq!(instrument, "administrasi-ptt");
        assert_eq!(semester, "Ganjil");

        let key = "3f2b-telaah-atp-Genap";
        let (subject, instrument, semester) = split_result_key(key).expect("split");
        assert_eq!(subject, "3f2b");
        assert_eq!(instrument, "telaah-atp");
        assert_eq!(semester, "Genap");

        assert!(split_result_key("no-instrument-here").is_none());
    }
}
