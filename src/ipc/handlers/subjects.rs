use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub const SUBJECT_KINDS: &[&str] = &["guru", "ptt", "ekstra", "admin"];

fn valid_kind(kind: &str) -> bool {
    SUBJECT_KINDS.contains(&kind)
}

fn subject_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, String>(0)?,
        "kind": row.get::<_, String>(1)?,
        "name": row.get::<_, String>(2)?,
        "idNumber": row.get::<_, Option<String>>(3)?,
        "role": row.get::<_, Option<String>>(4)?,
        "supervisorBucket": row.get::<_, i64>(5)?,
        "active": row.get::<_, i64>(6)? != 0,
        "sortOrder": row.get::<_, i64>(7)?,
    }))
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let kind = req.params.get("kind").and_then(|v| v.as_str());
    if let Some(k) = kind {
        if !valid_kind(k) {
            return err(
                &req.id,
                "bad_params",
                "kind must be one of: guru, ptt, ekstra, admin",
                Some(json!({ "kind": k })),
            );
        }
    }

    let result = match kind {
        Some(k) => {
            let mut stmt = match conn.prepare(
                "SELECT id, kind, name, id_number, role, supervisor_bucket, active, sort_order
                 FROM subjects WHERE kind = ? ORDER BY sort_order",
            ) {
                Ok(s) => s,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            stmt.query_map([k], subject_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        }
        None => {
            let mut stmt = match conn.prepare(
                "SELECT id, kind, name, id_number, role, supervisor_bucket, active, sort_order
                 FROM subjects ORDER BY kind, sort_order",
            ) {
                Ok(s) => s,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            stmt.query_map([], subject_json)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        }
    };

    match result {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let kind = match req.params.get("kind").and_then(|v| v.as_str()) {
        Some(k) if valid_kind(k) => k.to_string(),
        Some(k) => {
            return err(
                &req.id,
                "bad_params",
                "kind must be one of: guru, ptt, ekstra, admin",
                Some(json!({ "kind": k })),
            )
        }
        None => return err(&req.id, "bad_params", "missing kind", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let id_number = req.params.get("idNumber").and_then(|v| v.as_str());
    let role = req.params.get("role").and_then(|v| v.as_str());
    let bucket = req
        .params
        .get("supervisorBucket")
        .and_then(|v| v.as_i64())
        .unwrap_or(1);
    if bucket != 1 && bucket != 2 {
        return err(
            &req.id,
            "bad_params",
            "supervisorBucket must be 1 or 2",
            Some(json!({ "supervisorBucket": bucket })),
        );
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM subjects WHERE kind = ?",
        [&kind],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, kind, name, id_number, role, supervisor_bucket, active, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?)",
        (&subject_id, &kind, &name, id_number, role, bucket, next_sort),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "subjectId": subject_id }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    let exists: Option<String> = match conn
        .query_row("SELECT id FROM subjects WHERE id = ?", [&subject_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "subject not found", None);
    }

    for (field, value) in patch {
        let result = match field.as_str() {
            "name" => match value.as_str() {
                Some(v) if !v.trim().is_empty() => conn.execute(
                    "UPDATE subjects SET name = ? WHERE id = ?",
                    (v.trim(), &subject_id),
                ),
                _ => return err(&req.id, "bad_params", "name must be a non-empty string", None),
            },
            "idNumber" => conn.execute(
                "UPDATE subjects SET id_number = ? WHERE id = ?",
                (value.as_str(), &subject_id),
            ),
            "role" => conn.execute(
                "UPDATE subjects SET role = ? WHERE id = ?",
                (value.as_str(), &subject_id),
            ),
            "supervisorBucket" => match value.as_i64() {
                Some(b) if b == 1 || b == 2 => conn.execute(
                    "UPDATE subjects SET supervisor_bucket = ? WHERE id = ?",
                    (b, &subject_id),
                ),
                _ => {
                    return err(
                        &req.id,
                        "bad_params",
                        "supervisorBucket must be 1 or 2",
                        None,
                    )
                }
            },
            "active" => match value.as_bool() {
                Some(b) => conn.execute(
                    "UPDATE subjects SET active = ? WHERE id = ?",
                    (b as i64, &subject_id),
                ),
                None => return err(&req.id, "bad_params", "active must be a boolean", None),
            },
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    "unknown patch field",
                    Some(json!({ "field": other })),
                )
            }
        };
        if let Err(e) = result {
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    }

    ok(&req.id, json!({ "ok": true }))
}

fn delete_subject_cascade(conn: &Connection, subject_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM instrument_items WHERE result_id IN
         (SELECT id FROM instrument_results WHERE subject_id = ?)",
        [subject_id],
    )?;
    conn.execute(
        "DELETE FROM instrument_results WHERE subject_id = ?",
        [subject_id],
    )?;
    conn.execute("DELETE FROM schedules WHERE subject_id = ?", [subject_id])?;
    conn.execute("DELETE FROM subjects WHERE id = ?", [subject_id])
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };

    match delete_subject_cascade(conn, &subject_id) {
        Ok(0) => err(&req.id, "not_found", "subject not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
