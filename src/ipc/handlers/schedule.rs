use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{plan_visits, PlanSubject};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

const SEMESTERS: &[&str] = &["Ganjil", "Genap"];

pub fn parse_semester(raw: Option<&serde_json::Value>) -> Option<String> {
    let s = raw?.as_str()?;
    if SEMESTERS.contains(&s) {
        Some(s.to_string())
    } else {
        None
    }
}

fn parse_date(raw: Option<&serde_json::Value>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.as_str()?, "%Y-%m-%d").ok()
}

fn schedule_rows(conn: &Connection, semester: &str) -> rusqlite::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.subject_id, sub.name, s.date, s.time_slot, s.supervisor,
                s.sort_order, s.uploaded
         FROM schedules s
         LEFT JOIN subjects sub ON sub.id = s.subject_id
         WHERE s.semester = ?
         ORDER BY s.sort_order",
    )?;
    stmt.query_map([semester], |row| {
        Ok(json!({
            "scheduleId": row.get::<_, String>(0)?,
            "subjectId": row.get::<_, String>(1)?,
            "subjectName": row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "-".to_string()),
            "date": row.get::<_, String>(3)?,
            "timeSlot": row.get::<_, String>(4)?,
            "supervisor": row.get::<_, String>(5)?,
            "sortOrder": row.get::<_, i64>(6)?,
            "uploaded": row.get::<_, i64>(7)? != 0,
        }))
    })
    .and_then(|it| it.collect())
}

fn handle_schedule_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
    };
    let Some(start) = parse_date(req.params.get("startDate")) else {
        return err(&req.id, "bad_params", "startDate must be YYYY-MM-DD", None);
    };
    let Some(end) = parse_date(req.params.get("endDate")) else {
        return err(&req.id, "bad_params", "endDate must be YYYY-MM-DD", None);
    };
    if start > end {
        return err(
            &req.id,
            "bad_params",
            "startDate must not be after endDate",
            Some(json!({ "startDate": start.to_string(), "endDate": end.to_string() })),
        );
    }
    let kind = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .unwrap_or("guru");

    let mut stmt = match conn.prepare(
        "SELECT id, supervisor_bucket FROM subjects
         WHERE kind = ? AND active = 1 ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let subjects: Vec<PlanSubject> = match stmt
        .query_map([kind], |row| {
            Ok(PlanSubject {
                subject_id: row.get(0)?,
                supervisor_bucket: row.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let time_slot = db::settings_get_string(conn, "timeSlot", "07.30-09.30");
    let supervisor1 = db::settings_get_string(conn, "supervisor1", "Kepala Sekolah");
    let supervisor2 = db::settings_get_string(conn, "supervisor2", "Kepala Sekolah");

    let visits = plan_visits(start, end, &subjects, &time_slot, &supervisor1, &supervisor2);

    // Regenerating replaces earlier generated rows; uploaded rows are kept.
    if let Err(e) = conn.execute(
        "DELETE FROM schedules WHERE semester = ? AND uploaded = 0",
        [&semester],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    for (i, v) in visits.iter().enumerate() {
        if let Err(e) = conn.execute(
            "INSERT INTO schedules(id, subject_id, semester, date, time_slot, supervisor,
                                   sort_order, uploaded)
             VALUES(?, ?, ?, ?, ?, ?, ?, 0)",
            (
                Uuid::new_v4().to_string(),
                &v.subject_id,
                &semester,
                v.date.to_string(),
                &v.time_slot,
                &v.supervisor,
                i as i64,
            ),
        ) {
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    }

    match schedule_rows(conn, &semester) {
        Ok(rows) => ok(&req.id, json!({ "semester": semester, "rows": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
    };
    match schedule_rows(conn, &semester) {
        Ok(rows) => ok(&req.id, json!({ "semester": semester, "rows": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_schedule_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
    };
    let Some(rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing rows[]", None);
    };

    let default_slot = db::settings_get_string(conn, "timeSlot", "07.30-09.30");
    let default_supervisor = db::settings_get_string(conn, "supervisor1", "Kepala Sekolah");

    // Wholesale replacement of the semester's schedule.
    if let Err(e) = conn.execute("DELETE FROM schedules WHERE semester = ?", [&semester]) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    let mut inserted = 0_usize;
    for (i, row) in rows.iter().enumerate() {
        let Some(subject_id) = row.get("subjectId").and_then(|v| v.as_str()) else {
            return err(
                &req.id,
                "bad_params",
                format!("row at index {} missing subjectId", i),
                None,
            );
        };
        let Some(date) = row
            .get("date")
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        else {
            return err(
                &req.id,
                "bad_params",
                format!("row at index {} missing/invalid date", i),
                None,
            );
        };
        let time_slot = row
            .get("timeSlot")
            .and_then(|v| v.as_str())
            .unwrap_or(&default_slot);
        let supervisor = row
            .get("supervisor")
            .and_then(|v| v.as_str())
            .unwrap_or(&default_supervisor);

        if let Err(e) = conn.execute(
            "INSERT INTO schedules(id, subject_id, semester, date, time_slot, supervisor,
                                   sort_order, uploaded)
             VALUES(?, ?, ?, ?, ?, ?, ?, 1)",
            (
                Uuid::new_v4().to_string(),
                subject_id,
                &semester,
                date.to_string(),
                time_slot,
                supervisor,
                i as i64,
            ),
        ) {
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
        inserted += 1;
    }

    ok(&req.id, json!({ "semester": semester, "inserted": inserted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.generate" => Some(handle_schedule_generate(state, req)),
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.upload" => Some(handle_schedule_upload(state, req)),
        _ => None,
    }
}
