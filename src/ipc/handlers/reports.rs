use crate::db;
use crate::instruments::{find, InstrumentKind};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::scoring::{aggregate, item_value};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use super::schedule::parse_semester;

fn school_header(conn: &Connection) -> serde_json::Value {
    json!({
        "schoolName": db::settings_get_string(conn, "schoolName", "-"),
        "schoolAddress": db::settings_get_string(conn, "schoolAddress", "-"),
        "schoolYear": db::settings_get_string(conn, "schoolYear", "-"),
        "principalName": db::settings_get_string(conn, "principalName", "-"),
        "principalIdNumber": db::settings_get_string(conn, "principalIdNumber", "-"),
    })
}

fn subject_identity(
    conn: &Connection,
    subject_id: &str,
) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(
        "SELECT name, id_number, role FROM subjects WHERE id = ?",
        [subject_id],
        |r| {
            Ok(json!({
                "name": r.get::<_, String>(0)?,
                "idNumber": r.get::<_, Option<String>>(1)?.unwrap_or_else(|| "-".to_string()),
                "role": r.get::<_, Option<String>>(2)?.unwrap_or_else(|| "-".to_string()),
            }))
        },
    )
    .optional()
}

fn handle_instrument_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let kind = match req
        .params
        .get("instrument")
        .and_then(|v| v.as_str())
        .and_then(InstrumentKind::from_str)
    {
        Some(k) => k,
        None => return err(&req.id, "bad_params", "missing/unknown instrument", None),
    };
    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
    };

    let subject = match subject_identity(conn, &subject_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "subject not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let def = find(kind);

    let result: Option<(String, Option<String>, Option<String>, Option<String>)> = match conn
        .query_row(
            "SELECT id, catatan, tindak_lanjut, rekomendasi FROM instrument_results
             WHERE subject_id = ? AND instrument = ? AND semester = ?",
            (&subject_id, def.kind.as_str(), &semester),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Reports degrade to an all-empty grid when nothing has been scored yet.
    let mut values: Vec<Option<String>> = vec![None; def.items.len()];
    let (catatan, tindak_lanjut, rekomendasi) = match &result {
        None => (None, None, None),
        Some((result_id, catatan, tindak_lanjut, rekomendasi)) => {
            let mut stmt = match conn
                .prepare("SELECT item_no, value FROM instrument_items WHERE result_id = ?")
            {
                Ok(s) => s,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            let rows = stmt
                .query_map([result_id], |r| {
                    Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
                })
                .and_then(|it| it.collect::<Result<Vec<_>, _>>());
            match rows {
                Ok(items) => {
                    for (no, value) in items {
                        if no >= 1 && (no as usize) <= values.len() {
                            values[(no - 1) as usize] = Some(value);
                        }
                    }
                }
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            }
            (catatan.clone(), tindak_lanjut.clone(), rekomendasi.clone())
        }
    };

    let thresholds = db::band_thresholds(conn);
    let agg = aggregate(
        values.iter().filter_map(|v| v.as_deref()),
        def.max_score,
        &thresholds,
    );

    let rows: Vec<serde_json::Value> = def
        .items
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let value = values[i].clone();
            let numeric = value.as_deref().map(item_value).unwrap_or(0.0);
            json!({
                "itemNo": i as i64 + 1,
                "text": text,
                "value": value,
                "numericValue": numeric,
            })
        })
        .collect();

    let visit: Option<String> = match conn
        .query_row(
            "SELECT date FROM schedules WHERE subject_id = ? AND semester = ?
             ORDER BY sort_order LIMIT 1",
            (&subject_id, &semester),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "header": school_header(conn),
            "subject": subject,
            "instrument": def.kind.as_str(),
            "title": def.title,
            "semester": semester,
            "visitDate": visit,
            "rows": rows,
            "aggregate": agg,
            "feedback": {
                "catatan": catatan,
                "tindakLanjut": tindak_lanjut,
                "rekomendasi": rekomendasi,
            },
            "signatures": {
                "principalName": db::settings_get_string(conn, "principalName", "-"),
                "principalIdNumber": db::settings_get_string(conn, "principalIdNumber", "-"),
                "supervisor1": db::settings_get_string(conn, "supervisor1", "-"),
                "supervisor2": db::settings_get_string(conn, "supervisor2", "-"),
            },
        }),
    )
}

fn handle_recap_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    // The recap report is the recap table wrapped with the printable header.
    let recap = super::recap::try_handle(
        state,
        &Request {
            id: req.id.clone(),
            method: "scoring.recap".to_string(),
            params: req.params.clone(),
        },
    );
    let Some(recap) = recap else {
        return err(&req.id, "not_implemented", "recap unavailable", None);
    };
    if recap.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        return recap;
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = recap.get("result").cloned().unwrap_or(json!({}));
    ok(
        &req.id,
        json!({
            "header": school_header(conn),
            "recap": result,
        }),
    )
}

fn handle_schedule_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sched = super::schedule::try_handle(
        state,
        &Request {
            id: req.id.clone(),
            method: "schedule.list".to_string(),
            params: req.params.clone(),
        },
    );
    let Some(sched) = sched else {
        return err(&req.id, "not_implemented", "schedule unavailable", None);
    };
    if sched.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        return sched;
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = sched.get("result").cloned().unwrap_or(json!({}));
    ok(
        &req.id,
        json!({
            "header": school_header(conn),
            "schedule": result,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.instrumentModel" => Some(handle_instrument_model(state, req)),
        "reports.recapModel" => Some(handle_recap_model(state, req)),
        "reports.scheduleModel" => Some(handle_schedule_model(state, req)),
        _ => None,
    }
}
