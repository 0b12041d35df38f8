use crate::db;
use crate::instruments::{catalog, find, InstrumentDef, InstrumentKind, ItemDomain};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::scoring::{aggregate, AggregateResult};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use super::schedule::parse_semester;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn db(e: impl std::fmt::Display) -> Self {
        Self {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

struct ResultKey {
    subject_id: String,
    def: &'static InstrumentDef,
    semester: String,
}

fn parse_result_key(req: &Request) -> Result<ResultKey, HandlerErr> {
    let subject_id = req
        .params
        .get("subjectId")
        .and_then(|v| v.as_str())
        .ok_or(HandlerErr {
            code: "bad_params",
            message: "missing subjectId".to_string(),
            details: None,
        })?
        .to_string();
    let instrument_raw = req
        .params
        .get("instrument")
        .and_then(|v| v.as_str())
        .ok_or(HandlerErr {
            code: "bad_params",
            message: "missing instrument".to_string(),
            details: None,
        })?;
    let kind = InstrumentKind::from_str(instrument_raw).ok_or(HandlerErr {
        code: "bad_params",
        message: "unknown instrument".to_string(),
        details: Some(json!({ "instrument": instrument_raw })),
    })?;
    let semester = parse_semester(req.params.get("semester")).ok_or(HandlerErr {
        code: "bad_params",
        message: "semester must be Ganjil or Genap".to_string(),
        details: None,
    })?;
    Ok(ResultKey {
        subject_id,
        def: find(kind),
        semester,
    })
}

/// Get-or-create the result row. Creation happens on first open for a
/// subject, which is also where the lifecycle of a scored instrument starts.
fn ensure_result_row(conn: &Connection, key: &ResultKey) -> Result<String, HandlerErr> {
    let subject_exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM subjects WHERE id = ?",
            [&key.subject_id],
            |r| r.get(0),
        )
        .map_err(HandlerErr::db)?;
    if subject_exists == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: "subject not found".to_string(),
            details: None,
        });
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM instrument_results
             WHERE subject_id = ? AND instrument = ? AND semester = ?",
            (&key.subject_id, key.def.kind.as_str(), &key.semester),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db)?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let result_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO instrument_results(id, subject_id, instrument, semester,
                                        feedback_auto, updated_at)
         VALUES(?, ?, ?, ?, 1, ?)",
        (
            &result_id,
            &key.subject_id,
            key.def.kind.as_str(),
            &key.semester,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(result_id)
}

fn load_values(conn: &Connection, result_id: &str) -> Result<Vec<Option<String>>, HandlerErr> {
    // Dense per-item vector indexed by item_no - 1; absent cells stay None.
    let mut stmt = conn
        .prepare("SELECT item_no, value FROM instrument_items WHERE result_id = ?")
        .map_err(HandlerErr::db)?;
    let rows = stmt
        .query_map([result_id], |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    let mut out: Vec<Option<String>> = Vec::new();
    for (no, value) in rows {
        if no < 1 {
            continue;
        }
        let idx = (no - 1) as usize;
        if out.len() <= idx {
            out.resize(idx + 1, None);
        }
        out[idx] = Some(value);
    }
    Ok(out)
}

fn compute_aggregate(
    conn: &Connection,
    result_id: &str,
    def: &InstrumentDef,
) -> Result<AggregateResult, HandlerErr> {
    let values = load_values(conn, result_id)?;
    let thresholds = db::band_thresholds(conn);
    Ok(aggregate(
        values.iter().filter_map(|v| v.as_deref()),
        def.max_score,
        &thresholds,
    ))
}

/// Auto-fill feedback from the bank while the result is still auto-managed.
/// A manual edit switches the row to manual; only an explicit regenerate
/// switches it back.
fn refresh_feedback_if_auto(
    conn: &Connection,
    result_id: &str,
    def: &InstrumentDef,
    agg: &AggregateResult,
) -> Result<(), HandlerErr> {
    let auto: i64 = conn
        .query_row(
            "SELECT feedback_auto FROM instrument_results WHERE id = ?",
            [result_id],
            |r| r.get(0),
        )
        .map_err(HandlerErr::db)?;
    if auto == 0 {
        return Ok(());
    }
    write_bank_feedback(conn, result_id, def, agg, true)
}

fn write_bank_feedback(
    conn: &Connection,
    result_id: &str,
    def: &InstrumentDef,
    agg: &AggregateResult,
    auto: bool,
) -> Result<(), HandlerErr> {
    let entry = def.bank.select(agg.percentage, agg.total_score);
    conn.execute(
        "UPDATE instrument_results
         SET catatan = ?, tindak_lanjut = ?, rekomendasi = ?, feedback_auto = ?, updated_at = ?
         WHERE id = ?",
        (
            entry.catatan,
            entry.tindak_lanjut,
            entry.rekomendasi,
            auto as i64,
            Utc::now().to_rfc3339(),
            result_id,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(())
}

fn result_response(
    conn: &Connection,
    key: &ResultKey,
    result_id: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let values = load_values(conn, result_id)?;
    let agg = compute_aggregate(conn, result_id, key.def)?;

    let items: Vec<serde_json::Value> = key
        .def
        .items
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "itemNo": i as i64 + 1,
                "text": text,
                "value": values.get(i).cloned().flatten(),
            })
        })
        .collect();

    let (catatan, tindak_lanjut, rekomendasi, feedback_auto): (
        Option<String>,
        Option<String>,
        Option<String>,
        i64,
    ) = conn
        .query_row(
            "SELECT catatan, tindak_lanjut, rekomendasi, feedback_auto
             FROM instrument_results WHERE id = ?",
            [result_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .map_err(HandlerErr::db)?;

    Ok(json!({
        "subjectId": key.subject_id,
        "instrument": key.def.kind.as_str(),
        "title": key.def.title,
        "semester": key.semester,
        "maxScore": key.def.max_score,
        "domain": key.def.domain,
        "items": items,
        "aggregate": agg,
        "feedback": {
            "catatan": catatan,
            "tindakLanjut": tindak_lanjut,
            "rekomendasi": rekomendasi,
            "auto": feedback_auto != 0,
        },
    }))
}

fn handle_catalog(state: &mut AppState, req: &Request) -> serde_json::Value {
    // The catalog is static; a workspace is not required to read it.
    let _ = state;
    let defs: Vec<serde_json::Value> = catalog()
        .iter()
        .map(|d| {
            json!({
                "instrument": d.kind.as_str(),
                "title": d.title,
                "itemCount": d.item_count(),
                "items": d.items,
                "domain": d.domain,
                "maxScore": d.max_score,
                "composite": d.composite,
            })
        })
        .collect();
    ok(&req.id, json!({ "instruments": defs }))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let key = match parse_result_key(req) {
        Ok(k) => k,
        Err(e) => return e.response(&req.id),
    };
    let result_id = match ensure_result_row(conn, &key) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };
    match result_response(conn, &key, &result_id) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_set_item(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let key = match parse_result_key(req) {
        Ok(k) => k,
        Err(e) => return e.response(&req.id),
    };

    let item_no = match req.params.get("itemNo").and_then(|v| v.as_i64()) {
        Some(n) if n >= 1 && n <= key.def.item_count() => n,
        Some(n) => {
            return err(
                &req.id,
                "bad_params",
                "itemNo outside instrument item list",
                Some(json!({ "itemNo": n, "itemCount": key.def.item_count() })),
            )
        }
        None => return err(&req.id, "bad_params", "missing/invalid itemNo", None),
    };

    let raw = match req.params.get("value") {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return err(&req.id, "bad_params", "missing value", None),
    };
    if !key.def.domain.accepts(&raw) {
        let expected = match key.def.domain {
            ItemDomain::Numeric { max } => format!("an integer in 0..={}", max),
            ItemDomain::Letter => "one of B, C, K, T".to_string(),
            ItemDomain::YesNo => "YA or TIDAK".to_string(),
        };
        return err(
            &req.id,
            "bad_params",
            format!("value must be {}", expected),
            Some(json!({ "value": raw })),
        );
    }
    let stored = match key.def.domain {
        ItemDomain::Numeric { .. } => raw,
        ItemDomain::Letter | ItemDomain::YesNo => raw.to_ascii_uppercase(),
    };

    let result_id = match ensure_result_row(conn, &key) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };

    if let Err(e) = conn.execute(
        "INSERT INTO instrument_items(result_id, item_no, value) VALUES(?, ?, ?)
         ON CONFLICT(result_id, item_no) DO UPDATE SET value = excluded.value",
        (&result_id, item_no, &stored),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    let agg = match compute_aggregate(conn, &result_id, key.def) {
        Ok(a) => a,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = refresh_feedback_if_auto(conn, &result_id, key.def, &agg) {
        return e.response(&req.id);
    }

    match result_response(conn, &key, &result_id) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_set_feedback(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let key = match parse_result_key(req) {
        Ok(k) => k,
        Err(e) => return e.response(&req.id),
    };
    let result_id = match ensure_result_row(conn, &key) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };

    let mut touched = false;
    for (param, column) in [
        ("catatan", "catatan"),
        ("tindakLanjut", "tindak_lanjut"),
        ("rekomendasi", "rekomendasi"),
    ] {
        let Some(value) = req.params.get(param) else {
            continue;
        };
        let Some(text) = value.as_str() else {
            return err(
                &req.id,
                "bad_params",
                format!("{} must be a string", param),
                None,
            );
        };
        let sql = format!("UPDATE instrument_results SET {} = ? WHERE id = ?", column);
        if let Err(e) = conn.execute(&sql, (text, &result_id)) {
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
        touched = true;
    }
    if !touched {
        return err(
            &req.id,
            "bad_params",
            "provide at least one of catatan, tindakLanjut, rekomendasi",
            None,
        );
    }

    // A human edit pins the text: later score changes no longer overwrite it.
    if let Err(e) = conn.execute(
        "UPDATE instrument_results SET feedback_auto = 0, updated_at = ? WHERE id = ?",
        (Utc::now().to_rfc3339(), &result_id),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    match result_response(conn, &key, &result_id) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_regenerate_feedback(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let key = match parse_result_key(req) {
        Ok(k) => k,
        Err(e) => return e.response(&req.id),
    };
    let result_id = match ensure_result_row(conn, &key) {
        Ok(id) => id,
        Err(e) => return e.response(&req.id),
    };

    let agg = match compute_aggregate(conn, &result_id, key.def) {
        Ok(a) => a,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = write_bank_feedback(conn, &result_id, key.def, &agg, true) {
        return e.response(&req.id);
    }

    match result_response(conn, &key, &result_id) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "instruments.catalog" => Some(handle_catalog(state, req)),
        "instruments.open" => Some(handle_open(state, req)),
        "instruments.setItem" => Some(handle_set_item(state, req)),
        "instruments.setFeedback" => Some(handle_set_feedback(state, req)),
        "instruments.regenerateFeedback" => Some(handle_regenerate_feedback(state, req)),
        _ => None,
    }
}
