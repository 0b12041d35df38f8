use crate::db;
use crate::instruments::{catalog, composite_kinds, InstrumentDef};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::scoring::{aggregate, composite_percentage, AggregateResult, BandThresholds};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use super::schedule::parse_semester;

struct HandlerErr {
    code: &'static str,
    message: String,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }

    fn db(e: impl std::fmt::Display) -> Self {
        Self {
            code: "db_query_failed",
            message: e.to_string(),
        }
    }
}

/// Aggregate one subject's instrument for a semester. A missing result row or
/// an empty score map both aggregate to zero; nothing here fails on absence.
fn subject_aggregate(
    conn: &Connection,
    subject_id: &str,
    def: &InstrumentDef,
    semester: &str,
    thresholds: &BandThresholds,
) -> Result<AggregateResult, HandlerErr> {
    let result_id: Option<String> = conn
        .query_row(
            "SELECT id FROM instrument_results
             WHERE subject_id = ? AND instrument = ? AND semester = ?",
            (subject_id, def.kind.as_str(), semester),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db)?;

    let values: Vec<String> = match result_id {
        None => Vec::new(),
        Some(id) => {
            let mut stmt = conn
                .prepare("SELECT value FROM instrument_items WHERE result_id = ?")
                .map_err(HandlerErr::db)?;
            stmt.query_map([&id], |r| r.get::<_, String>(0))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(HandlerErr::db)?
        }
    };

    Ok(aggregate(
        values.iter().map(String::as_str),
        def.max_score,
        thresholds,
    ))
}

fn summary_for_subject(
    conn: &Connection,
    subject_id: &str,
    semester: &str,
    thresholds: &BandThresholds,
) -> Result<serde_json::Value, HandlerErr> {
    let mut per_instrument = Vec::new();
    let mut composite_parts = Vec::new();

    for def in catalog() {
        let agg = subject_aggregate(conn, subject_id, def, semester, thresholds)?;
        if def.composite {
            composite_parts.push(agg.percentage);
        }
        per_instrument.push(json!({
            "instrument": def.kind.as_str(),
            "title": def.title,
            "composite": def.composite,
            "aggregate": agg,
        }));
    }

    let composite = composite_percentage(&composite_parts);
    Ok(json!({
        "subjectId": subject_id,
        "semester": semester,
        "perInstrument": per_instrument,
        "composite": {
            "percentage": composite,
            "band": thresholds.band(composite),
        },
    }))
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
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

    let thresholds = db::band_thresholds(conn);
    match summary_for_subject(conn, &subject_id, &semester, &thresholds) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_recap(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let kind = match req.params.get("kind").and_then(|v| v.as_str()) {
        Some(k) if super::subjects::SUBJECT_KINDS.contains(&k) => k.to_string(),
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
    let Some(semester) = parse_semester(req.params.get("semester")) else {
        return err(&req.id, "bad_params", "semester must be Ganjil or Genap", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT id, name, id_number, role FROM subjects
         WHERE kind = ? AND active = 1 ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let subjects: Vec<(String, String, Option<String>, Option<String>)> = match stmt
        .query_map([&kind], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let thresholds = db::band_thresholds(conn);
    // Teaching subjects recap over the five composite instruments; the other
    // kinds recap their single instrument.
    let defs: Vec<&'static InstrumentDef> = if kind == "guru" {
        composite_kinds().collect()
    } else {
        let wanted = match kind.as_str() {
            "ekstra" => "ekstrakurikuler",
            _ => "administrasi-ptt",
        };
        catalog()
            .iter()
            .filter(|d| d.kind.as_str() == wanted)
            .collect()
    };

    let mut rows = Vec::with_capacity(subjects.len());
    for (subject_id, name, id_number, role) in &subjects {
        let mut per_instrument = Vec::new();
        let mut parts = Vec::new();
        for def in &defs {
            let agg = match subject_aggregate(conn, subject_id, def, &semester, &thresholds) {
                Ok(a) => a,
                Err(e) => return e.response(&req.id),
            };
            parts.push(agg.percentage);
            per_instrument.push(json!({
                "instrument": def.kind.as_str(),
                "percentage": agg.percentage,
            }));
        }
        let composite = composite_percentage(&parts);
        rows.push(json!({
            "subjectId": subject_id,
            "name": name,
            "idNumber": id_number,
            "role": role,
            "perInstrument": per_instrument,
            "composite": composite,
            "band": thresholds.band(composite),
        }));
    }

    ok(
        &req.id,
        json!({ "kind": kind, "semester": semester, "rows": rows }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scoring.summary" => Some(handle_summary(state, req)),
        "scoring.recap" => Some(handle_recap(state, req)),
        _ => None,
    }
}
