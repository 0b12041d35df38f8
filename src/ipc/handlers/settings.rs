use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Keys the front end may set. School identity, supervision defaults, and the
/// sync store location all live here; nothing is hardcoded in the binary.
const KNOWN_KEYS: &[&str] = &[
    "schoolName",
    "schoolAddress",
    "principalName",
    "principalIdNumber",
    "schoolYear",
    "semester",
    "timeSlot",
    "supervisor1",
    "supervisor2",
    "thresholds",
    "syncStorePath",
    "syncKey",
];

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match db::settings_all(conn) {
        Ok(map) => ok(&req.id, json!({ "settings": map })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    let mut updated = 0_usize;
    for (key, value) in patch {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return err(
                &req.id,
                "bad_params",
                "unknown settings key",
                Some(json!({ "key": key })),
            );
        }
        if let Err(e) = db::settings_set_json(conn, key, value) {
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
        updated += 1;
    }

    ok(&req.id, json!({ "updated": updated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
