use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::snapshot::{apply_snapshot, build_snapshot};
use crate::store::{store_at, DocumentStore};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_SYNC_KEY: &str = "supervisi-state";

fn status_json(state: &AppState) -> serde_json::Value {
    json!({
        "busy": state.sync.busy,
        "state": state.sync.state,
        "lastSyncedAt": state.sync.last_synced_at,
        "message": state.sync.message,
    })
}

/// Resolve the store directory: an explicit `storePath` param wins, otherwise
/// the `syncStorePath` setting. No path configured at all is an error.
fn resolve_store(
    state: &AppState,
    req: &Request,
) -> Result<(PathBuf, String), (&'static str, String)> {
    let conn = state
        .db
        .as_ref()
        .ok_or(("no_workspace", "select a workspace first".to_string()))?;

    let param_path = req
        .params
        .get("storePath")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let path = match param_path {
        Some(p) if !p.trim().is_empty() => p,
        _ => {
            let configured = db::settings_get_string(conn, "syncStorePath", "");
            if configured.trim().is_empty() {
                return Err((
                    "store_unconfigured",
                    "no store path configured; set syncStorePath or pass storePath".to_string(),
                ));
            }
            configured
        }
    };

    let key = db::settings_get_string(conn, "syncKey", DEFAULT_SYNC_KEY);
    Ok((PathBuf::from(path), key))
}

fn handle_sync_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.sync.busy {
        return err(&req.id, "sync_busy", "a sync is already in progress", None);
    }
    let (store_path, key) = match resolve_store(state, req) {
        Ok(v) => v,
        Err((code, message)) => return err(&req.id, code, message, None),
    };
    let conn = match state.db.as_ref() {
        Some(c) => c,
        None => return err(&req.id, "no_workspace", "select a workspace first", None),
    };

    state.sync.busy = true;
    let outcome = build_snapshot(conn).and_then(|doc| {
        let text = serde_json::to_string(&doc)?;
        store_at(&store_path).set(&key, &text)?;
        Ok(())
    });
    state.sync.busy = false;

    match outcome {
        Ok(()) => {
            let now = chrono::Utc::now().to_rfc3339();
            state.sync.state = "success";
            state.sync.last_synced_at = Some(now);
            state.sync.message = None;
            info!(key = %key, "saved state document");
            ok(&req.id, json!({ "saved": true, "status": status_json(state) }))
        }
        Err(e) => {
            state.sync.state = "error";
            state.sync.message = Some(e.to_string());
            err(&req.id, "sync_failed", e.to_string(), None)
        }
    }
}

fn handle_sync_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.sync.busy {
        return err(&req.id, "sync_busy", "a sync is already in progress", None);
    }
    let (store_path, key) = match resolve_store(state, req) {
        Ok(v) => v,
        Err((code, message)) => return err(&req.id, code, message, None),
    };

    let doc_text = match store_at(&store_path).get(&key) {
        Ok(v) => v,
        Err(e) => {
            state.sync.state = "error";
            state.sync.message = Some(e.to_string());
            return err(&req.id, "sync_failed", e.to_string(), None);
        }
    };
    let Some(doc_text) = doc_text else {
        return ok(&req.id, json!({ "found": false }));
    };

    let conn = match state.db.as_mut() {
        Some(c) => c,
        None => return err(&req.id, "no_workspace", "select a workspace first", None),
    };

    state.sync.busy = true;
    let outcome = serde_json::from_str::<serde_json::Value>(&doc_text)
        .map_err(anyhow::Error::from)
        .and_then(|doc| apply_snapshot(conn, &doc));
    state.sync.busy = false;

    match outcome {
        Ok(()) => {
            let now = chrono::Utc::now().to_rfc3339();
            state.sync.state = "success";
            state.sync.last_synced_at = Some(now);
            state.sync.message = None;
            info!(key = %key, "loaded state document");
            ok(&req.id, json!({ "found": true, "status": status_json(state) }))
        }
        Err(e) => {
            state.sync.state = "error";
            state.sync.message = Some(e.to_string());
            err(&req.id, "sync_failed", e.to_string(), None)
        }
    }
}

fn handle_sync_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, status_json(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.save" => Some(handle_sync_save(state, req)),
        "sync.load" => Some(handle_sync_load(state, req)),
        "sync.status" => Some(handle_sync_status(state, req)),
        _ => None,
    }
}
