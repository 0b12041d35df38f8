use crate::backup::{export_workspace_bundle, import_workspace_bundle};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn param_path(req: &Request, name: &str) -> Option<PathBuf> {
    req.params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// The workspace path is explicit so a bundle can be produced from or restored
/// into a directory other than the currently open one.
fn workspace_path(state: &AppState, req: &Request) -> Option<PathBuf> {
    param_path(req, "workspacePath").or_else(|| state.workspace.clone())
}

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = workspace_path(state, req) else {
        return err(&req.id, "bad_params", "missing workspacePath", None);
    };
    let Some(out_path) = param_path(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => {
            info!(out = %out_path.to_string_lossy(), "exported workspace bundle");
            ok(
                &req.id,
                json!({
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "dbSha256": summary.db_sha256,
                    "outPath": out_path.to_string_lossy(),
                }),
            )
        }
        Err(e) => err(&req.id, "export_failed", e.to_string(), None),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = workspace_path(state, req) else {
        return err(&req.id, "bad_params", "missing workspacePath", None);
    };
    let Some(in_path) = param_path(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    // Importing over the open workspace swaps the database file underneath the
    // live connection; drop it first and reopen from disk.
    let reopen = state.workspace.as_deref() == Some(workspace.as_path());
    if reopen {
        state.db = None;
    }

    let outcome = import_workspace_bundle(&in_path, &workspace);
    if reopen {
        match crate::db::open_db(&workspace) {
            Ok(conn) => state.db = Some(conn),
            Err(e) => return err(&req.id, "db_open_failed", e.to_string(), None),
        }
    }

    match outcome {
        Ok(summary) => {
            info!(workspace = %workspace.to_string_lossy(), "imported workspace bundle");
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "workspacePath": workspace.to_string_lossy(),
                }),
            )
        }
        Err(e) => err(&req.id, "import_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportBundle" => Some(handle_export(state, req)),
        "backup.importBundle" => Some(handle_import(state, req)),
        _ => None,
    }
}
