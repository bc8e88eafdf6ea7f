use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{log_activity, require_workspace, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{MemoryStore, SqliteStore};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_path = match require_workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = state.store.flush() {
        log::warn!("checkpoint before export failed: {:#}", e);
    }

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": out_path })),
            )
        }
    };
    log::info!("exported workspace bundle to {}", out_path);
    log_activity(state, "backup.export", json!({ "path": out_path }));

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256
        }),
    )
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_path = match require_workspace(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // Drop the open handle before replacing the file.
    state.store = Box::new(MemoryStore::default());

    let import = backup::import_workspace_bundle(&src, &workspace_path);

    // Reopen whichever database is now in place, restored or untouched.
    match SqliteStore::open(&workspace_path) {
        Ok(store) => state.store = Box::new(store),
        Err(e) => {
            state.workspace = None;
            return err(
                &req.id,
                "db_open_failed",
                format!("{:#}", e),
                Some(json!({ "path": workspace_path.to_string_lossy() })),
            );
        }
    }

    let import = match import {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": in_path })),
            )
        }
    };
    log::info!("imported workspace bundle from {}", in_path);
    log_activity(
        state,
        "backup.import",
        json!({ "path": in_path, "format": import.bundle_format_detected }),
    );

    ok(
        &req.id,
        json!({
            "workspacePath": workspace_path.to_string_lossy(),
            "bundleFormatDetected": import.bundle_format_detected,
            "checksumVerified": import.checksum_verified
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        _ => None,
    }
}
