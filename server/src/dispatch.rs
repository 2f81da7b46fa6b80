use badge_bridge_core::{actions, ErrorCode, Request, Response};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::state::BridgeState;
use crate::store::StoreError;

/// Executes one action and produces exactly one response. Domain errors
/// come back as `ok=false` responses with a structured code; they never
/// tear down the connection.
pub fn dispatch(state: &BridgeState, req: &Request) -> Response {
    let body = req.body.as_object().cloned().unwrap_or_default();
    match req.action.as_str() {
        actions::ADMIN_LOGIN => admin_login(state, req.id, &body),
        actions::ADMIN_LOGOUT => admin_logout(state, req.id, &body),
        action => {
            // Everything past this point mutates or reads the worker store
            // and requires a live session.
            if let Err(resp) = require_admin(state, req.id, &body) {
                return resp;
            }
            match action {
                actions::GET_FIRST_ADMIN_ID => get_first_admin_id(state, req.id),
                actions::LIST_WORKERS => list_workers(state, req.id),
                actions::CREATE_WORKER => create_worker(state, req.id, &body),
                actions::UPDATE_WORKER => update_worker(state, req.id, &body),
                actions::DELETE_WORKER => delete_worker(state, req.id, &body),
                other => Response::failure(
                    req.id,
                    ErrorCode::BadRequest,
                    format!("Unknown action: {other}"),
                ),
            }
        }
    }
}

fn require_admin(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Result<i64, Response> {
    let token = body.get("auth_token").and_then(Value::as_str);
    token
        .and_then(|token| state.sessions.admin_for(token))
        .ok_or_else(|| Response::failure(id, ErrorCode::Unauthorized, "Admin login required"))
}

fn admin_login(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Response {
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();
    if password.is_empty() {
        return Response::failure(id, ErrorCode::BadRequest, "Password required");
    }
    if !state.admins.verify_password(password) {
        return Response::failure(id, ErrorCode::Unauthorized, "Invalid password");
    }
    let Some(admin_id) = state.admins.first_admin_id() else {
        return Response::failure(id, ErrorCode::Unauthorized, "No admin registered");
    };
    let token = state.sessions.insert(admin_id);
    debug!(admin_id, sessions = state.sessions.len(), "admin logged in");
    Response::success(id, Some(json!({ "token": token, "admin_id": admin_id })))
}

fn admin_logout(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Response {
    if let Some(token) = body.get("auth_token").and_then(Value::as_str) {
        state.sessions.remove(token);
    }
    Response::success(id, None)
}

fn get_first_admin_id(state: &BridgeState, id: u64) -> Response {
    match state.admins.first_admin_id() {
        Some(admin_id) => Response::success(id, Some(json!({ "admin_id": admin_id }))),
        None => Response::success(id, None),
    }
}

fn list_workers(state: &BridgeState, id: u64) -> Response {
    ok_json(id, &state.store.list())
}

fn create_worker(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Response {
    let Some(admin_id) = body.get("admin_id").and_then(Value::as_i64) else {
        return Response::failure(id, ErrorCode::BadRequest, "admin_id required");
    };
    let name = body.get("name").and_then(Value::as_str).unwrap_or("");
    let card_uid = body.get("card_uid").and_then(Value::as_str).unwrap_or("");
    match state.store.create(admin_id, name, card_uid) {
        Ok(worker) => ok_json(id, &worker),
        Err(err) => store_failure(id, err),
    }
}

fn update_worker(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Response {
    let Some(worker_id) = body.get("worker_id").and_then(Value::as_i64) else {
        return Response::failure(id, ErrorCode::BadRequest, "worker_id required");
    };
    let name = body.get("name").and_then(Value::as_str);
    let card_uid = body.get("card_uid").and_then(Value::as_str);
    match state.store.update(worker_id, name, card_uid) {
        Ok(worker) => ok_json(id, &worker),
        Err(err) => store_failure(id, err),
    }
}

fn delete_worker(state: &BridgeState, id: u64, body: &Map<String, Value>) -> Response {
    let Some(worker_id) = body.get("worker_id").and_then(Value::as_i64) else {
        return Response::failure(id, ErrorCode::BadRequest, "worker_id required");
    };
    match state.store.delete(worker_id) {
        Ok(()) => Response::success(id, None),
        Err(err) => store_failure(id, err),
    }
}

fn store_failure(id: u64, err: StoreError) -> Response {
    match err {
        StoreError::NotFound => Response::failure(id, ErrorCode::NotFound, err.to_string()),
        StoreError::DuplicateCardUid(detail) => {
            Response::failure(id, ErrorCode::Conflict, detail)
        }
    }
}

fn ok_json<T: serde::Serialize>(id: u64, value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(body) => Response::success(id, Some(body)),
        // Uncoded internal failure; the client surfaces the text as-is.
        Err(err) => Response {
            id,
            ok: false,
            body: None,
            error: Some(err.to_string()),
            code: None,
        },
    }
}
