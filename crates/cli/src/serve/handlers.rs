//! Route handlers for the registry API.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use sustain_registry::{RecordFilter, RegistryError};

use super::json_error;
use super::state::AppState;

/// HTTP status for a registry error. The body always carries the registry
/// code, so clients can tell e.g. 105 from 106 behind the same 409.
pub(crate) fn status_for(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::NotAuthorized { .. } => StatusCode::FORBIDDEN,
        RegistryError::NotVerified { .. } => StatusCode::NOT_FOUND,
        RegistryError::AlreadyVerified { .. }
        | RegistryError::AlreadyInitialized { .. }
        | RegistryError::NotInitialized
        | RegistryError::AuditChainBroken { .. } => StatusCode::CONFLICT,
        RegistryError::InvalidCertificationLevel { .. } | RegistryError::InvalidInput { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RegistryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn registry_error(err: RegistryError) -> Response {
    (status_for(&err), Json(err.to_json_value())).into_response()
}

/// 400 for a body or query string that does not deserialize.
fn bad_request(detail: String) -> Response {
    let body = serde_json::json!({
        "code": 104,
        "message": "Invalid input",
        "detail": detail,
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn ok_json<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    status: Option<RecordFilter>,
    limit: Option<usize>,
}

/// GET /managers?status=all|active|revoked&limit=N
pub(crate) async fn handle_list_managers(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let filter = params.status.unwrap_or_default();
    match state
        .registry
        .list_managers(filter, params.limit.unwrap_or(0))
        .await
    {
        Ok(records) => ok_json(serde_json::json!({
            "count": records.len(),
            "managers": records,
        })),
        Err(e) => registry_error(e),
    }
}

/// GET /managers/{manager}
///
/// Returns the stored record, revoked ones included. Unknown managers are
/// 404 with code 102.
pub(crate) async fn handle_get_manager(
    State(state): State<Arc<AppState>>,
    Path(manager): Path<String>,
) -> Response {
    match state.registry.get_details(&manager).await {
        Ok(Some(record)) => ok_json(record),
        Ok(None) => registry_error(RegistryError::NotVerified { manager }),
        Err(e) => registry_error(e),
    }
}

/// GET /managers/{manager}/verified
pub(crate) async fn handle_is_verified(
    State(state): State<Arc<AppState>>,
    Path(manager): Path<String>,
) -> Response {
    match state.registry.is_verified(&manager).await {
        Ok(verified) => ok_json(serde_json::json!({
            "manager": manager,
            "verified": verified,
        })),
        Err(e) => registry_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyRequest {
    caller: String,
    name: String,
    organization: String,
    #[serde(alias = "certificationLevel")]
    certification_level: u32,
}

/// POST /managers/{manager}/verify
pub(crate) async fn handle_verify(
    State(state): State<Arc<AppState>>,
    Path(manager): Path<String>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state
        .registry
        .verify(
            &req.caller,
            &manager,
            &req.name,
            &req.organization,
            req.certification_level,
        )
        .await
    {
        Ok(outcome) => ok_json(outcome),
        Err(e) => registry_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallerRequest {
    caller: String,
}

/// POST /managers/{manager}/revoke
pub(crate) async fn handle_revoke(
    State(state): State<Arc<AppState>>,
    Path(manager): Path<String>,
    payload: Result<Json<CallerRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state.registry.revoke(&req.caller, &manager).await {
        Ok(outcome) => ok_json(outcome),
        Err(e) => registry_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    limit: Option<usize>,
}

/// GET /managers/{manager}/history
pub(crate) async fn handle_manager_history(
    State(state): State<Arc<AppState>>,
    Path(manager): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state
        .registry
        .history(Some(&manager), params.limit.unwrap_or(0))
        .await
    {
        Ok(events) => ok_json(serde_json::json!({ "manager": manager, "events": events })),
        Err(e) => registry_error(e),
    }
}

/// GET /history
pub(crate) async fn handle_history(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state.registry.history(None, params.limit.unwrap_or(0)).await {
        Ok(events) => ok_json(serde_json::json!({ "events": events })),
        Err(e) => registry_error(e),
    }
}

/// GET /audit
pub(crate) async fn handle_audit(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.verify_audit_chain().await {
        Ok(checked) => ok_json(serde_json::json!({ "valid": true, "events": checked })),
        Err(e) => registry_error(e),
    }
}

/// GET /owner
pub(crate) async fn handle_owner(State(state): State<Arc<AppState>>) -> Response {
    match state.registry.owner().await {
        Ok(owner) => ok_json(serde_json::json!({ "owner": owner })),
        Err(e) => registry_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransferRequest {
    caller: String,
    #[serde(alias = "newOwner")]
    new_owner: String,
}

/// POST /owner/transfer
pub(crate) async fn handle_transfer_owner(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state
        .registry
        .transfer_ownership(&req.caller, &req.new_owner)
        .await
    {
        Ok(outcome) => ok_json(outcome),
        Err(e) => registry_error(e),
    }
}
