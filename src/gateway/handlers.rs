//! Transfer and system handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, warn};
use validator::Validate;

use crate::tracker::RefreshOutcome;
use crate::transfer::TransferError;

use super::state::AppState;
use super::types::{
    ApiError, ApiResult, CreateTransferRequest, CreateTransferResponse, ErrorResponse,
    HealthResponse, PageQuery, TransferDetail, TransferPage, USER_ID_HEADER,
};

/// Caller identity from `X-User-ID`
fn caller_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::from(TransferError::Unauthorized))
}

/// Submit a transfer
///
/// The sender is the `X-User-ID` caller. Returns once the ledger accepted
/// the call; finality is tracked in the background.
#[utoipa::path(
    post,
    path = "/transfers",
    request_body = CreateTransferRequest,
    params(("X-User-ID" = String, Header, description = "Authenticated sender")),
    responses(
        (status = 201, description = "Submitted; record is PENDING", body = CreateTransferResponse),
        (status = 400, description = "Invalid transfer parameters", body = ErrorResponse),
        (status = 401, description = "Missing X-User-ID", body = ErrorResponse),
        (status = 422, description = "Ledger rejected the submission", body = ErrorResponse),
        (status = 502, description = "Ledger unreachable", body = ErrorResponse)
    ),
    tag = "Transfers"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateTransferResponse>)> {
    let sender_id = caller_id(&headers)?;
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    req.validate()?;

    let receipt = state.initiator.initiate(req.into_intent(sender_id)).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Get a transfer by hash
///
/// A non-terminal record is reconciled with the ledger before it is
/// returned. Lookup problems are not surfaced; the stored record is.
#[utoipa::path(
    get,
    path = "/transfers/{tx_hash}",
    params(("tx_hash" = String, Path, description = "Transaction hash")),
    responses(
        (status = 200, description = "Transfer record", body = TransferDetail),
        (status = 404, description = "Unknown hash", body = ErrorResponse)
    ),
    tag = "Transfers"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(tx_hash): Path<String>,
) -> ApiResult<Json<TransferDetail>> {
    let tx_hash = tx_hash.trim().to_ascii_lowercase();
    let record = state
        .store
        .get_by_hash(&tx_hash)
        .await
        .map_err(TransferError::from)?
        .ok_or_else(|| TransferError::NotFound(tx_hash.clone()))?;

    let record = if record.status.is_terminal() {
        record
    } else {
        match state.tracker.refresh(&tx_hash).await {
            Ok(RefreshOutcome::Updated(update)) => {
                debug!(tx_hash = %tx_hash, status = %update.status, "On-demand refresh");
                let mut record = record;
                record.apply(&update);
                record
            }
            Ok(_) => record,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "On-demand refresh failed");
                record
            }
        }
    };

    let explorer_url = state.initiator.explorer_url(&record.tx_hash);
    Ok(Json(TransferDetail {
        record,
        explorer_url,
    }))
}

/// Transfers sent or received by the caller, newest first
#[utoipa::path(
    get,
    path = "/transfers/user/history",
    params(
        ("X-User-ID" = String, Header, description = "Authenticated user"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Page of transfers", body = TransferPage),
        (status = 401, description = "Missing X-User-ID", body = ErrorResponse)
    ),
    tag = "Transfers"
)]
pub async fn user_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<TransferPage>> {
    let user_id = caller_id(&headers)?;
    let page = state
        .store
        .list_by_user(&user_id, query.into())
        .await
        .map_err(TransferError::from)?;
    Ok(Json(page.into()))
}

/// Transfers of a conversation, newest first
#[utoipa::path(
    get,
    path = "/transfers/conversation/{conversation_id}",
    params(
        ("conversation_id" = String, Path, description = "Conversation id"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Page of transfers", body = TransferPage)
    ),
    tag = "Transfers"
)]
pub async fn conversation_transfers(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<TransferPage>> {
    let page = state
        .store
        .list_by_conversation(&conversation_id, query.into())
        .await
        .map_err(TransferError::from)?;
    Ok(Json(page.into()))
}

/// Health check
///
/// - Healthy: 200 OK + `{status: "ok", ...}`
/// - Store unreachable: 503 + `{status: "degraded", ...}`
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let healthy = match state.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(store = state.store.name(), error = %e, "[HEALTH] Store check failed");
            false
        }
    };

    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        store: state.store.name().to_string(),
        ledger: state.ledger_name.to_string(),
        pending: state.tracker.pending().len(),
        uptime_secs: state.uptime_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
