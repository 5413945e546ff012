//! Gateway request/response types
//!
//! - Request DTOs validated with `validator` before they reach the initiator
//! - `ApiError`: `{ code, msg }` JSON body with a matching HTTP status

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::tracker::{Page, PageRequest, TokenType, TrackerError, TransactionRecord, TxStatus};
use crate::transfer::{TransferError, TransferIntent, TransferReceipt};

/// Header carrying the authenticated caller
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// Requests
// ============================================================================

/// Transfer request body. The sender is the `X-User-ID` caller.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    #[validate(length(min = 1, max = 128))]
    #[schema(example = "user-bob")]
    pub recipient_id: String,
    #[validate(length(min = 1, max = 128))]
    #[schema(example = "conv-42")]
    pub conversation_id: String,
    #[validate(length(min = 1, max = 128))]
    pub message_id: Option<String>,
    #[validate(length(min = 3, max = 66))]
    #[schema(example = "0x0a11ce")]
    pub sender_address: Option<String>,
    #[validate(length(min = 3, max = 66))]
    #[schema(example = "0x0b0b")]
    pub recipient_address: Option<String>,
    pub token_type: TokenType,
    #[validate(length(min = 3, max = 66))]
    pub token_address: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub token_id: Option<String>,
    /// Base-unit integer as a string
    #[validate(length(min = 1, max = 78))]
    #[schema(example = "1000000000000000000")]
    pub amount: String,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl CreateTransferRequest {
    pub fn into_intent(self, sender_id: String) -> TransferIntent {
        TransferIntent {
            sender_id,
            recipient_id: self.recipient_id,
            conversation_id: self.conversation_id,
            message_id: self.message_id,
            sender_address: self.sender_address,
            recipient_address: self.recipient_address,
            token_type: self.token_type,
            token_address: self.token_address,
            token_id: self.token_id,
            amount: self.amount,
            metadata: self.metadata,
        }
    }
}

/// Pagination query (`?page=1&limit=20`)
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size (default 20, max 100)
    pub limit: Option<u32>,
}

impl From<PageQuery> for PageRequest {
    fn from(q: PageQuery) -> Self {
        PageRequest::new(q.page, q.limit)
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferResponse {
    pub id: Uuid,
    #[schema(example = "0x5f3c1b")]
    pub tx_hash: String,
    pub status: TxStatus,
    #[schema(example = "https://sepolia.voyager.online/tx/0x5f3c1b")]
    pub explorer_url: String,
}

impl From<TransferReceipt> for CreateTransferResponse {
    fn from(receipt: TransferReceipt) -> Self {
        Self {
            id: receipt.record.id,
            tx_hash: receipt.record.tx_hash,
            status: receipt.record.status,
            explorer_url: receipt.explorer_url,
        }
    }
}

/// A record plus its explorer link
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetail {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferPage {
    pub items: Vec<TransactionRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub limit: u32,
    pub total: u64,
}

impl From<Page<TransactionRecord>> for TransferPage {
    fn from(page: Page<TransactionRecord>) -> Self {
        Self {
            items: page.items,
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "postgres")]
    pub store: String,
    #[schema(example = "starknet-rpc")]
    pub ledger: String,
    /// Hashes currently being reconciled
    pub pending: usize,
    pub uptime_secs: u64,
    #[schema(example = "0.1.0")]
    pub version: String,
    pub git_hash: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "INVALID_AMOUNT")]
    pub code: String,
    #[schema(example = "Invalid amount: amount must be greater than zero")]
    pub msg: String,
}

/// Handler error rendered as `ErrorResponse`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub msg: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg)
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        TransferError::from(e).into()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code.to_string(),
            msg: self.msg,
        };
        (self.status, Json(body)).into_response()
    }
}
