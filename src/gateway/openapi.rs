//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::types::{
    CreateTransferRequest, CreateTransferResponse, ErrorResponse, HealthResponse, TransferDetail,
    TransferPage,
};
use crate::tracker::{StatusUpdate, TokenType, TransactionRecord, TxStatus};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Transfer Tracker API",
        version = "1.0.0",
        description = "Submit value transfers to Starknet and follow them to finality.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::create_transfer,
        crate::gateway::handlers::get_transfer,
        crate::gateway::handlers::user_history,
        crate::gateway::handlers::conversation_transfers,
    ),
    components(
        schemas(
            HealthResponse,
            CreateTransferRequest,
            CreateTransferResponse,
            TransferDetail,
            TransferPage,
            TransactionRecord,
            StatusUpdate,
            TokenType,
            TxStatus,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Transfers", description = "Transfer submission and lifecycle reads"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
