use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use model::{Product, Transaction};
use prometheus::Encoder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use service::{
    CheckoutRequest, CheckoutResult, PaymentNotification, ServiceError, TransactionDetails,
    TransactionList,
};
use tracing::{error, info};

use crate::AppState;
use crate::error::{ApiError, ApiResponse};

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Bodies are read as raw bytes so that a malformed payload gets the same
/// JSON error envelope as every other failure.
fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedPayload(e.to_string()))
}

pub(crate) async fn payment_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<TransactionDetails> {
    let notification: PaymentNotification = parse_json(&body)?;
    info!(order_id = ?notification.order_id, "Received payment notification");

    let details = state.service.handle_notification(&notification).await?;
    Ok(ApiResponse::ok(
        "Payment notification received and transaction updated successfully.",
        details,
    ))
}

pub(crate) async fn set_transaction_status(
    State(state): State<AppState>,
    Path((transaction_id, status)): Path<(String, String)>,
) -> ApiResult<TransactionDetails> {
    let details = state.service.set_status(&transaction_id, &status).await?;
    Ok(ApiResponse::ok("Transaction updated successfully!", details))
}

pub(crate) async fn checkout(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, ApiResponse<CheckoutResult>), ApiError> {
    let request: CheckoutRequest = parse_json(&body)?;
    let result = state.service.checkout(&request).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Transaction created successfully!", result),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    status: Option<String>,
}

pub(crate) async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<TransactionList> {
    let status = query.status.ok_or_else(|| {
        ServiceError::InvalidRequest("status query parameter is required".to_string())
    })?;
    let list = state.service.list_by_status(&status).await?;
    Ok(ApiResponse::ok("Transactions fetched successfully!", list))
}

pub(crate) async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> ApiResult<TransactionDetails> {
    let details = state.service.get_transaction(&transaction_id).await?;
    Ok(ApiResponse::ok("Transaction fetched successfully!", details))
}

#[derive(Debug, Deserialize)]
struct CookingStatusBody {
    cooking_status: String,
}

pub(crate) async fn update_cooking_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Bytes,
) -> ApiResult<Transaction> {
    let body: CookingStatusBody = parse_json(&body)?;
    let transaction = state
        .service
        .update_cooking_status(&transaction_id, &body.cooking_status)
        .await?;
    Ok(ApiResponse::ok("Cooking status updated successfully!", transaction))
}

pub(crate) async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let products = state.service.list_products().await?;
    Ok(ApiResponse::ok("Products fetched successfully!", products))
}

pub(crate) async fn health() -> &'static str {
    "OK"
}

pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    match String::from_utf8(buffer) {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to convert metrics to UTF-8: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
        }
    }
}
