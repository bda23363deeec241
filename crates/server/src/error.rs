use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use service::ServiceError;
use thiserror::Error;
use tracing::error;

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(err) => match err {
                ServiceError::InvalidReference(_)
                | ServiceError::InvalidStatusCode(_)
                | ServiceError::InvalidTransactionId(_)
                | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ServiceError::InvalidSignature => StatusCode::UNAUTHORIZED,
                ServiceError::TransactionNotFound(_)
                | ServiceError::ItemsNotFound(_)
                | ServiceError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Db(_) | ServiceError::Gateway(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };

        let body = ApiResponse {
            success: false,
            message,
            data: Value::Null,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::RepositoryError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::MalformedPayload("eof".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::InvalidReference("x".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::InvalidStatusCode("9".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::InvalidSignature.into(), StatusCode::UNAUTHORIZED),
            (
                ServiceError::ItemsNotFound("x".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::Db(RepositoryError::Corrupt("bad status".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let err: ApiError = ServiceError::Db(RepositoryError::Corrupt("secret".into())).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("secret"));

        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error.");
        assert_eq!(body["data"], Value::Null);
    }
}
