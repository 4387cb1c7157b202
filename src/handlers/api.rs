use axum::{http::Uri, response::Json};
use serde_json::{Value, json};

use crate::errors::app_error::{AppError, AppResult};

/// Health check handler
/// Returns a simple JSON response indicating the server is running
pub async fn health_check() -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "status": "OK"
    })))
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
