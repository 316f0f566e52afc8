use axum::{extract::State, response::Json, routing::post, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload_image))
}

#[derive(Debug, Deserialize, Validate)]
struct UploadImageRequest {
    #[validate(length(min = 1))]
    base64_image: String,
    #[serde(default = "default_content_type")]
    content_type: String,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Serialize)]
struct UploadImageResponse {
    url: String,
}

/// Accepts a base64 image (with or without a `data:` prefix), stores it and
/// returns the public URL for use in a later analysis task.
async fn upload_image(
    State(state): State<AppState>,
    Json(request): Json<UploadImageRequest>,
) -> Result<Json<UploadImageResponse>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let encoded = request
        .base64_image
        .rsplit_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(&request.base64_image);

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 image: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Empty image".to_string()));
    }

    let url = state
        .object_store
        .upload(bytes, &request.content_type)
        .await
        .map_err(|e| match e {
            ObjectStoreError::UnsupportedContentType(t) => {
                AppError::BadRequest(format!("Unsupported content type: {}", t))
            }
            other => AppError::Storage(other.to_string()),
        })?;

    Ok(Json(UploadImageResponse { url }))
}
