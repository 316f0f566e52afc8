//! Object storage for uploaded meal and report images. The store returns a
//! public URL that later lands in task payloads and inference requests.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage rejected upload: {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the bytes under a fresh key and returns the public URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;
}

fn extension_for(content_type: &str) -> Result<&'static str, ObjectStoreError> {
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        "image/heic" => Ok("heic"),
        other => Err(ObjectStoreError::UnsupportedContentType(other.to_string())),
    }
}

/// HTTP-backed object store speaking the Supabase storage API.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, bucket: &str) -> Self {
        HttpObjectStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let key = format!("{}.{}", Uuid::new_v4(), extension_for(content_type)?);

        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, key
            ))
            .bearer_auth(&self.api_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Status { status, message });
        }

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        ))
    }
}
