//! Product image storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image storage is not configured")]
    NotConfigured,
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("storage rejected the request with status {0}")]
    Rejected(u16),
}

/// Object key for a new product image: `public/<product>-<millis>.<ext>`.
pub fn image_path(product_id: Uuid, file_name: &str, now: DateTime<Utc>) -> String {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".into());
    format!("public/{product_id}-{}.{ext}", now.timestamp_millis())
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the object and returns its public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError>;
    async fn remove(&self, path: &str) -> Result<(), MediaError>;
}

pub struct HttpObjectStore { client: reqwest::Client, base_url: Option<String>, bucket: String, service_key: Option<String> }

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self { client: reqwest::Client::new(), base_url: config.url.clone(), bucket: config.bucket.clone(), service_key: config.service_key.clone() }
    }

    fn endpoint(&self) -> Result<(&str, &str), MediaError> {
        match (self.base_url.as_deref(), self.service_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(MediaError::NotConfigured),
        }
    }

    pub fn public_url(&self, base: &str, path: &str) -> String { format!("{base}/object/public/{}/{path}", self.bucket) }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError> {
        let (base, key) = self.endpoint()?;
        let response = self.client.post(format!("{base}/object/{}/{path}", self.bucket))
            .bearer_auth(key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send().await
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MediaError::Rejected(response.status().as_u16()));
        }
        Ok(self.public_url(base, path))
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        let (base, key) = self.endpoint()?;
        let response = self.client.delete(format!("{base}/object/{}/{path}", self.bucket))
            .bearer_auth(key)
            .send().await
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        match response.status().as_u16() {
            s if (200..300).contains(&s) || s == 404 => Ok(()),
            s => Err(MediaError::Rejected(s)),
        }
    }
}

/// In-process bucket for local runs and tests.
#[derive(Default)]
pub struct MemoryObjectStore { objects: parking_lot::Mutex<std::collections::HashMap<String, Vec<u8>>> }

impl MemoryObjectStore {
    pub fn contains(&self, path: &str) -> bool { self.objects.lock().contains_key(path) }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, MediaError> {
        self.objects.lock().insert(path.to_string(), bytes);
        Ok(format!("memory://object/public/{path}"))
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        self.objects.lock().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_image_path() {
        let id = Uuid::nil();
        let now = Utc.timestamp_millis_opt(1_717_000_000_123).unwrap();
        assert_eq!(image_path(id, "Front.JPG", now), format!("public/{id}-1717000000123.jpg"));
        assert_eq!(image_path(id, "noext", now), format!("public/{id}-1717000000123.bin"));
    }

    #[tokio::test]
    async fn test_unconfigured_store_refuses() {
        let store = HttpObjectStore::new(&StorageConfig { url: None, bucket: "product-images".into(), service_key: None });
        assert!(matches!(store.upload("public/a.jpg", vec![1], "image/jpeg").await, Err(MediaError::NotConfigured)));
    }

    #[test]
    fn test_public_url_round_trips_to_object_path() {
        use crate::domain::value_objects::ImageRef;
        let store = HttpObjectStore::new(&StorageConfig { url: Some("https://cdn.example.com/storage/v1".into()), bucket: "product-images".into(), service_key: Some("k".into()) });
        let url = store.public_url("https://cdn.example.com/storage/v1", "public/abc-1.png");
        assert_eq!(url, "https://cdn.example.com/storage/v1/object/public/product-images/public/abc-1.png");
        assert_eq!(ImageRef { url }.object_path().as_deref(), Some("public/abc-1.png"));
    }
}
