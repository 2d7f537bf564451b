//! Minimal GCS object client over the XML interoperability API.

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::StatusCode;

use crate::error::{AppError, Result};

/// GCS client
#[derive(Debug, Clone)]
pub struct Client {
    access_id: String,
    secret: String,
    bucket: String,
    endpoint: Option<String>,
    http: reqwest::Client,
}

impl Client {
    /// Create a new client
    ///
    /// `endpoint` overrides the Google host with a path-style base URL,
    /// which is what local fake servers expect.
    pub fn new(
        access_id: impl Into<String>,
        secret: impl Into<String>,
        bucket: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            secret: secret.into(),
            bucket: bucket.into(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            http: reqwest::Client::new(),
        }
    }

    /// Virtual-hosted bucket host
    pub fn get_host(&self) -> String {
        format!("{}.storage.googleapis.com", self.bucket)
    }

    /// URL a request for the object is sent to
    pub fn object_url(&self, key: &str) -> String {
        let encoded = urlencoding::encode(key);
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, encoded),
            None => format!("https://{}/{}", self.get_host(), encoded),
        }
    }

    /// Deterministic public URL recorded as the blob locator
    pub fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!("https://storage.googleapis.com/{}/{}", self.bucket, key),
        }
    }

    /// Canonicalized resource used for signing
    fn resource(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    /// Signed headers common to every request
    fn signed_headers(&self, method: &str, key: &str, content_type: &str) -> HeaderMap {
        let date = Utc::now().format("%a, %d %b %Y %T GMT").to_string();
        let resource = self.resource(key);
        let signer = super::signer::Signer::new(method, &resource, content_type, &date);
        let auth = signer.authorization(&self.access_id, &self.secret);

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&date) {
            headers.insert(DATE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&auth) {
            headers.insert(AUTHORIZATION, value);
        }
        if !content_type.is_empty() {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        headers
    }

    /// Upload an object
    pub async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let resp = self
            .http
            .put(self.object_url(key))
            .headers(self.signed_headers("PUT", key, content_type))
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GCS upload failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Storage(format!(
                "GCS upload failed: HTTP {}",
                resp.status()
            )));
        }

        tracing::debug!("Uploaded object {}", key);
        Ok(())
    }

    /// Download an object
    pub async fn get_object(&self, key: &str) -> Result<Bytes> {
        let resp = self
            .http
            .get(self.object_url(key))
            .headers(self.signed_headers("GET", key, ""))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GCS download failed: {}", e)))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        if !resp.status().is_success() {
            return Err(AppError::Storage(format!(
                "GCS download failed: HTTP {}",
                resp.status()
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| AppError::Storage(format!("GCS download failed: {}", e)))
    }

    /// Delete an object. A missing object counts as deleted.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.object_url(key))
            .headers(self.signed_headers("DELETE", key, ""))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GCS delete failed: {}", e)))?;

        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
            tracing::debug!("Deleted object {}", key);
            return Ok(());
        }

        Err(AppError::Storage(format!(
            "GCS delete failed: HTTP {}",
            resp.status()
        )))
    }

    /// Check whether an object exists
    pub async fn head_object(&self, key: &str) -> Result<bool> {
        let resp = self
            .http
            .head(self.object_url(key))
            .headers(self.signed_headers("HEAD", key, ""))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GCS head failed: {}", e)))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !resp.status().is_success() {
            return Err(AppError::Storage(format!(
                "GCS head failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(true)
    }
}
