//! BunnyCDN edge storage client
//!
//! Files are written with one authenticated `PUT` each:
//! `{storage_endpoint}/{storage_zone}/{cdn_directory}/{path}`.

use crate::adapters::http::{build_client, error_for_status, retry_request};
use crate::adapters::s3::{content_type, join_key};
use crate::config::schema::{BunnyConfig, RetryConfig};
use crate::config::SecretString;
use crate::domain::errors::BackendError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Client for one storage zone
pub struct BunnyClient {
    client: Client,
    storage_endpoint: String,
    storage_zone: String,
    cdn_directory: Option<String>,
    access_key: SecretString,
    retry: RetryConfig,
}

impl BunnyClient {
    pub fn new(config: &BunnyConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            storage_endpoint: config.storage_endpoint.trim_end_matches('/').to_string(),
            storage_zone: config.storage_zone.clone(),
            cdn_directory: config.cdn_directory.clone(),
            access_key: config.access_key.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Storage URL for a path inside the zone's CDN directory
    pub fn object_url(&self, remote_path: &str) -> String {
        let key = join_key(self.cdn_directory.as_deref(), remote_path);
        format!("{}/{}/{}", self.storage_endpoint, self.storage_zone, key)
    }

    /// Upload a local file; false on any failure
    pub async fn upload_file(&self, local_path: &Path, remote_path: &str) -> bool {
        let bytes = match tokio::fs::read(local_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    file_path = %local_path.display(),
                    error = %e,
                    "Could not read file for upload"
                );
                return false;
            }
        };

        match self.put_bytes(remote_path, bytes).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    storage_zone = %self.storage_zone,
                    remote_path = %remote_path,
                    error = %e,
                    "BunnyCDN upload failed"
                );
                false
            }
        }
    }

    /// PUT raw bytes, retrying transient failures
    pub async fn put_bytes(&self, remote_path: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        let url = self.object_url(remote_path);
        let checksum = sha256_upper_hex(&bytes);
        let mime = content_type(remote_path);

        retry_request(&self.retry, || async {
            let response = self
                .client
                .put(&url)
                .header("AccessKey", self.access_key.expose_secret().as_str())
                .header("Checksum", checksum.as_str())
                .header(CONTENT_TYPE, mime)
                .body(bytes.clone())
                .send()
                .await?;
            error_for_status(response).await?;
            Ok(())
        })
        .await?;

        tracing::debug!(url = %url, "Uploaded to BunnyCDN");
        Ok(())
    }
}

fn sha256_upper_hex(bytes: &[u8]) -> String {
    format!("{:X}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use tempfile::TempDir;

    fn config(endpoint: &str) -> BunnyConfig {
        BunnyConfig {
            storage_zone: "my-zone".to_string(),
            access_key: secret_string("zone-password".to_string()),
            storage_endpoint: endpoint.to_string(),
            cdn_directory: Some("site".to_string()),
            custom_404_path: None,
            batch_size: 25,
            throttle: false,
            throttle_ms: 0,
            timeout_seconds: 5,
            retry: RetryConfig {
                max_retries: 1,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
        }
    }

    #[test]
    fn test_object_url() {
        let client = BunnyClient::new(&config("https://storage.bunnycdn.com/")).unwrap();
        assert_eq!(
            client.object_url("/blog/index.html"),
            "https://storage.bunnycdn.com/my-zone/site/blog/index.html"
        );
    }

    #[test]
    fn test_checksum_is_uppercase_sha256() {
        assert_eq!(
            sha256_upper_hex(b"abc"),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
        assert_eq!(
            sha256_upper_hex(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[tokio::test]
    async fn test_upload_file_sends_access_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/my-zone/site/index.html")
            .match_header("AccessKey", "zone-password")
            .match_body("<h1>home</h1>")
            .with_status(201)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<h1>home</h1>").unwrap();

        let client = BunnyClient::new(&config(&server.url())).unwrap();
        assert!(client.upload_file(&file, "index.html").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_file_returns_false_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/my-zone/site/index.html")
            .with_status(401)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "x").unwrap();

        let client = BunnyClient::new(&config(&server.url())).unwrap();
        assert!(!client.upload_file(&file, "index.html").await);
    }

    #[tokio::test]
    async fn test_put_bytes_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/my-zone/site/404.html")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = BunnyClient::new(&config(&server.url())).unwrap();
        let err = client.put_bytes("404.html", b"gone".to_vec()).await.unwrap_err();
        assert!(matches!(err, BackendError::ServerError { status: 503, .. }));
        mock.assert_async().await;
    }
}
