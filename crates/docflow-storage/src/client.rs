//! S3 artifact store.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use docflow_models::JobId;

use crate::error::{StorageError, StorageResult};
use crate::reference::{ArtifactRef, DEFAULT_PUBLIC_HOST};
use crate::store::{content_type_for, ArtifactStore};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket outputs are published to
    pub bucket_name: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint for S3-compatible stores
    pub endpoint_url: Option<String>,
    /// Static credentials; the default provider chain is used when absent
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Host suffix used in `https://bucket.<host>/key` references
    pub public_host: String,
    /// Key prefix for published outputs
    pub output_prefix: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let bucket_name = std::env::var("AWS_S3_BUCKET")
            .ok()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| StorageError::config_error("AWS_S3_BUCKET not set"))?;

        Ok(Self {
            bucket_name,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").ok(),
            public_host: std::env::var("S3_PUBLIC_HOST")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_HOST.to_string()),
            output_prefix: std::env::var("S3_OUTPUT_PREFIX")
                .unwrap_or_else(|_| "processed".to_string()),
        })
    }
}

/// Build `<prefix>/<job id>/<file name>`, tolerating an empty prefix.
pub(crate) fn build_output_key(prefix: &str, job_id: &JobId, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", job_id, file_name)
    } else {
        format!("{}/{}/{}", prefix, job_id, file_name)
    }
}

/// S3-backed artifact store.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    public_host: String,
    output_prefix: String,
}

impl S3ArtifactStore {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let client = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "docflow-env");
                let mut builder = Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .credentials_provider(credentials);
                if let Some(endpoint) = &config.endpoint_url {
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
            (None, None) => {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                let mut builder = Builder::from(&sdk_config);
                if let Some(endpoint) = &config.endpoint_url {
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
            _ => {
                return Err(StorageError::config_error(
                    "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
                ))
            }
        };

        info!(
            "S3 artifact store ready (bucket: {}, region: {})",
            config.bucket_name, config.region
        );

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_host: config.public_host,
            output_prefix: config.output_prefix,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Bucket outputs are published to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::AwsSdk(format!(
                    "S3 connectivity check failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64> {
        let artifact = ArtifactRef::parse(reference, &self.public_host)?;
        debug!("Downloading {} to {}", artifact, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&artifact.bucket)
            .key(&artifact.key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()) == Some(true) {
                    StorageError::not_found(artifact.to_string())
                } else {
                    StorageError::download_failed(DisplayErrorContext(&e).to_string())
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let size = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", artifact, e)))?;
        file.flush().await?;

        info!("Downloaded {} ({} bytes)", artifact, size);
        Ok(size)
    }

    async fn upload(&self, src: &Path, key: &str) -> StorageResult<String> {
        debug!("Uploading {} to {}", src.display(), key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(DisplayErrorContext(&e).to_string()))?;

        let reference = ArtifactRef::new(&self.bucket, key).to_https(&self.public_host);
        info!("Uploaded {} to {}", src.display(), reference);
        Ok(reference)
    }

    fn output_key(&self, job_id: &JobId, file_name: &str) -> String {
        build_output_key(&self.output_prefix, job_id, file_name)
    }
}
