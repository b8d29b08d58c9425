//! Object storage for the CSV backup.
//!
//! [`ObjectStore`] is the seam the ingest pipeline and the dashboard use.
//! [`S3ObjectStore`] talks to S3; [`FsObjectStore`] mirrors the same
//! `bucket/key` layout under a local directory for offline runs.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes>;
    async fn upload(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS configuration (env vars, profile,
    /// instance role).
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("S3 GetObject failed for s3://{bucket}/{key}"))?;

        let body = resp
            .body
            .collect()
            .await
            .with_context(|| format!("reading body of s3://{bucket}/{key}"))?;
        Ok(body.into_bytes())
    }

    async fn upload(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let content_type = if key.ends_with(".gz") {
            "application/gzip"
        } else {
            "text/csv"
        };

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for s3://{bucket}/{key}"))?;

        Ok(())
    }
}

/// Stores objects as files at `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.path(bucket, key);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn upload(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let path = self.path(bucket, key);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = body.len(), "Object written");
        Ok(())
    }
}

/// Gzip-compresses an upload body.
pub fn gzip(data: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(Bytes::from(encoder.finish()?))
}

/// Returns the object body as CSV bytes, gunzipping keys that end in `.gz`.
pub fn decode_body(key: &str, body: Bytes) -> Result<Bytes> {
    if !key.ends_with(".gz") {
        return Ok(body);
    }
    let mut out = Vec::new();
    GzDecoder::new(body.as_ref())
        .read_to_end(&mut out)
        .with_context(|| format!("{key} is not valid gzip"))?;
    Ok(Bytes::from(out))
}
