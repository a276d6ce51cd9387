/// Media store client over an S3-compatible object store
///
/// Two buckets: `videos` for full media objects and `previews` for the
/// worker-generated thumbnails. Uploads stream through the S3 multipart
/// API in 5 MiB parts so gigabyte-scale files never sit in memory.
use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::info;

use crate::config::S3Config;

/// Minimum S3 multipart part size.
const UPLOAD_PART_SIZE: usize = 5 * 1024 * 1024;

/// An object fetched from the store, ready to stream to a client.
pub struct StoredObject {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl StoredObject {
    /// Adapt the store body into a stream actix can serve.
    pub fn into_byte_stream(
        self,
    ) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        futures::stream::unfold(self.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), body)),
                Ok(None) => None,
                Err(e) => Some((Err(std::io::Error::other(e.to_string())), body)),
            }
        })
    }
}

#[derive(Clone)]
pub struct MediaStore {
    client: Client,
    videos_bucket: String,
    previews_bucket: String,
}

impl MediaStore {
    /// Build the S3 client from config. A custom endpoint (MinIO et al.)
    /// switches to path-style addressing.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "vidstream_gateway_s3",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.endpoint.is_some() {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            videos_bucket: config.videos_bucket.clone(),
            previews_bucket: config.previews_bucket.clone(),
        })
    }

    pub fn videos_bucket(&self) -> &str {
        &self.videos_bucket
    }

    pub fn previews_bucket(&self) -> &str {
        &self.previews_bucket
    }

    /// Create the `videos` and `previews` buckets when they do not exist yet.
    pub async fn ensure_buckets(&self) -> Result<()> {
        let listing = self
            .client
            .list_buckets()
            .send()
            .await
            .context("Failed to list buckets")?;

        let existing: Vec<&str> = listing
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name())
            .collect();

        for bucket in [&self.videos_bucket, &self.previews_bucket] {
            if !existing.contains(&bucket.as_str()) {
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .with_context(|| format!("Failed to create bucket '{bucket}'"))?;
                info!(bucket = %bucket, "Created media store bucket");
            }
        }

        Ok(())
    }

    /// Stream an upload into the store under `key`, returning the number of
    /// bytes actually transferred. The multipart session is aborted on any
    /// failure so no orphaned parts accumulate.
    pub async fn upload_stream<S, E>(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        stream: S,
    ) -> Result<i64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .context("Failed to start multipart upload")?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| anyhow!("Store returned no multipart upload id"))?
            .to_string();

        match self.stream_parts(bucket, key, &upload_id, stream).await {
            Ok((parts, total)) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .context("Failed to complete multipart upload")?;
                Ok(total)
            }
            Err(e) => {
                let _ = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                Err(e)
            }
        }
    }

    async fn stream_parts<S, E>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut stream: S,
    ) -> Result<(Vec<CompletedPart>, i64)>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut parts = Vec::new();
        let mut buffer = BytesMut::with_capacity(UPLOAD_PART_SIZE);
        let mut part_number = 1i32;
        let mut total = 0i64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| anyhow!("Failed to read upload stream: {e}"))?;
            total += chunk.len() as i64;
            buffer.extend_from_slice(&chunk);

            if buffer.len() >= UPLOAD_PART_SIZE {
                let part = self
                    .upload_part(bucket, key, upload_id, part_number, buffer.split().freeze())
                    .await?;
                parts.push(part);
                part_number += 1;
            }
        }

        // Flush the tail; a zero-byte upload still completes with one empty part.
        if !buffer.is_empty() || parts.is_empty() {
            let part = self
                .upload_part(bucket, key, upload_id, part_number, buffer.split().freeze())
                .await?;
            parts.push(part);
        }

        Ok((parts, total))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let uploaded = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to upload part {part_number}"))?;

        Ok(CompletedPart::builder()
            .e_tag(uploaded.e_tag().unwrap_or_default())
            .part_number(part_number)
            .build())
    }

    /// Fetch a byte span of an object. The caller validated the range against
    /// the catalog size; the store returns exactly `[start, end]`.
    pub async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={start}-{end}"))
            .send()
            .await
            .with_context(|| format!("Failed to fetch range of '{key}'"))?;

        Ok(StoredObject {
            content_type: output.content_type().map(|ct| ct.to_string()),
            body: output.body,
        })
    }

    /// Fetch a whole object.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()) == Some(true) {
                    anyhow!("NoSuchKey: '{key}' does not exist")
                } else {
                    anyhow!(e).context(format!("Failed to fetch '{key}'"))
                }
            })?;

        Ok(StoredObject {
            content_type: output.content_type().map(|ct| ct.to_string()),
            body: output.body,
        })
    }

    /// Delete one object. Missing keys are not an error.
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete '{key}'"))?;
        Ok(())
    }
}

/// Whether a store error means the object does not exist.
pub fn error_is_not_found(err: &anyhow::Error) -> bool {
    let message = format!("{err:#}");
    message.contains("NoSuchKey") || message.contains("NotFound") || message.contains("404")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_size_meets_s3_minimum() {
        assert!(UPLOAD_PART_SIZE >= 5 * 1024 * 1024);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(error_is_not_found(&anyhow!("service error: NoSuchKey")));
        assert!(error_is_not_found(&anyhow!("status 404")));
        assert!(!error_is_not_found(&anyhow!("connection refused")));
    }
}
