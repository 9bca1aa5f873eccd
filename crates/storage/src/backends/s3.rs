//! Object store backed by S3 or an S3-compatible service such as MinIO.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ListingOptions, ListingPage, ObjectEntry, ObjectMeta, ObjectStore, PageStream};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_http_client::Builder as HttpClientBuilder;
use beekeeper_core::config::MAX_DELETE_BATCH_SIZE;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{instrument, warn};

const FALLBACK_REGION: &str = "us-east-1";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct S3Backend {
    client: Client,
    endpoint: String,
    region: String,
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Build a client for the given endpoint and region.
    ///
    /// Static keys must be given as a pair. Without them the ambient AWS
    /// credential chain is used. `force_path_style` addresses buckets as
    /// `endpoint/bucket/key`, which MinIO needs.
    pub async fn new(
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        let static_keys = match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret, None, None, "beekeeper")),
            (None, None) => None,
            _ => {
                return Err(StorageError::Config(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
        };

        let region = region.unwrap_or_else(|| FALLBACK_REGION.to_string());
        let endpoint = endpoint.as_deref().map(with_scheme);

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));
        if let Some(credentials) = static_keys {
            loader = loader.credentials_provider(credentials);
        }
        if let Some(url) = &endpoint {
            loader = loader.endpoint_url(url);
            // A plain-http endpoint should not need TLS roots on the host.
            if url.to_ascii_lowercase().starts_with("http://") {
                loader = loader.http_client(HttpClientBuilder::new().build_http());
            }
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            endpoint: endpoint.unwrap_or_else(|| format!("s3.{region}.amazonaws.com")),
            region,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// `minio:9000` becomes `http://minio:9000`; URLs with a scheme pass through.
fn with_scheme(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn status_is_404<E>(err: &SdkError<E>) -> bool {
    match err {
        SdkError::ServiceError(e) => e.raw().status().as_u16() == 404,
        _ => false,
    }
}

fn sdk_failure<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

fn clamp_size(size: Option<i64>) -> u64 {
    size.unwrap_or_default().max(0) as u64
}

fn page_entries(output: &ListObjectsV2Output) -> Vec<ObjectEntry> {
    output
        .contents()
        .iter()
        .filter_map(|object| {
            let key = object.key()?;
            Some(ObjectEntry::new(key, clamp_size(object.size())))
        })
        .collect()
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let request = self.client.head_object().bucket(bucket).key(key);
        match request.send().await {
            Ok(_) => Ok(true),
            Err(err) if status_is_404(&err) => Ok(false),
            Err(err) => Err(sdk_failure(err)),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head(&self, bucket: &str, key: &str) -> StorageResult<ObjectMeta> {
        let request = self.client.head_object().bucket(bucket).key(key);
        let output = match request.send().await {
            Ok(output) => output,
            Err(err) if status_is_404(&err) => {
                return Err(StorageError::NotFound(format!("{bucket}/{key}")));
            }
            Err(err) => return Err(sdk_failure(err)),
        };

        let last_modified = output
            .last_modified()
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at.secs()).ok());

        Ok(ObjectMeta {
            size: clamp_size(output.content_length()),
            last_modified,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        // DeleteObject reports success for keys that do not exist.
        let request = self.client.delete_object().bucket(bucket).key(key);
        request.send().await.map_err(sdk_failure)?;
        Ok(())
    }

    #[instrument(skip(self, keys), fields(backend = "s3", count = keys.len()))]
    async fn delete_many(&self, bucket: &str, keys: &[String]) -> StorageResult<Vec<String>> {
        if keys.len() > MAX_DELETE_BATCH_SIZE {
            return Err(StorageError::InvalidKey(format!(
                "{} keys in one DeleteObjects call, at most {MAX_DELETE_BATCH_SIZE} allowed",
                keys.len()
            )));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut identifiers = Vec::with_capacity(keys.len());
        for key in keys {
            let identifier = ObjectIdentifier::builder()
                .key(key)
                .build()
                .map_err(|e| StorageError::S3(Box::new(e)))?;
            identifiers.push(identifier);
        }
        let batch = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(false)
            .build()
            .map_err(|e| StorageError::S3(Box::new(e)))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(batch)
            .send()
            .await
            .map_err(sdk_failure)?;

        for refused in output.errors() {
            warn!(
                bucket,
                key = refused.key().unwrap_or_default(),
                code = refused.code().unwrap_or_default(),
                message = refused.message().unwrap_or_default(),
                "Object not deleted"
            );
        }

        let confirmed = output
            .deleted()
            .iter()
            .filter_map(|entry| entry.key())
            .map(str::to_owned)
            .collect();
        Ok(confirmed)
    }

    fn list_pages<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        options: ListingOptions,
    ) -> PageStream<'a> {
        let bucket = bucket.to_owned();
        let prefix = prefix.to_owned();
        let max_keys = options.normalized_page_size() as i32;

        Box::pin(async_stream::try_stream! {
            let mut token: Option<String> = None;
            loop {
                let output = self
                    .client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .max_keys(max_keys)
                    .set_continuation_token(token.take())
                    .send()
                    .await
                    .map_err(sdk_failure)?;

                let objects = page_entries(&output);
                if !objects.is_empty() {
                    yield ListingPage { objects };
                }

                token = match output.is_truncated() {
                    Some(true) => output.next_continuation_token().map(str::to_owned),
                    _ => None,
                };
                if token.is_none() {
                    break;
                }
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let request = self.client.list_buckets().send();
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, request).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(sdk_failure(err)),
            Err(_) => Err(StorageError::Unavailable(format!(
                "no answer from {} within {}s",
                self.endpoint,
                HEALTH_CHECK_TIMEOUT.as_secs()
            ))),
        }
    }
}
