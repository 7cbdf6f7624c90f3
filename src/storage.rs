//! Persists rendered screenshots either to local disk or to an S3-compatible
//! object store (e.g. Cloudflare R2), behind one `Storage` trait.
//!
//! Remote uploads retry with the same doubling backoff the capture path uses
//! (1s, 2s, 4s, ... capped at 30s), resetting the failure streak after a
//! 60-second quiet window so a single old failure doesn't poison the delay
//! for unrelated later uploads.
//!
//! `upload` takes a path, not bytes: the caller hands over a temp file and,
//! on success, the adapter owns cleaning it up (local mode moves it away,
//! remote mode deletes it once the bytes are durably uploaded). On failure
//! the file is left in place for the caller to remove.

use crate::error::ScreenshotError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, source: &Path, key: &str, content_type: &str) -> Result<String, ScreenshotError>;
    async fn stats(&self) -> StorageStats;
}

#[derive(Debug, Clone)]
pub struct StorageStats {
    pub backend: &'static str,
    pub upload_count: u64,
    pub failure_count: u64,
    pub total_bytes: u64,
    /// Configured object lifetime for this backend, if any (`None` for local
    /// disk, which has no lifecycle concept).
    pub expiration_days: Option<u32>,
}

pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Writes screenshots under a local directory, returning a `file://` URL.
/// Used for development and for deployments without an object store.
pub struct LocalStorage {
    root: PathBuf,
    upload_count: AtomicU32,
    total_bytes: AtomicU64,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, ScreenshotError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            upload_count: AtomicU32::new(0),
            total_bytes: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, source: &Path, key: &str, _content_type: &str) -> Result<String, ScreenshotError> {
        let dest = self.root.join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if source != dest {
            match tokio::fs::rename(source, &dest).await {
                Ok(()) => {}
                Err(_) => {
                    // Likely a cross-device rename (EXDEV); fall back to copy + remove.
                    tokio::fs::copy(source, &dest).await?;
                    tokio::fs::remove_file(source).await?;
                }
            }
        }

        let size = tokio::fs::metadata(&dest).await.map(|m| m.len()).unwrap_or(0);
        self.upload_count.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(format!("file://{}", dest.display()))
    }

    async fn stats(&self) -> StorageStats {
        StorageStats {
            backend: "local",
            upload_count: self.upload_count.load(Ordering::Relaxed) as u64,
            failure_count: 0,
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            expiration_days: None,
        }
    }
}

/// S3-compatible object store backend (e.g. Cloudflare R2).
pub struct ObjectStoreStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
    object_expiration_days: u32,
    upload_count: AtomicU32,
    failure_count: AtomicU32,
    total_bytes: AtomicU64,
    last_failure: Mutex<Option<Instant>>,
}

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const BACKOFF_QUIET_WINDOW: Duration = Duration::from_secs(60);
const MAX_UPLOAD_ATTEMPTS: u32 = 5;
const OBJECT_KEY_PREFIX: &str = "screenshots/";

impl ObjectStoreStorage {
    pub async fn new(config: &crate::config::StorageConfig) -> Result<Self, ScreenshotError> {
        let bucket = config.bucket.clone().ok_or_else(|| {
            ScreenshotError::ConfigurationError("object store backend requires a bucket".to_string())
        })?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                key, secret, None, None, "static",
            ));
        }
        let sdk_config = loader.load().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);

        let storage = Self {
            client,
            bucket,
            public_base_url: config.public_base_url.clone(),
            object_expiration_days: config.object_expiration_days,
            upload_count: AtomicU32::new(0),
            failure_count: AtomicU32::new(0),
            total_bytes: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        };
        storage.ensure_lifecycle_policy().await;
        Ok(storage)
    }

    /// Installs an expiring-objects lifecycle rule scoped to our key prefix.
    /// Buckets may already carry a retention policy managed outside this
    /// process; failure here is logged but non-fatal — the service continues
    /// without expiry rather than refusing to start.
    async fn ensure_lifecycle_policy(&self) {
        let expiration = aws_sdk_s3::types::LifecycleExpiration::builder()
            .days(self.object_expiration_days as i32)
            .build();

        let rule = aws_sdk_s3::types::LifecycleRule::builder()
            .id("screenshot-tool-expiration")
            .status(aws_sdk_s3::types::ExpirationStatus::Enabled)
            .filter(
                aws_sdk_s3::types::LifecycleRuleFilter::Prefix(OBJECT_KEY_PREFIX.to_string()),
            )
            .expiration(expiration)
            .build();

        let rule = match rule {
            Ok(rule) => rule,
            Err(e) => {
                tracing::warn!("could not build bucket lifecycle rule: {e}");
                return;
            }
        };

        let configuration = match aws_sdk_s3::types::BucketLifecycleConfiguration::builder()
            .rules(rule)
            .build()
        {
            Ok(configuration) => configuration,
            Err(e) => {
                tracing::warn!("could not build bucket lifecycle configuration: {e}");
                return;
            }
        };

        if let Err(e) = self
            .client
            .put_bucket_lifecycle_configuration()
            .bucket(&self.bucket)
            .lifecycle_configuration(configuration)
            .send()
            .await
        {
            tracing::warn!("could not install bucket lifecycle policy (expiry after {} days): {e}", self.object_expiration_days);
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let mut guard = self.last_failure.lock().unwrap();
        if let Some(last) = *guard {
            if last.elapsed() > BACKOFF_QUIET_WINDOW {
                self.failure_count.store(0, Ordering::Relaxed);
            }
        }
        *guard = Some(Instant::now());
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(BACKOFF_BASE * exp as u32, BACKOFF_CAP)
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn upload(&self, source: &Path, key: &str, content_type: &str) -> Result<String, ScreenshotError> {
        let data = tokio::fs::read(source).await?;
        let object_key = format!("{OBJECT_KEY_PREFIX}{key}");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&object_key)
                .body(data.clone().into())
                .content_type(content_type)
                .cache_control("max-age=31536000, immutable")
                .send()
                .await;

            match result {
                Ok(_) => {
                    self.upload_count.fetch_add(1, Ordering::Relaxed);
                    self.total_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
                    // Ownership transfers to us on success; the pipeline no longer
                    // needs the local temp file once the bytes are durable remotely.
                    let _ = tokio::fs::remove_file(source).await;
                    let url = match &self.public_base_url {
                        Some(base) => format!("{}/{object_key}", base.trim_end_matches('/')),
                        None => format!("https://{}.s3.amazonaws.com/{object_key}", self.bucket),
                    };
                    return Ok(url);
                }
                Err(e) => {
                    self.failure_count.fetch_add(1, Ordering::Relaxed);
                    if attempt >= MAX_UPLOAD_ATTEMPTS {
                        return Err(ScreenshotError::StorageFailed(e.to_string()));
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!("storage upload attempt {attempt} failed, retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn stats(&self) -> StorageStats {
        StorageStats {
            backend: "object_store",
            upload_count: self.upload_count.load(Ordering::Relaxed) as u64,
            failure_count: self.failure_count.load(Ordering::Relaxed) as u64,
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            expiration_days: Some(self.object_expiration_days),
        }
    }
}
