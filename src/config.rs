//! Configuration management with serde serialization/deserialization
//!
//! This module provides all configuration structures and utilities for the screenshot tool,
//! including browser settings, optimization parameters, and output formats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for the screenshot tool
///
/// Controls all aspects of the screenshot service including browser pool size,
/// concurrency limits, timeouts, and optimization settings.
///
/// # Examples
///
/// ```rust
/// use screenshot_tool::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     browser_pool_size: 5,
///     max_concurrent_screenshots: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Legacy seed for pool sizing, kept for test/benchmark construction.
    /// Actual pool sizing lives in [`BrowserPoolConfig`].
    pub browser_pool_size: usize,

    /// Legacy internal concurrency gate for capture fan-out. Admission sizing
    /// lives in [`AdmissionConfig::max_concurrent`].
    pub max_concurrent_screenshots: usize,

    /// Hard outer cap for a single capture attempt, regardless of navigation tier.
    pub screenshot_timeout: Duration,

    /// Legacy flat retry count, superseded by `max_retries_regular`/`max_retries_complex`.
    pub retry_attempts: usize,

    /// Output image format for screenshots (default: PNG)
    pub output_format: OutputFormat,

    /// Browser viewport configuration for screenshots
    pub viewport: Viewport,

    /// Performance optimization settings
    pub optimization: OptimizationSettings,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for requests (default: Chrome default)
    pub user_agent: Option<String>,

    /// Memory limit per Chrome instance in bytes (default: 1GB)
    pub memory_limit: Option<usize>,

    /// Navigation timeout for pages not classified as "hard".
    pub navigation_timeout_regular: Duration,

    /// Navigation timeout for pages matching `hard_page_patterns`.
    pub navigation_timeout_complex: Duration,

    /// Retry budget for regular-tier pages.
    pub max_retries_regular: usize,

    /// Retry budget for complex-tier pages.
    pub max_retries_complex: usize,

    /// Base delay for the retry backoff.
    pub retry_base_delay: Duration,

    /// Cap on the retry backoff delay.
    pub retry_max_delay: Duration,

    /// URL substrings that classify a page as "complex" for tiered timeouts/retries.
    pub hard_page_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_pool_size: 10,
            max_concurrent_screenshots: 200,
            screenshot_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            output_format: OutputFormat::Png,
            viewport: Viewport::default(),
            optimization: OptimizationSettings::default(),
            chrome_path: None,
            user_agent: None,
            memory_limit: Some(1024 * 1024 * 1024), // 1GB
            navigation_timeout_regular: Duration::from_secs(15),
            navigation_timeout_complex: Duration::from_secs(45),
            max_retries_regular: 2,
            max_retries_complex: 4,
            retry_base_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(5),
            hard_page_patterns: Vec::new(),
        }
    }
}

/// Browser viewport configuration for screenshots
///
/// Controls the browser window size and display characteristics used when
/// rendering pages for screenshots.
///
/// # Examples
///
/// ```rust
/// use screenshot_tool::Viewport;
///
/// // Desktop viewport (default)
/// let desktop = Viewport::default();
///
/// // Mobile viewport
/// let mobile = Viewport {
///     width: 375,
///     height: 667,
///     device_scale_factor: 2.0,
///     mobile: true,
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio for high-DPI displays (default: 1.0)
    pub device_scale_factor: f64,

    /// Whether to emulate mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Performance optimization settings for screenshot rendering
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizationSettings {
    /// Block advertisement content (default: true)
    pub block_ads: bool,

    /// Block tracking scripts and analytics (default: true)
    pub block_trackers: bool,

    /// Block image loading (default: false)
    pub block_images: bool,

    /// Enable JavaScript execution (default: true)
    pub enable_javascript: bool,

    /// Wait for network requests to complete (default: false)
    pub wait_for_network_idle: bool,

    /// Disable CSS loading (default: false)
    pub disable_css: bool,

    /// Disable browser plugins (default: true)
    pub disable_plugins: bool,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            block_ads: true,
            block_trackers: true,
            block_images: false,
            enable_javascript: true,
            wait_for_network_idle: false,
            disable_css: false,
            disable_plugins: true,
        }
    }
}

/// Supported output image formats for screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutputFormat {
    /// PNG format - lossless compression, best quality
    Png,
    /// JPEG format - lossy compression, smaller files
    Jpeg,
    /// WebP format - modern compression, good balance of size and quality
    Webp,
}

/// Priority levels for screenshot requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum Priority {
    /// Low priority - processed when system resources are available
    Low,
    /// Normal priority - standard processing order (default)
    Normal,
    /// High priority - processed before normal requests
    High,
    /// Critical priority - processed immediately with maximum resources
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone)]
pub struct ScreenshotRequest {
    pub id: String,
    pub url: String,
    pub priority: Priority,
    pub custom_viewport: Option<Viewport>,
    pub wait_time: Option<Duration>,
    pub element_selector: Option<String>,
    pub full_page: bool,
    pub retry_count: usize,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: String::new(),
            priority: Priority::default(),
            custom_viewport: None,
            wait_time: None,
            element_selector: None,
            full_page: false,
            retry_count: 0,
        }
    }
}

/// Result of a single capture. `path` points at a temp file on local disk that
/// the caller owns: the pipeline either deletes it (failure) or hands it to
/// the storage adapter, which moves it (success).
#[derive(Debug)]
pub struct ScreenshotResult {
    pub request_id: String,
    pub url: String,
    pub path: std::path::PathBuf,
    pub format: OutputFormat,
    pub timestamp: std::time::SystemTime,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<crate::error::ScreenshotError>,
    pub metadata: ScreenshotMetadata,
}

#[derive(Debug, Clone)]
pub struct ScreenshotMetadata {
    pub viewport: Viewport,
    pub page_title: Option<String>,
    pub final_url: Option<String>,
    pub response_status: Option<u16>,
    pub file_size: usize,
    pub browser_instance_id: usize,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Generate Chrome command-line arguments based on configuration
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    get_chrome_args_with_instance_id(config, None)
}

/// Generate Chrome arguments with unique instance ID for browser pool isolation
pub fn get_chrome_args_with_instance_id(
    config: &Config,
    instance_id: Option<usize>,
) -> Vec<String> {
    let unique_id = match instance_id {
        Some(id) => format!("{}-{}", std::process::id(), id),
        None => format!("{}-{}", std::process::id(), uuid::Uuid::new_v4()),
    };

    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-features=TranslateUI".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--disable-web-security".to_string(),
        "--disable-process-singleton-dialog".to_string(),
        "--disable-features=ProcessSingleton".to_string(),
        "--no-process-singleton-dialog".to_string(),
        "--disable-single-process".to_string(),
        "--allow-running-insecure-content".to_string(),
        "--ignore-certificate-errors".to_string(),
        "--ignore-ssl-errors".to_string(),
        "--ignore-certificate-errors-spki-list".to_string(),
        "--ignore-certificate-errors-ssl-errors".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        "--memory-pressure-off".to_string(),
        format!("--user-data-dir=/tmp/chromium-screenshot-{}", unique_id),
        format!(
            "--remote-debugging-port={}",
            9222 + instance_id.unwrap_or(0)
        ),
        format!("--temp-dir=/tmp/chromium-temp-{}", unique_id),
    ];

    if let Some(memory_limit) = config.memory_limit {
        args.push(format!(
            "--max_old_space_size={}",
            memory_limit / 1024 / 1024
        ));
    }

    if config.optimization.block_images {
        args.push("--disable-images".to_string());
    }

    if !config.optimization.enable_javascript {
        args.push("--disable-javascript".to_string());
    }

    if config.optimization.disable_plugins {
        args.push("--disable-plugins".to_string());
    }

    if config.optimization.disable_css {
        args.push("--disable-css".to_string());
    }

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(config: &Config) -> chromiumoxide::browser::BrowserConfig {
    create_browser_config_with_instance_id(config, None)
}

pub fn create_browser_config_with_instance_id(
    config: &Config,
    instance_id: Option<usize>,
) -> chromiumoxide::browser::BrowserConfig {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args_with_instance_id(config, instance_id));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .unwrap_or_else(|_| BrowserConfig::with_executable("/usr/sbin/chromium"))
}

/// Request to render a URL to an image, as accepted at the pipeline boundary.
///
/// Named apart from the capture-only [`ScreenshotRequest`] because it carries the
/// extra fields (`cache`, target format/dimensions) that only the HTTP-facing
/// pipeline needs; the capture worker still deals in [`ScreenshotRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub cache: bool,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_true() -> bool {
    true
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Png
    }
}

/// How aggressively emergency (fallback) capture is attempted after the regular
/// retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EmergencyPolicy {
    /// Never fall back to the emergency context; a capture failure is final.
    Never,
    /// Fall back only when the final regular attempt failed with a timeout.
    OnTimeoutOnly,
    /// Fall back on any capture failure, not just timeouts.
    OnAnyFailure,
}

impl Default for EmergencyPolicy {
    fn default() -> Self {
        EmergencyPolicy::OnTimeoutOnly
    }
}

/// Which host-rewrite table to apply before capture. Keyed by public host,
/// valued by the internal host the capture worker should actually navigate to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    pub host_mappings: HashMap<String, String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        let mut host_mappings = HashMap::new();
        host_mappings.insert(
            "viding.co".to_string(),
            "viding-co_website-revamp".to_string(),
        );
        host_mappings.insert(
            "viding.org".to_string(),
            "viding-org_website-revamp".to_string(),
        );
        Self { host_mappings }
    }
}

/// HMAC-SHA256 URL signing configuration. `key` and `salt` are hex strings,
/// matching the imgproxy convention this scheme was copied from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
    pub key_hex: String,
    pub salt_hex: String,
    pub base_url: String,
}

/// Browser pool sizing and retirement policy, sized/aged independently of the
/// capture-worker settings in [`Config`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserPoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub max_age: Duration,
    pub cleanup_interval: Duration,
    pub max_concurrent_contexts: usize,
    pub max_tabs_per_browser: usize,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            idle_timeout: Duration::from_secs(300),
            max_age: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
            max_concurrent_contexts: 50,
            max_tabs_per_browser: 5,
        }
    }
}

/// Storage backend selection plus both backends' settings, so switching is a
/// one-variable change.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub local_dir: String,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub public_base_url: Option<String>,
    /// Days after which an uploaded object expires under the bucket lifecycle
    /// policy the object-store adapter installs at startup.
    pub object_expiration_days: u32,
    /// When true, local-disk mode serves rendered images through an imgproxy
    /// front end instead of the raw `local_dir` path.
    pub use_imgproxy_for_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Local,
    ObjectStore,
}

/// Bounded result-cache sizing and freshness window.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 10_000,
        }
    }
}

/// Admission queue sizing, shedding threshold, and the checkout timeout a
/// queued request will wait before giving up.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub pressure_threshold: f64,
    pub queue_timeout: Duration,
    /// When false, `admit()` runs the handler directly under the semaphore:
    /// outcomes are only PROCESSED/REJECTED, never QUEUED/TIMEOUT.
    pub queue_enabled: bool,
    /// When false, the pressure-based REJECTED branch is skipped entirely.
    pub load_shedding_enabled: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 500,
            max_concurrent: 50,
            pressure_threshold: 0.9,
            queue_timeout: Duration::from_secs(30),
            queue_enabled: true,
            load_shedding_enabled: true,
        }
    }
}

/// Ambient HTTP server bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Top-level process configuration: capture settings (`Config`) plus every
/// ambient and pipeline-stage configuration group, assembled once at startup
/// from environment variables and shared read-only via `Arc` thereafter.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub capture: Config,
    pub browser_pool: BrowserPoolConfig,
    pub transform: TransformConfig,
    pub signer: SignerConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub admission: AdmissionConfig,
    pub server: ServerConfig,
    pub emergency_policy: EmergencyPolicy,
    pub emergency_context_timeout: Duration,
}

/// Recognized environment variable names. Anything set in the process
/// environment outside this list is logged as a warning at startup rather
/// than silently ignored, so typos in deployment configuration surface fast.
const KNOWN_ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "RUST_LOG",
    "CHROME_PATH",
    "HOST_MAPPINGS",
    "BROWSER_POOL_MIN_SIZE",
    "BROWSER_POOL_MAX_SIZE",
    "BROWSER_POOL_IDLE_TIMEOUT",
    "BROWSER_POOL_MAX_AGE",
    "BROWSER_POOL_CLEANUP_INTERVAL",
    "MAX_CONCURRENT_CONTEXTS",
    "MAX_TABS_PER_BROWSER",
    "NAVIGATION_TIMEOUT_REGULAR",
    "NAVIGATION_TIMEOUT_COMPLEX",
    "SCREENSHOT_TIMEOUT",
    "MAX_RETRIES_REGULAR",
    "MAX_RETRIES_COMPLEX",
    "RETRY_BASE_DELAY",
    "RETRY_MAX_DELAY",
    "ENABLE_EMERGENCY_CONTEXT",
    "EMERGENCY_CONTEXT_TIMEOUT",
    "FORCE_EMERGENCY_ON_TIMEOUT",
    "ENABLE_REQUEST_QUEUE",
    "MAX_QUEUE_SIZE",
    "QUEUE_TIMEOUT",
    "MAX_CONCURRENT_SCREENSHOTS",
    "ENABLE_LOAD_SHEDDING",
    "LOAD_SHEDDING_THRESHOLD",
    "CACHE_TTL_SECONDS",
    "CACHE_MAX_ITEMS",
    "STORAGE_MODE",
    "R2_ENDPOINT",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
    "R2_BUCKET",
    "R2_PUBLIC_URL",
    "R2_OBJECT_EXPIRATION_DAYS",
    "LOCAL_STORAGE_DIR",
    "LOCAL_STORAGE_BASE_URL",
    "USE_IMGPROXY_FOR_LOCAL",
    "IMGPROXY_KEY",
    "IMGPROXY_SALT",
    "IMGPROXY_BASE_URL",
];

impl AppConfig {
    /// Builds configuration from the process environment, per the variable
    /// list above. `IMGPROXY_KEY` and `IMGPROXY_SALT` are the only truly
    /// required variables; a missing signer secret is a fatal startup error
    /// rather than a silently-disabled signing feature.
    pub fn from_env() -> Result<Self, crate::error::ScreenshotError> {
        warn_on_unknown_env_vars();

        let signing_key = std::env::var("IMGPROXY_KEY").map_err(|_| {
            crate::error::ScreenshotError::ConfigurationError(
                "IMGPROXY_KEY is required".to_string(),
            )
        })?;
        let signing_salt = std::env::var("IMGPROXY_SALT").map_err(|_| {
            crate::error::ScreenshotError::ConfigurationError(
                "IMGPROXY_SALT is required".to_string(),
            )
        })?;
        if !is_hex(&signing_key) || !is_hex(&signing_salt) || signing_key.len() % 2 != 0 {
            return Err(crate::error::ScreenshotError::ConfigurationError(
                "IMGPROXY_KEY/IMGPROXY_SALT must be even-length hex strings".to_string(),
            ));
        }

        let backend = match std::env::var("STORAGE_MODE").as_deref() {
            Ok("remote") => StorageBackendKind::ObjectStore,
            _ => StorageBackendKind::Local,
        };
        let bucket = std::env::var("R2_BUCKET").ok();
        if backend == StorageBackendKind::ObjectStore && bucket.is_none() {
            return Err(crate::error::ScreenshotError::ConfigurationError(
                "R2_BUCKET is required when STORAGE_MODE=remote".to_string(),
            ));
        }

        let mut capture = Config::default();
        if let Ok(v) = env_usize("NAVIGATION_TIMEOUT_REGULAR") {
            capture.navigation_timeout_regular = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("NAVIGATION_TIMEOUT_COMPLEX") {
            capture.navigation_timeout_complex = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("SCREENSHOT_TIMEOUT") {
            capture.screenshot_timeout = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("MAX_RETRIES_REGULAR") {
            capture.max_retries_regular = v;
        }
        if let Ok(v) = env_usize("MAX_RETRIES_COMPLEX") {
            capture.max_retries_complex = v;
        }
        if let Ok(v) = env_usize("RETRY_BASE_DELAY") {
            capture.retry_base_delay = Duration::from_millis(v as u64);
        }
        if let Ok(v) = env_usize("RETRY_MAX_DELAY") {
            capture.retry_max_delay = Duration::from_millis(v as u64);
        }
        if let Ok(v) = std::env::var("CHROME_PATH") {
            capture.chrome_path = Some(v);
        }

        let mut browser_pool = BrowserPoolConfig::default();
        if let Ok(v) = env_usize("BROWSER_POOL_MIN_SIZE") {
            browser_pool.min_size = v;
        }
        if let Ok(v) = env_usize("BROWSER_POOL_MAX_SIZE") {
            browser_pool.max_size = v.max(browser_pool.min_size);
        }
        if let Ok(v) = env_usize("BROWSER_POOL_IDLE_TIMEOUT") {
            browser_pool.idle_timeout = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("BROWSER_POOL_MAX_AGE") {
            browser_pool.max_age = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("BROWSER_POOL_CLEANUP_INTERVAL") {
            browser_pool.cleanup_interval = Duration::from_secs(v as u64);
        }
        if let Ok(v) = env_usize("MAX_CONCURRENT_CONTEXTS") {
            browser_pool.max_concurrent_contexts = v;
        }
        if let Ok(v) = env_usize("MAX_TABS_PER_BROWSER") {
            browser_pool.max_tabs_per_browser = v;
        }

        let mut transform = TransformConfig::default();
        if let Ok(raw) = std::env::var("HOST_MAPPINGS") {
            let mut parsed = HashMap::new();
            for pair in raw.split(',').filter(|s| !s.is_empty()) {
                if let Some((public, internal)) = pair.split_once('=') {
                    parsed.insert(public.trim().to_string(), internal.trim().to_string());
                }
            }
            if !parsed.is_empty() {
                transform.host_mappings = parsed;
            }
        }

        let enable_emergency = env_bool("ENABLE_EMERGENCY_CONTEXT", true);
        let force_on_timeout = env_bool("FORCE_EMERGENCY_ON_TIMEOUT", false);
        let emergency_policy = if !enable_emergency {
            EmergencyPolicy::Never
        } else if force_on_timeout {
            EmergencyPolicy::OnTimeoutOnly
        } else {
            EmergencyPolicy::OnAnyFailure
        };

        Ok(Self {
            capture,
            browser_pool,
            transform,
            signer: SignerConfig {
                key_hex: signing_key,
                salt_hex: signing_salt,
                base_url: std::env::var("IMGPROXY_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            storage: StorageConfig {
                backend,
                local_dir: std::env::var("LOCAL_STORAGE_DIR")
                    .unwrap_or_else(|_| "./data/screenshots".to_string()),
                bucket,
                endpoint: std::env::var("R2_ENDPOINT").ok(),
                region: "auto".to_string(),
                access_key_id: std::env::var("R2_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY").ok(),
                public_base_url: std::env::var("R2_PUBLIC_URL")
                    .ok()
                    .or_else(|| std::env::var("LOCAL_STORAGE_BASE_URL").ok()),
                object_expiration_days: env_usize("R2_OBJECT_EXPIRATION_DAYS").unwrap_or(30) as u32,
                use_imgproxy_for_local: env_bool("USE_IMGPROXY_FOR_LOCAL", false),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(env_usize("CACHE_TTL_SECONDS").unwrap_or(3600) as u64),
                max_entries: env_usize("CACHE_MAX_ITEMS").unwrap_or(10_000),
            },
            admission: AdmissionConfig {
                max_queue_size: env_usize("MAX_QUEUE_SIZE").unwrap_or(500),
                max_concurrent: env_usize("MAX_CONCURRENT_SCREENSHOTS").unwrap_or(50),
                pressure_threshold: std::env::var("LOAD_SHEDDING_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.9),
                queue_timeout: Duration::from_secs(env_usize("QUEUE_TIMEOUT").unwrap_or(30) as u64),
                queue_enabled: env_bool("ENABLE_REQUEST_QUEUE", true),
                load_shedding_enabled: env_bool("ENABLE_LOAD_SHEDDING", true),
            },
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8080),
            },
            emergency_policy,
            emergency_context_timeout: Duration::from_secs(
                env_usize("EMERGENCY_CONTEXT_TIMEOUT").unwrap_or(45) as u64,
            ),
        })
    }
}

fn env_usize(key: &str) -> Result<usize, ()> {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).ok_or(())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).as_deref() {
        Ok("true") | Ok("1") => true,
        Ok("false") | Ok("0") => false,
        _ => default,
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Screenshot-tool-specific env vars this binary doesn't recognize are almost
/// always a typo in deployment config; log them instead of failing so the
/// process still starts.
const OUR_PREFIXES: &[&str] = &[
    "HOST_MAPPINGS",
    "IMGPROXY_",
    "STORAGE_",
    "LOCAL_STORAGE_",
    "USE_IMGPROXY_",
    "R2_",
    "CACHE_",
    "QUEUE_",
    "MAX_QUEUE_",
    "MAX_CONCURRENT_",
    "ENABLE_REQUEST_",
    "ENABLE_LOAD_",
    "LOAD_SHEDDING_",
    "SCREENSHOT_",
    "NAVIGATION_",
    "BROWSER_POOL_",
    "MAX_TABS_",
    "RETRY_",
    "CHROME_",
    "ENABLE_EMERGENCY_",
    "FORCE_EMERGENCY_",
    "EMERGENCY_CONTEXT_",
];

fn warn_on_unknown_env_vars() {
    for (key, _) in std::env::vars() {
        if KNOWN_ENV_KEYS.contains(&key.as_str()) {
            continue;
        }
        if OUR_PREFIXES.iter().any(|p| key.starts_with(p)) {
            tracing::warn!("unrecognized configuration variable: {key}");
        }
    }
}
