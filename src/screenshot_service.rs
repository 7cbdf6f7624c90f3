//! Main screenshot service orchestrating the capture pipeline.
//!
//! Retries are tiered: pages matching `hard_page_patterns` get the "complex"
//! navigation timeout and retry budget, everything else gets the "regular"
//! one. If the regular/complex retry budget is exhausted, `emergency_policy`
//! decides whether to make one more attempt under a separate, usually more
//! generous, emergency timeout before giving up for good.

use crate::browser_pool::BrowserPool;
use crate::config::{
    AppConfig, Config, EmergencyPolicy, OutputFormat, Priority, ScreenshotMetadata,
    ScreenshotRequest, ScreenshotResult,
};
use crate::utils::{MemoryMonitor, MemoryStatus, RequestInterceptor};
use crate::{CircuitBreaker, ScreenshotError};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, ErrorReason, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::future::try_join_all;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// High-performance screenshot service backed by a pool of reusable browser
/// tabs.
///
/// # Examples
///
/// ```rust,no_run
/// use screenshot_tool::{AppConfig, ScreenshotService, ScreenshotRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let app_config = AppConfig::from_env()?;
///     let service = ScreenshotService::new(&app_config).await?;
///
///     let request = ScreenshotRequest {
///         url: "https://example.com".to_string(),
///         ..Default::default()
///     };
///     let result = service.screenshot_single(request).await?;
///     println!("Captured to {}", result.path.display());
///
///     service.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ScreenshotService {
    pub browser_pool: Arc<BrowserPool>,
    config: Config,
    emergency_policy: EmergencyPolicy,
    emergency_context_timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
    interceptor: RequestInterceptor,
    memory_monitor: Arc<MemoryMonitor>,
}

impl ScreenshotService {
    pub async fn new(app_config: &AppConfig) -> Result<Self, ScreenshotError> {
        let browser_pool =
            BrowserPool::new(app_config.browser_pool.clone(), app_config.capture.clone()).await?;
        let memory_limit = app_config.capture.memory_limit.unwrap_or(1024 * 1024 * 1024);

        Ok(Self {
            browser_pool,
            config: app_config.capture.clone(),
            emergency_policy: app_config.emergency_policy,
            emergency_context_timeout: app_config.emergency_context_timeout,
            circuit_breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
            interceptor: RequestInterceptor::new(),
            memory_monitor: Arc::new(MemoryMonitor::new(memory_limit)),
        })
    }

    pub async fn screenshot_urls(&self, urls: Vec<String>) -> Result<Vec<ScreenshotResult>, ScreenshotError> {
        let requests: Vec<ScreenshotRequest> = urls
            .into_iter()
            .map(|url| ScreenshotRequest { url, ..Default::default() })
            .collect();
        self.process_requests(requests).await
    }

    pub async fn screenshot_single(&self, request: ScreenshotRequest) -> Result<ScreenshotResult, ScreenshotError> {
        let results = self.process_requests(vec![request]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ScreenshotError::CaptureFailed("no result returned".to_string()))
    }

    pub async fn process_requests(&self, requests: Vec<ScreenshotRequest>) -> Result<Vec<ScreenshotResult>, ScreenshotError> {
        let mut sorted_requests = requests;
        sorted_requests.sort_by(|a, b| self.priority_to_value(&b.priority).cmp(&self.priority_to_value(&a.priority)));

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_screenshots));
        let tasks: Vec<_> = sorted_requests
            .into_iter()
            .map(|request| {
                let service = self.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await?;
                    service.take_screenshot_with_retry(request).await
                })
            })
            .collect();

        let results = try_join_all(tasks)
            .await
            .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;

        results.into_iter().collect::<Result<Vec<_>, _>>()
    }

    fn is_complex(&self, url: &str) -> bool {
        self.config.hard_page_patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    async fn take_screenshot_with_retry(&self, mut request: ScreenshotRequest) -> Result<ScreenshotResult, ScreenshotError> {
        let complex = self.is_complex(&request.url);
        let max_attempts = if complex { self.config.max_retries_complex } else { self.config.max_retries_regular };
        let nav_timeout = if complex { self.config.navigation_timeout_complex } else { self.config.navigation_timeout_regular };

        let mut last_error = None;
        let mut last_was_timeout = false;

        for attempt in 0..=max_attempts {
            if !self.circuit_breaker.can_execute() {
                return Err(ScreenshotError::BrowserUnavailable);
            }

            request.retry_count = attempt;

            match self.take_screenshot(request.clone(), nav_timeout).await {
                Ok(mut result) => {
                    self.circuit_breaker.record_success();
                    result.success = true;
                    return Ok(result);
                }
                Err(e) => {
                    last_was_timeout = matches!(e, ScreenshotError::Timeout(_));
                    self.circuit_breaker.record_failure();
                    last_error = Some(e.clone());

                    if !e.is_retryable() || attempt == max_attempts {
                        break;
                    }

                    let delay = self.calculate_retry_delay(attempt);
                    debug!(
                        "retrying screenshot for {} after {:?} (attempt {}/{})",
                        request.url, delay, attempt + 1, max_attempts
                    );
                    sleep(delay).await;
                }
            }
        }

        let should_try_emergency = match self.emergency_policy {
            EmergencyPolicy::Never => false,
            EmergencyPolicy::OnTimeoutOnly => last_was_timeout,
            EmergencyPolicy::OnAnyFailure => true,
        };

        if should_try_emergency {
            debug!("attempting emergency-context capture for {}", request.url);
            match self.take_screenshot(request.clone(), self.emergency_context_timeout).await {
                Ok(mut result) => {
                    result.success = true;
                    return Ok(result);
                }
                Err(e) => last_error = Some(e),
            }
        }

        self.failed_result(request, last_error)
    }

    fn failed_result(&self, request: ScreenshotRequest, error: Option<ScreenshotError>) -> Result<ScreenshotResult, ScreenshotError> {
        Ok(ScreenshotResult {
            request_id: request.id,
            url: request.url,
            path: std::path::PathBuf::new(),
            format: self.config.output_format,
            timestamp: SystemTime::now(),
            duration: Duration::from_secs(0),
            success: false,
            error,
            metadata: ScreenshotMetadata {
                viewport: self.config.viewport.clone(),
                page_title: None,
                final_url: None,
                response_status: None,
                file_size: 0,
                browser_instance_id: 0,
            },
        })
    }

    async fn take_screenshot(&self, request: ScreenshotRequest, nav_timeout: Duration) -> Result<ScreenshotResult, ScreenshotError> {
        let start_time = Instant::now();

        if !self.is_valid_url(&request.url) {
            return Err(ScreenshotError::InvalidUrl(request.url.clone()));
        }

        if self.memory_monitor.check_memory() == MemoryStatus::Critical {
            return Err(ScreenshotError::MemoryLimitExceeded);
        }

        let viewport = request.custom_viewport.as_ref().unwrap_or(&self.config.viewport);
        let context = self.browser_pool.acquire_context(viewport.width, viewport.height).await?;
        let browser_instance_id = context.browser_idx;

        if self.config.optimization.block_ads || self.config.optimization.block_trackers || self.config.optimization.block_images {
            self.enable_request_interception(context.page()).await?;
        }

        let capture_future = self.navigate_and_capture(context.page(), &request, browser_instance_id, start_time);
        let bound = std::cmp::min(nav_timeout, self.config.screenshot_timeout);

        match timeout(bound, capture_future).await {
            Ok(result) => result,
            Err(_) => Err(ScreenshotError::Timeout(bound)),
        }
    }

    async fn navigate_and_capture(
        &self,
        page: &Page,
        request: &ScreenshotRequest,
        browser_instance_id: usize,
        start_time: Instant,
    ) -> Result<ScreenshotResult, ScreenshotError> {
        page.goto(&request.url).await.map_err(|e| ScreenshotError::PageError(e.to_string()))?;

        if self.config.optimization.wait_for_network_idle {
            page.wait_for_navigation().await.map_err(|e| ScreenshotError::PageError(e.to_string()))?;
        }

        if let Some(wait_time) = request.wait_time {
            sleep(wait_time).await;
        }

        let page_title = page.get_title().await.unwrap_or_default();
        let final_url = page.url().await.unwrap_or_else(|_| Some(request.url.clone()));

        let png_data = if let Some(selector) = &request.element_selector {
            self.screenshot_element(page, selector).await?
        } else if request.full_page {
            self.screenshot_full_page(page).await?
        } else {
            self.screenshot_viewport(page).await?
        };

        let encoded = self.convert_image_format(png_data).await?;
        let path = self.write_temp_file(&encoded).await?;
        let viewport = request.custom_viewport.as_ref().unwrap_or(&self.config.viewport).clone();

        Ok(ScreenshotResult {
            request_id: request.id.clone(),
            url: request.url.clone(),
            path,
            format: self.config.output_format,
            timestamp: SystemTime::now(),
            duration: start_time.elapsed(),
            success: true,
            error: None,
            metadata: ScreenshotMetadata {
                viewport,
                page_title,
                final_url,
                response_status: None,
                file_size: encoded.len(),
                browser_instance_id,
            },
        })
    }

    async fn write_temp_file(&self, data: &[u8]) -> Result<std::path::PathBuf, ScreenshotError> {
        let extension = match self.config.output_format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        };
        let path = std::env::temp_dir().join(format!("{}.{extension}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Enables CDP Fetch-domain interception and pumps its event stream for
    /// the lifetime of the page, failing blocked requests and letting
    /// everything else through.
    async fn enable_request_interception(&self, page: &Page) -> Result<(), ScreenshotError> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| ScreenshotError::ResourceBlockingError(e.to_string()))?;

        let mut events = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| ScreenshotError::ResourceBlockingError(e.to_string()))?;

        let interceptor = self.interceptor.clone();
        let page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = event.request.url.clone();
                let resource_type = event
                    .resource_type
                    .map(|t| format!("{t:?}").to_lowercase())
                    .unwrap_or_default();

                let outcome = if interceptor.should_block(&url, &resource_type) {
                    page.execute(FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient))
                        .await
                        .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    debug!("fetch interception step failed: {e}");
                }
            }
        });

        Ok(())
    }

    async fn screenshot_viewport(&self, page: &Page) -> Result<Vec<u8>, ScreenshotError> {
        let screenshot_params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build();
        page.screenshot(screenshot_params).await.map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))
    }

    async fn screenshot_full_page(&self, page: &Page) -> Result<Vec<u8>, ScreenshotError> {
        let screenshot_params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        page.screenshot(screenshot_params).await.map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))
    }

    async fn screenshot_element(&self, page: &Page, selector: &str) -> Result<Vec<u8>, ScreenshotError> {
        let element = page.find_element(selector).await.map_err(|e| ScreenshotError::ElementNotFound(e.to_string()))?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))
    }

    async fn convert_image_format(&self, png_data: Vec<u8>) -> Result<Vec<u8>, ScreenshotError> {
        match self.config.output_format {
            OutputFormat::Png => Ok(png_data),
            OutputFormat::Jpeg => {
                let img = image::load_from_memory(&png_data).map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;
                let mut out = Vec::new();
                img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
                    .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;
                Ok(out)
            }
            OutputFormat::Webp => {
                let img = image::load_from_memory(&png_data).map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;
                let mut out = Vec::new();
                img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::WebP)
                    .map_err(|e| ScreenshotError::CaptureFailed(e.to_string()))?;
                Ok(out)
            }
        }
    }

    fn is_valid_url(&self, url: &str) -> bool {
        url::Url::parse(url).is_ok()
    }

    fn priority_to_value(&self, priority: &Priority) -> u8 {
        match priority {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }

    fn calculate_retry_delay(&self, attempt: usize) -> Duration {
        let exp = 2u32.saturating_pow(attempt as u32);
        let delay = self.config.retry_base_delay.saturating_mul(exp);
        std::cmp::min(delay, self.config.retry_max_delay)
    }

    /// Whether the capture circuit breaker currently allows new attempts.
    pub fn is_available(&self) -> bool {
        self.circuit_breaker.can_execute()
    }

    pub async fn shutdown(&self) {
        info!("shutting down screenshot service");
        self.browser_pool.shutdown().await;
        info!("screenshot service shutdown complete");
    }
}

impl Clone for ScreenshotService {
    fn clone(&self) -> Self {
        Self {
            browser_pool: self.browser_pool.clone(),
            config: self.config.clone(),
            emergency_policy: self.emergency_policy,
            emergency_context_timeout: self.emergency_context_timeout,
            circuit_breaker: self.circuit_breaker.clone(),
            interceptor: self.interceptor.clone(),
            memory_monitor: self.memory_monitor.clone(),
        }
    }
}
