//! Orchestrates one capture request end to end: validation, cache lookup,
//! admission, capture, storage, signing, then publishing the signed URL back
//! into the cache for the next caller.
//!
//! Every exit path — cache hit, rejection, timeout, capture failure, or
//! success — cleans up after itself exactly once; a capture failure always
//! releases the cache's single-flight slot (with the error attached) so
//! followers observe the same failure instead of re-racing their own capture.

use crate::cache::{Lookup, ResultCache};
use crate::config::{CaptureRequest, ScreenshotRequest as CaptureScreenshotRequest, Viewport};
use crate::error::ScreenshotError;
use crate::queue::{self, AdmissionQueue};
use crate::signer::Signer;
use crate::storage::{content_type_for_extension, Storage};
use crate::transform::rewrite_for_capture;
use crate::AppConfig;
use crate::ScreenshotService;
use std::sync::Arc;

pub struct Services {
    pub config: AppConfig,
    pub capture: Arc<ScreenshotService>,
    pub cache: Arc<ResultCache>,
    pub queue: Arc<AdmissionQueue>,
    pub signer: Arc<Signer>,
    pub storage: Arc<dyn Storage>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Processed(String),
    Rejected,
    TimedOut,
}

/// Width/height bounds accepted at the pipeline boundary; see `validate_request`.
const MIN_DIMENSION: u32 = 1;
const MAX_DIMENSION: u32 = 5000;

fn validate_request(request: &CaptureRequest) -> Result<(), ScreenshotError> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&request.width) {
        return Err(ScreenshotError::InvalidInput(format!(
            "width must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {}",
            request.width
        )));
    }
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&request.height) {
        return Err(ScreenshotError::InvalidInput(format!(
            "height must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {}",
            request.height
        )));
    }
    crate::utils::validate_url(&request.url)
        .map_err(|_| ScreenshotError::InvalidInput(format!("invalid or non-http(s) url: {}", request.url)))?;
    Ok(())
}

pub async fn handle_request(
    services: &Services,
    request: CaptureRequest,
) -> Result<PipelineOutcome, ScreenshotError> {
    validate_request(&request)?;

    let fingerprint =
        ResultCache::fingerprint(&request.url, request.width, request.height, request.format.clone());

    if request.cache {
        match services.cache.begin_or_wait(fingerprint) {
            Lookup::Hit(signed_url) => return Ok(PipelineOutcome::Processed(signed_url)),
            Lookup::Wait(inflight) => {
                return inflight.await_outcome().await.map(PipelineOutcome::Processed);
            }
            Lookup::Miss => {}
        }
    }

    match services.queue.admit().await {
        queue::Outcome::Processed(permit) | queue::Outcome::Queued(permit, _) => {
            let result = capture_and_publish(services, &request, fingerprint, request.cache).await;
            drop(permit);
            result
        }
        queue::Outcome::Rejected => {
            if request.cache {
                services.cache.fail(fingerprint, ScreenshotError::Overloaded);
            }
            Ok(PipelineOutcome::Rejected)
        }
        queue::Outcome::TimedOut => {
            if request.cache {
                services.cache.fail(fingerprint, ScreenshotError::QueueTimeout);
            }
            Ok(PipelineOutcome::TimedOut)
        }
    }
}

async fn capture_and_publish(
    services: &Services,
    request: &CaptureRequest,
    fingerprint: u64,
    owns_cache_slot: bool,
) -> Result<PipelineOutcome, ScreenshotError> {
    let capture_url = rewrite_for_capture(&request.url, &services.config.transform);

    let capture_request = CaptureScreenshotRequest {
        url: capture_url,
        custom_viewport: Some(Viewport {
            width: request.width,
            height: request.height,
            device_scale_factor: 1.0,
            mobile: false,
        }),
        full_page: false,
        ..Default::default()
    };

    let capture = match services.capture.screenshot_single(capture_request).await {
        Ok(result) if result.success => result,
        Ok(result) => {
            let err = result
                .error
                .unwrap_or_else(|| ScreenshotError::CaptureFailed("unknown capture failure".to_string()));
            if owns_cache_slot {
                services.cache.fail(fingerprint, err.clone());
            }
            return Err(err);
        }
        Err(e) => {
            if owns_cache_slot {
                services.cache.fail(fingerprint, e.clone());
            }
            return Err(e);
        }
    };

    let extension = match request.format {
        crate::config::OutputFormat::Png => "png",
        crate::config::OutputFormat::Jpeg => "jpeg",
        crate::config::OutputFormat::Webp => "webp",
    };
    let key = format!("{fingerprint:016x}.{extension}");
    let content_type = content_type_for_extension(extension);

    // The storage adapter owns cleanup of `capture.path` on success (moves it
    // locally, or deletes it after a successful remote upload); on failure the
    // file is still ours, so we remove it here before surfacing the error.
    let stored_url = match services.storage.upload(&capture.path, &key, content_type).await {
        Ok(url) => url,
        Err(e) => {
            let _ = tokio::fs::remove_file(&capture.path).await;
            if owns_cache_slot {
                services.cache.fail(fingerprint, e.clone());
            }
            return Err(e);
        }
    };
    let _ = stored_url;

    let signed_url = services.signer.sign(
        &request.url,
        request.width,
        request.height,
        request.format.clone(),
    );

    if owns_cache_slot {
        services.cache.complete(fingerprint, signed_url.clone());
    }

    Ok(PipelineOutcome::Processed(signed_url))
}
