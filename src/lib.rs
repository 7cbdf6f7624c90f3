//! # Screenshot Tool
//!
//! An HTTP service that renders a URL to an image and returns a signed,
//! publicly fetchable URL for the result. Capture runs through a pool of
//! long-lived headless Chrome instances; results are deduplicated by an
//! in-memory cache keyed on (url, width, height, format) and persisted to
//! either local disk or an S3-compatible object store.
//!
//! ## Request flow
//!
//! `POST /screenshot` with `{url, width, height, format, cache}` walks:
//! cache lookup -> admission queue -> host rewrite -> capture -> storage
//! upload -> HMAC-signed URL -> cache publish. See [`pipeline::handle_request`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use screenshot_tool::{AppConfig, ScreenshotService, ScreenshotRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app_config = AppConfig::from_env()?;
//!     let service = ScreenshotService::new(&app_config).await?;
//!
//!     let request = ScreenshotRequest {
//!         url: "https://example.com".to_string(),
//!         ..Default::default()
//!     };
//!     let screenshot = service.screenshot_single(request).await?;
//!     println!("Screenshot captured to {}", screenshot.path.display());
//!
//!     Ok(())
//! }
//! ```
//!
//! Running the HTTP service itself is `screenshot-tool serve` (see [`cli`]).

/// Configuration and settings for the screenshot tool
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Browser pool management for concurrent Chrome instances
pub mod browser_pool;

/// Main screenshot service orchestrating the capture pipeline
pub mod screenshot_service;

/// Host rewriting applied before capture
pub mod transform;

/// HMAC-signed result URL generation
pub mod signer;

/// Local-disk / object-store persistence for rendered images
pub mod storage;

/// Bounded, single-flight result cache
pub mod cache;

/// Admission control in front of the browser pool
pub mod queue;

/// End-to-end request orchestration and the shared `Services` bundle
pub mod pipeline;

/// axum HTTP surface
pub mod http;

/// Command-line interface implementation
pub mod cli;

/// Performance metrics collection and monitoring
pub mod metrics;

/// Health checking system for browser instances and service
pub mod health;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use browser_pool::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use health::*;
pub use metrics::*;
pub use screenshot_service::*;
pub use utils::*;
