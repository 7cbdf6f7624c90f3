//! Pool of long-lived headless Chrome processes, each hosting multiple
//! concurrent tabs ("contexts").
//!
//! A single `Browser` process is expensive to launch but can safely run many
//! tabs at once, so the pool caps concurrency two ways: a global semaphore on
//! `MAX_CONCURRENT_CONTEXTS` (total in-flight tabs across the whole pool) and
//! a per-browser `MAX_TABS_PER_BROWSER` cap that spreads load before another
//! browser process is launched. Idle or aged-out browsers are retired by a
//! background watchdog and the pool is topped back up to `min_size`.

use crate::config::{get_chrome_args_with_instance_id, BrowserPoolConfig, Config};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::Page;
use crate::ScreenshotError;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tracing::{error, info, warn};

struct BrowserSlot {
    id: usize,
    browser: Arc<Mutex<Browser>>,
    handler: tokio::task::JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
    created_at: Instant,
    tabs_in_use: AtomicUsize,
    total_tabs_served: AtomicUsize,
    last_released: StdMutex<Instant>,
}

impl BrowserSlot {
    async fn shutdown(self) {
        let _ = self.browser.lock().await.close().await;
        self.handler.abort();
    }
}

/// One checked-out tab inside a pooled browser. Released back to the pool
/// (decrementing both the per-browser and global context counts) on drop.
pub struct BrowserContext {
    page: Page,
    pub browser_idx: usize,
    pool: Arc<BrowserPool>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl Drop for BrowserContext {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        let browser_idx = self.browser_idx;
        tokio::spawn(async move {
            pool.release_context(browser_idx).await;
        });
    }
}

pub struct BrowserPool {
    slots: Mutex<Vec<Arc<BrowserSlot>>>,
    context_semaphore: Arc<Semaphore>,
    config: BrowserPoolConfig,
    capture_config: Config,
    next_id: AtomicUsize,
    is_shutting_down: AtomicBool,
}

impl BrowserPool {
    pub async fn new(config: BrowserPoolConfig, capture_config: Config) -> Result<Arc<Self>, ScreenshotError> {
        let pool = Arc::new(Self {
            slots: Mutex::new(Vec::new()),
            context_semaphore: Arc::new(Semaphore::new(config.max_concurrent_contexts)),
            config,
            capture_config,
            next_id: AtomicUsize::new(0),
            is_shutting_down: AtomicBool::new(false),
        });

        pool.ensure_min_size().await?;
        pool.clone().spawn_watchdog();
        Ok(pool)
    }

    /// Checks out a tab sized to `width`x`height` from the least-loaded
    /// browser with spare tab capacity, launching a new browser process if
    /// every existing one is full and the pool hasn't hit `max_size`.
    pub async fn acquire_context(
        self: &Arc<Self>,
        width: u32,
        height: u32,
    ) -> Result<BrowserContext, ScreenshotError> {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(ScreenshotError::BrowserUnavailable);
        }

        let permit = Arc::clone(&self.context_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ScreenshotError::BrowserUnavailable)?;

        let slot = self.checkout_slot().await?;

        let page_result = {
            let browser = slot.browser.lock().await;
            browser.new_page("about:blank").await
        };
        let page = match page_result {
            Ok(page) => page,
            Err(e) => {
                self.release_context(slot.id).await;
                return Err(ScreenshotError::PageError(e.to_string()));
            }
        };

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(width)
            .height(height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| ScreenshotError::PageError(e.to_string()))?;
        if let Err(e) = page.execute(metrics).await {
            self.release_context(slot.id).await;
            return Err(ScreenshotError::PageError(e.to_string()));
        }

        slot.total_tabs_served.fetch_add(1, Ordering::Relaxed);

        Ok(BrowserContext {
            page,
            browser_idx: slot.id,
            pool: self.clone(),
            _permit: permit,
        })
    }

    async fn checkout_slot(&self) -> Result<Arc<BrowserSlot>, ScreenshotError> {
        loop {
            {
                let slots = self.slots.lock().await;
                if let Some(slot) = slots
                    .iter()
                    .filter(|s| s.tabs_in_use.load(Ordering::Relaxed) < self.config.max_tabs_per_browser)
                    .min_by_key(|s| s.tabs_in_use.load(Ordering::Relaxed))
                {
                    slot.tabs_in_use.fetch_add(1, Ordering::Relaxed);
                    return Ok(slot.clone());
                }
                if slots.len() >= self.config.max_size {
                    drop(slots);
                    // Every browser is at its per-tab cap and we're already at
                    // max_size; the context semaphore already bounds how many
                    // callers can be here at once, so back off briefly and retry
                    // rather than deadlock.
                    sleep(Duration::from_millis(50)).await;
                    continue;
                }
            }

            let slot = Arc::new(self.launch_slot().await?);
            let mut slots = self.slots.lock().await;
            slots.push(slot.clone());
            slot.tabs_in_use.fetch_add(1, Ordering::Relaxed);
            return Ok(slot);
        }
    }

    async fn release_context(&self, slot_id: usize) {
        let slots = self.slots.lock().await;
        if let Some(slot) = slots.iter().find(|s| s.id == slot_id) {
            slot.tabs_in_use.fetch_sub(1, Ordering::Relaxed);
            *slot.last_released.lock().unwrap() = Instant::now();
        }
    }

    async fn launch_slot(&self) -> Result<BrowserSlot, ScreenshotError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let temp_dir = format!("/tmp/chromium-temp-{}-{}", std::process::id(), id);
        let user_data_dir = format!("/tmp/chromium-screenshot-{}-{}", std::process::id(), id);
        let runner_dir = format!("/tmp/chromiumoxide-runner-{}", id);
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| ScreenshotError::BrowserLaunchFailed(format!("failed to create temp dir: {e}")))?;
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| ScreenshotError::BrowserLaunchFailed(format!("failed to create user data dir: {e}")))?;
        std::fs::create_dir_all(&runner_dir)
            .map_err(|e| ScreenshotError::BrowserLaunchFailed(format!("failed to create runner dir: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .window_size(self.capture_config.viewport.width, self.capture_config.viewport.height)
            .args(get_chrome_args_with_instance_id(&self.capture_config, Some(id)));
        if let Some(chrome_path) = &self.capture_config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }
        let browser_config = builder
            .build()
            .unwrap_or_else(|_| BrowserConfig::with_executable("/usr/sbin/chromium"));

        let (browser, mut handler) = {
            std::env::set_var("TMPDIR", &runner_dir);
            let result = Browser::launch(browser_config).await;
            std::env::remove_var("TMPDIR");
            result
        }
        .map_err(|e| ScreenshotError::BrowserLaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("browser handler error: {e}");
                        return Err(e);
                    }
                    None => {
                        info!("browser handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        info!("launched browser slot {id}");

        Ok(BrowserSlot {
            id,
            browser: Arc::new(Mutex::new(browser)),
            handler: handler_task,
            created_at: Instant::now(),
            tabs_in_use: AtomicUsize::new(0),
            total_tabs_served: AtomicUsize::new(0),
            last_released: StdMutex::new(Instant::now()),
        })
    }

    async fn ensure_min_size(&self) -> Result<(), ScreenshotError> {
        loop {
            let deficit = {
                let slots = self.slots.lock().await;
                self.config.min_size.saturating_sub(slots.len())
            };
            if deficit == 0 {
                return Ok(());
            }
            let slot = self.launch_slot().await?;
            self.slots.lock().await.push(Arc::new(slot));
        }
    }

    fn spawn_watchdog(self: Arc<Self>) {
        let interval = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while !self.is_shutting_down.load(Ordering::Relaxed) {
                ticker.tick().await;
                self.sweep().await;
            }
        });
    }

    async fn sweep(&self) {
        let to_retire: Vec<usize> = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .filter(|s| {
                    let tabs = s.tabs_in_use.load(Ordering::Relaxed);
                    if tabs != 0 {
                        return false;
                    }
                    let idle_for = s.last_released.lock().unwrap().elapsed();
                    s.handler.is_finished()
                        || s.created_at.elapsed() > self.config.max_age
                        || idle_for > self.config.idle_timeout
                })
                .map(|s| s.id)
                .collect()
        };

        for id in to_retire {
            self.retire_slot(id).await;
        }

        if let Err(e) = self.ensure_min_size().await {
            warn!("failed to refill browser pool to min_size: {e}");
        }
    }

    async fn retire_slot(&self, id: usize) {
        let removed = {
            let mut slots = self.slots.lock().await;
            slots
                .iter()
                .position(|s| s.id == id && s.tabs_in_use.load(Ordering::Relaxed) == 0)
                .map(|pos| slots.remove(pos))
        };
        if let Some(slot) = removed {
            info!("retiring browser slot {id}");
            if let Ok(slot) = Arc::try_unwrap(slot) {
                slot.shutdown().await;
            }
        }
    }

    pub async fn shutdown(&self) {
        info!("shutting down browser pool");
        self.is_shutting_down.store(true, Ordering::Relaxed);
        let mut slots = self.slots.lock().await;
        for slot in slots.drain(..) {
            if let Ok(slot) = Arc::try_unwrap(slot) {
                slot.shutdown().await;
            }
        }
        info!("browser pool shutdown complete");
    }

    pub async fn get_stats(&self) -> BrowserPoolStats {
        let slots = self.slots.lock().await;
        let total_tabs_in_use: usize = slots.iter().map(|s| s.tabs_in_use.load(Ordering::Relaxed)).sum();
        let total_tabs_served: usize = slots
            .iter()
            .map(|s| s.total_tabs_served.load(Ordering::Relaxed))
            .sum();
        BrowserPoolStats {
            browsers: slots.len(),
            min_size: self.config.min_size,
            max_size: self.config.max_size,
            tabs_in_use: total_tabs_in_use,
            max_tabs_per_browser: self.config.max_tabs_per_browser,
            available_contexts: self.context_semaphore.available_permits(),
            max_concurrent_contexts: self.config.max_concurrent_contexts,
            total_tabs_served,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BrowserPoolStats {
    pub browsers: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub tabs_in_use: usize,
    pub max_tabs_per_browser: usize,
    pub available_contexts: usize,
    pub max_concurrent_contexts: usize,
    pub total_tabs_served: usize,
}
