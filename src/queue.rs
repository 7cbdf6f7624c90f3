//! Admission control in front of the browser pool.
//!
//! Requests acquire a concurrency permit before capture starts. When no
//! permit is immediately free, the request either waits (admitted into the
//! queue) or is shed immediately, depending on current pressure — the
//! max of queue-depth ratio and in-flight-concurrency ratio. A queued
//! request that doesn't get a permit within `queue_timeout` times out rather
//! than waiting indefinitely.

use crate::config::AdmissionConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

pub enum Outcome {
    /// A permit was available immediately; caller may proceed to capture.
    Processed(AdmittedPermit),
    /// The request waited in the queue and then got a permit.
    Queued(AdmittedPermit, Duration),
    /// Pressure was already over threshold; the request never queued.
    Rejected,
    /// The request queued but did not get a permit before `queue_timeout`.
    TimedOut,
}

/// Holds the concurrency permit for the lifetime of one capture. Dropping it
/// frees the slot for the next queued request.
pub struct AdmittedPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

pub struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    max_queue_size: usize,
    pressure_threshold: f64,
    queue_timeout: Duration,
    queue_enabled: bool,
    load_shedding_enabled: bool,
    queued: AtomicUsize,
    total_queue_wait_ms: AtomicUsize,
    total_admitted: AtomicUsize,
}

impl AdmissionQueue {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            max_concurrent: config.max_concurrent,
            max_queue_size: config.max_queue_size,
            pressure_threshold: config.pressure_threshold,
            queue_timeout: config.queue_timeout,
            queue_enabled: config.queue_enabled,
            load_shedding_enabled: config.load_shedding_enabled,
            queued: AtomicUsize::new(0),
            total_queue_wait_ms: AtomicUsize::new(0),
            total_admitted: AtomicUsize::new(0),
        }
    }

    fn pressure(&self) -> f64 {
        let queue_ratio = self.queued.load(Ordering::Relaxed) as f64 / self.max_queue_size as f64;
        let in_use = self.max_concurrent - self.semaphore.available_permits();
        let concurrency_ratio = in_use as f64 / self.max_concurrent as f64;
        queue_ratio.max(concurrency_ratio)
    }

    /// Attempts to admit one request. Never blocks past `queue_timeout`.
    pub async fn admit(&self) -> Outcome {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            self.total_admitted.fetch_add(1, Ordering::Relaxed);
            return Outcome::Processed(AdmittedPermit { _permit: permit });
        }

        // With the queue disabled, admission is a direct try-or-reject against
        // the semaphore: nothing waits and nothing times out.
        if !self.queue_enabled {
            return Outcome::Rejected;
        }

        if self.load_shedding_enabled && self.pressure() >= self.pressure_threshold {
            return Outcome::Rejected;
        }
        if self.queued.load(Ordering::Relaxed) >= self.max_queue_size {
            return Outcome::Rejected;
        }

        self.queued.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.queue_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await;
        self.queued.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(Ok(permit)) => {
                let waited = started.elapsed();
                self.total_admitted.fetch_add(1, Ordering::Relaxed);
                self.total_queue_wait_ms
                    .fetch_add(waited.as_millis() as usize, Ordering::Relaxed);
                Outcome::Queued(AdmittedPermit { _permit: permit }, waited)
            }
            Ok(Err(_)) => Outcome::Rejected,
            Err(_) => Outcome::TimedOut,
        }
    }

    pub fn stats(&self) -> QueueStats {
        let total_admitted = self.total_admitted.load(Ordering::Relaxed);
        let avg_wait_ms = if total_admitted > 0 {
            self.total_queue_wait_ms.load(Ordering::Relaxed) as f64 / total_admitted as f64
        } else {
            0.0
        };
        QueueStats {
            queued: self.queued.load(Ordering::Relaxed),
            in_flight: self.max_concurrent - self.semaphore.available_permits(),
            max_concurrent: self.max_concurrent,
            pressure: self.pressure(),
            average_queue_wait_ms: avg_wait_ms,
        }
    }

    /// Logs queue pressure on an interval; intended to run for the process
    /// lifetime as a background task.
    pub fn spawn_stats_log_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let stats = self.stats();
                tracing::info!(
                    queued = stats.queued,
                    in_flight = stats.in_flight,
                    pressure = stats.pressure,
                    "admission queue stats"
                );
            }
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub pressure: f64,
    pub average_queue_wait_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_concurrent: usize, max_queue_size: usize) -> AdmissionConfig {
        AdmissionConfig {
            max_queue_size,
            max_concurrent,
            pressure_threshold: 0.99,
            queue_timeout: Duration::from_millis(100),
            queue_enabled: true,
            load_shedding_enabled: true,
        }
    }

    #[tokio::test]
    async fn first_request_is_processed_immediately() {
        let queue = AdmissionQueue::new(&config(1, 10));
        assert!(matches!(queue.admit().await, Outcome::Processed(_)));
    }

    #[tokio::test]
    async fn second_request_queues_then_times_out_if_slot_held() {
        let queue = AdmissionQueue::new(&config(1, 10));
        let _held = match queue.admit().await {
            Outcome::Processed(p) => p,
            _ => panic!("expected processed"),
        };
        assert!(matches!(queue.admit().await, Outcome::TimedOut));
    }

    #[tokio::test]
    async fn rejects_when_pressure_already_over_threshold() {
        let mut cfg = config(1, 10);
        cfg.pressure_threshold = 0.0;
        let queue = AdmissionQueue::new(&cfg);
        let _held = match queue.admit().await {
            Outcome::Processed(p) => p,
            _ => panic!("expected processed"),
        };
        assert!(matches!(queue.admit().await, Outcome::Rejected));
    }

    #[tokio::test]
    async fn disabled_load_shedding_ignores_pressure_and_queues_instead() {
        let mut cfg = config(1, 10);
        cfg.pressure_threshold = 0.0;
        cfg.load_shedding_enabled = false;
        let queue = AdmissionQueue::new(&cfg);
        let _held = match queue.admit().await {
            Outcome::Processed(p) => p,
            _ => panic!("expected processed"),
        };
        // Pressure is already over threshold, but shedding is off, so the
        // request queues and times out rather than being rejected outright.
        assert!(matches!(queue.admit().await, Outcome::TimedOut));
    }

    #[tokio::test]
    async fn disabled_queue_rejects_immediately_instead_of_waiting() {
        let mut cfg = config(1, 10);
        cfg.queue_enabled = false;
        let queue = AdmissionQueue::new(&cfg);
        let _held = match queue.admit().await {
            Outcome::Processed(p) => p,
            _ => panic!("expected processed"),
        };
        assert!(matches!(queue.admit().await, Outcome::Rejected));
    }
}
