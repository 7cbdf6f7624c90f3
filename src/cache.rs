//! Bounded result cache keyed by a fingerprint of (original URL, width,
//! height, format) — independent of any host rewriting applied for capture.
//!
//! Expiry is lazy (checked on read) plus swept periodically by a background
//! task; eviction when over capacity drops the least-recently-read entry.
//! A single-flight latch collapses concurrent requests for the same
//! fingerprint into one capture, and carries the leader's outcome (success
//! or error) so followers observe exactly what the leader observed instead
//! of re-racing into their own capture.

use crate::config::{CacheConfig, OutputFormat};
use crate::error::ScreenshotError;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct Entry {
    signed_url: String,
    inserted_at: Instant,
    last_read: Instant,
}

/// Single-flight latch for one fingerprint. Holds the leader's outcome once
/// known so followers that already captured a clone of this `Arc` can read
/// it directly instead of looking the fingerprint back up in the map.
pub struct InFlight {
    notify: Notify,
    outcome: Mutex<Option<Result<String, ScreenshotError>>>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            outcome: Mutex::new(None),
        }
    }

    fn publish(&self, outcome: Result<String, ScreenshotError>) {
        *self.outcome.lock().unwrap() = Some(outcome);
        self.notify.notify_waiters();
    }

    /// Waits for the leader to call `complete`/`fail` and returns its outcome.
    pub async fn await_outcome(&self) -> Result<String, ScreenshotError> {
        loop {
            let notified = self.notify.notified();
            if let Some(outcome) = self.outcome.lock().unwrap().clone() {
                return outcome;
            }
            notified.await;
        }
    }
}

enum Slot {
    Ready(Entry),
    InFlight(Arc<InFlight>),
}

pub struct ResultCache {
    entries: DashMap<u64, Slot>,
    ttl: Duration,
    max_entries: usize,
}

pub enum Lookup {
    /// A fresh entry was found; use its signed URL directly.
    Hit(String),
    /// No entry exists and this caller became the leader: it must capture the
    /// result and call `complete`/`fail`.
    Miss,
    /// Another caller is already capturing this fingerprint; await its
    /// outcome directly rather than re-checking the map.
    Wait(Arc<InFlight>),
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: config.ttl,
            max_entries: config.max_entries,
        }
    }

    pub fn fingerprint(url: &str, width: u32, height: u32, format: OutputFormat) -> u64 {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        width.hash(&mut hasher);
        height.hash(&mut hasher);
        std::mem::discriminant(&format).hash(&mut hasher);
        hasher.finish()
    }

    /// Looks up `key`, registering this caller as the single-flight leader on
    /// a miss.
    pub fn begin_or_wait(&self, key: u64) -> Lookup {
        if let Some(mut slot) = self.entries.get_mut(&key) {
            match &mut *slot {
                Slot::Ready(entry) => {
                    if entry.inserted_at.elapsed() > self.ttl {
                        drop(slot);
                        self.entries.remove(&key);
                        return self.begin_or_wait(key);
                    }
                    entry.last_read = Instant::now();
                    return Lookup::Hit(entry.signed_url.clone());
                }
                Slot::InFlight(inflight) => return Lookup::Wait(inflight.clone()),
            }
        }

        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                // Lost the race after the read above; recurse to read the winner's slot.
                self.begin_or_wait(key)
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(Slot::InFlight(Arc::new(InFlight::new())));
                Lookup::Miss
            }
        }
    }

    /// Completes a successful capture, publishing `signed_url` and waking
    /// anyone waiting on it with the same value.
    pub fn complete(&self, key: u64, signed_url: String) {
        let inflight = match self.entries.get(&key) {
            Some(slot) => match &*slot {
                Slot::InFlight(inflight) => Some(inflight.clone()),
                Slot::Ready(_) => None,
            },
            None => None,
        };

        self.evict_if_full();
        let now = Instant::now();
        self.entries.insert(
            key,
            Slot::Ready(Entry {
                signed_url: signed_url.clone(),
                inserted_at: now,
                last_read: now,
            }),
        );

        if let Some(inflight) = inflight {
            inflight.publish(Ok(signed_url));
        }
    }

    /// Releases the single-flight leadership on a failed capture, publishing
    /// `err` to every follower awaiting this fingerprint instead of letting
    /// them re-race into their own capture.
    pub fn fail(&self, key: u64, err: ScreenshotError) {
        if let Some((_, Slot::InFlight(inflight))) = self.entries.remove(&key) {
            inflight.publish(Err(err));
        }
    }

    fn evict_if_full(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .filter_map(|r| match r.value() {
                Slot::Ready(e) => Some((*r.key(), e.last_read)),
                Slot::InFlight(_) => None,
            })
            .min_by_key(|(_, last_read)| *last_read);
        if let Some((key, _)) = oldest {
            self.entries.remove(&key);
        }
    }

    /// Sweeps all expired entries. Intended to be called from a periodic
    /// background task rather than on every read.
    pub fn sweep_expired(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, slot| match slot {
            Slot::Ready(entry) => entry.inserted_at.elapsed() <= ttl,
            Slot::InFlight(_) => true,
        });
        before - self.entries.len()
    }

    pub fn remove(&self, key: u64) {
        self.entries.remove(&key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut ready = 0;
        let mut in_flight = 0;
        for r in self.entries.iter() {
            match r.value() {
                Slot::Ready(_) => ready += 1,
                Slot::InFlight(_) => in_flight += 1,
            }
        }
        CacheStats {
            entries: ready,
            in_flight,
            max_entries: self.max_entries,
        }
    }

    /// Runs a periodic sweep on `interval` until the task is aborted.
    pub fn spawn_eviction_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    tracing::debug!("cache sweep removed {removed} expired entries");
                }
            }
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub max_entries: usize,
}
