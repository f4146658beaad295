//! Recurring job scheduler.
//!
//! Owns every live registration and a single worker task. The worker wakes on
//! a fixed tick, or early when `schedule()` adds a registration, and runs all
//! due jobs one after another. Jobs never run concurrently with each other.
//!
//! The registration lock is never held while a job runs, so `schedule()` and
//! `cancel()` stay responsive. A job canceled or replaced while earlier jobs
//! of the same tick were running is skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::tasks::Period;

/// Default worker tick.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// What a job asks the scheduler to do after one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Keep the registration; run again when next due.
    Continue,
    /// Remove the registration, unless it was replaced meanwhile.
    Deregister,
}

/// A unit of recurring work bound to one tag.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, tag: &str) -> JobOutcome;
}

struct Registration {
    period: Period,
    next_due: Instant,
    generation: u64,
    job: Arc<dyn Job>,
    registered_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    run_count: u64,
}

/// Read-only view of a registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationInfo {
    pub tag: String,
    pub period: Period,
    pub interval_secs: u64,
    pub registered_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub run_count: u64,
}

type RegistrationMap = Arc<RwLock<HashMap<String, Registration>>>;

/// Scheduler for recurring jobs keyed by tag.
pub struct Scheduler {
    registrations: RegistrationMap,
    next_generation: AtomicU64,
    tick: Duration,
    wake: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registrations: Arc::new(RwLock::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            tick,
            wake: Arc::new(Notify::new()),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker. Calling `start` on a running scheduler does nothing.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        self.shutdown.send_replace(false);

        let registrations = self.registrations.clone();
        let wake = self.wake.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let tick = self.tick;

        *worker = Some(tokio::spawn(async move {
            info!(tick_ms = tick.as_millis() as u64, "Scheduler worker started");
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                run_pending(&registrations).await;
            }
            info!("Scheduler worker stopped");
        }));
    }

    /// Signal the worker to exit after its current tick and wait for it.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Scheduler worker ended abnormally");
        }
    }

    /// Register `job` under `tag`, replacing any existing registration.
    ///
    /// The job is due immediately; the worker is woken so it runs without
    /// waiting for the next tick.
    pub async fn schedule(&self, tag: impl Into<String>, period: Period, job: Arc<dyn Job>) {
        let tag = tag.into();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            period,
            next_due: Instant::now(),
            generation,
            job,
            registered_at: Utc::now(),
            last_run_at: None,
            run_count: 0,
        };

        let replaced = self
            .registrations
            .write()
            .await
            .insert(tag.clone(), registration)
            .is_some();
        self.wake.notify_one();

        info!(tag = %tag, period = %period, replaced, "Job scheduled");
    }

    /// Remove the registration under `tag`. Returns whether one was removed.
    pub async fn cancel(&self, tag: &str) -> bool {
        let removed = self.registrations.write().await.remove(tag).is_some();
        if removed {
            info!(tag = tag, "Job canceled");
        } else {
            debug!(tag = tag, "Cancel requested for unknown tag");
        }
        removed
    }

    pub async fn is_scheduled(&self, tag: &str) -> bool {
        self.registrations.read().await.contains_key(tag)
    }

    /// Snapshot of all live registrations, ordered by tag.
    pub async fn registrations(&self) -> Vec<RegistrationInfo> {
        let map = self.registrations.read().await;
        let mut list: Vec<RegistrationInfo> = map
            .iter()
            .map(|(tag, r)| RegistrationInfo {
                tag: tag.clone(),
                period: r.period,
                interval_secs: r.period.interval().as_secs(),
                registered_at: r.registered_at,
                last_run_at: r.last_run_at,
                run_count: r.run_count,
            })
            .collect();
        list.sort_by(|a, b| a.tag.cmp(&b.tag));
        list
    }
}

/// Run every due registration once.
///
/// `next_due` is advanced from this tick's time before any job runs, so a
/// slow job can leave a registration already due again.
async fn run_pending(registrations: &RegistrationMap) {
    let now = Instant::now();
    let due: Vec<(String, u64, Arc<dyn Job>)> = {
        let mut map = registrations.write().await;
        map.iter_mut()
            .filter(|(_, r)| r.next_due <= now)
            .map(|(tag, r)| {
                r.next_due = now + r.period.interval();
                (tag.clone(), r.generation, r.job.clone())
            })
            .collect()
    };

    if due.is_empty() {
        return;
    }
    debug!(count = due.len(), "Running due jobs");

    for (tag, generation, job) in due {
        {
            let mut map = registrations.write().await;
            match map.get_mut(&tag) {
                Some(r) if r.generation == generation => {
                    r.last_run_at = Some(Utc::now());
                    r.run_count += 1;
                }
                _ => {
                    debug!(tag = %tag, "Skipping job canceled or replaced during this tick");
                    continue;
                }
            }
        }

        if job.run(&tag).await == JobOutcome::Deregister {
            let mut map = registrations.write().await;
            if map.get(&tag).is_some_and(|r| r.generation == generation) {
                map.remove(&tag);
                info!(tag = %tag, "Job deregistered itself");
            }
        }
    }
}
