//! Research orchestrator
//!
//! Drives one research attempt per subject name:
//! PENDING/FAILED/COMPLETE → IN_PROGRESS → COMPLETE | FAILED
//!
//! # Single-flight
//! The orchestrator owns an in-flight map keyed by name. Checking and
//! inserting happen under one lock before any background work starts, so
//! at most one attempt per name runs at a time. A trigger for a name that is
//! already running is dropped, not queued. The map entry is removed by a
//! guard owned by the background task, whether the attempt completes,
//! fails or panics. A panic inside an attempt is caught and recorded as a
//! failure like any other error.
//!
//! Attempts for different names run in parallel on the tokio runtime.

use chrono::Utc;
use dphil_common::events::{EventBus, KnowledgeEvent};
use dphil_common::Result;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::db::KnowledgeStore;
use crate::services::source::{KnowledgeSource, SourceOutcome};

/// Result of [`ResearchOrchestrator::trigger_research`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchTrigger {
    /// A new background attempt was started
    Started,
    /// An attempt for this name is already running; nothing was started
    AlreadyRunning,
}

struct InFlight {
    generation: u64,
    done: watch::Receiver<bool>,
}

type InFlightMap = Mutex<HashMap<String, InFlight>>;

struct Inner {
    store: Arc<dyn KnowledgeStore>,
    sources: Vec<Arc<dyn KnowledgeSource>>,
    event_bus: EventBus,
    in_flight: InFlightMap,
    next_generation: AtomicU64,
}

/// Single-flight research coordinator
///
/// Cloning is cheap; clones share the same in-flight map.
#[derive(Clone)]
pub struct ResearchOrchestrator {
    inner: Arc<Inner>,
}

/// Removes the in-flight entry when the background task ends
struct InFlightGuard {
    inner: Arc<Inner>,
    name: String,
    generation: u64,
    done: watch::Sender<bool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        {
            let mut in_flight = lock_in_flight(&self.inner.in_flight);
            // Only remove our own entry
            if in_flight.get(&self.name).map(|entry| entry.generation) == Some(self.generation) {
                in_flight.remove(&self.name);
            }
        }
        let _ = self.done.send(true);
    }
}

fn lock_in_flight(map: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ResearchOrchestrator {
    /// Create an orchestrator
    ///
    /// # Arguments
    /// * `store` - Durable knowledge store
    /// * `sources` - Sources consulted in turn on every attempt
    /// * `event_bus` - Receives research lifecycle events
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        sources: Vec<Arc<dyn KnowledgeSource>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                sources,
                event_bus,
                in_flight: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start a background research attempt for `name` unless one is running
    ///
    /// Returns immediately; never blocks on the attempt and never fails.
    /// Must be called from within a tokio runtime.
    pub fn trigger_research(&self, name: &str) -> ResearchTrigger {
        let (done_tx, done_rx) = watch::channel(false);

        let generation = {
            let mut in_flight = lock_in_flight(&self.inner.in_flight);
            if in_flight.contains_key(name) {
                debug!(name = %name, "Research already in flight, ignoring trigger");
                return ResearchTrigger::AlreadyRunning;
            }
            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            in_flight.insert(
                name.to_string(),
                InFlight {
                    generation,
                    done: done_rx,
                },
            );
            generation
        };

        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                name: name.clone(),
                generation,
                done: done_tx,
            };
            inner.run_attempt(&name).await;
        });

        ResearchTrigger::Started
    }

    /// True while an attempt for `name` is running
    pub fn is_in_flight(&self, name: &str) -> bool {
        lock_in_flight(&self.inner.in_flight).contains_key(name)
    }

    /// Number of attempts currently running
    pub fn in_flight_count(&self) -> usize {
        lock_in_flight(&self.inner.in_flight).len()
    }

    /// Wait until the attempt running for `name` (if any) has finished
    pub async fn wait_for(&self, name: &str) {
        let done = lock_in_flight(&self.inner.in_flight)
            .get(name)
            .map(|entry| entry.done.clone());

        if let Some(mut done) = done {
            // Err means the task is gone, which also means it finished
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Wait until no attempt is running
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<watch::Receiver<bool>> = lock_in_flight(&self.inner.in_flight)
                .values()
                .map(|entry| entry.done.clone())
                .collect();

            if pending.is_empty() {
                return;
            }
            for mut done in pending {
                let _ = done.wait_for(|finished| *finished).await;
            }
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }
}

impl Inner {
    async fn run_attempt(&self, name: &str) {
        info!(name = %name, sources = self.sources.len(), "Starting knowledge research");

        match AssertUnwindSafe(self.research(name)).catch_unwind().await {
            Ok(Ok(contributed)) => {
                info!(name = %name, sources = ?contributed, "Knowledge research complete");
            }
            Ok(Err(e)) => {
                error!(name = %name, error = %e, "Knowledge research failed");
                self.record_failure(name, &e.to_string()).await;
            }
            Err(payload) => {
                let message = format!("Research attempt panicked: {}", panic_message(payload.as_ref()));
                error!(name = %name, error = %message, "Knowledge research panicked");
                self.record_failure(name, &message).await;
            }
        }
    }

    /// One attempt; returns the names of sources that contributed data
    async fn research(&self, name: &str) -> Result<Vec<String>> {
        let mut record = self.store.get_or_create(name).await?;
        record.begin_attempt();
        self.store.save(&mut record).await?;

        self.event_bus.emit_lossy(KnowledgeEvent::ResearchStarted {
            name: name.to_string(),
            timestamp: Utc::now(),
        });

        let mut contributed = Vec::new();
        for source in &self.sources {
            match source.fetch(name).await {
                SourceOutcome::Data(data) => {
                    record.merge_source(source.name(), data);
                    contributed.push(source.name().to_string());
                }
                SourceOutcome::NoData => {
                    debug!(name = %name, source = source.name(), "Source returned no data");
                }
            }
        }

        record.complete();
        self.store.save(&mut record).await?;

        self.event_bus.emit_lossy(KnowledgeEvent::ResearchCompleted {
            name: name.to_string(),
            sources: contributed.clone(),
            timestamp: Utc::now(),
        });

        Ok(contributed)
    }

    /// Mark the stored record failed, re-reading it from the store
    ///
    /// A failure here is only logged.
    async fn record_failure(&self, name: &str, message: &str) {
        match self.store.find_by_name(name).await {
            Ok(Some(mut record)) => {
                record.fail(message);
                if let Err(e) = self.store.save(&mut record).await {
                    error!(name = %name, error = %e, "Failed to mark knowledge record failed");
                }
            }
            Ok(None) => {
                warn!(name = %name, "No knowledge record to mark failed");
            }
            Err(e) => {
                error!(name = %name, error = %e, "Failed to load knowledge record after failure");
            }
        }

        self.event_bus.emit_lossy(KnowledgeEvent::ResearchFailed {
            name: name.to_string(),
            error: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
