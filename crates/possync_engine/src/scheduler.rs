//! Automatic sync scheduling.
//!
//! [`AutoSync`] owns a tokio task that decides *when* to run a cycle:
//! once at startup, on every interval tick while online, on each
//! explicit trigger, and whenever connectivity comes back. The cycle
//! itself runs on the blocking pool because [`RemoteClient`] calls are
//! synchronous, so the loop stays responsive to connectivity changes
//! while a cycle is in flight.

use crate::error::SyncResult;
use crate::remote::RemoteClient;
use crate::report::{SkipReason, SyncCycleReport, SyncOutcome};
use crate::state::SyncEngine;
use possync_core::IdentityProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 64;

/// Pause between attempts of a reconnect cycle that found another cycle
/// still running.
const RECONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The scheduler just started.
    Startup,
    /// The periodic timer fired.
    Interval,
    /// A caller asked for a cycle.
    Manual,
    /// Connectivity was restored.
    Reconnected,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Interval => "interval",
            SyncTrigger::Manual => "manual",
            SyncTrigger::Reconnected => "reconnected",
        })
    }
}

/// Notifications published by the scheduler.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connectivity changed.
    ConnectivityChanged {
        /// New connectivity.
        online: bool,
    },
    /// A cycle ran to completion.
    Completed {
        /// What started it.
        trigger: SyncTrigger,
        /// What it did.
        report: Arc<SyncCycleReport>,
    },
    /// A cycle was requested but did not run.
    Skipped {
        /// What requested it.
        trigger: SyncTrigger,
        /// Why it did not run.
        reason: SkipReason,
    },
    /// A cycle aborted.
    Failed {
        /// What started it.
        trigger: SyncTrigger,
        /// The aborting error.
        error: String,
    },
}

/// Builder for the scheduler task.
pub struct AutoSync<R: RemoteClient + 'static> {
    engine: Arc<SyncEngine<R>>,
    identity: Arc<dyn IdentityProvider>,
    events: broadcast::Sender<SyncEvent>,
    initially_online: bool,
}

impl<R: RemoteClient + 'static> AutoSync<R> {
    /// Creates a scheduler for `engine`, resolving the identity from
    /// `identity` at the start of every cycle.
    pub fn new(engine: Arc<SyncEngine<R>>, identity: Arc<dyn IdentityProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            identity,
            events,
            initially_online: true,
        }
    }

    /// Sets the connectivity assumed at startup.
    pub fn with_initial_connectivity(mut self, online: bool) -> Self {
        self.initially_online = online;
        self
    }

    /// Subscribes to events. Subscribe before [`AutoSync::spawn`] to
    /// observe the startup cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Starts the scheduler on the current tokio runtime.
    pub fn spawn(self) -> AutoSyncHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (connectivity_tx, connectivity_rx) = watch::channel(self.initially_online);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let events = self.events.clone();
        let task = tokio::spawn(self.run(trigger_rx, connectivity_rx, shutdown_rx));
        AutoSyncHandle {
            triggers: trigger_tx,
            connectivity: connectivity_tx,
            shutdown: shutdown_tx,
            events,
            task,
        }
    }

    async fn run(
        self,
        mut triggers: mpsc::Receiver<()>,
        mut connectivity: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut online = *connectivity.borrow_and_update();
        self.apply_connectivity(online);

        let mut ticker = tokio::time::interval(self.engine.config().sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_trigger = SyncTrigger::Startup;
        info!(
            interval_secs = self.engine.config().sync_interval.as_secs(),
            online, "auto sync started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick(), if online => {
                    self.spawn_cycle(tick_trigger);
                    tick_trigger = SyncTrigger::Interval;
                }
                msg = triggers.recv() => match msg {
                    Some(()) => self.spawn_cycle(SyncTrigger::Manual),
                    None => break,
                },
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *connectivity.borrow_and_update();
                    if now_online == online {
                        continue;
                    }
                    online = now_online;
                    self.apply_connectivity(online);
                    if online {
                        ticker.reset();
                        tick_trigger = SyncTrigger::Interval;
                        self.spawn_cycle(SyncTrigger::Reconnected);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.engine.cancel();
        info!("auto sync stopped");
    }

    fn apply_connectivity(&self, online: bool) {
        if let Err(e) = self.engine.set_connectivity(online) {
            warn!(error = %e, "could not record connectivity change");
        }
        let _ = self.events.send(SyncEvent::ConnectivityChanged { online });
    }

    fn spawn_cycle(&self, trigger: SyncTrigger) {
        debug!(%trigger, "sync requested");
        let engine = Arc::clone(&self.engine);
        let identity = Arc::clone(&self.identity);
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut result = run_blocking(&engine, &identity).await;
            // A cycle cancelled by the outage may still be unwinding; the
            // reconnect cycle must run once it has.
            while trigger == SyncTrigger::Reconnected
                && matches!(result, Ok(Ok(SyncOutcome::Skipped(SkipReason::CycleInFlight))))
            {
                debug!("previous cycle still in flight, retrying reconnect cycle");
                tokio::time::sleep(RECONNECT_RETRY_DELAY).await;
                result = run_blocking(&engine, &identity).await;
            }

            let event = match result {
                Ok(Ok(SyncOutcome::Completed(report))) => SyncEvent::Completed {
                    trigger,
                    report: Arc::new(report),
                },
                Ok(Ok(SyncOutcome::Skipped(reason))) => SyncEvent::Skipped { trigger, reason },
                Ok(Err(e)) => SyncEvent::Failed {
                    trigger,
                    error: e.to_string(),
                },
                Err(e) => SyncEvent::Failed {
                    trigger,
                    error: format!("sync task failed: {e}"),
                },
            };
            let _ = events.send(event);
        });
    }
}

async fn run_blocking<R: RemoteClient + 'static>(
    engine: &Arc<SyncEngine<R>>,
    identity: &Arc<dyn IdentityProvider>,
) -> Result<SyncResult<SyncOutcome>, JoinError> {
    let engine = Arc::clone(engine);
    let identity = Arc::clone(identity);
    tokio::task::spawn_blocking(move || {
        let current = identity.current_identity();
        engine.sync(current.as_ref())
    })
    .await
}

/// Control handle for a running scheduler.
pub struct AutoSyncHandle {
    triggers: mpsc::Sender<()>,
    connectivity: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
    events: broadcast::Sender<SyncEvent>,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Requests a cycle. Returns false if a request is already pending.
    pub fn trigger(&self) -> bool {
        self.triggers.try_send(()).is_ok()
    }

    /// Reports connectivity.
    pub fn set_online(&self, online: bool) {
        self.connectivity.send_replace(online);
    }

    /// Subscribes to events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Stops the scheduler and cancels any running cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "auto sync task ended abnormally");
        }
    }
}
