//! Scheduler behaviour with real (short) timers.

use possync_core::{IdentityProvider, StaticIdentity};
use possync_engine::{AutoSync, SkipReason, SyncEvent, SyncTrigger};
use possync_protocol::{EntityKind, RecordSet};
use possync_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn signed_in() -> Arc<dyn IdentityProvider> {
    Arc::new(StaticIdentity::new(cashier()))
}

async fn wait_for(
    events: &mut broadcast::Receiver<SyncEvent>,
    matches: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn is_completed(event: &SyncEvent, expected: SyncTrigger) -> bool {
    matches!(event, SyncEvent::Completed { trigger, .. } if *trigger == expected)
}

#[tokio::test]
async fn startup_runs_a_cycle() {
    let terminal = TestTerminal::new();
    terminal
        .remote
        .seed(TEST_OWNER, RecordSet::Expense(vec![expense("e1", 3.0)]));

    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    let event = wait_for(&mut events, |e| is_completed(e, SyncTrigger::Startup)).await;
    if let SyncEvent::Completed { report, .. } = event {
        assert_eq!(report.records_pulled(), 1);
    }
    assert!(terminal.local(EntityKind::Expense).contains("e1"));

    handle.shutdown().await;
}

#[tokio::test]
async fn manual_trigger_drains_new_actions() {
    let terminal = TestTerminal::new();
    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();
    wait_for(&mut events, |e| is_completed(e, SyncTrigger::Startup)).await;

    terminal.db.create(sale("s1", 9.5), Some(&terminal.identity)).unwrap();
    assert!(handle.trigger());
    wait_for(&mut events, |e| is_completed(e, SyncTrigger::Manual)).await;

    assert!(terminal.queued().is_empty());
    assert!(terminal.remote_records(EntityKind::Sale).contains("s1"));

    handle.shutdown().await;
}

#[tokio::test]
async fn interval_ticks_keep_syncing() {
    let terminal = TestTerminal::with_config(
        valid_config().with_sync_interval(Duration::from_millis(50)),
    );
    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    wait_for(&mut events, |e| is_completed(e, SyncTrigger::Interval)).await;
    assert!(terminal.engine.stats().cycles_completed >= 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn reconnect_triggers_a_cycle() {
    let terminal = TestTerminal::new();
    terminal.db.create(expense("e1", 1.0), Some(&terminal.identity)).unwrap();

    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in())
        .with_initial_connectivity(false);
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    wait_for(&mut events, |e| {
        matches!(e, SyncEvent::ConnectivityChanged { online: false })
    })
    .await;
    assert!(terminal.db.offline().is_offline().unwrap());

    assert!(handle.trigger());
    let skipped = wait_for(&mut events, |e| matches!(e, SyncEvent::Skipped { .. })).await;
    assert!(matches!(
        skipped,
        SyncEvent::Skipped {
            trigger: SyncTrigger::Manual,
            reason: SkipReason::Offline
        }
    ));
    assert_eq!(terminal.queued().len(), 1);

    handle.set_online(true);
    wait_for(&mut events, |e| is_completed(e, SyncTrigger::Reconnected)).await;
    assert!(terminal.queued().is_empty());
    assert!(!terminal.db.offline().is_offline().unwrap());

    handle.shutdown().await;
}

#[tokio::test]
async fn reconnect_waits_out_the_cancelled_cycle() {
    let terminal = TestTerminal::new();
    terminal.db.create(expense("e1", 1.0), Some(&terminal.identity)).unwrap();
    let barrier = Arc::new(std::sync::Barrier::new(2));
    terminal
        .remote
        .hold_next_pull_of(EntityKind::Expense, Arc::clone(&barrier));

    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    timeout(WAIT, async {
        while !terminal.engine.is_syncing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("startup cycle never started");

    handle.set_online(false);
    wait_for(&mut events, |e| {
        matches!(e, SyncEvent::ConnectivityChanged { online: false })
    })
    .await;
    handle.set_online(true);
    wait_for(&mut events, |e| {
        matches!(e, SyncEvent::ConnectivityChanged { online: true })
    })
    .await;

    tokio::task::spawn_blocking(move || {
        barrier.wait();
    })
    .await
    .unwrap();

    let event = wait_for(&mut events, |e| match e {
        SyncEvent::Completed { trigger, .. } | SyncEvent::Skipped { trigger, .. } => {
            *trigger == SyncTrigger::Reconnected
        }
        _ => false,
    })
    .await;
    assert!(is_completed(&event, SyncTrigger::Reconnected), "got {event:?}");
    assert!(terminal.queued().is_empty());
    assert!(terminal.remote_records(EntityKind::Expense).contains("e1"));

    handle.shutdown().await;
}

#[tokio::test]
async fn missing_identity_is_reported_as_skipped() {
    let terminal = TestTerminal::new();
    let auto = AutoSync::new(Arc::clone(&terminal.engine), Arc::new(StaticIdentity::none()));
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::Skipped { .. })).await;
    assert!(matches!(
        event,
        SyncEvent::Skipped {
            trigger: SyncTrigger::Startup,
            reason: SkipReason::NoIdentity
        }
    ));
    assert_eq!(terminal.remote.pull_count(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn failed_cycle_is_published() {
    let terminal = TestTerminal::new();
    terminal.remote.set_connected(false);
    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::Failed { .. })).await;
    assert!(matches!(
        event,
        SyncEvent::Failed {
            trigger: SyncTrigger::Startup,
            ..
        }
    ));
    assert!(terminal.db.offline().is_offline().unwrap());

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let terminal = TestTerminal::new();
    let auto = AutoSync::new(Arc::clone(&terminal.engine), signed_in());
    let mut events = auto.subscribe();
    let handle = auto.spawn();
    wait_for(&mut events, |e| is_completed(e, SyncTrigger::Startup)).await;

    timeout(WAIT, handle.shutdown())
        .await
        .expect("shutdown did not finish");
    let pulls = terminal.remote.pull_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(terminal.remote.pull_count(), pulls);
}
