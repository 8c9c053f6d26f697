//! Integration tests for cycle scheduling and debouncing.

use gitmount_sync_engine::{
    CycleOutcome, DebounceConfig, DirtyDebouncer, MockBackend, MockPull, OpenGate, SyncConfig,
    SyncEngine, SyncTrigger,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn diverged_remote_with_rejected_push_retries_after_a_minute() {
    let backend = MockBackend::new();
    backend.set_remote_url(Some("git@203.0.113.9:shared/notes.git"));
    backend.queue_pull(MockPull::Conflict);
    backend.queue_push(false);
    backend.touch(&["draft.txt"]);

    let engine = SyncEngine::new(SyncConfig::default(), backend, Arc::new(OpenGate)).unwrap();
    assert_eq!(engine.trigger(), CycleOutcome::Failed);

    let status = engine.status();
    assert!(status.merge_needed);
    assert!(status.retry_pending);
    let next = status.next_evaluation.unwrap();
    assert!(next > Duration::from_secs(55) && next <= Duration::from_secs(60));
    engine.shutdown().unwrap();
}

#[test]
fn rejected_push_is_reattempted_on_retry_timer() {
    let backend = MockBackend::new();
    backend.set_remote_url(Some("git@203.0.113.9:shared/notes.git"));
    let config = SyncConfig::default()
        .with_intervals(
            Duration::from_secs(600),
            Duration::from_secs(600),
            Duration::from_secs(600),
        )
        .with_push_retry(Duration::from_millis(50));
    let engine = SyncEngine::new(config, backend, Arc::new(OpenGate)).unwrap();
    assert_eq!(engine.trigger(), CycleOutcome::Synced);

    engine.backend().touch(&["draft.txt"]);
    engine.backend().queue_push(false);
    assert_eq!(engine.trigger(), CycleOutcome::Failed);
    let pushes = engine.backend().push_count();
    assert!(engine.status().retry_pending);

    assert!(wait_until(Duration::from_secs(2), || {
        engine.backend().push_count() > pushes
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        let status = engine.status();
        !status.retry_pending
            && status
                .next_evaluation
                .is_some_and(|next| next > Duration::from_secs(590))
    }));
    engine.shutdown().unwrap();
}

#[test]
fn successful_push_waits_for_local_interval() {
    let backend = MockBackend::new();
    backend.set_remote_url(Some("/srv/git/notes.git"));
    let engine = SyncEngine::new(SyncConfig::default(), backend, Arc::new(OpenGate)).unwrap();

    assert_eq!(engine.trigger(), CycleOutcome::Synced);
    let next = engine.status().next_evaluation.unwrap();
    assert!(next > Duration::from_secs(9) && next <= Duration::from_secs(10));
    engine.shutdown().unwrap();
}

#[test]
fn scheduler_repeats_cycles_on_short_interval() {
    let backend = MockBackend::new();
    let config = SyncConfig::default().with_intervals(
        Duration::from_millis(20),
        Duration::from_millis(20),
        Duration::from_millis(20),
    );
    let engine = SyncEngine::new(config, backend, Arc::new(OpenGate)).unwrap();
    engine.request_sync();

    assert!(wait_until(Duration::from_secs(3), || engine.backend().push_count() >= 3));
    engine.shutdown().unwrap();
    let after = engine.backend().push_count();
    thread::sleep(Duration::from_millis(80));
    assert_eq!(engine.backend().push_count(), after);
}

#[test]
fn mutation_burst_produces_one_cycle() {
    let engine = SyncEngine::new(
        SyncConfig::default(),
        MockBackend::new(),
        Arc::new(OpenGate),
    )
    .unwrap();
    engine.trigger();
    let baseline = engine.backend().push_count();

    let sink: Arc<dyn SyncTrigger> = engine.clone();
    let debouncer = DirtyDebouncer::new(
        DebounceConfig::new(Duration::from_millis(40), Duration::from_millis(400)),
        sink,
    )
    .unwrap();

    for i in 0..10 {
        engine.backend().touch(&[&format!("file-{i}.txt")]);
        debouncer.notify();
        thread::sleep(Duration::from_millis(5));
    }
    assert!(wait_until(Duration::from_secs(2), || {
        engine.backend().push_count() > baseline
    }));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.backend().push_count(), baseline + 1);
    assert_eq!(engine.backend().commit_count(), 1);

    debouncer.stop();
    engine.shutdown().unwrap();
}

#[test]
fn endless_mutations_still_fire_at_window_end() {
    let engine = SyncEngine::new(
        SyncConfig::default(),
        MockBackend::new(),
        Arc::new(OpenGate),
    )
    .unwrap();
    engine.trigger();
    let baseline = engine.backend().push_count();

    let sink: Arc<dyn SyncTrigger> = engine.clone();
    let debouncer = DirtyDebouncer::new(
        DebounceConfig::new(Duration::from_millis(50), Duration::from_millis(150)),
        sink,
    )
    .unwrap();

    let start = Instant::now();
    engine.backend().touch(&["busy.log"]);
    while engine.backend().push_count() == baseline && start.elapsed() < Duration::from_secs(2) {
        debouncer.notify();
        thread::sleep(Duration::from_millis(10));
    }
    assert!(engine.backend().push_count() > baseline);
    assert!(start.elapsed() < Duration::from_secs(1));

    debouncer.stop();
    engine.shutdown().unwrap();
}
