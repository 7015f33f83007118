//! Reactor behaviour against a recording command runner.
//!
//! Mount targets point into temporary directories and the runner never
//! spawns anything, so these tests do not need privileges.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_events::Event;
use agent_hotplug::{CommandError, CommandRunner, HotplugConfig, HotplugReactor, MountOutcome};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::{timeout, Instant};

/// Records every invocation and fails the first `failures` of them.
struct RecordingRunner {
    failures: u32,
    calls: AtomicU32,
    invocations: Mutex<Vec<(Instant, String, Vec<String>)>>,
}

impl RecordingRunner {
    fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            invocations: Mutex::new(Vec::new()),
        })
    }

    fn always_failing() -> Arc<Self> {
        Self::failing_first(u32::MAX)
    }

    fn invocations(&self) -> Vec<(Instant, String, Vec<String>)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        self.invocations
            .lock()
            .unwrap()
            .push((Instant::now(), program.to_string(), args.to_vec()));

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(CommandError::Failed {
                program: program.to_string(),
                status: "exit status: 32".to_string(),
                stderr: "mount: special device does not exist".to_string(),
            });
        }
        Ok(String::new())
    }
}

fn reactor(runner: Arc<RecordingRunner>) -> HotplugReactor {
    HotplugReactor::new(HotplugConfig::default(), runner).unwrap()
}

fn disk_added(path: &Path) -> Event {
    Event::new(
        "device",
        json!({
            "action": "added",
            "name": "disk0",
            "config": { "type": "disk", "path": path.to_str().unwrap() }
        }),
    )
}

fn assert_spaced(invocations: &[(Instant, String, Vec<String>)], min_gap: Duration) {
    for pair in invocations.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        assert!(gap >= min_gap, "attempts only {gap:?} apart");
    }
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_fifth_attempt() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("data");
    let runner = RecordingRunner::failing_first(4);

    let outcome = reactor(runner.clone()).react(&disk_added(&target)).await;

    assert!(matches!(outcome, Some(MountOutcome::Mounted { attempts: 5 })));
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 5);
    assert_spaced(&invocations, Duration::from_millis(500));
    assert!(target.is_dir());
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_five_attempts() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("data");
    let runner = RecordingRunner::always_failing();

    let outcome = reactor(runner.clone()).react(&disk_added(&target)).await;

    match outcome {
        Some(MountOutcome::Failed { attempts, error }) => {
            assert_eq!(attempts, 5);
            assert!(error.to_string().contains("special device does not exist"));
        }
        other => panic!("Expected failed mount, got {other:?}"),
    }
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 5);
    assert_spaced(&invocations, Duration::from_millis(500));
}

#[tokio::test]
async fn test_first_success_stops_retrying() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::failing_first(0);

    let outcome = reactor(runner.clone())
        .react(&disk_added(&tmp.path().join("data")))
        .await;

    assert!(matches!(outcome, Some(MountOutcome::Mounted { attempts: 1 })));
    assert_eq!(runner.invocations().len(), 1);
}

#[tokio::test]
async fn test_mount_arguments() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("share");
    let runner = RecordingRunner::failing_first(0);

    let event = Event::new(
        "device",
        json!({
            "action": "added",
            "name": "share",
            "config": { "type": "disk", "path": target.to_str().unwrap() },
            "mount": { "source": "host_share", "options": ["ro", "noatime"] }
        }),
    );
    reactor(runner.clone()).react(&event).await;

    let invocations = runner.invocations();
    let (_, program, args) = &invocations[0];
    assert_eq!(program, "mount");
    assert_eq!(
        args,
        &vec![
            "-o".to_string(),
            "ro,noatime".to_string(),
            "-t".to_string(),
            "virtiofs".to_string(),
            "host_share".to_string(),
            target.to_str().unwrap().to_string(),
        ]
    );
}

#[tokio::test]
async fn test_null_mount_hint_uses_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("data");
    let runner = RecordingRunner::failing_first(0);

    let event = Event::new(
        "device",
        json!({
            "action": "added",
            "name": "disk0",
            "config": { "type": "disk", "path": target.to_str().unwrap() },
            "mount": { "source": "", "options": null }
        }),
    );
    let outcome = reactor(runner.clone()).react(&event).await;

    assert!(matches!(outcome, Some(MountOutcome::Mounted { attempts: 1 })));
    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 1);
    let (_, _, args) = &invocations[0];
    assert_eq!(
        args,
        &vec![
            "-t".to_string(),
            "virtiofs".to_string(),
            "lxd_disk0".to_string(),
            target.to_str().unwrap().to_string(),
        ]
    );
}

#[tokio::test]
async fn test_non_device_event_has_no_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("never");
    let runner = RecordingRunner::failing_first(0);

    let mut event = disk_added(&target);
    event.event_type = "lifecycle".to_string();

    let outcome = reactor(runner.clone()).react(&event).await;

    assert!(outcome.is_none());
    assert!(runner.invocations().is_empty());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_undecodable_metadata_is_ignored() {
    let runner = RecordingRunner::failing_first(0);
    let event = Event::new("device", json!(["not", "an", "object"]));

    let outcome = reactor(runner.clone()).react(&event).await;

    assert!(outcome.is_none());
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn test_removed_device_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("gone");
    let runner = RecordingRunner::failing_first(0);

    let mut event = disk_added(&target);
    event.metadata["action"] = json!("removed");

    assert!(reactor(runner.clone()).react(&event).await.is_none());
    assert!(runner.invocations().is_empty());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_dispatch_runs_in_background() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::failing_first(0);
    let (handle, _worker) = reactor(runner.clone()).spawn();

    handle.dispatch(Event::new("logging", json!({"message": "hello"})));
    handle.dispatch(disk_added(&tmp.path().join("bg")));

    timeout(Duration::from_secs(2), async {
        while runner.invocations().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mount was never attempted");

    assert_eq!(runner.invocations().len(), 1);
    assert!(handle.is_running());
}

#[tokio::test]
async fn test_worker_stops_when_handles_dropped() {
    let runner = RecordingRunner::failing_first(0);
    let (handle, worker) = reactor(runner).spawn();

    drop(handle);
    timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker did not stop")
        .unwrap();
}
