//! Integration tests -- full pipeline flow from queue to durable output.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sentrypipe_core::event::{NormalizedEvent, parse_timestamp};
use sentrypipe_ingest::{
    PipelineConfig, PipelineCoordinator, QueueHandle, SourceSchema, queue,
};

fn syslog_event(n: usize) -> NormalizedEvent {
    let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
    let mut event = NormalizedEvent::new("syslog", ts, format!("<34>line {n}"));
    event.source_host = Some(format!("host-{:02}", n % 4));
    event.process = Some("sshd".to_owned());
    event
}

fn pipeline_config(dir: &Path, batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 1000,
        output_dir: dir.to_string_lossy().into_owned(),
        batch_size,
        // keep the periodic triggers out of the way; tests drive flushes
        // through batch size and shutdown
        flush_interval_secs: 3600,
        report_interval_secs: 3600,
        gap_threshold_secs: 600,
    }
}

fn default_schemas() -> Vec<SourceSchema> {
    vec![
        SourceSchema::new("syslog", ["timestamp", "source_host"]),
        SourceSchema::new(
            "aws_cloudtrail",
            ["timestamp", "source_ip", "action", "user"],
        ),
    ]
}

async fn wait_until_drained(handle: &QueueHandle) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.depth() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue should drain");
    // Let the coordinator finish the event it popped last.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn read_all_lines(dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        paths.push(entry.path());
    }
    paths.sort();
    for path in paths {
        let content = tokio::fs::read_to_string(path).await.unwrap();
        lines.extend(content.lines().map(str::to_owned));
    }
    lines
}

/// 150 valid events with batch size 100: one size-triggered flush plus the
/// shutdown flush, zero events lost.
#[tokio::test]
async fn batch_and_shutdown_flushes_persist_every_event() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(1000);
    let cancel = CancellationToken::new();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 100))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel.clone())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    for n in 0..150 {
        handle.push(syslog_event(n)).await.unwrap();
    }
    wait_until_drained(&handle).await;

    cancel.cancel();
    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("coordinator should stop")
        .unwrap()
        .unwrap();

    assert_eq!(report.processed, 150);
    assert_eq!(report.quarantined, 0);
    assert_eq!(report.flushed_events, 150);
    assert_eq!(report.flushes, 2, "one size-triggered, one shutdown flush");
    assert_eq!(report.flush_failures, 0);

    let lines = read_all_lines(dir.path()).await;
    assert_eq!(lines.len(), 150);
    for line in &lines {
        let event: NormalizedEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.source_type, "syslog");
    }
}

/// Events are persisted in the order a single producer pushed them.
#[tokio::test]
async fn output_preserves_push_order() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(100);
    let cancel = CancellationToken::new();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel.clone())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    for n in 0..20 {
        handle.push(syslog_event(n)).await.unwrap();
    }
    wait_until_drained(&handle).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    let lines = read_all_lines(dir.path()).await;
    assert_eq!(lines.len(), 20);
    for (n, line) in lines.iter().enumerate() {
        let event: NormalizedEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.raw, format!("<34>line {n}"));
    }
}

/// Invalid events are quarantined, not persisted, and the rest flow on.
#[tokio::test]
async fn quarantined_events_never_reach_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(100);
    let cancel = CancellationToken::new();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel.clone())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    for n in 0..10 {
        let mut event = syslog_event(n);
        if n % 2 == 0 {
            event.source_host = None; // violates the syslog schema
        }
        handle.push(event).await.unwrap();
    }
    wait_until_drained(&handle).await;
    cancel.cancel();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.processed, 5);
    assert_eq!(report.quarantined, 5);
    assert_eq!(report.flushed_events, 5);

    let lines = read_all_lines(dir.path()).await;
    assert_eq!(lines.len(), 5);
    for line in &lines {
        let event: NormalizedEvent = serde_json::from_str(line).unwrap();
        assert!(event.source_host.is_some());
    }
}

/// Unregistered sources pass through tagged and are persisted.
#[tokio::test]
async fn unregistered_source_is_persisted_with_tag() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(100);
    let cancel = CancellationToken::new();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel.clone())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
    handle
        .push(NormalizedEvent::new("netflow", ts, "flow record"))
        .await
        .unwrap();
    wait_until_drained(&handle).await;
    cancel.cancel();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.quarantined, 0);

    let lines = read_all_lines(dir.path()).await;
    assert_eq!(lines.len(), 1);
    let event: NormalizedEvent = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(event.tags, vec!["unregistered_source"]);
}

/// The coordinator stops on its own once every producer handle is dropped,
/// and still performs the final flush.
#[tokio::test]
async fn producers_gone_triggers_shutdown_flush() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(100);

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    for n in 0..7 {
        handle.push(syslog_event(n)).await.unwrap();
    }
    drop(handle);

    let report = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("coordinator should stop without cancel")
        .unwrap()
        .unwrap();

    assert_eq!(report.processed, 7);
    assert_eq!(report.flushed_events, 7);
    assert_eq!(read_all_lines(dir.path()).await.len(), 7);
}

/// Events still sitting in the queue at shutdown are drained and persisted.
#[tokio::test]
async fn cancel_drains_queued_events_before_final_flush() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(100);
    let cancel = CancellationToken::new();

    // Cancel before the coordinator ever runs: everything is still queued.
    for n in 0..5 {
        // capacity is large enough that these pushes cannot block
        handle.push(syslog_event(n)).await.unwrap();
    }
    cancel.cancel();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel)
        .build()
        .await
        .unwrap();
    let report = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("coordinator should stop")
        .unwrap();

    assert_eq!(report.processed, 5);
    assert_eq!(report.flushed_events, 5);
    assert_eq!(read_all_lines(dir.path()).await.len(), 5);
}

/// Two producers interleave into one FIFO stream; the total survives.
#[tokio::test]
async fn multiple_producers_share_one_queue() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, rx) = queue::bounded(1000);
    let cancel = CancellationToken::new();

    let coordinator = PipelineCoordinator::builder()
        .config(pipeline_config(dir.path(), 1000))
        .receiver(rx)
        .schemas(default_schemas())
        .cancel_token(cancel.clone())
        .build()
        .await
        .unwrap();
    let task = tokio::spawn(coordinator.run());

    let producer_a = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for n in 0..50 {
                handle.push(syslog_event(n)).await.unwrap();
            }
        })
    };
    let producer_b = {
        let handle = handle.clone();
        tokio::spawn(async move {
            let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
            for n in 0..50 {
                let mut event =
                    NormalizedEvent::new("aws_cloudtrail", ts, format!("record {n}"));
                event.source_ip = Some("203.0.113.5".to_owned());
                event.action = Some("ConsoleLogin".to_owned());
                event.user = Some("arn:aws:iam::123456789012:user/bob".to_owned());
                handle.push(event).await.unwrap();
            }
        })
    };
    producer_a.await.unwrap();
    producer_b.await.unwrap();
    wait_until_drained(&handle).await;
    cancel.cancel();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.processed, 100);
    assert_eq!(read_all_lines(dir.path()).await.len(), 100);
}
