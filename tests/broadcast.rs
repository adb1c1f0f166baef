use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Barrier;

use logvault::broadcast::{
    ChannelSink, Connection, ConnectionFilter, ConnectionRegistry, FanoutReport, LogPublisher,
    new_connection_id,
};
use logvault::models::{LogEntry, NewLogEntry};
use logvault::observability::Metrics;

fn entry(id: u64, service: &str, level: &str, tags: &[&str]) -> LogEntry {
    let mut new = NewLogEntry::new(service, level, format!("message {id}")).at(Utc::now());
    for tag in tags {
        new = new.with_tag(*tag);
    }
    new.into_entry(id)
}

fn filter(level: Option<&str>, service: Option<&str>, tag: Option<&str>) -> ConnectionFilter {
    ConnectionFilter {
        level: level.map(String::from),
        service: service.map(String::from),
        tag: tag.map(String::from),
    }
}

#[tokio::test]
async fn test_filters_combine_with_and() {
    let registry = ConnectionRegistry::new();
    let (sink, mut rx) = ChannelSink::channel(16);
    registry
        .register(
            "ops",
            Connection::new(
                Arc::new(sink),
                filter(Some("ERROR"), Some("billing"), Some("pager")),
            ),
        )
        .await
        .unwrap();

    let report = registry
        .publish(&entry(1, "billing", "ERROR", &["pager", "eu"]))
        .await;
    assert_eq!(report.delivered, 1);

    // Each criterion alone failing filters the entry out
    for miss in [
        entry(2, "billing", "WARN", &["pager"]),
        entry(3, "auth", "ERROR", &["pager"]),
        entry(4, "billing", "ERROR", &["eu"]),
    ] {
        let report = registry.publish(&miss).await;
        assert_eq!(report, FanoutReport { delivered: 0, filtered: 1, dropped: 0 });
    }

    assert_eq!(rx.recv().await.unwrap().id, 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_closed_and_lagging_viewers_are_dropped() {
    let metrics = Arc::new(Metrics::new());
    let registry = ConnectionRegistry::with_metrics(metrics.clone());

    let (healthy, mut healthy_rx) = ChannelSink::channel(16);
    let (closed, closed_rx) = ChannelSink::channel(16);
    let (lagging, _lagging_rx) = ChannelSink::channel(1);
    drop(closed_rx);

    for (id, sink) in [("healthy", healthy), ("closed", closed), ("lagging", lagging)] {
        registry
            .register(id, Connection::new(Arc::new(sink), ConnectionFilter::default()))
            .await
            .unwrap();
    }

    let first = registry.publish(&entry(1, "api", "INFO", &[])).await;
    assert_eq!(first.delivered, 2);
    assert_eq!(first.dropped, 1);

    // The lagging viewer's single slot is still occupied
    let second = registry.publish(&entry(2, "api", "INFO", &[])).await;
    assert_eq!(second.delivered, 1);
    assert_eq!(second.dropped, 1);

    assert_eq!(registry.connection_count().await, 1);
    assert_eq!(healthy_rx.recv().await.unwrap().id, 1);
    assert_eq!(healthy_rx.recv().await.unwrap().id, 2);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.broadcasts_delivered, 3);
    assert_eq!(snapshot.broadcasts_dropped, 2);
}

#[tokio::test]
async fn test_concurrent_register_and_publish() {
    let registry = ConnectionRegistry::new();
    let barrier = Arc::new(Barrier::new(9));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let (sink, rx) = ChannelSink::channel(64);
            registry
                .register(
                    new_connection_id(),
                    Connection::new(Arc::new(sink), ConnectionFilter::default()),
                )
                .await
                .unwrap();
            barrier.wait().await;
            rx
        }));
    }

    barrier.wait().await;
    let report = registry.publish(&entry(7, "api", "DEBUG", &[])).await;
    assert_eq!(report.delivered, 8);

    for handle in handles {
        let mut rx = handle.await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id, 7);
    }
}

#[tokio::test]
async fn test_unregister_stops_delivery() {
    let registry = ConnectionRegistry::new();
    let (sink, mut rx) = ChannelSink::channel(4);
    registry
        .register("viewer", Connection::new(Arc::new(sink), ConnectionFilter::default()))
        .await
        .unwrap();

    assert!(registry.unregister("viewer").await);
    assert!(!registry.unregister("viewer").await);

    let report = registry.publish(&entry(1, "api", "INFO", &[])).await;
    assert_eq!(report, FanoutReport::default());
    // The registry held the only sender
    assert!(rx.recv().await.is_none());
}
