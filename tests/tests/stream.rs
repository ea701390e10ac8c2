//! Stream consumer resilience.

use std::sync::Arc;
use std::time::Duration;

use broker::InboundMessage;
use integration_tests::fixtures;
use integration_tests::mocks::{MockMessageSource, MockTelemetrySink};
use tokio_util::sync::CancellationToken;
use worker::{MessageOutcome, StreamConsumer, StreamStats};

struct Harness {
    source: Arc<MockMessageSource>,
    sink: Arc<MockTelemetrySink>,
    consumer: Arc<StreamConsumer>,
}

impl Harness {
    fn new() -> Self {
        let source = Arc::new(MockMessageSource::new());
        let sink = Arc::new(MockTelemetrySink::new());
        let consumer = Arc::new(StreamConsumer::new(source.clone(), sink.clone()));
        Self {
            source,
            sink,
            consumer,
        }
    }

    /// Runs the loop until the script is consumed, then cancels it.
    async fn run_to_end(&self) -> StreamStats {
        let cancel = CancellationToken::new();
        let task = {
            let consumer = self.consumer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { consumer.run(cancel).await })
        };

        while !self.source.is_drained() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        task.await.unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_does_not_stop_the_loop() {
    let h = Harness::new();
    let good = fixtures::telemetry_json("battery-7", &[("soc", 81.5, "%"), ("power", -2.4, "kW")]);
    h.source
        .push_batch(vec![fixtures::malformed(10), fixtures::inbound(11, &good)]);

    let stats = h.run_to_end().await;

    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.rows, 2);

    let persisted = h.sink.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].asset_id, "battery-7");
    assert_eq!(persisted[0].payload.metrics[1].name, "power");
    assert_eq!(h.source.commits(), vec![(0, 12)]);
}

#[tokio::test(start_paused = true)]
async fn test_poll_errors_back_off_and_reconnect() {
    let h = Harness::new();
    let good = fixtures::telemetry_json("pv-2", &[("irradiance", 640.0, "W/m2")]);
    h.source.push_error("connection reset by peer");
    h.source.push_batch(vec![fixtures::inbound(0, &good)]);

    let stats = h.run_to_end().await;

    assert_eq!(stats.poll_errors, 1);
    assert_eq!(h.source.resets(), 1);
    assert_eq!(h.sink.persisted().len(), 1);
    assert_eq!(h.source.commits(), vec![(0, 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_skips_only_that_message() {
    let h = Harness::new();
    let first = fixtures::telemetry_json("wind-1", &[("rpm", 14.0, "rpm")]);
    let second = fixtures::telemetry_json("wind-2", &[("rpm", 15.0, "rpm")]);
    let failing_id = first["metadata"]["message_id"].as_str().unwrap().to_string();
    h.sink.fail_message(&failing_id);

    h.source.push_batch(vec![
        fixtures::inbound(3, &first),
        fixtures::inbound(4, &second),
    ]);

    let stats = h.run_to_end().await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(h.sink.persisted()[0].asset_id, "wind-2");
    assert_eq!(h.source.commits(), vec![(0, 5)]);
}

#[tokio::test(start_paused = true)]
async fn test_batches_spanning_partitions_commit_each_partition() {
    let h = Harness::new();
    let a = fixtures::telemetry_json("pv-1", &[("power", 3.1, "kW")]);
    let b = fixtures::telemetry_json("pv-2", &[("power", 2.9, "kW")]);
    let c = fixtures::telemetry_json("pv-3", &[("power", 4.0, "kW")]);
    h.source.push_batch(vec![
        fixtures::inbound_on(0, 41, &a),
        fixtures::inbound_on(2, 7, &b),
        fixtures::inbound_on(0, 42, &c),
    ]);

    let stats = h.run_to_end().await;

    assert_eq!(stats.processed, 3);
    assert_eq!(h.source.commits(), vec![(0, 43), (2, 8)]);
}

#[tokio::test]
async fn test_flat_and_empty_messages() {
    let h = Harness::new();

    let flat = serde_json::json!({
        "message_id": "m-1",
        "asset_id": "meter-9",
        "payload": {"timestamp": "2024-06-01T12:00:00+02:00", "metrics": []}
    });
    let outcome = h.consumer.handle(&fixtures::inbound(0, &flat)).await;
    assert_eq!(outcome, MessageOutcome::Persisted(0));
    assert_eq!(h.sink.persisted()[0].asset_id, "meter-9");

    let empty = InboundMessage {
        partition: 0,
        offset: 1,
        key: None,
        payload: None,
    };
    assert_eq!(h.consumer.handle(&empty).await, MessageOutcome::Dropped);

    let no_timestamp = serde_json::json!({
        "metadata": {"message_id": "m-2", "asset_id": "meter-9"},
        "payload": {"timestamp": "yesterday", "metrics": []}
    });
    assert_eq!(
        h.consumer.handle(&fixtures::inbound(2, &no_timestamp)).await,
        MessageOutcome::Dropped
    );
    assert_eq!(h.sink.persisted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_idle_stops_promptly() {
    let h = Harness::new();
    let cancel = CancellationToken::new();

    let task = {
        let consumer = h.consumer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("consumer stopped")
        .unwrap();
    assert_eq!(stats, StreamStats::default());
    assert!(h.source.commits().is_empty());
}
