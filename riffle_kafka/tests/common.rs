#![allow(dead_code)]

use std::time::{Duration, Instant};

use rdkafka::{
    ClientConfig,
    mocking::MockCluster,
    producer::{DefaultProducerContext, FutureProducer, FutureRecord},
};
use riffle_ingestor_core::{CommitMode, RecordSource, SourceRecord};
use riffle_kafka::{KafkaSource, KafkaSourceOptions};

pub const TOPIC: &str = "banking_server.public.customers";

const POLL_DEADLINE: Duration = Duration::from_secs(30);

/// Starts a single broker in-process cluster with a one partition topic.
pub fn start_cluster() -> MockCluster<'static, DefaultProducerContext> {
    let cluster = MockCluster::new(1).unwrap();
    cluster.create_topic(TOPIC, 1, 1).unwrap();
    cluster
}

/// Produces `count` create events with ids `0..count`.
pub async fn produce_creates(bootstrap_servers: &str, count: i64) {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .create()
        .unwrap();

    for id in 0..count {
        let key = id.to_string();
        let payload = format!(r#"{{"op":"c","after":{{"id":{id}}}}}"#);
        producer
            .send(
                FutureRecord::to(TOPIC).key(&key).payload(&payload),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
    }
}

pub fn source(bootstrap_servers: &str, group_id: &str, commit_mode: CommitMode) -> KafkaSource {
    KafkaSource::new(KafkaSourceOptions {
        commit_mode,
        session_timeout: Duration::from_secs(6),
        ..KafkaSourceOptions::new(bootstrap_servers, group_id)
    })
    .unwrap()
}

/// Polls until `expected` records arrived. Returns the size of every
/// non-empty poll along with the records.
pub async fn poll_until(
    source: &mut KafkaSource,
    expected: usize,
) -> (Vec<usize>, Vec<SourceRecord>) {
    let started = Instant::now();
    let mut sizes = Vec::new();
    let mut records = Vec::new();

    while records.len() < expected {
        assert!(
            started.elapsed() < POLL_DEADLINE,
            "received {} of {expected} records",
            records.len()
        );

        let polled = source.poll(Duration::from_millis(500)).await.unwrap();
        if !polled.is_empty() {
            sizes.push(polled.len());
            records.extend(polled);
        }
    }

    (sizes, records)
}
