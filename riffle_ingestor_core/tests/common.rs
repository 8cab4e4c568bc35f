#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use bytesize::ByteSize;
use riffle_ingestor_core::{
    BatchFlusher, FlushError, FlushReceipt, PartitionPosition, RecordSource, Row, SourceError,
    SourceRecord, TopicPartitionOffset,
};
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;

pub const CUSTOMERS: &str = "banking_server.public.customers";
pub const ACCOUNTS: &str = "banking_server.public.accounts";
pub const TRANSACTIONS: &str = "banking_server.public.transactions";

/// What a [`ScriptedSource`] was asked to do.
#[derive(Debug, Default)]
pub struct SourceLog {
    pub subscribed: Vec<String>,
    pub polls: usize,
    pub commits: Vec<TopicPartitionOffset>,
    pub closed: bool,
}

/// Replays a fixed list of poll results, then cancels the run.
pub struct ScriptedSource {
    polls: VecDeque<Result<Vec<SourceRecord>, SourceError>>,
    ct: CancellationToken,
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    pub fn new(
        polls: Vec<Result<Vec<SourceRecord>, SourceError>>,
        ct: CancellationToken,
    ) -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        let source = Self {
            polls: polls.into(),
            ct,
            log: log.clone(),
        };
        (source, log)
    }
}

#[async_trait::async_trait]
impl RecordSource for ScriptedSource {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), SourceError> {
        self.log.lock().unwrap().subscribed = topics.to_vec();
        Ok(())
    }

    async fn poll(&mut self, _timeout: Duration) -> Result<Vec<SourceRecord>, SourceError> {
        self.log.lock().unwrap().polls += 1;
        match self.polls.pop_front() {
            Some(result) => result,
            None => {
                self.ct.cancel();
                Ok(Vec::new())
            }
        }
    }

    fn assignment(&self) -> Result<Vec<PartitionPosition>, SourceError> {
        let subscribed = self.log.lock().unwrap().subscribed.clone();
        Ok(subscribed
            .into_iter()
            .map(|topic| PartitionPosition {
                topic,
                partition: 0,
                position: Some(0),
            })
            .collect())
    }

    async fn commit(&mut self, offsets: &[TopicPartitionOffset]) -> Result<(), SourceError> {
        self.log.lock().unwrap().commits.extend_from_slice(offsets);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedFlush {
    pub table: String,
    pub rows: Vec<Row>,
    /// Whether shutdown had been requested when the flush happened.
    pub during_shutdown: bool,
}

/// Keeps flushed batches in memory. Tables listed as failing always fail.
#[derive(Clone)]
pub struct RecordingFlusher {
    ct: CancellationToken,
    failing_tables: HashSet<String>,
    flushes: Arc<Mutex<Vec<RecordedFlush>>>,
}

impl RecordingFlusher {
    pub fn new(ct: CancellationToken) -> Self {
        Self {
            ct,
            failing_tables: HashSet::new(),
            flushes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    pub fn flushes(&self) -> Vec<RecordedFlush> {
        self.flushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BatchFlusher for RecordingFlusher {
    async fn flush(&mut self, table: &str, rows: Vec<Row>) -> Result<Option<FlushReceipt>, FlushError> {
        if rows.is_empty() {
            return Ok(None);
        }

        if self.failing_tables.contains(table) {
            return Err(FlushError::Upload {
                key: format!("{table}/failed.parquet"),
                path: format!("/tmp/{table}.parquet").into(),
                source: object_store::Error::Generic {
                    store: "test",
                    source: "upload rejected".into(),
                },
            });
        }

        let mut flushes = self.flushes.lock().unwrap();
        let receipt = FlushReceipt {
            key: format!("{table}/{}.parquet", flushes.len()),
            rows: rows.len(),
            size: ByteSize::b(0),
            staging_retained: false,
        };

        flushes.push(RecordedFlush {
            table: table.to_string(),
            rows,
            during_shutdown: self.ct.is_cancelled(),
        });

        Ok(Some(receipt))
    }
}

pub fn record(topic: &str, offset: i64, event: JsonValue) -> SourceRecord {
    SourceRecord {
        topic: topic.to_string(),
        partition: 0,
        offset,
        payload: Some(serde_json::to_vec(&event).unwrap()),
    }
}

pub fn create_event(after: JsonValue) -> JsonValue {
    json!({
        "before": null,
        "after": after,
        "source": {"connector": "postgresql", "db": "banking"},
        "op": "c",
        "ts_ms": 1_717_171_717_000_i64,
    })
}

pub fn delete_event(id: i64) -> JsonValue {
    json!({
        "before": {"id": id},
        "after": null,
        "op": "d",
        "ts_ms": 1_717_171_717_000_i64,
    })
}

/// `count` create events for `topic` with ids `0..count`.
pub fn creates(topic: &str, count: i64) -> Vec<SourceRecord> {
    (0..count)
        .map(|id| record(topic, id, create_event(json!({"id": id}))))
        .collect()
}

pub fn topics() -> Vec<String> {
    vec![
        CUSTOMERS.to_string(),
        ACCOUNTS.to_string(),
        TRANSACTIONS.to_string(),
    ]
}
