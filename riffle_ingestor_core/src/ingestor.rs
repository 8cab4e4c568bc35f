use std::{collections::BTreeMap, time::Duration};

use riffle_observability::KeyValue;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    buffer::TopicBuffer,
    envelope::{Envelope, RowOutcome, extract},
    error::{FlushFailuresSnafu, InvalidOptionsSnafu, Result, SourceSnafu},
    flush::{BatchFlusher, FlushError, FlushStage},
    metrics::IngestionMetrics,
    offsets::{CommitMode, OffsetTracker},
    source::{RecordSource, SourceRecord},
};

#[derive(Debug, Clone)]
pub struct IngestorOptions {
    pub topics: Vec<String>,
    /// Rows per topic that trigger a flush.
    pub flush_threshold: usize,
    pub poll_timeout: Duration,
    /// Timeout of the first poll, issued to get partitions assigned.
    pub initial_poll_timeout: Duration,
    pub commit_mode: CommitMode,
    /// Consecutive failed flushes after which the run stops.
    pub max_consecutive_flush_failures: u32,
}

/// Lifecycle of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Polling,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub records_polled: u64,
    pub deletes: u64,
    pub malformed: u64,
    pub files_written: u64,
    pub failed_flushes: u64,
    /// Rows flushed per topic.
    pub rows_flushed: BTreeMap<String, u64>,
    pub final_state: PipelineState,
}

/// Polls a record source and flushes per-topic batches.
///
/// Everything runs on the task calling [`IngestionLoop::run`]: polling,
/// buffering, flushing and committing happen one after the other, so a flush
/// in progress always completes before cancellation is observed.
pub struct IngestionLoop<S, F> {
    options: IngestorOptions,
    source: S,
    flusher: F,
    buffers: BTreeMap<String, TopicBuffer>,
    offsets: OffsetTracker,
    state: PipelineState,
    consecutive_flush_failures: u32,
    summary: IngestionSummary,
    metrics: IngestionMetrics,
}

impl<S, F> IngestionLoop<S, F>
where
    S: RecordSource,
    F: BatchFlusher,
{
    pub fn new(options: IngestorOptions, source: S, flusher: F) -> Result<Self> {
        options.validate()?;

        let buffers = options
            .topics
            .iter()
            .map(|topic| {
                (
                    topic.clone(),
                    TopicBuffer::new(topic.clone(), options.flush_threshold),
                )
            })
            .collect();

        Ok(Self {
            offsets: OffsetTracker::new(options.commit_mode),
            options,
            source,
            flusher,
            buffers,
            state: PipelineState::Starting,
            consecutive_flush_failures: 0,
            summary: IngestionSummary::default(),
            metrics: IngestionMetrics::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs until `ct` is cancelled or an unrecoverable error happens.
    ///
    /// Buffered rows are flushed before returning in both cases.
    pub async fn run(mut self, ct: CancellationToken) -> Result<IngestionSummary> {
        let outcome = self.poll_until_stopped(&ct).await;

        if let Err(err) = &outcome {
            error!(error = %err, "Ingestion failed, draining buffers");
        }

        self.transition(PipelineState::Draining);
        self.drain_all().await;

        self.transition(PipelineState::Stopped);
        if let Err(err) = self.source.close().await {
            warn!(error = %err, "Failed to close record source");
        }

        self.summary.final_state = self.state;
        info!(
            records_polled = self.summary.records_polled,
            files_written = self.summary.files_written,
            failed_flushes = self.summary.failed_flushes,
            deletes = self.summary.deletes,
            malformed = self.summary.malformed,
            "Ingestion stopped"
        );

        outcome.map(|_| self.summary)
    }

    async fn poll_until_stopped(&mut self, ct: &CancellationToken) -> Result<()> {
        let topics = self.options.topics.clone();
        self.source
            .subscribe(&topics)
            .await
            .context(SourceSnafu {
                operation: "subscribe",
            })?;
        info!(?topics, "Subscribed to topics");

        // The first poll triggers the partition assignment. What it returns is
        // processed like any other poll.
        let records = self.poll(self.options.initial_poll_timeout).await?;
        self.log_assignment();
        if let Some(records) = records {
            self.process(records).await?;
        }

        self.transition(PipelineState::Polling);
        info!(
            threshold = self.options.flush_threshold,
            commit_mode = ?self.options.commit_mode,
            "Waiting for change events"
        );

        loop {
            if ct.is_cancelled() {
                info!("Shutdown requested");
                return Ok(());
            }

            let Some(records) = self.poll(self.options.poll_timeout).await? else {
                continue;
            };

            if records.is_empty() {
                info!(
                    timeout_ms = self.options.poll_timeout.as_millis() as u64,
                    "No messages received, still listening"
                );
                continue;
            }

            self.process(records).await?;
        }
    }

    /// Polls the source. Transient errors are logged and yield `None`.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<SourceRecord>>> {
        match self.source.poll(timeout).await {
            Ok(records) => Ok(Some(records)),
            Err(err) if err.is_fatal() => Err(err).context(SourceSnafu { operation: "poll" }),
            Err(err) => {
                warn!(error = %err, "Failed to poll records, continuing");
                Ok(None)
            }
        }
    }

    async fn process(&mut self, records: Vec<SourceRecord>) -> Result<()> {
        self.summary.records_polled += records.len() as u64;
        self.metrics.polled_records.add(records.len() as u64, &[]);

        for record in records {
            self.offsets.observe(&record);
            self.route(record);
        }

        let topics = self.buffers.keys().cloned().collect::<Vec<_>>();
        for topic in topics {
            let Some((is_full, is_empty)) = self
                .buffers
                .get(&topic)
                .map(|buffer| (buffer.is_full(), buffer.is_empty()))
            else {
                continue;
            };

            if is_full {
                // One artifact per threshold-sized batch.
                while self.buffers.get(&topic).is_some_and(TopicBuffer::is_full) {
                    let Err(err) = self.flush_topic(&topic).await else {
                        continue;
                    };

                    if self.consecutive_flush_failures
                        >= self.options.max_consecutive_flush_failures
                    {
                        return Err(err).context(FlushFailuresSnafu {
                            failures: self.consecutive_flush_failures,
                        });
                    }
                }
            } else if is_empty {
                // Nothing waiting, e.g. a poll with deletes only.
                self.commit_topic(&topic).await;
            }
        }

        Ok(())
    }

    fn route(&mut self, record: SourceRecord) {
        let SourceRecord {
            topic,
            partition,
            offset,
            payload,
        } = record;

        let envelope = match Envelope::decode(payload.as_deref()) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%topic, partition, offset, error = %err, "Skipping malformed record");
                self.summary.malformed += 1;
                self.metrics.malformed_records.add(1, &[]);
                return;
            }
        };

        let operation = envelope.operation();
        match extract(&envelope) {
            RowOutcome::HasRow(row) => {
                let threshold = self.options.flush_threshold;
                let buffer = self
                    .buffers
                    .entry(topic.clone())
                    .or_insert_with(|| TopicBuffer::new(topic.clone(), threshold));
                buffer.append(row);

                debug!(%topic, partition, offset, ?operation, buffered = buffer.len(), "Buffered row");
                self.metrics
                    .buffered_rows
                    .add(1, &[KeyValue::new("table", buffer.table().to_string())]);
            }
            RowOutcome::Delete => {
                info!(%topic, partition, offset, "Received delete event");
                self.summary.deletes += 1;
                self.metrics.deletes.add(1, &[]);
            }
            RowOutcome::Empty => {
                warn!(%topic, partition, offset, ?operation, "Skipping event without row data");
                self.summary.malformed += 1;
                self.metrics.malformed_records.add(1, &[]);
            }
        }
    }

    /// Flushes the next batch of `topic`.
    ///
    /// Offsets are committed once a successful flush leaves the buffer empty.
    /// Errors are logged here. The caller only decides whether to go on.
    async fn flush_topic(&mut self, topic: &str) -> std::result::Result<(), FlushError> {
        let Some(buffer) = self.buffers.get_mut(topic) else {
            return Ok(());
        };

        let table = buffer.table().to_string();
        let rows = buffer.take_batch();
        let row_count = rows.len();

        match self.flusher.flush(&table, rows).await {
            Ok(None) => Ok(()),
            Ok(Some(receipt)) => {
                let mut drained = true;
                if let Some(buffer) = self.buffers.get_mut(topic) {
                    buffer.record_flushed(receipt.rows);
                    drained = buffer.is_empty();
                }

                self.consecutive_flush_failures = 0;
                self.summary.files_written += 1;
                *self
                    .summary
                    .rows_flushed
                    .entry(topic.to_string())
                    .or_default() += receipt.rows as u64;

                let attributes = [KeyValue::new("table", table.clone())];
                self.metrics.flushed_rows.add(receipt.rows as u64, &attributes);
                self.metrics.uploaded_files.add(1, &attributes);
                self.metrics
                    .uploaded_bytes
                    .add(receipt.size.as_u64(), &attributes);

                info!(
                    %table,
                    key = %receipt.key,
                    rows = receipt.rows,
                    size = %receipt.size,
                    "Flushed batch"
                );

                if drained {
                    self.commit_topic(topic).await;
                }
                Ok(())
            }
            Err(err) => {
                self.consecutive_flush_failures += 1;
                self.summary.failed_flushes += 1;
                self.metrics.record_flush_failure(&table, err.stage());
                self.offsets.block(topic);

                match err.stage() {
                    FlushStage::Upload => error!(
                        %table,
                        rows = row_count,
                        error = %err,
                        "Batch was not uploaded, rows are only in the staging file"
                    ),
                    _ => error!(%table, rows = row_count, error = %err, "Failed to flush batch"),
                }

                Err(err)
            }
        }
    }

    async fn commit_topic(&mut self, topic: &str) {
        if self.offsets.mode() == CommitMode::Auto {
            return;
        }

        let offsets = self.offsets.take_committable(topic);
        if offsets.is_empty() {
            return;
        }

        match self.source.commit(&offsets).await {
            Ok(()) => debug!(%topic, partitions = offsets.len(), "Committed offsets"),
            Err(err) => {
                warn!(%topic, error = %err, "Failed to commit offsets");
                self.offsets.restore(offsets);
            }
        }
    }

    async fn drain_all(&mut self) {
        let topics = self.buffers.keys().cloned().collect::<Vec<_>>();

        for topic in topics {
            let buffered = self.buffers.get(&topic).map(TopicBuffer::len).unwrap_or(0);

            if buffered == 0 {
                self.commit_topic(&topic).await;
                continue;
            }

            info!(%topic, rows = buffered, "Flushing remaining rows");
            while self.buffers.get(&topic).is_some_and(|buffer| !buffer.is_empty()) {
                // Failures are already logged; the remaining rows still get flushed.
                let _ = self.flush_topic(&topic).await;
            }
        }

        for buffer in self.buffers.values() {
            info!(
                topic = %buffer.topic(),
                rows_flushed = buffer.flushed_total(),
                "Topic summary"
            );
        }
    }

    fn log_assignment(&self) {
        match self.source.assignment() {
            Ok(partitions) if partitions.is_empty() => {
                info!("No partitions assigned yet");
            }
            Ok(partitions) => {
                for partition in partitions {
                    info!(
                        topic = %partition.topic,
                        partition = partition.partition,
                        position = ?partition.position,
                        "Assigned partition"
                    );
                }
            }
            Err(err) => warn!(error = %err, "Failed to read partition assignment"),
        }
    }

    fn transition(&mut self, state: PipelineState) {
        debug!(from = ?self.state, to = ?state, "Ingestion state change");
        self.state = state;
    }
}

impl IngestorOptions {
    pub fn new(topics: Vec<String>) -> Self {
        Self {
            topics,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return InvalidOptionsSnafu {
                message: "at least one topic is required",
            }
            .fail();
        }

        if self.flush_threshold == 0 {
            return InvalidOptionsSnafu {
                message: "flush threshold must be at least 1",
            }
            .fail();
        }

        if self.max_consecutive_flush_failures == 0 {
            return InvalidOptionsSnafu {
                message: "max consecutive flush failures must be at least 1",
            }
            .fail();
        }

        Ok(())
    }
}

impl Default for IngestorOptions {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            flush_threshold: 50,
            poll_timeout: Duration::from_secs(5),
            initial_poll_timeout: Duration::from_secs(1),
            commit_mode: CommitMode::Auto,
            max_consecutive_flush_failures: 3,
        }
    }
}

impl Default for IngestionSummary {
    fn default() -> Self {
        Self {
            records_polled: 0,
            deletes: 0,
            malformed: 0,
            files_written: 0,
            failed_flushes: 0,
            rows_flushed: BTreeMap::new(),
            final_state: PipelineState::Starting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(IngestorOptions::default().validate().is_err());

        let options = IngestorOptions::new(vec!["banking_server.public.accounts".to_string()]);
        assert!(options.validate().is_ok());

        let zero_threshold = IngestorOptions {
            flush_threshold: 0,
            ..options.clone()
        };
        assert!(zero_threshold.validate().is_err());

        let zero_failures = IngestorOptions {
            max_consecutive_flush_failures: 0,
            ..options
        };
        assert!(zero_failures.validate().is_err());
    }
}
