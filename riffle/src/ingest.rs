use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, ValueEnum};
use riffle_ingestor_core::{
    CommitMode, IngestionLoop, IngestionSummary, IngestorOptions, ParquetFlushWriter,
    ParquetFlushWriterOptions,
};
use riffle_kafka::{KafkaSource, KafkaSourceOptions};
use riffle_object_store::{
    LocalFileSystemFactory, ObjectStoreFactory, S3StoreFactory, S3StoreOptions,
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{
    IngestionSnafu, InvalidArgumentSnafu, KafkaSnafu, ObjectStoreSnafu, Result,
};

const DEFAULT_TOPICS: &str = "banking_server.public.customers,banking_server.public.accounts,banking_server.public.transactions";

#[derive(Args)]
pub struct IngestArgs {
    /// Kafka bootstrap servers.
    #[arg(long, env = "KAFKA_BOOTSTRAP", default_value = "localhost:9092")]
    bootstrap_servers: String,
    /// Consumer group id.
    #[arg(long, env = "KAFKA_GROUP", default_value = "riffle-ingestor")]
    group_id: String,
    /// Debezium topics to consume, comma separated.
    #[arg(long, env = "KAFKA_TOPICS", value_delimiter = ',', default_value = DEFAULT_TOPICS)]
    topics: Vec<String>,
    /// S3 endpoint, e.g. `http://localhost:9000` for MinIO.
    #[arg(long, env = "MINIO_ENDPOINT")]
    endpoint: Option<String>,
    #[arg(long, env = "MINIO_ACCESS_KEY")]
    access_key: Option<String>,
    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,
    /// Destination bucket, created on startup if missing.
    #[arg(long, env = "MINIO_BUCKET")]
    bucket: String,
    #[arg(long, env = "MINIO_REGION", default_value = "us-east-1")]
    region: String,
    /// Write to a directory on the local filesystem instead of S3.
    ///
    /// Takes precedence over the S3 settings.
    #[arg(long)]
    local_root: Option<PathBuf>,
    /// Directory for Parquet files waiting to be uploaded.
    #[arg(long)]
    staging_dir: Option<PathBuf>,
    /// Rows per topic that trigger a flush.
    #[arg(long, default_value_t = 50)]
    flush_threshold: usize,
    /// Poll timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    poll_timeout_ms: u64,
    /// Timeout of the first poll in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    initial_poll_timeout_ms: u64,
    #[arg(long, default_value_t = 500)]
    max_poll_records: usize,
    /// When consumed offsets are committed.
    #[arg(long, value_enum, default_value_t = CommitModeArg::Auto)]
    commit_mode: CommitModeArg,
    /// Stop after this many flushes fail in a row.
    #[arg(long, default_value_t = 3)]
    max_consecutive_flush_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommitModeArg {
    /// The consumer commits periodically in the background.
    Auto,
    /// Commit a topic's offsets only once its rows are uploaded.
    AfterFlush,
}

impl IngestArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let options = self.ingestor_options()?;

        let factory = self.object_store_factory()?;
        let status = factory
            .ensure_bucket()
            .await
            .context(ObjectStoreSnafu {
                operation: "ensure_bucket",
            })?;
        info!(bucket = %factory.bucket(), ?status, "Bucket ready");

        let object_store = factory
            .create_object_store()
            .await
            .context(ObjectStoreSnafu {
                operation: "create_object_store",
            })?;

        let staging_dir = self
            .staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("riffle-staging"));
        let writer =
            ParquetFlushWriter::new(object_store, ParquetFlushWriterOptions::new(staging_dir));

        let source = KafkaSource::new(self.kafka_options()).context(KafkaSnafu {})?;

        println!("Consuming {} topics from {}", options.topics.len(), self.bootstrap_servers);
        println!("Writing Parquet files to bucket {}", factory.bucket());

        let ingestion = IngestionLoop::new(options, source, writer).context(IngestionSnafu {})?;
        let summary = ingestion.run(ct).await.context(IngestionSnafu {})?;

        print_summary(&summary);

        Ok(())
    }

    fn ingestor_options(&self) -> Result<IngestorOptions> {
        let topics: Vec<String> = self
            .topics
            .iter()
            .map(|topic| topic.trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();

        if topics.is_empty() {
            return InvalidArgumentSnafu {
                name: "topics",
                message: "at least one topic is required",
            }
            .fail();
        }

        Ok(IngestorOptions {
            topics,
            flush_threshold: self.flush_threshold,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            initial_poll_timeout: Duration::from_millis(self.initial_poll_timeout_ms),
            commit_mode: self.commit_mode.into(),
            max_consecutive_flush_failures: self.max_consecutive_flush_failures,
        })
    }

    fn kafka_options(&self) -> KafkaSourceOptions {
        KafkaSourceOptions {
            commit_mode: self.commit_mode.into(),
            max_poll_records: self.max_poll_records,
            ..KafkaSourceOptions::new(&self.bootstrap_servers, &self.group_id)
        }
    }

    fn object_store_factory(&self) -> Result<Arc<dyn ObjectStoreFactory>> {
        if let Some(root) = &self.local_root {
            let factory = LocalFileSystemFactory::new(root, &self.bucket).context(
                ObjectStoreSnafu {
                    operation: "local_filesystem",
                },
            )?;
            return Ok(Arc::new(factory));
        }

        let factory = S3StoreFactory::new(S3StoreOptions {
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key.clone(),
            secret_access_key: self.secret_key.clone(),
            ..Default::default()
        })
        .context(ObjectStoreSnafu { operation: "s3" })?;

        Ok(Arc::new(factory))
    }
}

impl std::fmt::Debug for IngestArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestArgs")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("group_id", &self.group_id)
            .field("topics", &self.topics)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("local_root", &self.local_root)
            .field("staging_dir", &self.staging_dir)
            .field("flush_threshold", &self.flush_threshold)
            .field("commit_mode", &self.commit_mode)
            .finish_non_exhaustive()
    }
}

impl From<CommitModeArg> for CommitMode {
    fn from(value: CommitModeArg) -> Self {
        match value {
            CommitModeArg::Auto => CommitMode::Auto,
            CommitModeArg::AfterFlush => CommitMode::AfterFlush,
        }
    }
}

fn print_summary(summary: &IngestionSummary) {
    println!(
        "Polled {} records, wrote {} files ({} failed flushes)",
        summary.records_polled, summary.files_written, summary.failed_flushes
    );
    println!(
        "Skipped {} deletes and {} malformed records",
        summary.deletes, summary.malformed
    );
    for (topic, rows) in &summary.rows_flushed {
        println!("  {topic}: {rows} rows");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        args: IngestArgs,
    }

    fn parse(args: &[&str]) -> IngestArgs {
        let argv = ["riffle", "--bucket", "raw"].into_iter().chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_defaults_cover_banking_topics() {
        let args = parse(&["--bootstrap-servers", "kafka:29092"]);
        let options = args.ingestor_options().unwrap();

        assert_eq!(options.topics.len(), 3);
        assert_eq!(options.topics[0], "banking_server.public.customers");
        assert_eq!(options.flush_threshold, 50);
        assert_eq!(options.poll_timeout, Duration::from_secs(5));
        assert_eq!(options.commit_mode, CommitMode::Auto);

        let kafka = args.kafka_options();
        assert_eq!(kafka.bootstrap_servers, "kafka:29092");
        assert_eq!(kafka.max_poll_records, 500);
    }

    #[test]
    fn test_commit_mode_and_topics() {
        let args = parse(&[
            "--topics",
            "a.public.x, a.public.y",
            "--commit-mode",
            "after-flush",
            "--poll-timeout-ms",
            "250",
        ]);
        let options = args.ingestor_options().unwrap();

        assert_eq!(options.topics, vec!["a.public.x", "a.public.y"]);
        assert_eq!(options.commit_mode, CommitMode::AfterFlush);
        assert_eq!(options.poll_timeout, Duration::from_millis(250));
        assert_eq!(args.kafka_options().commit_mode, CommitMode::AfterFlush);
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let args = parse(&["--access-key", "minioadmin", "--secret-key", "s3cr3t-value"]);
        let debug = format!("{args:?}");

        assert!(debug.contains("minioadmin"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("s3cr3t-value"));
    }

    #[test]
    fn test_blank_topics_rejected() {
        let args = parse(&["--topics", " "]);
        assert!(matches!(
            args.ingestor_options(),
            Err(crate::error::CliError::InvalidArgument { name: "topics", .. })
        ));
    }
}
