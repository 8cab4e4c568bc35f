use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::record_batch::RecordBatch;
use bytesize::ByteSize;
use chrono::{NaiveDateTime, SubsecRound, TimeDelta};
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, path::Path as ObjectPath};
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    errors::ParquetError,
    file::{metadata::KeyValue, properties::WriterProperties},
};
use riffle_object_store::paths::{PARQUET_EXTENSION, format_artifact_path, format_artifact_stem};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    envelope::Row,
    flush::{
        BatchFlusher, FlushClock, FlushReceipt, SystemClock,
        error::{
            CleanupSnafu, FlushError, ParquetSnafu, RecordBatchSnafu, StagingSnafu, UploadSnafu,
        },
        serialize::rows_to_record_batch,
    },
};

#[derive(Debug, Clone)]
pub struct ParquetFlushWriterOptions {
    /// Directory holding parquet files until they are uploaded.
    pub staging_dir: PathBuf,
    pub compression: Compression,
}

/// Writes batches as parquet files and uploads them to the object store.
///
/// Each batch is first written to the staging directory. The staging file is
/// removed once the upload succeeded and kept otherwise, so a failed batch can
/// be recovered by hand.
pub struct ParquetFlushWriter {
    object_store: Arc<dyn ObjectStore>,
    options: ParquetFlushWriterOptions,
    clock: Arc<dyn FlushClock>,
    last_flushed_at: Option<NaiveDateTime>,
}

impl ParquetFlushWriter {
    pub fn new(object_store: Arc<dyn ObjectStore>, options: ParquetFlushWriterOptions) -> Self {
        Self {
            object_store,
            options,
            clock: Arc::new(SystemClock),
            last_flushed_at: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn FlushClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.options.staging_dir
    }

    /// Returns the timestamp for the next artifact.
    ///
    /// Keys carry microseconds, so the timestamp is truncated to microseconds
    /// and bumped past the previous one when the clock did not advance.
    fn next_flush_time(&mut self) -> NaiveDateTime {
        let now = self.clock.now().trunc_subsecs(6);

        let flushed_at = match self.last_flushed_at {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };

        self.last_flushed_at = Some(flushed_at);
        flushed_at
    }

    /// Encodes the batch as a parquet file in memory.
    fn encode(
        &self,
        table: &str,
        flushed_at: &NaiveDateTime,
        batch: &RecordBatch,
    ) -> Result<Vec<u8>, ParquetError> {
        let kv_metadata = vec![
            KeyValue::new("riffle:table".to_string(), table.to_string()),
            KeyValue::new("riffle:row-count".to_string(), batch.num_rows().to_string()),
            KeyValue::new(
                "riffle:flushed-at".to_string(),
                flushed_at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            ),
        ];

        let writer_properties = WriterProperties::builder()
            .set_compression(self.options.compression)
            .set_key_value_metadata(kv_metadata.into())
            .build();

        let mut writer =
            ArrowWriter::try_new(Vec::new(), batch.schema(), writer_properties.into())?;
        writer.write(batch)?;
        writer.into_inner()
    }

    async fn write_staging_file(&self, path: &Path, data: &[u8]) -> Result<(), FlushError> {
        let staging_dir = &self.options.staging_dir;
        tokio::fs::create_dir_all(staging_dir)
            .await
            .context(StagingSnafu { path: staging_dir })?;

        if let Err(err) = tokio::fs::write(path, data).await {
            let _ = tokio::fs::remove_file(path).await;
            return Err(err).context(StagingSnafu { path });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl BatchFlusher for ParquetFlushWriter {
    async fn flush(&mut self, table: &str, rows: Vec<Row>) -> Result<Option<FlushReceipt>, FlushError> {
        if rows.is_empty() {
            debug!(%table, "Nothing to flush");
            return Ok(None);
        }

        let batch = rows_to_record_batch(&rows).context(RecordBatchSnafu { table })?;

        let flushed_at = self.next_flush_time();
        let key = format_artifact_path(table, &flushed_at, PARQUET_EXTENSION);
        let staging_path = self.options.staging_dir.join(format!(
            "{}.{PARQUET_EXTENSION}",
            format_artifact_stem(table, &flushed_at)
        ));

        let data = self
            .encode(table, &flushed_at, &batch)
            .context(ParquetSnafu { table })?;
        self.write_staging_file(&staging_path, &data).await?;
        let size = ByteSize::b(data.len() as _);

        debug!(%key, staging_path = %staging_path.display(), %size, "Uploading parquet file to storage");

        self.object_store
            .put_opts(
                &ObjectPath::from(key.as_str()),
                PutPayload::from(data),
                PutOptions {
                    mode: PutMode::Create,
                    ..Default::default()
                },
            )
            .await
            .context(UploadSnafu {
                key: &key,
                path: &staging_path,
            })?;

        let staging_retained = match tokio::fs::remove_file(&staging_path)
            .await
            .context(CleanupSnafu {
                path: &staging_path,
            }) {
            Ok(()) => false,
            Err(err) => {
                warn!(%key, error = %err, "Batch uploaded but staging file was not removed");
                true
            }
        };

        Ok(Some(FlushReceipt {
            key,
            rows: rows.len(),
            size,
            staging_retained,
        }))
    }
}

impl ParquetFlushWriterOptions {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            compression: Compression::SNAPPY,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::NaiveDate;
    use object_store::memory::InMemory;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        envelope::Value,
        flush::{FixedClock, FlushStage},
        test_utils::row,
    };

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_micro_opt(12, 0, 0, 250)
            .unwrap()
    }

    fn writer(store: Arc<dyn ObjectStore>, staging: &TempDir) -> ParquetFlushWriter {
        ParquetFlushWriter::new(store, ParquetFlushWriterOptions::new(staging.path()))
            .with_clock(Arc::new(FixedClock(noon())))
    }

    fn staged_files(staging: &TempDir) -> Vec<PathBuf> {
        std::fs::read_dir(staging.path())
            .map(|entries| entries.map(|e| e.unwrap().path()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_empty_flush_is_a_noop() {
        let staging = TempDir::new().unwrap();
        let store = Arc::new(InMemory::new());
        let mut writer = writer(store.clone(), &staging);

        let receipt = writer.flush("customers", Vec::new()).await.unwrap();
        assert!(receipt.is_none());
        assert!(staged_files(&staging).is_empty());

        let listed = store.list_with_delimiter(None).await.unwrap();
        assert!(listed.objects.is_empty());
        assert!(listed.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_flush_uploads_and_removes_staging_file() {
        let staging = TempDir::new().unwrap();
        let store = Arc::new(InMemory::new());
        let mut writer = writer(store.clone(), &staging);

        let rows = vec![
            row([("id", Value::Int(1)), ("name", Value::String("Ada".into()))]),
            row([("id", Value::Int(2))]),
        ];
        let receipt = writer.flush("customers", rows).await.unwrap().unwrap();

        assert_eq!(
            receipt.key,
            "customers/date=2024-06-01/customers_120000000250.parquet"
        );
        assert_eq!(receipt.rows, 2);
        assert!(!receipt.staging_retained);
        assert!(staged_files(&staging).is_empty());

        let data: Bytes = store
            .get(&ObjectPath::from(receipt.key.as_str()))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(receipt.size.as_u64(), data.len() as u64);

        let builder = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
        let metadata = builder.metadata().file_metadata().key_value_metadata().unwrap();
        assert!(
            metadata
                .iter()
                .any(|kv| kv.key == "riffle:table" && kv.value.as_deref() == Some("customers"))
        );

        let batches = builder.build().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        let total = batches.iter().map(|b| b.num_rows()).sum::<usize>();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_missing_staging_dir_is_created() {
        let root = TempDir::new().unwrap();
        let staging_dir = root.path().join("staging").join("riffle");
        let store = Arc::new(InMemory::new());
        let mut writer =
            ParquetFlushWriter::new(store, ParquetFlushWriterOptions::new(&staging_dir))
                .with_clock(Arc::new(FixedClock(noon())));

        let receipt = writer
            .flush("accounts", vec![row([("id", Value::Int(7))])])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(receipt.rows, 1);
        assert!(staging_dir.is_dir());
        assert_eq!(std::fs::read_dir(&staging_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_same_instant_flushes_get_distinct_keys() {
        let staging = TempDir::new().unwrap();
        let store = Arc::new(InMemory::new());
        let mut writer = writer(store.clone(), &staging);

        let first = writer
            .flush("accounts", vec![row([("id", Value::Int(1))])])
            .await
            .unwrap()
            .unwrap();
        let second = writer
            .flush("accounts", vec![row([("id", Value::Int(2))])])
            .await
            .unwrap()
            .unwrap();

        assert_ne!(first.key, second.key);
        assert_eq!(
            second.key,
            "accounts/date=2024-06-01/accounts_120000000251.parquet"
        );
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_staging_file() {
        let staging = TempDir::new().unwrap();
        let store = Arc::new(InMemory::new());

        // Occupy the key the writer is going to use.
        let key = ObjectPath::from("transactions/date=2024-06-01/transactions_120000000250.parquet");
        store
            .put(&key, PutPayload::from_static(b"taken"))
            .await
            .unwrap();

        let mut writer = writer(store.clone(), &staging);
        let err = writer
            .flush("transactions", vec![row([("id", Value::Int(1))])])
            .await
            .unwrap_err();

        assert_eq!(err.stage(), FlushStage::Upload);
        let staged = staged_files(&staging);
        assert_eq!(staged.len(), 1);
        assert!(staged[0].ends_with("transactions_120000000250.parquet"));

        // The retained file is a complete parquet file that can be uploaded by hand.
        let retained = Bytes::from(std::fs::read(&staged[0]).unwrap());
        let reader = ParquetRecordBatchReaderBuilder::try_new(retained)
            .unwrap()
            .build()
            .unwrap();
        let total = reader.map(|batch| batch.unwrap().num_rows()).sum::<usize>();
        assert_eq!(total, 1);

        // The existing object is left untouched.
        let existing = store.get(&key).await.unwrap().bytes().await.unwrap();
        assert_eq!(existing.as_ref(), b"taken");
    }
}
