use riffle_observability::{Counter, KeyValue};

use crate::flush::FlushStage;

pub struct IngestionMetrics {
    pub polled_records: Counter<u64>,
    pub buffered_rows: Counter<u64>,
    pub flushed_rows: Counter<u64>,
    pub uploaded_files: Counter<u64>,
    pub uploaded_bytes: Counter<u64>,
    pub flush_failures: Counter<u64>,
    pub deletes: Counter<u64>,
    pub malformed_records: Counter<u64>,
}

impl IngestionMetrics {
    pub fn record_flush_failure(&self, table: &str, stage: FlushStage) {
        self.flush_failures.add(
            1,
            &[
                KeyValue::new("table", table.to_string()),
                KeyValue::new("stage", stage.as_str()),
            ],
        );
    }
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        let meter = riffle_observability::meter("ingestion");
        Self {
            polled_records: meter
                .u64_counter("ingestion.polled.records")
                .with_unit("{record}")
                .with_description("records received from the messaging system")
                .build(),
            buffered_rows: meter
                .u64_counter("ingestion.buffered.rows")
                .with_unit("{row}")
                .with_description("rows extracted and appended to a topic buffer")
                .build(),
            flushed_rows: meter
                .u64_counter("ingestion.flushed.rows")
                .with_unit("{row}")
                .with_description("rows written to object storage")
                .build(),
            uploaded_files: meter
                .u64_counter("ingestion.uploaded.files")
                .with_unit("{file}")
                .with_description("parquet files uploaded to object storage")
                .build(),
            uploaded_bytes: meter
                .u64_counter("ingestion.uploaded.bytes")
                .with_unit("By")
                .with_description("bytes uploaded to object storage")
                .build(),
            flush_failures: meter
                .u64_counter("ingestion.flush.failures")
                .with_unit("{flush}")
                .with_description("failed flushes by stage")
                .build(),
            deletes: meter
                .u64_counter("ingestion.deletes")
                .with_unit("{record}")
                .with_description("delete events seen")
                .build(),
            malformed_records: meter
                .u64_counter("ingestion.malformed.records")
                .with_unit("{record}")
                .with_description("records skipped because they carried no usable row")
                .build(),
        }
    }
}
