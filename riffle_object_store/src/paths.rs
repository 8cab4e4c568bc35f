use chrono::NaiveDateTime;

pub const PARQUET_EXTENSION: &str = "parquet";

/// Returns the object key for a flushed table batch.
///
/// Keys look like `{table}/date={YYYY-MM-DD}/{table}_{HHMMSSffffff}.{ext}`,
/// the filename carries microsecond precision.
pub fn format_artifact_path(table: &str, flushed_at: &NaiveDateTime, extension: &str) -> String {
    format!(
        "{table}/date={}/{}.{extension}",
        flushed_at.format("%Y-%m-%d"),
        format_artifact_stem(table, flushed_at),
    )
}

/// Returns the file name, without extension, shared by a staged artifact and its object key.
pub fn format_artifact_stem(table: &str, flushed_at: &NaiveDateTime) -> String {
    format!("{table}_{}", flushed_at.format("%H%M%S%6f"))
}
