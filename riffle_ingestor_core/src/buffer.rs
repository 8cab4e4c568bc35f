use crate::envelope::Row;

/// Returns the table name for a topic, the segment after the last `.`.
///
/// `banking_server.public.customers` maps to `customers`.
pub fn table_name_for_topic(topic: &str) -> &str {
    topic.rsplit('.').next().unwrap_or(topic)
}

/// Rows accumulated for a single topic since its last flush.
#[derive(Debug)]
pub struct TopicBuffer {
    topic: String,
    table: String,
    threshold: usize,
    rows: Vec<Row>,
    flushed_total: u64,
}

impl TopicBuffer {
    pub fn new(topic: impl Into<String>, threshold: usize) -> Self {
        let topic = topic.into();
        let table = table_name_for_topic(&topic).to_string();

        Self {
            topic,
            table,
            threshold,
            rows: Vec::with_capacity(threshold),
            flushed_total: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn append(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.threshold
    }

    /// Takes all buffered rows, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Row> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.threshold))
    }

    /// Takes at most `threshold` rows from the front of the buffer.
    ///
    /// Rows past the threshold stay buffered in arrival order.
    pub fn take_batch(&mut self) -> Vec<Row> {
        if self.rows.len() <= self.threshold {
            return self.drain();
        }

        let rest = self.rows.split_off(self.threshold);
        std::mem::replace(&mut self.rows, rest)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows this buffer handed to successful flushes.
    pub fn flushed_total(&self) -> u64 {
        self.flushed_total
    }

    pub fn record_flushed(&mut self, rows: usize) {
        self.flushed_total += rows as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{envelope::Value, test_utils::row};

    #[test]
    fn test_table_name_for_topic() {
        assert_eq!(
            table_name_for_topic("banking_server.public.customers"),
            "customers"
        );
        assert_eq!(table_name_for_topic("accounts"), "accounts");
        assert_eq!(table_name_for_topic("a.b."), "");
    }

    #[test]
    fn test_append_and_drain_preserve_order() {
        let mut buffer = TopicBuffer::new("banking_server.public.transactions", 3);
        assert_eq!(buffer.table(), "transactions");
        assert!(buffer.is_empty());

        for id in 0..2 {
            buffer.append(row([("id", Value::Int(id))]));
        }
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_full());

        buffer.append(row([("id", Value::Int(2))]));
        assert!(buffer.is_full());

        let rows = buffer.drain();
        let ids = rows.iter().map(|r| r["id"].clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_take_batch_is_bounded_by_threshold() {
        let mut buffer = TopicBuffer::new("customers", 2);
        for id in 0..5 {
            buffer.append(row([("id", Value::Int(id))]));
        }

        let mut batches = Vec::new();
        while buffer.is_full() {
            batches.push(buffer.take_batch());
        }
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0]["id"], Value::Int(0));
        assert_eq!(batches[1][1]["id"], Value::Int(3));

        assert_eq!(buffer.len(), 1);
        let rest = buffer.take_batch();
        assert_eq!(rest[0]["id"], Value::Int(4));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut buffer = TopicBuffer::new("accounts", 10);
        let same = row([("id", Value::Int(1))]);
        buffer.append(same.clone());
        buffer.append(same);

        assert_eq!(buffer.drain().len(), 2);
    }

    #[test]
    fn test_record_flushed() {
        let mut buffer = TopicBuffer::new("accounts", 1);
        buffer.record_flushed(4);
        buffer.record_flushed(1);
        assert_eq!(buffer.flushed_total(), 5);
    }
}
