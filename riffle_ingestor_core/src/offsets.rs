use std::collections::{BTreeMap, HashMap};

use crate::source::{SourceRecord, TopicPartitionOffset};

/// When consumed offsets are committed back to the messaging system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// The messaging client commits on its own schedule, flushed or not.
    #[default]
    Auto,
    /// Offsets are committed only once the rows they carried were flushed.
    AfterFlush,
}

/// Tracks offsets that are safe to commit in [`CommitMode::AfterFlush`].
///
/// Offsets are recorded per topic as records are processed and handed out
/// once the topic's buffer has been flushed. A failed flush blocks the topic:
/// nothing is committed for it afterwards, so the lost rows are delivered
/// again on restart.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    mode: CommitMode,
    topics: HashMap<String, TopicOffsets>,
}

#[derive(Debug, Default)]
struct TopicOffsets {
    pending: BTreeMap<i32, i64>,
    blocked: bool,
}

impl OffsetTracker {
    pub fn new(mode: CommitMode) -> Self {
        Self {
            mode,
            topics: HashMap::new(),
        }
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    pub fn observe(&mut self, record: &SourceRecord) {
        if self.mode == CommitMode::Auto {
            return;
        }

        let topic = self.topics.entry(record.topic.clone()).or_default();
        let next = record.offset + 1;
        topic
            .pending
            .entry(record.partition)
            .and_modify(|offset| *offset = (*offset).max(next))
            .or_insert(next);
    }

    /// Takes the offsets of `topic` that can be committed now.
    pub fn take_committable(&mut self, topic: &str) -> Vec<TopicPartitionOffset> {
        let Some(offsets) = self.topics.get_mut(topic) else {
            return Vec::new();
        };

        if offsets.blocked {
            return Vec::new();
        }

        std::mem::take(&mut offsets.pending)
            .into_iter()
            .map(|(partition, offset)| TopicPartitionOffset {
                topic: topic.to_string(),
                partition,
                offset,
            })
            .collect()
    }

    /// Puts back offsets whose commit failed.
    pub fn restore(&mut self, offsets: Vec<TopicPartitionOffset>) {
        for offset in offsets {
            let topic = self.topics.entry(offset.topic).or_default();
            topic
                .pending
                .entry(offset.partition)
                .and_modify(|pending| *pending = (*pending).max(offset.offset))
                .or_insert(offset.offset);
        }
    }

    pub fn block(&mut self, topic: &str) {
        if self.mode == CommitMode::Auto {
            return;
        }

        let offsets = self.topics.entry(topic.to_string()).or_default();
        offsets.blocked = true;
        offsets.pending.clear();
    }

    pub fn is_blocked(&self, topic: &str) -> bool {
        self.topics.get(topic).is_some_and(|offsets| offsets.blocked)
    }
}
