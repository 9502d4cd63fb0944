use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// How many conversations the log retains before evicting the oldest.
pub const LOG_CAPACITY: usize = 100;

/// One inbound/outbound exchange, kept for debugging and manual recovery.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    /// Monotonic per-log sequence number
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub datetime: String,
    pub user_id: String,
    pub user_name: String,
    pub chat_id: String,
    pub user_message: String,
    pub bot_reply: String,
    pub customer_id: i64,
    /// Raw inbound payload, kept verbatim for debugging
    pub webhook_data: Value,
    /// True once the reply reached the user (automatically or manually)
    pub manual_reply_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_reply_time: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    pub fn new(
        user_id: String,
        user_name: String,
        chat_id: String,
        user_message: String,
        bot_reply: String,
        customer_id: i64,
        webhook_data: Value,
        delivered: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            seq: 0,
            timestamp: now,
            datetime: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            user_id,
            user_name,
            chat_id,
            user_message,
            bot_reply,
            customer_id,
            webhook_data,
            manual_reply_sent: delivered,
            manual_reply: None,
            manual_reply_time: None,
        }
    }
}

/// The most recently active chat, used as the default target for
/// operator-triggered messages.
#[derive(Debug, Clone, Serialize)]
pub struct LastChatTarget {
    pub chat_id: String,
    pub user_id: String,
    pub user_name: String,
    pub ts: DateTime<Utc>,
}

/// Fixed-capacity ring buffer over conversation records.
///
/// `head` indexes the oldest record; once full, a push overwrites the oldest
/// slot and advances `head`. Never holds more than [`LOG_CAPACITY`] records.
#[derive(Debug)]
pub struct ConversationLog {
    slots: Vec<ConversationRecord>,
    head: usize,
    next_seq: u64,
    capacity: usize,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            next_seq: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a record, evicting the oldest when at capacity.
    /// Returns the sequence number assigned to the record.
    pub fn push(&mut self, mut record: ConversationRecord) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        record.seq = seq;

        if self.slots.len() < self.capacity {
            self.slots.push(record);
        } else {
            self.slots[self.head] = record;
            self.head = (self.head + 1) % self.capacity;
        }
        seq
    }

    /// Records in insertion order, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ConversationRecord> {
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(self.head + i) % len])
    }

    /// The most recent `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConversationRecord> {
        let skip = self.len().saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }

    /// Records still awaiting a successful delivery, oldest first.
    pub fn pending(&self) -> Vec<ConversationRecord> {
        self.iter()
            .filter(|c| !c.manual_reply_sent)
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.iter().filter(|c| !c.manual_reply_sent).count()
    }

    /// All records for one user, oldest first.
    pub fn for_user(&self, user_id: &str) -> Vec<ConversationRecord> {
        self.iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    /// The most recent record for one user.
    pub fn latest_for_user(&self, user_id: &str) -> Option<&ConversationRecord> {
        self.iter().rev().find(|c| c.user_id == user_id)
    }

    /// Flip the delivery flag on a record after a successful manual resend.
    /// Returns the updated record.
    pub fn mark_manual_reply(&mut self, seq: u64, message: String) -> Option<ConversationRecord> {
        let record = self.slots.iter_mut().find(|c| c.seq == seq)?;
        record.manual_reply_sent = true;
        record.manual_reply = Some(message);
        record.manual_reply_time = Some(Utc::now());
        Some(record.clone())
    }
}
