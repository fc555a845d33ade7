use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::traits::InboundMessage;

pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Bounded log of inbound messages, oldest entries evicted first.
#[derive(Debug)]
pub struct MessageLog {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, message: &InboundMessage) {
        let line = format!(
            "{} - {}: {}",
            message.received_at.format("%d.%m.%Y %H:%M:%S"),
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_back();
        }
        entries.push_front(line);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn message(topic: &str, payload: &str, secs: i64) -> InboundMessage {
        InboundMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
            received_at: DateTime::from_timestamp(1_747_262_160 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_entries_are_formatted_newest_first() {
        let log = MessageLog::default();
        log.record(&message("GPS_OUT/1", "a", 0));
        log.record(&message("GPS_OUT/2", "b", 1));

        let entries = log.entries();
        assert_eq!(entries[0], "14.05.2025 22:36:01 - GPS_OUT/2: b");
        assert_eq!(entries[1], "14.05.2025 22:36:00 - GPS_OUT/1: a");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = MessageLog::new(2);
        for i in 0..5 {
            log.record(&message("SUS_OUT/1", &format!("RST: {i}"), i));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("RST: 4"));
        assert!(entries[1].ends_with("RST: 3"));
    }

    #[test]
    fn test_clear() {
        let log = MessageLog::default();
        log.record(&message("PSU_OUT/1", "{}", 0));
        log.clear();
        assert!(log.is_empty());
    }
}
