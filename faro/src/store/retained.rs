// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::TopicFilter;
use std::collections::HashMap;

use crate::types::StoredMessage;

/// Storage of the most recent retained message per topic.
///
/// A retained PUBLISH with an empty payload is a tombstone: the retained
/// message of that topic is removed and nothing is stored [MQTT-3.3.1-6].
pub trait RetainedStore: Send {
    /// Store `msg` as the retained message of its topic, or delete the
    /// entry when the payload is empty.
    fn store(&mut self, msg: StoredMessage);

    /// Collect retained messages whose topic matches `filter`. Expired
    /// entries are dropped on the way out.
    fn matches(&mut self, filter: &TopicFilter) -> Vec<StoredMessage>;

    /// Topics currently holding a retained message.
    fn topics(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory retained store.
#[derive(Debug, Default)]
pub struct MemoryRetainedStore {
    map: HashMap<String, StoredMessage>,
}

impl MemoryRetainedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetainedStore for MemoryRetainedStore {
    fn store(&mut self, msg: StoredMessage) {
        if msg.payload.is_empty() {
            self.map.remove(&msg.topic);
        } else {
            self.map.insert(msg.topic.clone(), msg);
        }
    }

    fn matches(&mut self, filter: &TopicFilter) -> Vec<StoredMessage> {
        self.map
            .retain(|_topic, msg| !msg.is_expired());

        let mut matched: Vec<StoredMessage> = self
            .map
            .values()
            .filter(|msg| filter.is_match(&msg.topic))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.topic.cmp(&b.topic));
        matched
    }

    fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.map.keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn msg(topic: &str, payload: &[u8]) -> StoredMessage {
        StoredMessage::new(topic, payload.to_vec(), QoS::AtMostOnce, true)
    }

    #[test]
    fn test_store_and_match() {
        let mut store = MemoryRetainedStore::new();
        store.store(msg("a/b", b"1"));
        store.store(msg("a/c", b"2"));

        let filter = TopicFilter::parse("a/+").unwrap();
        let matched = store.matches(&filter);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].topic, "a/b");
    }

    #[test]
    fn test_replace() {
        let mut store = MemoryRetainedStore::new();
        store.store(msg("a/b", b"old"));
        store.store(msg("a/b", b"new"));
        let filter = TopicFilter::parse("a/b").unwrap();
        let matched = store.matches(&filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].payload, b"new");
    }

    #[test]
    fn test_tombstone() {
        let mut store = MemoryRetainedStore::new();
        store.store(msg("a/b", b"1"));
        store.store(msg("a/b", b""));
        assert!(store.is_empty());
        let filter = TopicFilter::parse("a/b").unwrap();
        assert!(store.matches(&filter).is_empty());
    }
}
