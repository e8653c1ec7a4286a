// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Subscription table: per-client subscription sets with topic matching.

use codec::{TopicError, TopicFilter};
use std::collections::HashMap;

use crate::types::Subscription;

/// Whether `add` inserted a new entry or updated an existing one.
///
/// An existing entry is informational, not an error: the subscription
/// options are replaced in place and the SUBACK still carries the granted
/// `QoS` [MQTT-3.8.4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    Added,
    Existed,
}

/// Whether `remove` found something to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveResult {
    Removed,
    NotFound,
}

#[derive(Debug, Default)]
struct ClientSubscriptions {
    filters: HashMap<String, (TopicFilter, Subscription)>,
}

/// Subscription table keyed by client id.
///
/// Entries survive a disconnect of a persistent session; they are dropped
/// on clean-start, on session expiry and on explicit unsubscribe.
#[derive(Debug, Default)]
pub struct SubTrie {
    map: HashMap<String, ClientSubscriptions>,
}

impl SubTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update one subscription.
    ///
    /// # Errors
    ///
    /// Returns error if `filter` is not a valid topic filter.
    pub fn add(
        &mut self,
        client_id: &str,
        filter: &str,
        subscription: Subscription,
    ) -> Result<AddResult, TopicError> {
        let parsed = TopicFilter::parse(filter)?;
        let client = self.map.entry(client_id.to_string()).or_default();
        let result = if client.filters.contains_key(filter) {
            AddResult::Existed
        } else {
            AddResult::Added
        };
        client
            .filters
            .insert(filter.to_string(), (parsed, subscription));
        Ok(result)
    }

    /// Remove one subscription by its exact filter string.
    pub fn remove(&mut self, client_id: &str, filter: &str) -> RemoveResult {
        let Some(client) = self.map.get_mut(client_id) else {
            return RemoveResult::NotFound;
        };
        if client.filters.remove(filter).is_none() {
            return RemoveResult::NotFound;
        }
        if client.filters.is_empty() {
            self.map.remove(client_id);
        }
        RemoveResult::Removed
    }

    /// Drop every subscription of a client.
    pub fn clean(&mut self, client_id: &str) {
        self.map.remove(client_id);
    }

    /// Enumerate subscriptions matching `topic`, at most one entry per
    /// client, picking the subscription with the highest granted `QoS` when
    /// several filters of one client overlap.
    ///
    /// The result is sorted by client id so the order is stable within one
    /// router invocation.
    #[must_use]
    pub fn matching(&self, topic: &str) -> Vec<(String, Subscription)> {
        let mut matched: Vec<(String, Subscription)> = Vec::new();
        for (client_id, client) in &self.map {
            let mut best: Option<Subscription> = None;
            for (filter, subscription) in client.filters.values() {
                if filter.is_match(topic) {
                    match best {
                        Some(current) if current.qos >= subscription.qos => {}
                        _ => best = Some(*subscription),
                    }
                }
            }
            if let Some(subscription) = best {
                matched.push((client_id.clone(), subscription));
            }
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched
    }

    /// Current subscription set of one client.
    #[must_use]
    pub fn client_filters(&self, client_id: &str) -> HashMap<String, Subscription> {
        self.map.get(client_id).map_or_else(HashMap::new, |client| {
            client
                .filters
                .iter()
                .map(|(filter, (_parsed, subscription))| (filter.clone(), *subscription))
                .collect()
        })
    }

    /// Distinct filter strings across all clients, sorted.
    #[must_use]
    pub fn all_filters(&self) -> Vec<String> {
        let mut filters: Vec<String> = self
            .map
            .values()
            .flat_map(|client| client.filters.keys().cloned())
            .collect();
        filters.sort_unstable();
        filters.dedup();
        filters
    }

    /// Number of subscriptions across all clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.values().map(|client| client.filters.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn sub(qos: QoS) -> Subscription {
        Subscription {
            qos,
            ..Subscription::default()
        }
    }

    #[test]
    fn test_add_and_update() {
        let mut trie = SubTrie::new();
        assert_eq!(
            trie.add("c1", "a/+", sub(QoS::AtMostOnce)).unwrap(),
            AddResult::Added
        );
        assert_eq!(
            trie.add("c1", "a/+", sub(QoS::ExactOnce)).unwrap(),
            AddResult::Existed
        );
        assert_eq!(trie.len(), 1);
        let filters = trie.client_filters("c1");
        assert_eq!(filters.get("a/+").unwrap().qos, QoS::ExactOnce);
    }

    #[test]
    fn test_remove() {
        let mut trie = SubTrie::new();
        let _added = trie.add("c1", "a/b", sub(QoS::AtMostOnce)).unwrap();
        assert_eq!(trie.remove("c1", "a/b"), RemoveResult::Removed);
        assert_eq!(trie.remove("c1", "a/b"), RemoveResult::NotFound);
        assert_eq!(trie.remove("c2", "a/b"), RemoveResult::NotFound);
    }

    #[test]
    fn test_matching() {
        let mut trie = SubTrie::new();
        let _a = trie.add("c1", "sport/#", sub(QoS::AtLeastOnce)).unwrap();
        let _b = trie.add("c2", "sport/tennis", sub(QoS::AtMostOnce)).unwrap();
        let _c = trie.add("c3", "news/#", sub(QoS::AtMostOnce)).unwrap();

        let matched = trie.matching("sport/tennis");
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].0, "c1");
        assert_eq!(matched[1].0, "c2");
    }

    #[test]
    fn test_overlapping_filters_pick_highest_qos() {
        let mut trie = SubTrie::new();
        let _a = trie.add("c1", "a/#", sub(QoS::AtMostOnce)).unwrap();
        let _b = trie.add("c1", "a/b", sub(QoS::ExactOnce)).unwrap();

        let matched = trie.matching("a/b");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].1.qos, QoS::ExactOnce);
    }

    #[test]
    fn test_clean() {
        let mut trie = SubTrie::new();
        let _a = trie.add("c1", "a/#", sub(QoS::AtMostOnce)).unwrap();
        trie.clean("c1");
        assert!(trie.matching("a/b").is_empty());
    }
}
