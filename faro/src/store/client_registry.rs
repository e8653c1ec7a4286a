// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::Error;
use crate::types::{ClientMessage, Subscription};

/// Session expiry sentinel of pre-v5 persistent sessions.
pub const SESSION_NEVER_EXPIRES: u32 = 0xffff_ffff;

/// Persistent record of one client session.
///
/// Pending deliveries and timing are memory-only; what reaches the disk is
/// `{id, assigned_id, last_mid, subscriptions, session_expiry_interval}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,

    /// Client id was generated by the broker.
    pub assigned_id: bool,

    /// Last allocated outbound packet id.
    pub last_mid: u16,

    pub subscriptions: HashMap<String, Subscription>,

    pub session_expiry_interval: u32,

    /// Outbound deliveries parked while the client is offline.
    #[serde(skip)]
    pub pending_out: Vec<ClientMessage>,

    #[serde(skip)]
    pub disconnected_at: Option<Instant>,
}

impl ClientRecord {
    #[must_use]
    pub fn new(id: &str, assigned_id: bool) -> Self {
        Self {
            id: id.to_string(),
            assigned_id,
            last_mid: 0,
            subscriptions: HashMap::new(),
            session_expiry_interval: 0,
            pending_out: Vec::new(),
            disconnected_at: None,
        }
    }

    /// A disconnected record past its session expiry is treated as absent.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        if self.session_expiry_interval == SESSION_NEVER_EXPIRES {
            return false;
        }
        self.disconnected_at.is_some_and(|at| {
            at.elapsed().as_secs() >= u64::from(self.session_expiry_interval)
        })
    }
}

/// Registry of known client sessions, optionally persisted as one JSON
/// file. Records of broker-assigned client ids are volatile and never
/// written to disk.
#[derive(Debug)]
pub struct ClientRegistry {
    records: HashMap<String, ClientRecord>,
    persistence: bool,
    db_file: PathBuf,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(persistence: bool, db_path: &Path) -> Self {
        Self {
            records: HashMap::new(),
            persistence,
            db_file: db_path.join("clients.json"),
        }
    }

    /// Load records from disk, ignoring a missing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed.
    pub fn load(&mut self) -> Result<(), Error> {
        if !self.persistence || !self.db_file.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.db_file)?;
        let records: Vec<ClientRecord> = serde_json::from_str(&content)?;
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        log::info!("registry: Loaded {} client records", self.records.len());
        Ok(())
    }

    /// Write non-volatile records to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn flush(&self) -> Result<(), Error> {
        if !self.persistence {
            return Ok(());
        }
        if let Some(parent) = self.db_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let records: Vec<&ClientRecord> = self
            .records
            .values()
            .filter(|record| !record.assigned_id)
            .collect();
        let content = serde_json::to_string_pretty(&records)?;
        std::fs::write(&self.db_file, content)?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&ClientRecord> {
        self.records.get(client_id)
    }

    pub fn get_mut(&mut self, client_id: &str) -> Option<&mut ClientRecord> {
        self.records.get_mut(client_id)
    }

    /// Insert a fresh record, replacing any previous one.
    pub fn create(&mut self, client_id: &str, assigned_id: bool) -> &mut ClientRecord {
        self.records
            .insert(client_id.to_string(), ClientRecord::new(client_id, assigned_id));
        self.records.get_mut(client_id).unwrap_or_else(|| {
            unreachable!("record was just inserted");
        })
    }

    pub fn remove(&mut self, client_id: &str) -> Option<ClientRecord> {
        self.records.remove(client_id)
    }

    /// Sorted ids of known records.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let mut registry = ClientRegistry::new(false, Path::new("/tmp"));
        registry.create("dev-1", false);
        assert!(registry.get("dev-1").is_some());
        assert!(registry.get("dev-2").is_none());
        assert_eq!(registry.list(), vec!["dev-1".to_string()]);
    }

    #[test]
    fn test_expiry() {
        let mut record = ClientRecord::new("dev-1", false);
        record.session_expiry_interval = 0;
        record.disconnected_at = Some(Instant::now());
        assert!(record.is_expired());

        record.session_expiry_interval = SESSION_NEVER_EXPIRES;
        assert!(!record.is_expired());

        record.session_expiry_interval = 3600;
        assert!(!record.is_expired());
    }
}
