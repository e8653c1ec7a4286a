// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind};

/// Hash value and salt of one stored credential, both base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretData {
    pub value: String,
    pub salt: String,
}

/// Parameters the hash was derived with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialData {
    pub hash_iterations: u32,
    pub algorithm: String,
    #[serde(default)]
    pub additional_parameters: serde_json::Map<String, serde_json::Value>,
}

/// One credential of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: String,

    /// Milliseconds since the Unix epoch.
    pub created_date: u64,

    pub secret_data: SecretData,

    pub credential_data: CredentialData,
}

/// Credential list of one username.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub credentials: Vec<Credential>,
}

impl CredentialRecord {
    /// First credential of type "password", the one used for CONNECT
    /// verification.
    #[must_use]
    pub fn password_credential(&self) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.kind == "password")
    }
}

/// Store of per-username credential records, optionally persisted as one
/// JSON file.
#[derive(Debug)]
pub struct CredentialStore {
    users: HashMap<String, CredentialRecord>,
    persistence: bool,
    file: PathBuf,
}

impl CredentialStore {
    #[must_use]
    pub fn new(persistence: bool, file: &Path) -> Self {
        Self {
            users: HashMap::new(),
            persistence,
            file: file.to_path_buf(),
        }
    }

    /// Load records from disk, ignoring a missing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed.
    pub fn load(&mut self) -> Result<(), Error> {
        if !self.persistence || !self.file.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.file)?;
        self.users = serde_json::from_str(&content)?;
        log::info!("credentials: Loaded {} users", self.users.len());
        Ok(())
    }

    /// Write records to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn flush(&self) -> Result<(), Error> {
        if !self.persistence {
            return Ok(());
        }
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.users)?;
        std::fs::write(&self.file, content)?;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<&CredentialRecord> {
        self.users.get(username)
    }

    /// Insert a record for a new username.
    ///
    /// # Errors
    ///
    /// Returns error if the username already exists.
    pub fn create(&mut self, username: &str, record: CredentialRecord) -> Result<(), Error> {
        if self.users.contains_key(username) {
            return Err(Error::from_string(
                ErrorKind::FormatError,
                format!("credentials: User {username} already exists"),
            ));
        }
        self.users.insert(username.to_string(), record);
        Ok(())
    }

    /// Sorted list of known usernames.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let content = r#"
{
  "anna": {
    "credentials": [
      {
        "type": "password",
        "createdDate": 1581316153674,
        "secretData": {
          "value": "aGFzaA==",
          "salt": "jtz3ZtLYBwRFMoe2gZg6pw=="
        },
        "credentialData": {
          "hashIterations": 27500,
          "algorithm": "sha512",
          "additionalParameters": {}
        }
      }
    ]
  }
}
"#;
        let users: HashMap<String, CredentialRecord> = serde_json::from_str(content).unwrap();
        let record = users.get("anna").unwrap();
        let credential = record.password_credential().unwrap();
        assert_eq!(credential.credential_data.algorithm, "sha512");
        assert_eq!(credential.credential_data.hash_iterations, 27500);
        assert_eq!(credential.secret_data.salt, "jtz3ZtLYBwRFMoe2gZg6pw==");
    }

    #[test]
    fn test_create_rejects_duplicate() {
        let mut store = CredentialStore::new(false, Path::new("/tmp/users.json"));
        store
            .create("anna", CredentialRecord::default())
            .unwrap();
        assert!(store.create("anna", CredentialRecord::default()).is_err());
        assert_eq!(store.list(), vec!["anna".to_string()]);
    }
}
