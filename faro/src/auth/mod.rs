// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Client authentication against the credential store.

pub mod pwd;

use codec::v5::ReasonCode;

use crate::config::Security;
use crate::store::CredentialStore;

/// Gate a CONNECT against the credential store.
///
/// With `allow_anonymous` the check is skipped entirely. Otherwise a
/// username must be present, known, and its password credential must
/// verify; any mismatch collapses into a single `NotAuthorized` so the
/// response does not leak which field was wrong.
pub fn authenticate(
    store: &CredentialStore,
    security: &Security,
    username: Option<&str>,
    password: Option<&[u8]>,
) -> Result<(), ReasonCode> {
    if security.allow_anonymous {
        return Ok(());
    }

    let Some(username) = username else {
        return Err(ReasonCode::NotAuthorized);
    };
    let Some(record) = store.get(username) else {
        return Err(ReasonCode::NotAuthorized);
    };
    let Some(credential) = record.password_credential() else {
        return Err(ReasonCode::NotAuthorized);
    };
    let password = password.unwrap_or(b"");

    if pwd::verify_credential(password, credential) {
        Ok(())
    } else {
        Err(ReasonCode::NotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialRecord;
    use std::path::Path;

    fn store_with_user(username: &str, password: &[u8]) -> CredentialStore {
        let mut store = CredentialStore::new(false, Path::new("/tmp/users.json"));
        let credential = pwd::hash_password(password, "", 101).unwrap();
        store
            .create(
                username,
                CredentialRecord {
                    credentials: vec![credential],
                },
            )
            .unwrap();
        store
    }

    fn strict() -> Security {
        Security {
            allow_anonymous: false,
            allow_zero_length_clientid: false,
            use_username_as_clientid: false,
        }
    }

    #[test]
    fn test_anonymous_allowed() {
        let store = CredentialStore::new(false, Path::new("/tmp/users.json"));
        let security = Security::default();
        assert!(authenticate(&store, &security, None, None).is_ok());
    }

    #[test]
    fn test_missing_username_rejected() {
        let store = store_with_user("anna", b"pw");
        assert_eq!(
            authenticate(&store, &strict(), None, None),
            Err(ReasonCode::NotAuthorized)
        );
    }

    #[test]
    fn test_good_password() {
        let store = store_with_user("anna", b"pw");
        assert!(authenticate(&store, &strict(), Some("anna"), Some(b"pw")).is_ok());
    }

    #[test]
    fn test_bad_password() {
        let store = store_with_user("anna", b"pw");
        assert_eq!(
            authenticate(&store, &strict(), Some("anna"), Some(b"nope")),
            Err(ReasonCode::NotAuthorized)
        );
    }

    #[test]
    fn test_unknown_user() {
        let store = store_with_user("anna", b"pw");
        assert_eq!(
            authenticate(&store, &strict(), Some("bob"), Some(b"pw")),
            Err(ReasonCode::NotAuthorized)
        );
    }
}
