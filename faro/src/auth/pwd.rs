// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{PW_MIN_ITERATIONS, PW_SALT_LEN};
use crate::error::{Error, ErrorKind};
use crate::store::{Credential, CredentialData, SecretData};

/// Longest supported digest output, SHA-512.
const MAX_HASH_LEN: usize = 64;

fn derive(
    password: &[u8],
    salt: &[u8],
    algorithm: &str,
    iterations: u32,
    out: &mut [u8],
) -> Result<(), Error> {
    match algorithm {
        // SHA-512 is the storage default.
        "" | "sha512" => pbkdf2_hmac::<Sha512>(password, salt, iterations, out),
        "sha256" => pbkdf2_hmac::<Sha256>(password, salt, iterations, out),
        other => {
            return Err(Error::from_string(
                ErrorKind::AuthError,
                format!("pwd: Unknown digest algorithm {other:?}"),
            ));
        }
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify `password` against a stored PBKDF2 hash.
///
/// Hash and salt arrive base64-encoded; the derived key length follows the
/// stored hash length so both SHA-256 and SHA-512 records verify. The
/// comparison is constant-time.
///
/// # Errors
///
/// Returns error if the stored fields cannot be decoded or the algorithm is
/// unknown.
pub fn check_password(
    password: &[u8],
    hash_b64: &str,
    salt_b64: &str,
    algorithm: &str,
    iterations: u32,
) -> Result<bool, Error> {
    let stored_hash = BASE64.decode(hash_b64)?;
    let salt = BASE64.decode(salt_b64)?;

    if stored_hash.is_empty() || stored_hash.len() > MAX_HASH_LEN {
        return Err(Error::new(ErrorKind::AuthError, "pwd: Bad stored hash length"));
    }
    if iterations == 0 {
        return Err(Error::new(ErrorKind::AuthError, "pwd: Bad iteration count"));
    }

    let mut derived = [0u8; MAX_HASH_LEN];
    let derived = &mut derived[..stored_hash.len()];
    derive(password, &salt, algorithm, iterations, derived)?;

    Ok(constant_time_eq(derived, &stored_hash))
}

/// Verify `password` against a stored credential record entry.
#[must_use]
pub fn verify_credential(password: &[u8], credential: &Credential) -> bool {
    check_password(
        password,
        &credential.secret_data.value,
        &credential.secret_data.salt,
        &credential.credential_data.algorithm,
        credential.credential_data.hash_iterations,
    )
    .unwrap_or(false)
}

/// Hash a fresh password into a credential record entry.
///
/// A random 12 byte salt is generated; iteration counts below the floor of
/// 101 are raised to it.
///
/// # Errors
///
/// Returns error if the algorithm is unknown.
pub fn hash_password(
    password: &[u8],
    algorithm: &str,
    iterations: u32,
) -> Result<Credential, Error> {
    let algorithm = if algorithm.is_empty() {
        "sha512"
    } else {
        algorithm
    };
    let iterations = iterations.max(PW_MIN_ITERATIONS);

    let mut salt = [0u8; PW_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let hash_len = match algorithm {
        "sha256" => 32,
        _ => MAX_HASH_LEN,
    };
    let mut hash = [0u8; MAX_HASH_LEN];
    derive(password, &salt, algorithm, iterations, &mut hash[..hash_len])?;

    let created_date = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        });

    Ok(Credential {
        kind: "password".to_string(),
        created_date,
        secret_data: SecretData {
            value: BASE64.encode(&hash[..hash_len]),
            salt: BASE64.encode(salt),
        },
        credential_data: CredentialData {
            hash_iterations: iterations,
            algorithm: algorithm.to_string(),
            additional_parameters: serde_json::Map::new(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_check() {
        let credential = hash_password(b"hunter2", "", 0).unwrap();
        assert_eq!(credential.kind, "password");
        assert_eq!(credential.credential_data.algorithm, "sha512");
        assert_eq!(credential.credential_data.hash_iterations, 101);

        assert!(verify_credential(b"hunter2", &credential));
        assert!(!verify_credential(b"hunter3", &credential));
    }

    #[test]
    fn test_sha256_record() {
        let credential = hash_password(b"secret", "sha256", 200).unwrap();
        assert_eq!(credential.credential_data.algorithm, "sha256");
        assert!(verify_credential(b"secret", &credential));
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(hash_password(b"x", "md5", 101).is_err());
        assert!(check_password(b"x", "aGFzaA==", "c2FsdA==", "md5", 101).is_err());
    }

    #[test]
    fn test_salt_is_twelve_bytes() {
        let credential = hash_password(b"x", "", 101).unwrap();
        let salt = BASE64.decode(&credential.secret_data.salt).unwrap();
        assert_eq!(salt.len(), PW_SALT_LEN);
    }

    #[test]
    fn test_bad_base64() {
        assert!(check_password(b"x", "%%%", "c2FsdA==", "sha512", 101).is_err());
    }
}
