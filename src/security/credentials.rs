//! Password hashing and the canonical credential text format.
//!
//! Hashes are argon2id keys stored as
//! `$argon2id$v=<version>$m=<memory>,t=<iterations>,p=<parallelism>$<salt>$<key>`
//! with salt and key in unpadded standard base64. The text carries every
//! parameter needed to recompute the key, so verification never needs the
//! configured parameters.

use std::fmt;
use std::num::ParseIntError;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Algorithm tag written into every credential string.
pub const ALGORITHM: &str = "argon2id";

/// Version written for newly hashed passwords (0x13).
pub const CURRENT_VERSION: u32 = 19;

/// Errors raised by hashing or decoding credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid argon2id phc format provided: {0}")]
    Format(&'static str),

    #[error("cant extract {field} from hash: {source}")]
    Number {
        field: &'static str,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid {field} provided. cant decode: {source}")]
    Encoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("unsupported argon2 version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid hash provided. salt or hash too long")]
    TooLong,

    #[error("hashing failed: {0}")]
    Hash(String),
}

/// Tunable cost parameters for hashing new passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingParams {
    /// Number of passes over memory.
    pub iterations: u32,
    /// Memory used per hash in KiB.
    pub memory_cost: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u8,
    /// Length of the derived key in bytes.
    pub key_length: u32,
    /// Length of generated salts in bytes.
    pub salt_length: u32,
    /// Fixed salt. Generated fresh for every hash when empty.
    #[serde(skip)]
    pub salt: Vec<u8>,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            memory_cost: 64 * 1024,
            parallelism: 1,
            key_length: 32,
            salt_length: 16,
            salt: Vec::new(),
        }
    }
}

/// A decoded credential string.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub version: u32,
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u8,
    pub salt: Vec<u8>,
    pub key: Vec<u8>,
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHash")
            .field("version", &self.version)
            .field("memory_cost", &self.memory_cost)
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .field("salt_len", &self.salt.len())
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}$v={}$m={},t={},p={}${}${}",
            ALGORITHM,
            self.version,
            self.memory_cost,
            self.iterations,
            self.parallelism,
            STANDARD_NO_PAD.encode(&self.salt),
            STANDARD_NO_PAD.encode(&self.key),
        )
    }
}

impl PasswordHash {
    /// Parse the canonical text form.
    pub fn decode(encoded: &str) -> Result<Self, CredentialError> {
        let mut parts = encoded.split('$');

        if parts.next() != Some("") {
            return Err(CredentialError::Format("missing leading '$'"));
        }
        if parts.next() != Some(ALGORITHM) {
            return Err(CredentialError::Format("unknown algorithm"));
        }

        let version = parts
            .next()
            .and_then(|v| v.strip_prefix("v="))
            .ok_or(CredentialError::Format("missing version"))?;
        let version: u32 = parse_number("version", version)?;
        Version::try_from(version).map_err(|_| CredentialError::UnsupportedVersion(version))?;

        let costs = parts.next().ok_or(CredentialError::Format("missing parameters"))?;
        let mut costs = costs.split(',');
        let memory_cost = cost_field(costs.next(), "m=", "memory cost")?;
        let iterations = cost_field(costs.next(), "t=", "iterations")?;
        let parallelism = cost_field(costs.next(), "p=", "parallelism")?;
        if costs.next().is_some() {
            return Err(CredentialError::Format("unexpected parameter"));
        }

        let salt = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::Format("missing salt"))?;
        let key = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(CredentialError::Format("missing hash"))?;
        if parts.next().is_some() {
            return Err(CredentialError::Format("trailing fields"));
        }

        let salt = STANDARD_NO_PAD
            .decode(salt)
            .map_err(|source| CredentialError::Encoding { field: "salt", source })?;
        let key = STANDARD_NO_PAD
            .decode(key)
            .map_err(|source| CredentialError::Encoding { field: "hash", source })?;

        if u32::try_from(salt.len()).is_err() || u32::try_from(key.len()).is_err() {
            return Err(CredentialError::TooLong);
        }

        Ok(Self {
            version,
            memory_cost,
            iterations,
            parallelism,
            salt,
            key,
        })
    }

    /// Parameters that reproduce this hash, including its salt.
    pub fn params(&self) -> HashingParams {
        HashingParams {
            iterations: self.iterations,
            memory_cost: self.memory_cost,
            parallelism: self.parallelism,
            // decode() rejected lengths outside u32
            key_length: self.key.len() as u32,
            salt_length: self.salt.len() as u32,
            salt: self.salt.clone(),
        }
    }

    /// Compare against `other`'s derived key in constant time.
    pub fn key_matches(&self, other: &PasswordHash) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

/// Hash `password` with `params` and return the canonical text form.
///
/// A fresh random salt of `salt_length` bytes is generated when
/// `params.salt` is empty.
pub fn hash_password(password: &str, params: &HashingParams) -> Result<String, CredentialError> {
    Ok(derive(password, params, CURRENT_VERSION)?.to_string())
}

/// Check `password` against a stored credential string.
///
/// `Ok(false)` means a well-formed hash that does not match; `Err` means the
/// stored text could not be decoded or rehashed.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, CredentialError> {
    let stored = PasswordHash::decode(encoded)?;
    let candidate = derive(password, &stored.params(), stored.version)?;
    Ok(stored.key_matches(&candidate))
}

fn derive(
    password: &str,
    params: &HashingParams,
    version: u32,
) -> Result<PasswordHash, CredentialError> {
    let salt = if params.salt.is_empty() {
        let mut salt = vec![0u8; params.salt_length as usize];
        OsRng.fill_bytes(&mut salt);
        salt
    } else {
        params.salt.clone()
    };

    let argon_version =
        Version::try_from(version).map_err(|_| CredentialError::UnsupportedVersion(version))?;
    let argon_params = Params::new(
        params.memory_cost,
        params.iterations,
        u32::from(params.parallelism),
        Some(params.key_length as usize),
    )
    .map_err(|e| CredentialError::Hash(e.to_string()))?;

    let mut key = vec![0u8; params.key_length as usize];
    Argon2::new(Algorithm::Argon2id, argon_version, argon_params)
        .hash_password_into(password.as_bytes(), &salt, &mut key)
        .map_err(|e| CredentialError::Hash(e.to_string()))?;

    Ok(PasswordHash {
        version,
        memory_cost: params.memory_cost,
        iterations: params.iterations,
        parallelism: params.parallelism,
        salt,
        key,
    })
}

fn parse_number<T: std::str::FromStr<Err = ParseIntError>>(
    field: &'static str,
    raw: &str,
) -> Result<T, CredentialError> {
    // FromStr accepts a leading '+', the text format does not
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CredentialError::Format("non-decimal number"));
    }
    raw.parse().map_err(|source| CredentialError::Number { field, source })
}

fn cost_field<T: std::str::FromStr<Err = ParseIntError>>(
    raw: Option<&str>,
    prefix: &str,
    field: &'static str,
) -> Result<T, CredentialError> {
    let value = raw
        .and_then(|r| r.strip_prefix(prefix))
        .ok_or(CredentialError::Format("parameters out of order"))?;
    parse_number(field, value)
}
