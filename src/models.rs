// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! # Shared Domain Types
//!
//! Newtypes and small value objects used across the storage layer and the
//! REST API. All types derive `Serialize`, `Deserialize`, and `ToSchema`
//! for automatic JSON handling and OpenAPI documentation.
//!
//! ## Content Hash Type
//!
//! The [`FileHash`] newtype wraps SHA-256 content digests (64 hex
//! characters). Construction normalizes the raw input: an optional `0x`
//! prefix is stripped and the hex is lowercased, so lookups against the
//! registry are insensitive to how the client formatted the hash.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Content Hash Type
// =============================================================================

/// Normalized file content hash.
///
/// The natural key of the hash registry. Stored without the `0x` prefix and
/// in lowercase; normalization is lossless so arbitrary client input is
/// accepted permissively.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHash(String);

impl FileHash {
    /// Normalize a raw hash string: strip an optional `0x` prefix and
    /// case-fold to lowercase.
    pub fn normalize(raw: &str) -> Self {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        FileHash(stripped.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<FileHash> for String {
    fn from(value: FileHash) -> Self {
        value.0
    }
}

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address wrapper.
///
/// Provides type safety for wallet addresses throughout the API.
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(pub String);

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress(value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress(value.to_string())
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Typed Detail Payloads
// =============================================================================

/// Typed key-value payload for audit entries and record metadata.
///
/// Keys are validated at write time; the map is serialized to JSON only as
/// a storage-layer concern. Iteration order is stable (sorted by key).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Details(std::collections::BTreeMap<String, serde_json::Value>);

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Empty keys are rejected silently with a diagnostic
    /// rather than panicking; callers build details from literals in
    /// practice.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if key.is_empty() {
            tracing::warn!("discarding detail entry with empty key");
            return self;
        }
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substring match over keys and stringified values, used by the audit
    /// trail free-text filter.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.0.iter().any(|(k, v)| {
            k.to_lowercase().contains(&needle) || v.to_string().to_lowercase().contains(&needle)
        })
    }
}
