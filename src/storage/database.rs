// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `user_email_index`: lowercase email → user_id
//! - `user_wallet_index`: wallet address → user_id
//! - `file_records`: record_id → serialized FileRecord
//! - `file_hash_index`: normalized content hash → record_id
//! - `owner_file_index`: composite key (owner|!created_at|record_id) → record_id
//! - `verifications`: composite key (!verified_at|event_id) → serialized event
//! - `verification_hash_index`: composite key (hash|!verified_at|event_id) → primary key
//! - `audit_logs`: composite key (!timestamp|entry_id) → serialized entry
//! - `audit_actor_index`: composite key (actor|!timestamp|entry_id) → primary key
//! - `audit_action_index`: composite key (action|!timestamp|entry_id) → primary key
//!
//! Composite keys embed an inverted big-endian millisecond timestamp so a
//! forward range scan yields newest-first ordering.

use std::path::Path;

use redb::{Database, TableDefinition};

use super::StorageResult;

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
pub(super) const USER_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_email_index");
pub(super) const USER_WALLET_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("user_wallet_index");

pub(super) const FILE_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("file_records");
pub(super) const FILE_HASH_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("file_hash_index");
pub(super) const OWNER_FILE_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("owner_file_index");

pub(super) const VERIFICATIONS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("verifications");
pub(super) const VERIFICATION_HASH_INDEX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("verification_hash_index");

pub(super) const AUDIT_LOGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit_logs");
pub(super) const AUDIT_ACTOR_INDEX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("audit_actor_index");
pub(super) const AUDIT_ACTION_INDEX: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("audit_action_index");

// =============================================================================
// Composite Key Helpers
// =============================================================================

/// Build a time-ordered key: `inverted_timestamp_be | id`.
///
/// The inverted timestamp ensures newest-first ordering when scanning
/// forward.
pub(super) fn time_key(timestamp_millis: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + id.len());
    key.extend_from_slice(&(!(timestamp_millis as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build a prefixed time-ordered key: `prefix | inverted_timestamp_be | id`.
pub(super) fn prefixed_time_key(prefix: &str, timestamp_millis: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!(timestamp_millis as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build the start bound for a range scan over all keys with `prefix`.
pub(super) fn prefix_start(prefix: &str) -> Vec<u8> {
    let mut start = Vec::with_capacity(prefix.len() + 1);
    start.extend_from_slice(prefix.as_bytes());
    start.push(b'|');
    start
}

/// Build the upper bound for a range scan (prefix with 0xFF bytes appended).
pub(super) fn prefix_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix_start(prefix);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// FileDatabase
// =============================================================================

/// Embedded ACID database shared by all repositories.
pub struct FileDatabase {
    db: Database,
}

impl FileDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(USER_WALLET_INDEX)?;
            let _ = write_txn.open_table(FILE_RECORDS)?;
            let _ = write_txn.open_table(FILE_HASH_INDEX)?;
            let _ = write_txn.open_table(OWNER_FILE_INDEX)?;
            let _ = write_txn.open_table(VERIFICATIONS)?;
            let _ = write_txn.open_table(VERIFICATION_HASH_INDEX)?;
            let _ = write_txn.open_table(AUDIT_LOGS)?;
            let _ = write_txn.open_table(AUDIT_ACTOR_INDEX)?;
            let _ = write_txn.open_table(AUDIT_ACTION_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(super) fn raw(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_precreates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = FileDatabase::open(&dir.path().join("test.redb")).unwrap();

        // A fresh read transaction can open every table without error
        use redb::ReadableDatabase;
        let read_txn = db.raw().begin_read().unwrap();
        assert!(read_txn.open_table(FILE_RECORDS).is_ok());
        assert!(read_txn.open_table(AUDIT_LOGS).is_ok());
        assert!(read_txn.open_table(USERS).is_ok());
    }

    #[test]
    fn time_keys_sort_newest_first() {
        let older = time_key(1_000, "a");
        let newer = time_key(2_000, "b");
        assert!(newer < older, "newer timestamps must sort first");

        let p_older = prefixed_time_key("user-1", 1_000, "a");
        let p_newer = prefixed_time_key("user-1", 2_000, "b");
        assert!(p_newer < p_older);
    }

    #[test]
    fn prefix_bounds_cover_only_matching_keys() {
        let key = prefixed_time_key("user-1", 5_000, "x");
        assert!(prefix_start("user-1").as_slice() < key.as_slice());
        assert!(key.as_slice() < prefix_end("user-1").as_slice());

        let other = prefixed_time_key("user-2", 5_000, "x");
        assert!(other.as_slice() > prefix_end("user-1").as_slice());
    }
}
