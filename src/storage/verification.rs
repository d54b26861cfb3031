// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Verification events: an append-only record of every lookup attempt,
//! successful or not.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Details, WalletAddress};

use super::database::{prefix_end, prefix_start, prefixed_time_key, time_key, VERIFICATIONS, VERIFICATION_HASH_INDEX};
use super::{FileDatabase, StorageResult};

/// How a verification was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// Caller supplied the hash directly
    Hash,
    /// Caller supplied file content, hashed server-side
    File,
    /// Programmatic API client
    Api,
}

/// One verification attempt against the registry.
///
/// Events are immutable once written. `file_record_id` is `None` for
/// lookups of hashes the registry has never seen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationEvent {
    pub id: String,
    /// Normalized hash that was checked.
    pub file_hash: String,
    /// Matched record, when the hash was known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_record_id: Option<String>,
    /// Whether the hash matched a registered record.
    pub verified: bool,
    pub method: VerificationMethod,
    /// Requesting actor; None for anonymous verifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    /// Wallet of the verifying party, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_address: Option<WalletAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub details: Details,
    pub created_at: DateTime<Utc>,
}

impl VerificationEvent {
    pub fn new(file_hash: String, verified: bool, method: VerificationMethod) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_hash,
            file_record_id: None,
            verified,
            method,
            actor_user_id: None,
            verifier_address: None,
            client_ip: None,
            details: Details::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_record(mut self, file_record_id: &str) -> Self {
        self.file_record_id = Some(file_record_id.to_string());
        self
    }

    pub fn with_actor(mut self, actor_user_id: &str) -> Self {
        self.actor_user_id = Some(actor_user_id.to_string());
        self
    }

    pub fn with_verifier(mut self, verifier_address: WalletAddress) -> Self {
        self.verifier_address = Some(verifier_address);
        self
    }

    pub fn with_client_ip(mut self, client_ip: &str) -> Self {
        self.client_ip = Some(client_ip.to_string());
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }
}

/// Repository for verification events.
pub struct VerificationStore<'a> {
    db: &'a FileDatabase,
}

impl<'a> VerificationStore<'a> {
    pub fn new(db: &'a FileDatabase) -> Self {
        Self { db }
    }

    /// Append an event. Events are never updated or deleted.
    pub fn record(&self, event: &VerificationEvent) -> StorageResult<()> {
        let json = serde_json::to_vec(event)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut events = write_txn.open_table(VERIFICATIONS)?;
            let key = time_key(event.created_at.timestamp_millis(), &event.id);
            events.insert(key.as_slice(), json.as_slice())?;

            let mut hash_index = write_txn.open_table(VERIFICATION_HASH_INDEX)?;
            let hash_key =
                prefixed_time_key(&event.file_hash, event.created_at.timestamp_millis(), &event.id);
            hash_index.insert(hash_key.as_slice(), key.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Most recent events for one hash, newest first.
    pub fn list_for_hash(&self, file_hash: &str, limit: usize) -> StorageResult<Vec<VerificationEvent>> {
        let read_txn = self.db.raw().begin_read()?;
        let hash_index = read_txn.open_table(VERIFICATION_HASH_INDEX)?;
        let events = read_txn.open_table(VERIFICATIONS)?;

        let start = prefix_start(file_hash);
        let end = prefix_end(file_hash);

        let mut out = Vec::new();
        for entry in hash_index.range(start.as_slice()..end.as_slice())? {
            if out.len() >= limit {
                break;
            }
            let entry = entry?;
            if let Some(value) = events.get(entry.1.value())? {
                out.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(out)
    }

    /// Most recent events linked to one record, newest first.
    pub fn list_for_record(
        &self,
        file_record_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<VerificationEvent>> {
        let read_txn = self.db.raw().begin_read()?;
        let events = read_txn.open_table(VERIFICATIONS)?;
        let mut out = Vec::new();
        for entry in events.iter()? {
            if out.len() >= limit {
                break;
            }
            let entry = entry?;
            let event: VerificationEvent = serde_json::from_slice(entry.1.value())?;
            if event.file_record_id.as_deref() == Some(file_record_id) {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Most recent events overall, newest first.
    pub fn recent(&self, limit: usize) -> StorageResult<Vec<VerificationEvent>> {
        let read_txn = self.db.raw().begin_read()?;
        let events = read_txn.open_table(VERIFICATIONS)?;
        let mut out = Vec::new();
        for entry in events.iter()? {
            if out.len() >= limit {
                break;
            }
            let entry = entry?;
            out.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(out)
    }

    /// All events, for the stats aggregator.
    pub fn all(&self) -> StorageResult<Vec<VerificationEvent>> {
        let read_txn = self.db.raw().begin_read()?;
        let events = read_txn.open_table(VERIFICATIONS)?;
        let mut out = Vec::new();
        for entry in events.iter()? {
            let entry = entry?;
            out.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(out)
    }

    pub fn count(&self) -> StorageResult<usize> {
        let read_txn = self.db.raw().begin_read()?;
        let events = read_txn.open_table(VERIFICATIONS)?;
        Ok(events.len()? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (FileDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = FileDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn failed_lookups_are_recorded_too() {
        let (db, _dir) = temp_db();
        let store = VerificationStore::new(&db);

        store
            .record(&VerificationEvent::new(
                "unknownhash".to_string(),
                false,
                VerificationMethod::Hash,
            ))
            .unwrap();

        let events = store.list_for_hash("unknownhash", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].verified);
        assert!(events[0].file_record_id.is_none());
    }

    #[test]
    fn events_list_newest_first_per_hash() {
        let (db, _dir) = temp_db();
        let store = VerificationStore::new(&db);

        for i in 0..3 {
            let mut event =
                VerificationEvent::new("deadbeef".to_string(), true, VerificationMethod::Hash)
                    .with_record(&format!("rec-{i}"));
            event.created_at = Utc::now() - chrono::Duration::seconds(10 - i);
            store.record(&event).unwrap();
        }
        store
            .record(&VerificationEvent::new(
                "otherhash".to_string(),
                false,
                VerificationMethod::Api,
            ))
            .unwrap();

        let events = store.list_for_hash("deadbeef", 10).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].file_record_id.as_deref(), Some("rec-2"));
        assert_eq!(events[2].file_record_id.as_deref(), Some("rec-0"));

        let limited = store.list_for_hash("deadbeef", 2).unwrap();
        assert_eq!(limited.len(), 2);

        let by_record = store.list_for_record("rec-1", 10).unwrap();
        assert_eq!(by_record.len(), 1);
        assert_eq!(by_record[0].file_record_id.as_deref(), Some("rec-1"));
    }

    #[test]
    fn recent_spans_all_hashes() {
        let (db, _dir) = temp_db();
        let store = VerificationStore::new(&db);

        for hash in ["aa", "bb", "cc"] {
            store
                .record(&VerificationEvent::new(
                    hash.to_string(),
                    true,
                    VerificationMethod::File,
                ))
                .unwrap();
        }
        assert_eq!(store.recent(10).unwrap().len(), 3);
        assert_eq!(store.count().unwrap(), 3);
    }
}
