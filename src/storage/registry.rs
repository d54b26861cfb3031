// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Hash registry: content hash → canonical file record.
//!
//! The registry enforces global uniqueness of content hashes. The
//! check-then-insert runs inside a single redb write transaction; redb
//! serializes write transactions, so two concurrent ingestions of the same
//! hash yield exactly one success and one `DuplicateHash` error.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Details, FileHash, WalletAddress};

use super::database::{
    prefix_end, prefix_start, prefixed_time_key, FILE_HASH_INDEX, FILE_RECORDS, OWNER_FILE_INDEX,
};
use super::{FileDatabase, StorageError, StorageResult};

/// Maximum page size accepted by listing operations.
pub const MAX_PAGE_SIZE: usize = 100;

/// Upload lifecycle status.
///
/// Progression is forward-only; `Verified` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Submission accepted, external references not yet committed
    Pending,
    /// Metadata committed with chain/content-store references
    Uploaded,
    /// Integrity confirmed against the registry
    Verified,
    /// Submission failed, kept for diagnostics
    Failed,
}

impl UploadStatus {
    fn rank(self) -> u8 {
        match self {
            UploadStatus::Pending => 0,
            UploadStatus::Uploaded => 1,
            UploadStatus::Verified | UploadStatus::Failed => 2,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Verified | UploadStatus::Failed)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(UploadStatus::Pending),
            "uploaded" => Some(UploadStatus::Uploaded),
            "verified" => Some(UploadStatus::Verified),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

/// Canonical record for a registered file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    /// Opaque identifier, assigned on creation.
    pub id: String,
    /// Original file name as submitted.
    pub file_name: String,
    /// Normalized content hash; unique across all records.
    pub file_hash: FileHash,
    /// File size in bytes.
    pub file_size: u64,
    /// MIME type derived from the file name extension.
    pub file_type: String,
    /// IPFS content identifier, informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
    /// Chain transaction hash, informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Block the transaction was included in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Gas used by the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Submitting actor at the chain layer.
    pub wallet_address: WalletAddress,
    /// Current lifecycle status.
    pub upload_status: UploadStatus,
    /// Additional metadata (upload method, client IP, user agent).
    #[serde(default)]
    pub metadata: Details,
    /// Owning user; None for anonymous uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, when the status becomes `Uploaded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Create a new pending record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_name: String,
        file_hash: FileHash,
        file_size: u64,
        file_type: String,
        wallet_address: WalletAddress,
        owner_user_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name,
            file_hash,
            file_size,
            file_type,
            ipfs_hash: None,
            transaction_hash: None,
            block_number: None,
            gas_used: None,
            wallet_address,
            upload_status: UploadStatus::Pending,
            metadata: Details::new(),
            owner_user_id,
            created_at: now,
            updated_at: now,
            uploaded_at: None,
        }
    }

    /// Attach external-system references, set at creation time only.
    pub fn with_chain_refs(
        mut self,
        ipfs_hash: Option<String>,
        transaction_hash: Option<String>,
        block_number: Option<u64>,
        gas_used: Option<u64>,
    ) -> Self {
        self.ipfs_hash = ipfs_hash;
        self.transaction_hash = transaction_hash;
        self.block_number = block_number;
        self.gas_used = gas_used;
        self
    }

    pub fn with_metadata(mut self, metadata: Details) -> Self {
        self.metadata = metadata;
        self
    }

    /// Advance the lifecycle status. Backward transitions and transitions
    /// out of a terminal state are ignored.
    pub fn advance(&mut self, next: UploadStatus) {
        if self.upload_status.is_terminal() || next.rank() <= self.upload_status.rank() {
            return;
        }
        self.upload_status = next;
        self.updated_at = Utc::now();
    }

    /// Mark the record uploaded, stamping `uploaded_at` exactly once.
    pub fn mark_uploaded(&mut self) {
        self.advance(UploadStatus::Uploaded);
        if self.upload_status == UploadStatus::Uploaded && self.uploaded_at.is_none() {
            self.uploaded_at = Some(self.updated_at);
        }
    }
}

/// Filters accepted by owner-scoped listing.
#[derive(Debug, Default, Clone)]
pub struct RegistryFilter {
    pub status: Option<UploadStatus>,
    /// Substring match over file name and hash.
    pub query: Option<String>,
    /// Substring match over the MIME type.
    pub file_type: Option<String>,
}

impl RegistryFilter {
    fn matches(&self, record: &FileRecord) -> bool {
        if let Some(status) = self.status {
            if record.upload_status != status {
                return false;
            }
        }
        if let Some(ref q) = self.query {
            let q = q.to_lowercase();
            if !record.file_name.to_lowercase().contains(&q)
                && !record.file_hash.as_str().contains(&q)
            {
                return false;
            }
        }
        if let Some(ref ft) = self.file_type {
            if !record
                .file_type
                .to_lowercase()
                .contains(&ft.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// A stable page of records, newest-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordPage {
    pub files: Vec<FileRecord>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
    pub per_page: usize,
}

/// Repository for file records keyed by content hash.
pub struct HashRegistry<'a> {
    db: &'a FileDatabase,
}

impl<'a> HashRegistry<'a> {
    pub fn new(db: &'a FileDatabase) -> Self {
        Self { db }
    }

    /// Insert a record, enforcing hash uniqueness atomically.
    pub fn insert(&self, record: &FileRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut hash_index = write_txn.open_table(FILE_HASH_INDEX)?;
            if hash_index.get(record.file_hash.as_str())?.is_some() {
                return Err(StorageError::DuplicateHash(
                    record.file_hash.as_str().to_string(),
                ));
            }
            hash_index.insert(record.file_hash.as_str(), record.id.as_str())?;

            let mut records = write_txn.open_table(FILE_RECORDS)?;
            records.insert(record.id.as_str(), json.as_slice())?;

            if let Some(ref owner) = record.owner_user_id {
                let mut owner_index = write_txn.open_table(OWNER_FILE_INDEX)?;
                let key =
                    prefixed_time_key(owner, record.created_at.timestamp_millis(), &record.id);
                owner_index.insert(key.as_slice(), record.id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up the canonical record for a normalized hash.
    ///
    /// Returns `Ok(None)` for absent hashes; errors indicate storage
    /// faults only.
    pub fn lookup(&self, hash: &FileHash) -> StorageResult<Option<FileRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let hash_index = read_txn.open_table(FILE_HASH_INDEX)?;
        let Some(id) = hash_index.get(hash.as_str())? else {
            return Ok(None);
        };
        let records = read_txn.open_table(FILE_RECORDS)?;
        match records.get(id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> StorageResult<Option<FileRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let records = read_txn.open_table(FILE_RECORDS)?;
        match records.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a record and its index entries. Returns the removed record.
    pub fn delete(&self, id: &str) -> StorageResult<FileRecord> {
        let write_txn = self.db.raw().begin_write()?;
        let record: FileRecord;
        {
            let mut records = write_txn.open_table(FILE_RECORDS)?;
            let existing = records
                .remove(id)?
                .ok_or_else(|| StorageError::NotFound(format!("File record {id}")))?;
            record = serde_json::from_slice(existing.value())?;

            let mut hash_index = write_txn.open_table(FILE_HASH_INDEX)?;
            hash_index.remove(record.file_hash.as_str())?;

            if let Some(ref owner) = record.owner_user_id {
                let mut owner_index = write_txn.open_table(OWNER_FILE_INDEX)?;
                let key =
                    prefixed_time_key(owner, record.created_at.timestamp_millis(), &record.id);
                owner_index.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(record)
    }

    /// Persist status/metadata changes to an existing record.
    ///
    /// The hash and creation time never change, so no index maintenance is
    /// needed here.
    pub fn update(&self, record: &FileRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut records = write_txn.open_table(FILE_RECORDS)?;
            if records.get(record.id.as_str())?.is_none() {
                return Err(StorageError::NotFound(format!(
                    "File record {}",
                    record.id
                )));
            }
            records.insert(record.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Reverse-chronological page of an owner's records.
    ///
    /// `page` is 1-based; `per_page` is clamped to [`MAX_PAGE_SIZE`]. Pages
    /// beyond the total are empty, not errors.
    pub fn list_by_owner(
        &self,
        owner_user_id: &str,
        filter: &RegistryFilter,
        page: usize,
        per_page: usize,
    ) -> StorageResult<RecordPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let read_txn = self.db.raw().begin_read()?;
        let owner_index = read_txn.open_table(OWNER_FILE_INDEX)?;
        let records = read_txn.open_table(FILE_RECORDS)?;

        let start = prefix_start(owner_user_id);
        let end = prefix_end(owner_user_id);

        let mut matched = Vec::new();
        for entry in owner_index.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            let id = entry.1.value();
            if let Some(value) = records.get(id)? {
                let record: FileRecord = serde_json::from_slice(value.value())?;
                if filter.matches(&record) {
                    matched.push(record);
                }
            }
        }

        let total = matched.len();
        let pages = total.div_ceil(per_page);
        let files: Vec<FileRecord> = matched
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(RecordPage {
            files,
            total,
            pages,
            current_page: page,
            per_page,
        })
    }

    /// All records, unordered. Used by the stats aggregator.
    pub fn all(&self) -> StorageResult<Vec<FileRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let records = read_txn.open_table(FILE_RECORDS)?;
        let mut out = Vec::new();
        for entry in records.iter()? {
            let entry = entry?;
            out.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(out)
    }

    /// Total record count.
    pub fn count(&self) -> StorageResult<usize> {
        let read_txn = self.db.raw().begin_read()?;
        let records = read_txn.open_table(FILE_RECORDS)?;
        Ok(records.len()? as usize)
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

    fn sample_record(hash: &str, owner: Option<&str>) -> FileRecord {
        let mut record = FileRecord::new(
            "report.pdf".to_string(),
            FileHash::normalize(hash),
            1024,
            "application/pdf".to_string(),
            WalletAddress::from("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12"),
            owner.map(String::from),
        )
        .with_chain_refs(
            Some("QmTestCid".to_string()),
            Some("0x01".to_string()),
            Some(12345),
            Some(21000),
        );
        record.mark_uploaded();
        record
    }

    #[test]
    fn insert_and_lookup_round_trip() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);

        let record = sample_record("deadbeef", Some("user-1"));
        registry.insert(&record).unwrap();

        let found = registry
            .lookup(&FileHash::normalize("0xDEADBEEF"))
            .unwrap()
            .expect("lookup after insert");
        assert_eq!(found.id, record.id);
        assert_eq!(found.file_hash.as_str(), "deadbeef");
        assert_eq!(found.upload_status, UploadStatus::Uploaded);
        assert!(found.uploaded_at.is_some());
    }

    #[test]
    fn lookup_missing_hash_is_none_not_error() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);
        assert!(registry
            .lookup(&FileHash::normalize("unknownhash"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);

        registry.insert(&sample_record("deadbeef", Some("user-1"))).unwrap();
        let err = registry
            .insert(&sample_record("0xDEADBEEF", Some("user-2")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateHash(_)));

        // Exactly one record survives
        assert_eq!(registry.count().unwrap(), 1);
    }

    #[test]
    fn concurrent_identical_ingest_yields_one_success() {
        let (db, _dir) = temp_db();
        let db = std::sync::Arc::new(db);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let db = db.clone();
            handles.push(std::thread::spawn(move || {
                let registry = HashRegistry::new(&db);
                registry.insert(&sample_record("cafebabe", Some("user-1")))
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent insert must win");
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StorageError::DuplicateHash(_)))));
    }

    #[test]
    fn delete_frees_the_hash() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);

        let record = sample_record("deadbeef", Some("user-1"));
        registry.insert(&record).unwrap();
        registry.delete(&record.id).unwrap();

        assert!(registry
            .lookup(&FileHash::normalize("deadbeef"))
            .unwrap()
            .is_none());
        // Hash can be registered again after deletion
        registry.insert(&sample_record("deadbeef", Some("user-2"))).unwrap();
    }

    #[test]
    fn delete_missing_record_errors() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);
        assert!(matches!(
            registry.delete("missing").unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[test]
    fn list_by_owner_is_newest_first_and_stable() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);

        for i in 0..5 {
            let mut record = sample_record(&format!("hash{i:02}"), Some("user-1"));
            record.created_at = Utc::now() - chrono::Duration::seconds(10 - i);
            registry.insert(&record).unwrap();
        }
        registry
            .insert(&sample_record("otherhash", Some("user-2")))
            .unwrap();

        let filter = RegistryFilter::default();
        let page1 = registry.list_by_owner("user-1", &filter, 1, 2).unwrap();
        assert_eq!(page1.total, 5);
        assert_eq!(page1.pages, 3);
        assert_eq!(page1.files.len(), 2);
        // Most recently created first
        assert_eq!(page1.files[0].file_hash.as_str(), "hash04");
        assert_eq!(page1.files[1].file_hash.as_str(), "hash03");

        // Re-reading the same page with no intervening writes is identical
        let again = registry.list_by_owner("user-1", &filter, 1, 2).unwrap();
        let ids: Vec<_> = page1.files.iter().map(|f| &f.id).collect();
        let ids_again: Vec<_> = again.files.iter().map(|f| &f.id).collect();
        assert_eq!(ids, ids_again);

        // A page past the end is empty, not an error
        let past = registry.list_by_owner("user-1", &filter, 9, 2).unwrap();
        assert!(past.files.is_empty());
        assert_eq!(past.total, 5);
    }

    #[test]
    fn list_by_owner_clamps_page_size() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);
        registry.insert(&sample_record("aa", Some("user-1"))).unwrap();

        let page = registry
            .list_by_owner("user-1", &RegistryFilter::default(), 1, 10_000)
            .unwrap();
        assert_eq!(page.per_page, MAX_PAGE_SIZE);
    }

    #[test]
    fn filter_by_status_and_query() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);

        let mut pending = FileRecord::new(
            "draft.txt".to_string(),
            FileHash::normalize("aaaa"),
            10,
            "text/plain".to_string(),
            WalletAddress::from("0x01"),
            Some("user-1".to_string()),
        );
        pending.created_at = Utc::now() - chrono::Duration::seconds(5);
        registry.insert(&pending).unwrap();
        registry.insert(&sample_record("bbbb", Some("user-1"))).unwrap();

        let uploaded_only = RegistryFilter {
            status: Some(UploadStatus::Uploaded),
            ..Default::default()
        };
        let page = registry
            .list_by_owner("user-1", &uploaded_only, 1, 20)
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].file_hash.as_str(), "bbbb");

        let by_name = RegistryFilter {
            query: Some("DRAFT".to_string()),
            ..Default::default()
        };
        let page = registry.list_by_owner("user-1", &by_name, 1, 20).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].file_name, "draft.txt");
    }

    #[test]
    fn status_progression_is_forward_only() {
        let mut record = FileRecord::new(
            "a.txt".to_string(),
            FileHash::normalize("cc"),
            1,
            "text/plain".to_string(),
            WalletAddress::from("0x01"),
            None,
        );
        assert_eq!(record.upload_status, UploadStatus::Pending);

        record.mark_uploaded();
        assert_eq!(record.upload_status, UploadStatus::Uploaded);
        let stamped = record.uploaded_at.expect("uploaded_at set");

        // uploaded_at is set exactly once
        record.mark_uploaded();
        assert_eq!(record.uploaded_at, Some(stamped));

        record.advance(UploadStatus::Verified);
        assert_eq!(record.upload_status, UploadStatus::Verified);

        // No backward transition once verified
        record.advance(UploadStatus::Pending);
        record.advance(UploadStatus::Failed);
        assert_eq!(record.upload_status, UploadStatus::Verified);
    }

    #[test]
    fn anonymous_records_have_no_owner_listing() {
        let (db, _dir) = temp_db();
        let registry = HashRegistry::new(&db);
        registry.insert(&sample_record("ffff", None)).unwrap();

        assert_eq!(registry.count().unwrap(), 1);
        assert!(registry
            .lookup(&FileHash::normalize("ffff"))
            .unwrap()
            .is_some());
    }
}
