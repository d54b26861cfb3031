// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! # Persistent Storage Module
//!
//! All application state lives in a single embedded redb database (pure
//! Rust, ACID). Repositories borrow the shared [`FileDatabase`] handle and
//! expose domain-level operations; no repository holds state of its own.
//!
//! ## Ownership of tables
//!
//! - `registry` — file records and the content-hash uniqueness index
//! - `verification` — immutable verification events
//! - `audit` — append-only audit trail
//! - `users` — accounts and credential hashes
//! - `stats` — read-only rollups over the other repositories
//!
//! Writers use single redb write transactions for atomicity; redb
//! serializes write transactions, which is what makes the
//! check-then-insert in the hash registry race-free.

pub mod audit;
pub mod database;
pub mod registry;
pub mod stats;
pub mod users;
pub mod verification;

pub use audit::{AuditLogEntry, AuditPage, AuditQuery, AuditTrail};
pub use database::FileDatabase;
pub use registry::{FileRecord, HashRegistry, RecordPage, RegistryFilter, UploadStatus};
pub use stats::StatsAggregator;
pub use users::{StoredUser, UserProfile, UserRepository};
pub use verification::{VerificationEvent, VerificationMethod, VerificationStore};

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate file hash: {0}")]
    DuplicateHash(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
