// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! User accounts with unique email and wallet indexes.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::WalletAddress;

use super::database::{FILE_RECORDS, USERS, USER_EMAIL_INDEX, USER_WALLET_INDEX};
use super::{FileDatabase, StorageError, StorageResult};

/// A persisted user account.
///
/// `password_hash` holds the PBKDF2 output and never leaves the storage
/// layer through API serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    /// Lowercased at creation; unique.
    pub email: String,
    /// salt$iterations$derived-key, all base64url.
    pub password_hash: String,
    /// Lowercased; unique when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl StoredUser {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        wallet_address: Option<WalletAddress>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email: email.to_lowercase(),
            password_hash,
            wallet_address: wallet_address.map(|w| WalletAddress(w.0.to_lowercase())),
            is_admin: false,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Public projection, safe to serialize in responses.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            wallet_address: self.wallet_address.clone(),
            is_admin: self.is_admin,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// API-facing view of a user, without credentials.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// Repository for user accounts.
pub struct UserRepository<'a> {
    db: &'a FileDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a FileDatabase) -> Self {
        Self { db }
    }

    /// Create a user, enforcing email and wallet uniqueness atomically.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut email_index = write_txn.open_table(USER_EMAIL_INDEX)?;
            if email_index.get(user.email.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "email {}",
                    user.email
                )));
            }
            let mut wallet_index = write_txn.open_table(USER_WALLET_INDEX)?;
            if let Some(ref wallet) = user.wallet_address {
                if wallet_index.get(wallet.0.as_str())?.is_some() {
                    return Err(StorageError::AlreadyExists(format!(
                        "wallet {}",
                        wallet.0
                    )));
                }
                wallet_index.insert(wallet.0.as_str(), user.id.as_str())?;
            }
            email_index.insert(user.email.as_str(), user.id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<StoredUser>> {
        let read_txn = self.db.raw().begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn by_email(&self, email: &str) -> StorageResult<Option<StoredUser>> {
        let email = email.to_lowercase();
        let read_txn = self.db.raw().begin_read()?;
        let email_index = read_txn.open_table(USER_EMAIL_INDEX)?;
        let Some(id) = email_index.get(email.as_str())? else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Persist changes to an existing user. The email and wallet indexes
    /// are rewritten when those fields changed.
    pub fn update(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let previous: StoredUser = match users.get(user.id.as_str())? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("User {}", user.id))),
            };

            if previous.email != user.email {
                let mut email_index = write_txn.open_table(USER_EMAIL_INDEX)?;
                if email_index.get(user.email.as_str())?.is_some() {
                    return Err(StorageError::AlreadyExists(format!(
                        "email {}",
                        user.email
                    )));
                }
                email_index.remove(previous.email.as_str())?;
                email_index.insert(user.email.as_str(), user.id.as_str())?;
            }

            let prev_wallet = previous.wallet_address.as_ref().map(|w| w.0.as_str());
            let next_wallet = user.wallet_address.as_ref().map(|w| w.0.as_str());
            if prev_wallet != next_wallet {
                let mut wallet_index = write_txn.open_table(USER_WALLET_INDEX)?;
                if let Some(next) = next_wallet {
                    match wallet_index.get(next)? {
                        Some(owner) if owner.value() != user.id => {
                            return Err(StorageError::AlreadyExists(format!("wallet {next}")));
                        }
                        _ => {}
                    }
                }
                if let Some(prev) = prev_wallet {
                    wallet_index.remove(prev)?;
                }
                if let Some(next) = next_wallet {
                    wallet_index.insert(next, user.id.as_str())?;
                }
            }

            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All users, for the admin listing and the stats aggregator.
    pub fn list(&self) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.raw().begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut out = Vec::new();
        for entry in users.iter()? {
            let entry = entry?;
            out.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(out)
    }

    pub fn count(&self) -> StorageResult<usize> {
        let read_txn = self.db.raw().begin_read()?;
        let users = read_txn.open_table(USERS)?;
        Ok(users.len()? as usize)
    }

    /// Per-user file counts, for the admin listing.
    pub fn file_counts(&self) -> StorageResult<std::collections::HashMap<String, usize>> {
        let read_txn = self.db.raw().begin_read()?;
        let records = read_txn.open_table(FILE_RECORDS)?;
        let mut counts = std::collections::HashMap::new();
        for entry in records.iter()? {
            let entry = entry?;
            let record: super::FileRecord = serde_json::from_slice(entry.1.value())?;
            if let Some(owner) = record.owner_user_id {
                *counts.entry(owner).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
