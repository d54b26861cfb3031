// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Append-only audit trail.
//!
//! Audit writes never fail a primary operation: handlers go through
//! [`AuditTrail::record_best_effort`], which logs storage faults and
//! swallows them. Entries are immutable once written.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Details;

use super::database::{
    prefix_end, prefix_start, prefixed_time_key, time_key, AUDIT_ACTION_INDEX, AUDIT_ACTOR_INDEX,
    AUDIT_LOGS,
};
use super::registry::MAX_PAGE_SIZE;
use super::{FileDatabase, StorageResult};

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: String,
    /// Machine-readable action name, e.g. `file_uploaded`, `login_failed`.
    pub action: String,
    /// Acting user; None for anonymous actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub details: Details,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(action: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.to_string(),
            actor_user_id: None,
            resource_type: None,
            resource_id: None,
            details: Details::new(),
            client_ip: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_user_id: &str) -> Self {
        self.actor_user_id = Some(actor_user_id.to_string());
        self
    }

    pub fn with_resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn with_client(mut self, client_ip: Option<&str>, user_agent: Option<&str>) -> Self {
        self.client_ip = client_ip.map(String::from);
        self.user_agent = user_agent.map(String::from);
        self
    }
}

/// Filters for audit queries. All filters compose with AND.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub actor_user_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    /// Substring match over action, resource id and details.
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: usize,
    pub per_page: usize,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref actor) = self.actor_user_id {
            if entry.actor_user_id.as_deref() != Some(actor.as_str()) {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(ref resource_type) = self.resource_type {
            if entry.resource_type.as_deref() != Some(resource_type.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.created_at > to {
                return false;
            }
        }
        if let Some(ref needle) = self.search {
            let needle = needle.to_lowercase();
            let in_action = entry.action.to_lowercase().contains(&needle);
            let in_resource = entry
                .resource_id
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(&needle));
            if !in_action && !in_resource && !entry.details.matches(&needle) {
                return false;
            }
        }
        true
    }
}

/// A page of audit entries, newest-first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditPage {
    pub logs: Vec<AuditLogEntry>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
    pub per_page: usize,
}

/// Repository for the audit trail.
pub struct AuditTrail<'a> {
    db: &'a FileDatabase,
}

impl<'a> AuditTrail<'a> {
    pub fn new(db: &'a FileDatabase) -> Self {
        Self { db }
    }

    /// Append an entry, maintaining actor and action indexes in the same
    /// transaction.
    pub fn record(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        let json = serde_json::to_vec(entry)?;
        let ts = entry.created_at.timestamp_millis();
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut logs = write_txn.open_table(AUDIT_LOGS)?;
            let key = time_key(ts, &entry.id);
            logs.insert(key.as_slice(), json.as_slice())?;

            if let Some(ref actor) = entry.actor_user_id {
                let mut actor_index = write_txn.open_table(AUDIT_ACTOR_INDEX)?;
                let actor_key = prefixed_time_key(actor, ts, &entry.id);
                actor_index.insert(actor_key.as_slice(), key.as_slice())?;
            }

            let mut action_index = write_txn.open_table(AUDIT_ACTION_INDEX)?;
            let action_key = prefixed_time_key(&entry.action, ts, &entry.id);
            action_index.insert(action_key.as_slice(), key.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Record an entry, logging and swallowing storage faults so the
    /// primary operation is never failed by its audit write.
    pub fn record_best_effort(&self, entry: &AuditLogEntry) {
        if let Err(err) = self.record(entry) {
            tracing::warn!(action = %entry.action, error = %err, "Audit write failed");
        }
    }

    /// Query the trail, newest-first, with offset pagination.
    pub fn query(&self, query: &AuditQuery) -> StorageResult<AuditPage> {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, MAX_PAGE_SIZE);

        let read_txn = self.db.raw().begin_read()?;
        let logs = read_txn.open_table(AUDIT_LOGS)?;

        // When an actor filter is set, scan its index range instead of the
        // whole table.
        let mut matched = Vec::new();
        if let Some(ref actor) = query.actor_user_id {
            let actor_index = read_txn.open_table(AUDIT_ACTOR_INDEX)?;
            let start = prefix_start(actor);
            let end = prefix_end(actor);
            for entry in actor_index.range(start.as_slice()..end.as_slice())? {
                let entry = entry?;
                if let Some(value) = logs.get(entry.1.value())? {
                    let log: AuditLogEntry = serde_json::from_slice(value.value())?;
                    if query.matches(&log) {
                        matched.push(log);
                    }
                }
            }
        } else {
            for entry in logs.iter()? {
                let entry = entry?;
                let log: AuditLogEntry = serde_json::from_slice(entry.1.value())?;
                if query.matches(&log) {
                    matched.push(log);
                }
            }
        }

        let total = matched.len();
        let pages = total.div_ceil(per_page);
        let logs: Vec<AuditLogEntry> = matched
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(AuditPage {
            logs,
            total,
            pages,
            current_page: page,
            per_page,
        })
    }

    /// Entry counts per action, for the audit summary.
    pub fn action_counts(&self) -> StorageResult<std::collections::BTreeMap<String, usize>> {
        let read_txn = self.db.raw().begin_read()?;
        let logs = read_txn.open_table(AUDIT_LOGS)?;
        let mut counts = std::collections::BTreeMap::new();
        for entry in logs.iter()? {
            let entry = entry?;
            let log: AuditLogEntry = serde_json::from_slice(entry.1.value())?;
            *counts.entry(log.action).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// All entries, for the stats aggregator.
    pub fn all(&self) -> StorageResult<Vec<AuditLogEntry>> {
        let read_txn = self.db.raw().begin_read()?;
        let logs = read_txn.open_table(AUDIT_LOGS)?;
        let mut out = Vec::new();
        for entry in logs.iter()? {
            let entry = entry?;
            out.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(out)
    }

    pub fn count(&self) -> StorageResult<usize> {
        let read_txn = self.db.raw().begin_read()?;
        let logs = read_txn.open_table(AUDIT_LOGS)?;
        Ok(logs.len()? as usize)
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

    fn seed(trail: &AuditTrail<'_>) {
        for i in 0..3 {
            let mut entry = AuditLogEntry::new("file_uploaded")
                .with_actor("user-1")
                .with_resource("file_record", &format!("file-{i}"));
            entry.created_at = Utc::now() - chrono::Duration::seconds(30 - i);
            trail.record(&entry).unwrap();
        }
        let mut other = AuditLogEntry::new("login_failed")
            .with_details(Details::new().with("email", serde_json::json!("mallory@example.com")));
        other.created_at = Utc::now() - chrono::Duration::seconds(5);
        trail.record(&other).unwrap();
    }

    #[test]
    fn query_is_newest_first() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let page = trail
            .query(&AuditQuery {
                page: 1,
                per_page: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.logs[0].action, "login_failed");
        assert_eq!(page.logs[3].resource_id.as_deref(), Some("file-0"));
    }

    #[test]
    fn actor_filter_uses_the_index() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let page = trail
            .query(&AuditQuery {
                actor_user_id: Some("user-1".to_string()),
                page: 1,
                per_page: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.logs.iter().all(|l| l.action == "file_uploaded"));
    }

    #[test]
    fn search_reaches_into_details() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let page = trail
            .query(&AuditQuery {
                search: Some("mallory".to_string()),
                page: 1,
                per_page: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.logs[0].action, "login_failed");
    }

    #[test]
    fn time_window_filters_compose() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let page = trail
            .query(&AuditQuery {
                action: Some("file_uploaded".to_string()),
                from: Some(Utc::now() - chrono::Duration::seconds(29)),
                page: 1,
                per_page: 10,
                ..Default::default()
            })
            .unwrap();
        // file-0 was written 30s ago, outside the window
        assert_eq!(page.total, 2);
    }

    #[test]
    fn action_counts_summarize_the_trail() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let counts = trail.action_counts().unwrap();
        assert_eq!(counts.get("file_uploaded"), Some(&3));
        assert_eq!(counts.get("login_failed"), Some(&1));
    }

    #[test]
    fn pagination_clamps_and_overflows_empty() {
        let (db, _dir) = temp_db();
        let trail = AuditTrail::new(&db);
        seed(&trail);

        let page = trail
            .query(&AuditQuery {
                page: 50,
                per_page: 0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.per_page, 1);
        assert!(page.logs.is_empty());
        assert_eq!(page.total, 4);
    }
}
