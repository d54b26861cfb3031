// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! On-demand analytics over the registry, verification and audit tables.
//!
//! Aggregates are computed from the source tables at query time rather
//! than maintained as running counters, so they are always consistent
//! with the data they summarize.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, Timelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::audit::AuditTrail;
use super::registry::HashRegistry;
use super::users::UserRepository;
use super::verification::VerificationStore;
use super::{FileDatabase, StorageResult};

/// Trend window accepted by the trends endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendRange {
    Day,
    Week,
    Month,
    Quarter,
}

impl TrendRange {
    /// Parse the query-string form; unknown values fall back to a week.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "24h" => TrendRange::Day,
            "7d" => TrendRange::Week,
            "30d" => TrendRange::Month,
            "90d" => TrendRange::Quarter,
            _ => TrendRange::Week,
        }
    }

    fn days(self) -> i64 {
        match self {
            TrendRange::Day => 1,
            TrendRange::Week => 7,
            TrendRange::Month => 30,
            TrendRange::Quarter => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendRange::Day => "24h",
            TrendRange::Week => "7d",
            TrendRange::Month => "30d",
            TrendRange::Quarter => "90d",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OverviewStats {
    pub total_files: usize,
    pub total_verifications: usize,
    pub active_users: usize,
    /// Sum of registered file sizes, in bytes.
    pub total_storage_bytes: u64,
    /// Percentage of verification attempts that matched a registered
    /// hash. Zero when there are no attempts.
    pub success_rate: f64,
    /// Percentage change of uploads in the last 30 days against the 30
    /// days before that.
    pub growth_rate_30d: f64,
    /// Uploads in the last 7 days.
    pub recent_files: usize,
}

/// One time bucket of upload counts. Hour-labelled for the 24h range,
/// day-labelled otherwise.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationBucket {
    pub date: String,
    pub total: usize,
    pub successful: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileTypeCount {
    pub file_type: String,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HourActivity {
    /// Hour of day, 0-23.
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendStats {
    pub range: String,
    pub upload_trend: Vec<UploadBucket>,
    pub verification_trend: Vec<VerificationBucket>,
    /// Most common MIME types, at most ten.
    pub top_file_types: Vec<FileTypeCount>,
    /// Upload counts by hour of day across the window.
    pub hourly_activity: Vec<HourActivity>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BlockchainStats {
    /// Records carrying a transaction hash.
    pub total_transactions: usize,
    pub total_gas_used: u64,
    pub average_gas_used: f64,
    pub unique_blocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block: Option<u64>,
    /// Records carrying an IPFS content identifier.
    pub files_on_ipfs: usize,
}

/// Caller-scoped dashboard counts.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStats {
    pub total_files: usize,
    pub total_storage_bytes: u64,
    /// Verification events against this user's records.
    pub verifications_of_my_files: usize,
    pub uploads_last_30d: usize,
    pub file_types: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SecurityMetrics {
    /// Percentage of verification attempts that succeeded.
    pub verification_success_rate: f64,
    pub failed_verifications: usize,
    /// Verification events linked to a registered record.
    pub linked_verifications: usize,
    pub login_successes: usize,
    pub login_failures: usize,
    pub total_audit_entries: usize,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Read-only aggregator over all storage tables.
pub struct StatsAggregator<'a> {
    db: &'a FileDatabase,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(db: &'a FileDatabase) -> Self {
        Self { db }
    }

    pub fn overview(&self) -> StorageResult<OverviewStats> {
        let registry = HashRegistry::new(self.db);
        let verifications = VerificationStore::new(self.db);
        let users = UserRepository::new(self.db);

        let records = registry.all()?;
        let events = verifications.all()?;
        let now = Utc::now();

        let successful = events.iter().filter(|e| e.verified).count();

        let cutoff_30d = now - Duration::days(30);
        let cutoff_60d = now - Duration::days(60);
        let last_30d = records.iter().filter(|r| r.created_at >= cutoff_30d).count();
        let prior_30d = records
            .iter()
            .filter(|r| r.created_at >= cutoff_60d && r.created_at < cutoff_30d)
            .count();
        let growth_rate_30d = if prior_30d == 0 {
            if last_30d == 0 { 0.0 } else { 100.0 }
        } else {
            (last_30d as f64 - prior_30d as f64) / prior_30d as f64 * 100.0
        };

        let cutoff_7d = now - Duration::days(7);

        Ok(OverviewStats {
            total_files: records.len(),
            total_verifications: events.len(),
            active_users: users.list()?.iter().filter(|u| u.is_active).count(),
            total_storage_bytes: records.iter().map(|r| r.file_size).sum(),
            success_rate: percent(successful, events.len()),
            growth_rate_30d,
            recent_files: records.iter().filter(|r| r.created_at >= cutoff_7d).count(),
        })
    }

    /// Upload/verification trends over the requested window. Buckets with
    /// no activity still appear, with zero counts.
    pub fn trends(&self, range: TrendRange) -> StorageResult<TrendStats> {
        let registry = HashRegistry::new(self.db);
        let verifications = VerificationStore::new(self.db);

        let now = Utc::now();
        let start = now - Duration::days(range.days());
        let records = registry.all()?;
        let events = verifications.all()?;

        // Hour buckets for 24h, day buckets otherwise.
        let upload_trend = if range == TrendRange::Day {
            let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
            for offset in 0..24 {
                let label = (now - Duration::hours(23 - offset))
                    .format("%Y-%m-%d %H:00")
                    .to_string();
                buckets.insert(label, 0);
            }
            for record in &records {
                let label = record.created_at.format("%Y-%m-%d %H:00").to_string();
                if let Some(count) = buckets.get_mut(&label) {
                    *count += 1;
                }
            }
            buckets
                .into_iter()
                .map(|(label, count)| UploadBucket { label, count })
                .collect()
        } else {
            let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
            for offset in 0..=range.days() {
                let label = (start + Duration::days(offset)).format("%Y-%m-%d").to_string();
                buckets.insert(label, 0);
            }
            for record in &records {
                if record.created_at >= start {
                    let label = record.created_at.format("%Y-%m-%d").to_string();
                    if let Some(count) = buckets.get_mut(&label) {
                        *count += 1;
                    }
                }
            }
            buckets
                .into_iter()
                .map(|(label, count)| UploadBucket { label, count })
                .collect()
        };

        let mut verification_days: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for offset in 0..=range.days() {
            let label = (start + Duration::days(offset)).format("%Y-%m-%d").to_string();
            verification_days.insert(label, (0, 0));
        }
        for event in &events {
            if event.created_at >= start {
                let label = event.created_at.format("%Y-%m-%d").to_string();
                if let Some(bucket) = verification_days.get_mut(&label) {
                    bucket.0 += 1;
                    if event.verified {
                        bucket.1 += 1;
                    }
                }
            }
        }

        let mut type_counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            *type_counts.entry(record.file_type.clone()).or_insert(0) += 1;
        }
        let mut top_file_types: Vec<FileTypeCount> = type_counts
            .into_iter()
            .map(|(file_type, count)| FileTypeCount { file_type, count })
            .collect();
        top_file_types.sort_by(|a, b| b.count.cmp(&a.count));
        top_file_types.truncate(10);

        let mut hours = [0usize; 24];
        for record in &records {
            if record.created_at >= start {
                hours[record.created_at.hour() as usize] += 1;
            }
        }

        Ok(TrendStats {
            range: range.label().to_string(),
            upload_trend,
            verification_trend: verification_days
                .into_iter()
                .map(|(date, (total, successful))| VerificationBucket {
                    date,
                    total,
                    successful,
                })
                .collect(),
            top_file_types,
            hourly_activity: hours
                .iter()
                .enumerate()
                .map(|(hour, &count)| HourActivity {
                    hour: hour as u32,
                    count,
                })
                .collect(),
        })
    }

    pub fn blockchain(&self) -> StorageResult<BlockchainStats> {
        let registry = HashRegistry::new(self.db);
        let records = registry.all()?;

        let with_tx: Vec<_> = records
            .iter()
            .filter(|r| r.transaction_hash.is_some())
            .collect();
        let total_gas_used: u64 = with_tx.iter().filter_map(|r| r.gas_used).sum();
        let average_gas_used = if with_tx.is_empty() {
            0.0
        } else {
            total_gas_used as f64 / with_tx.len() as f64
        };
        let blocks: HashSet<u64> = records.iter().filter_map(|r| r.block_number).collect();

        Ok(BlockchainStats {
            total_transactions: with_tx.len(),
            total_gas_used,
            average_gas_used,
            unique_blocks: blocks.len(),
            first_block: blocks.iter().min().copied(),
            latest_block: blocks.iter().max().copied(),
            files_on_ipfs: records.iter().filter(|r| r.ipfs_hash.is_some()).count(),
        })
    }

    /// Dashboard counts scoped to one user's records.
    pub fn user_stats(&self, user_id: &str) -> StorageResult<UserStats> {
        let registry = HashRegistry::new(self.db);
        let verifications = VerificationStore::new(self.db);

        let mine: Vec<_> = registry
            .all()?
            .into_iter()
            .filter(|r| r.owner_user_id.as_deref() == Some(user_id))
            .collect();
        let my_ids: HashSet<&str> = mine.iter().map(|r| r.id.as_str()).collect();

        let verifications_of_my_files = verifications
            .all()?
            .iter()
            .filter(|e| {
                e.file_record_id
                    .as_deref()
                    .is_some_and(|id| my_ids.contains(id))
            })
            .count();

        let cutoff = Utc::now() - Duration::days(30);
        let mut file_types: BTreeMap<String, usize> = BTreeMap::new();
        for record in &mine {
            *file_types.entry(record.file_type.clone()).or_insert(0) += 1;
        }

        Ok(UserStats {
            total_files: mine.len(),
            total_storage_bytes: mine.iter().map(|r| r.file_size).sum(),
            verifications_of_my_files,
            uploads_last_30d: mine.iter().filter(|r| r.created_at >= cutoff).count(),
            file_types,
        })
    }

    pub fn security(&self) -> StorageResult<SecurityMetrics> {
        let trail = AuditTrail::new(self.db);
        let verifications = VerificationStore::new(self.db);

        let entries = trail.all()?;
        let events = verifications.all()?;
        let successful = events.iter().filter(|e| e.verified).count();

        Ok(SecurityMetrics {
            verification_success_rate: percent(successful, events.len()),
            failed_verifications: events.iter().filter(|e| !e.verified).count(),
            linked_verifications: events.iter().filter(|e| e.file_record_id.is_some()).count(),
            login_successes: entries.iter().filter(|e| e.action == "login_success").count(),
            login_failures: entries.iter().filter(|e| e.action == "login_failed").count(),
            total_audit_entries: entries.len(),
        })
    }
}
