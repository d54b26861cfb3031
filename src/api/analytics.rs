// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Aggregated analytics and the audit query surface.
//!
//! Everything here is computed on demand from the storage tables; there
//! are no running counters to drift out of sync.

use axum::extract::{Query, State};
use axum::http::header;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::extract::Json;
use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{
        stats::{BlockchainStats, OverviewStats, SecurityMetrics, TrendRange, TrendStats, UserStats},
        AuditPage, AuditQuery, AuditTrail, StatsAggregator,
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TrendsQuery {
    /// One of `24h`, `7d`, `30d`, `90d`. Defaults to `7d`.
    #[serde(default)]
    pub range: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLogsQuery {
    /// Admin-only filter; other callers are pinned to themselves.
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Substring search over action, resource id and details.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

/// Registry-wide headline numbers.
#[utoipa::path(
    get,
    path = "/api/analytics/overview",
    tag = "Analytics",
    responses((status = 200, body = OverviewStats), (status = 401))
)]
pub async fn overview(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<OverviewStats>, ApiError> {
    Ok(Json(StatsAggregator::new(&state.db).overview()?))
}

/// Upload and verification activity over a trailing window.
#[utoipa::path(
    get,
    path = "/api/analytics/trends",
    params(TrendsQuery),
    tag = "Analytics",
    responses((status = 200, body = TrendStats), (status = 401))
)]
pub async fn trends(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendStats>, ApiError> {
    let range = TrendRange::parse(query.range.as_deref().unwrap_or("7d"));
    Ok(Json(StatsAggregator::new(&state.db).trends(range)?))
}

/// Gas and block spread across anchored records.
#[utoipa::path(
    get,
    path = "/api/analytics/blockchain-stats",
    tag = "Analytics",
    responses((status = 200, body = BlockchainStats), (status = 401))
)]
pub async fn blockchain_stats(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<BlockchainStats>, ApiError> {
    Ok(Json(StatsAggregator::new(&state.db).blockchain()?))
}

/// The caller's own dashboard numbers.
#[utoipa::path(
    get,
    path = "/api/analytics/user-stats",
    tag = "Analytics",
    responses((status = 200, body = UserStats), (status = 401))
)]
pub async fn user_stats(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(StatsAggregator::new(&state.db).user_stats(&user.user_id)?))
}

/// Verification and login failure counters.
#[utoipa::path(
    get,
    path = "/api/analytics/security-metrics",
    tag = "Analytics",
    responses((status = 200, body = SecurityMetrics), (status = 401))
)]
pub async fn security_metrics(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<SecurityMetrics>, ApiError> {
    Ok(Json(StatsAggregator::new(&state.db).security()?))
}

/// Query the audit trail.
///
/// Non-admin callers only ever see their own entries regardless of the
/// `actor` parameter.
#[utoipa::path(
    get,
    path = "/api/analytics/audit-logs",
    params(AuditLogsQuery),
    tag = "Analytics",
    responses((status = 200, body = AuditPage), (status = 401))
)]
pub async fn audit_logs(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<AuditLogsQuery>,
) -> Result<Json<AuditPage>, ApiError> {
    let actor = if user.is_admin {
        query.actor
    } else {
        Some(user.user_id)
    };

    let page = AuditTrail::new(&state.db).query(&AuditQuery {
        actor_user_id: actor,
        action: query.action,
        resource_type: query.resource_type,
        search: query.q,
        from: query.from,
        to: query.to,
        page: query.page,
        per_page: query.per_page,
    })?;
    Ok(Json(page))
}

/// Entry totals by action, scoped like [`audit_logs`].
#[utoipa::path(
    get,
    path = "/api/analytics/audit-stats",
    tag = "Analytics",
    responses((status = 200), (status = 401))
)]
pub async fn audit_stats(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let trail = AuditTrail::new(&state.db);
    let counts = if user.is_admin {
        trail.action_counts()?
    } else {
        let mut counts = std::collections::BTreeMap::new();
        for entry in trail.all()? {
            if entry.actor_user_id.as_deref() == Some(user.user_id.as_str()) {
                *counts.entry(entry.action).or_insert(0) += 1;
            }
        }
        counts
    };
    let total: usize = counts.values().sum();
    Ok(Json(serde_json::json!({
        "total": total,
        "by_action": counts,
    })))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Output format; only `json` is supported.
    #[serde(default, rename = "type")]
    pub format: Option<String>,
    /// Trend window for the activity section, same values as
    /// [`TrendsQuery::range`].
    #[serde(default)]
    pub date_range: Option<String>,
    /// Sections to include: `overview`, `blockchain`, `security`,
    /// `activity`. Empty means all of them.
    #[serde(default)]
    pub include: Vec<String>,
}

fn section_wanted(include: &[String], name: &str) -> bool {
    include.is_empty() || include.iter().any(|s| s == name)
}

fn to_section<T: serde::Serialize>(value: T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::storage_fault(e.to_string()))
}

/// Assemble a downloadable report from the on-demand aggregates.
#[utoipa::path(
    post,
    path = "/api/analytics/export",
    request_body = ExportRequest,
    tag = "Analytics",
    responses(
        (status = 200, description = "JSON report, served as an attachment"),
        (status = 400, description = "Unsupported format"),
        (status = 401)
    )
)]
pub async fn export(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<([(header::HeaderName, String); 1], Json<serde_json::Value>), ApiError> {
    match request.format.as_deref() {
        None | Some("json") => {}
        Some(other) => {
            return Err(ApiError::validation(format!(
                "Unsupported export format: {other}"
            )))
        }
    }

    let aggregator = StatsAggregator::new(&state.db);
    let mut report = serde_json::Map::new();
    report.insert(
        "export_id".to_string(),
        serde_json::json!(uuid::Uuid::new_v4().to_string()),
    );
    report.insert("generated_at".to_string(), serde_json::json!(Utc::now()));
    report.insert("generated_by".to_string(), serde_json::json!(user.user_id));

    if section_wanted(&request.include, "overview") {
        report.insert("overview".to_string(), to_section(aggregator.overview()?)?);
    }
    if section_wanted(&request.include, "blockchain") {
        report.insert(
            "blockchain".to_string(),
            to_section(aggregator.blockchain()?)?,
        );
    }
    if section_wanted(&request.include, "security") {
        report.insert("security".to_string(), to_section(aggregator.security()?)?);
    }
    if section_wanted(&request.include, "activity") {
        let range = TrendRange::parse(request.date_range.as_deref().unwrap_or("30d"));
        report.insert(
            "activity".to_string(),
            to_section(aggregator.trends(range)?)?,
        );
    }

    let filename = format!(
        "fileproof-report-{}.json",
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )],
        Json(serde_json::Value::Object(report)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::models::{Details, FileHash, WalletAddress};
    use crate::state::test_support::test_state;
    use crate::storage::{AuditLogEntry, FileRecord, HashRegistry};

    fn caller(user_id: &str, is_admin: bool) -> Auth {
        Auth(AuthenticatedUser {
            user_id: user_id.to_string(),
            is_admin,
            expires_at: 0,
        })
    }

    fn seed_record(state: &AppState, owner: &str, hash: &str) {
        let record = FileRecord::new(
            "report.pdf".to_string(),
            FileHash::normalize(hash),
            1024,
            "application/pdf".to_string(),
            WalletAddress::from("0xabc"),
            Some(owner.to_string()),
        );
        HashRegistry::new(&state.db).insert(&record).unwrap();
    }

    #[tokio::test]
    async fn overview_counts_seeded_files() {
        let (state, _dir) = test_state();
        seed_record(&state, "u1", "aa11");
        seed_record(&state, "u1", "bb22");

        let Json(stats) = overview(caller("u1", false), State(state)).await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.recent_files, 2);
    }

    #[tokio::test]
    async fn trends_accepts_the_range_parameter() {
        let (state, _dir) = test_state();
        seed_record(&state, "u1", "aa11");

        let Json(stats) = trends(
            caller("u1", false),
            State(state),
            Query(TrendsQuery {
                range: Some("24h".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(stats.range, "24h");
        // Hour-bucketed for the 24h window
        assert_eq!(stats.upload_trend.len(), 24);
    }

    #[tokio::test]
    async fn audit_logs_pin_non_admins_to_themselves() {
        let (state, _dir) = test_state();
        let trail = AuditTrail::new(&state.db);
        trail
            .record(&AuditLogEntry::new("file_uploaded").with_actor("u1"))
            .unwrap();
        trail
            .record(&AuditLogEntry::new("file_uploaded").with_actor("u2"))
            .unwrap();

        let query = || AuditLogsQuery {
            actor: Some("u2".to_string()),
            action: None,
            resource_type: None,
            q: None,
            from: None,
            to: None,
            page: 1,
            per_page: 20,
        };

        // u1 asks for u2's entries and gets their own instead
        let Json(page) = audit_logs(caller("u1", false), State(state.clone()), Query(query()))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.logs[0].actor_user_id.as_deref(), Some("u1"));

        // An admin can target any actor
        let Json(page) = audit_logs(caller("admin", true), State(state), Query(query()))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.logs[0].actor_user_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn export_builds_a_named_attachment_with_all_sections() {
        let (state, _dir) = test_state();
        seed_record(&state, "u1", "aa11");

        let ([(name, value)], Json(report)) =
            export(caller("u1", false), State(state), Json(ExportRequest::default()))
                .await
                .unwrap();
        assert_eq!(name, header::CONTENT_DISPOSITION);
        assert!(value.starts_with("attachment; filename=\"fileproof-report-"));

        assert!(report["export_id"].is_string());
        assert!(report["generated_at"].is_string());
        assert_eq!(report["generated_by"], "u1");
        assert_eq!(report["overview"]["total_files"], 1);
        assert!(report["blockchain"].is_object());
        assert!(report["security"].is_object());
        // Default window is 30 days, day-bucketed
        assert_eq!(report["activity"]["range"], "30d");
    }

    #[tokio::test]
    async fn export_honours_the_include_list_and_rejects_unknown_formats() {
        let (state, _dir) = test_state();

        let (_, Json(report)) = export(
            caller("u1", false),
            State(state.clone()),
            Json(ExportRequest {
                format: Some("json".to_string()),
                date_range: None,
                include: vec!["overview".to_string()],
            }),
        )
        .await
        .unwrap();
        assert!(report.get("overview").is_some());
        assert!(report.get("blockchain").is_none());
        assert!(report.get("activity").is_none());

        let err = export(
            caller("u1", false),
            State(state),
            Json(ExportRequest {
                format: Some("csv".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, "validation_error");
    }

    #[tokio::test]
    async fn audit_stats_are_role_scoped() {
        let (state, _dir) = test_state();
        let trail = AuditTrail::new(&state.db);
        trail
            .record(&AuditLogEntry::new("login_success").with_actor("u1"))
            .unwrap();
        trail
            .record(
                &AuditLogEntry::new("file_deleted")
                    .with_actor("u2")
                    .with_details(Details::new().with("file_name", serde_json::json!("x.txt"))),
            )
            .unwrap();

        let Json(mine) = audit_stats(caller("u1", false), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(mine["total"], 1);
        assert_eq!(mine["by_action"]["login_success"], 1);

        let Json(all) = audit_stats(caller("admin", true), State(state)).await.unwrap();
        assert_eq!(all["total"], 2);
    }
}
