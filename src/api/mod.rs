// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{Details, FileHash, WalletAddress},
    state::AppState,
    storage::{
        stats::{
            BlockchainStats, FileTypeCount, HourActivity, OverviewStats, SecurityMetrics,
            TrendStats, UploadBucket, UserStats, VerificationBucket,
        },
        AuditLogEntry, AuditPage, FileRecord, RecordPage, UploadStatus, UserProfile,
        VerificationEvent, VerificationMethod,
    },
};

pub mod analytics;
pub mod auth;
pub mod chain;
pub mod extract;
pub mod files;
pub mod health;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/change-password", post(auth::change_password))
        .route("/logout", post(auth::logout))
        .route("/users", get(auth::list_users));

    let file_routes = Router::new()
        .route("/upload", post(files::upload))
        .route("/upload-ipfs", post(files::upload_ipfs))
        .route("/verify/{hash}", get(files::verify))
        .route("/my-files", get(files::my_files))
        .route("/search", get(files::search))
        .route("/stats", get(files::stats))
        .route("/{id}", get(files::detail).delete(files::delete));

    let analytics_routes = Router::new()
        .route("/overview", get(analytics::overview))
        .route("/trends", get(analytics::trends))
        .route("/blockchain-stats", get(analytics::blockchain_stats))
        .route("/user-stats", get(analytics::user_stats))
        .route("/security-metrics", get(analytics::security_metrics))
        .route("/audit-logs", get(analytics::audit_logs))
        .route("/audit-stats", get(analytics::audit_stats))
        .route("/export", post(analytics::export));

    let chain_routes = Router::new()
        .route("/status", get(chain::status))
        .route("/transaction/{tx_hash}", get(chain::transaction))
        .route("/gas-estimate", post(chain::gas_estimate))
        .route("/network-stats", get(chain::network_stats))
        .route("/contract-info", get(chain::contract_info))
        .route("/verify-contract", post(chain::verify_contract));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/analytics", analytics_routes)
        .nest("/chain", chain_routes);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::refresh,
        auth::me,
        auth::update_profile,
        auth::change_password,
        auth::logout,
        auth::list_users,
        files::upload,
        files::upload_ipfs,
        files::verify,
        files::my_files,
        files::search,
        files::stats,
        files::detail,
        files::delete,
        analytics::overview,
        analytics::trends,
        analytics::blockchain_stats,
        analytics::user_stats,
        analytics::security_metrics,
        analytics::audit_logs,
        analytics::audit_stats,
        analytics::export,
        chain::status,
        chain::transaction,
        chain::gas_estimate,
        chain::network_stats,
        chain::contract_info,
        chain::verify_contract,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            FileHash,
            WalletAddress,
            Details,
            FileRecord,
            RecordPage,
            UploadStatus,
            VerificationEvent,
            VerificationMethod,
            AuditLogEntry,
            AuditPage,
            UserProfile,
            OverviewStats,
            TrendStats,
            UploadBucket,
            VerificationBucket,
            FileTypeCount,
            HourActivity,
            BlockchainStats,
            UserStats,
            SecurityMetrics,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::RefreshRequest,
            auth::SessionResponse,
            auth::RefreshResponse,
            auth::ProfileUpdateRequest,
            auth::ChangePasswordRequest,
            auth::UserListEntry,
            auth::UserListResponse,
            files::UploadRequest,
            files::IpfsUploadResponse,
            files::VerifyResponse,
            files::FileDetailResponse,
            chain::ChainStatus,
            chain::TransactionResponse,
            chain::GasEstimateRequest,
            chain::GasEstimateResponse,
            chain::VerifyContractRequest,
            chain::ContractInfo,
            analytics::ExportRequest,
            crate::chain::TransactionDetails,
            crate::chain::NetworkSnapshot,
            crate::chain::ContractCode,
            crate::auth::TokenPair,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Account registration and sessions"),
        (name = "Files", description = "Hash registration and verification"),
        (name = "Analytics", description = "Aggregated registry statistics"),
        (name = "Chain", description = "Ethereum network queries"),
        (name = "Health", description = "Service health probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[test]
    fn openapi_document_serializes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/files/verify/{hash}"));
        assert!(json.contains("/api/auth/register"));
    }
}
