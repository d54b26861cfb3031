// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Account registration, login and profile management.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::extract::Json;
use crate::{
    auth::{hash_password, verify_password, AdminOnly, Auth, TokenPair},
    auth::claims::TokenUse,
    error::ApiError,
    models::{Details, WalletAddress},
    state::AppState,
    storage::{AuditLogEntry, AuditTrail, StoredUser, UserProfile, UserRepository},
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UsersQuery {
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

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListEntry {
    #[serde(flatten)]
    pub user: UserProfile,
    pub file_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserListEntry>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
    pub per_page: usize,
}

fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let ua = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    (ip, ua)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    let valid = email.contains('@')
        && email.rsplit_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid email address"))
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Create an account and sign the first session in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, body = SessionResponse),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email or wallet already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    if request.username.trim().is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    validate_email(&request.email)?;
    validate_password(&request.password)?;

    let user = StoredUser::new(
        request.username.trim().to_string(),
        request.email.trim().to_string(),
        hash_password(&request.password)?,
        request
            .wallet_address
            .filter(|w| !w.trim().is_empty())
            .map(WalletAddress),
    );

    let repo = UserRepository::new(&state.db);
    repo.create(&user)?;

    let (ip, ua) = client_meta(&headers);
    AuditTrail::new(&state.db).record_best_effort(
        &AuditLogEntry::new("user_registered")
            .with_actor(&user.id)
            .with_resource("user", &user.id)
            .with_details(Details::new().with("email", serde_json::json!(user.email)))
            .with_client(ip.as_deref(), ua.as_deref()),
    );

    let tokens = state.tokens.issue_pair(&user.id, user.is_admin)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user.profile(),
            tokens,
        }),
    ))
}

/// Exchange credentials for a token pair.
///
/// Failed attempts land in the audit trail with their reason; the caller
/// only ever sees a uniform rejection.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 403, description = "Account deactivated")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let repo = UserRepository::new(&state.db);
    let trail = AuditTrail::new(&state.db);
    let (ip, ua) = client_meta(&headers);

    let audit_failure = |reason: &str, actor: Option<&str>| {
        let mut entry = AuditLogEntry::new("login_failed")
            .with_details(
                Details::new()
                    .with("email", serde_json::json!(request.email.to_lowercase()))
                    .with("reason", serde_json::json!(reason)),
            )
            .with_client(ip.as_deref(), ua.as_deref());
        if let Some(actor) = actor {
            entry = entry.with_actor(actor);
        }
        trail.record_best_effort(&entry);
    };

    let Some(mut user) = repo.by_email(&request.email)? else {
        audit_failure("unknown_email", None);
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    if !verify_password(&request.password, &user.password_hash) {
        audit_failure("wrong_password", Some(&user.id));
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.is_active {
        audit_failure("account_deactivated", Some(&user.id));
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    user.last_login = Some(Utc::now());
    repo.update(&user)?;

    trail.record_best_effort(
        &AuditLogEntry::new("login_success")
            .with_actor(&user.id)
            .with_client(ip.as_deref(), ua.as_deref()),
    );

    let tokens = state.tokens.issue_pair(&user.id, user.is_admin)?;
    Ok(Json(SessionResponse {
        user: user.profile(),
        tokens,
    }))
}

/// Mint a fresh access token from a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses((status = 200, body = RefreshResponse), (status = 401))
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let claims = state.tokens.verify(&request.refresh_token, TokenUse::Refresh)?;

    let repo = UserRepository::new(&state.db);
    let user = repo
        .get(&claims.sub)?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Account no longer valid"))?;

    let pair = state.tokens.issue_pair(&user.id, user.is_admin)?;
    Ok(Json(RefreshResponse {
        access_token: pair.access_token,
        token_type: pair.token_type,
        expires_in: pair.expires_in,
    }))
}

/// The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses((status = 200, body = UserProfile), (status = 401))
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let repo = UserRepository::new(&state.db);
    let stored = repo
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::unauthorized("Account no longer valid"))?;
    Ok(Json(stored.profile()))
}

/// Update username or wallet address.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileUpdateRequest,
    tag = "Auth",
    responses(
        (status = 200, body = UserProfile),
        (status = 409, description = "Wallet already registered")
    )
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let repo = UserRepository::new(&state.db);
    let mut stored = repo
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::unauthorized("Account no longer valid"))?;

    let mut changed = Vec::new();
    if let Some(username) = request.username {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(ApiError::validation("username must not be empty"));
        }
        stored.username = username;
        changed.push("username");
    }
    if let Some(wallet) = request.wallet_address {
        let wallet = wallet.trim().to_lowercase();
        stored.wallet_address = if wallet.is_empty() {
            None
        } else {
            Some(WalletAddress(wallet))
        };
        changed.push("wallet_address");
    }
    if changed.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }

    stored.updated_at = Utc::now();
    repo.update(&stored)?;

    let (ip, ua) = client_meta(&headers);
    AuditTrail::new(&state.db).record_best_effort(
        &AuditLogEntry::new("profile_updated")
            .with_actor(&stored.id)
            .with_resource("user", &stored.id)
            .with_details(Details::new().with("fields", serde_json::json!(changed)))
            .with_client(ip.as_deref(), ua.as_deref()),
    );

    Ok(Json(stored.profile()))
}

/// Rotate the account password.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = UserRepository::new(&state.db);
    let trail = AuditTrail::new(&state.db);
    let (ip, ua) = client_meta(&headers);

    let mut stored = repo
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::unauthorized("Account no longer valid"))?;

    if !verify_password(&request.current_password, &stored.password_hash) {
        trail.record_best_effort(
            &AuditLogEntry::new("password_change_failed")
                .with_actor(&stored.id)
                .with_details(
                    Details::new().with("reason", serde_json::json!("wrong_current_password")),
                )
                .with_client(ip.as_deref(), ua.as_deref()),
        );
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }
    validate_password(&request.new_password)?;

    stored.password_hash = hash_password(&request.new_password)?;
    stored.updated_at = Utc::now();
    repo.update(&stored)?;

    trail.record_best_effort(
        &AuditLogEntry::new("password_changed")
            .with_actor(&stored.id)
            .with_client(ip.as_deref(), ua.as_deref()),
    );

    Ok(Json(serde_json::json!({ "message": "Password changed" })))
}

/// Record the logout. Tokens are stateless, so this is audit-only.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200))
)]
pub async fn logout(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (ip, ua) = client_meta(&headers);
    AuditTrail::new(&state.db).record_best_effort(
        &AuditLogEntry::new("logout")
            .with_actor(&user.user_id)
            .with_client(ip.as_deref(), ua.as_deref()),
    );
    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

/// Admin-only account listing with per-user file counts.
#[utoipa::path(
    get,
    path = "/api/auth/users",
    params(UsersQuery),
    tag = "Auth",
    responses((status = 200, body = UserListResponse), (status = 403))
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let repo = UserRepository::new(&state.db);
    let mut users = repo.list()?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let file_counts = repo.file_counts()?;

    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, crate::storage::registry::MAX_PAGE_SIZE);
    let total = users.len();
    let pages = total.div_ceil(per_page);

    let users = users
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|u| UserListEntry {
            file_count: file_counts.get(&u.id).copied().unwrap_or(0),
            user: u.profile(),
        })
        .collect();

    Ok(Json(UserListResponse {
        users,
        total,
        pages,
        current_page: page,
        per_page,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            wallet_address: Some("0xAbCd".to_string()),
        }
    }

    async fn registered(state: &AppState, email: &str) -> SessionResponse {
        let (_, Json(session)) = register(
            State(state.clone()),
            HeaderMap::new(),
            Json(register_request(email)),
        )
        .await
        .expect("registration succeeds");
        session
    }

    #[tokio::test]
    async fn register_creates_account_and_session() {
        let (state, _dir) = test_state();
        let session = registered(&state, "alice@example.com").await;

        assert_eq!(session.user.email, "alice@example.com");
        assert!(!session.tokens.access_token.is_empty());

        // The access token works against the verifier
        let claims = state
            .tokens
            .verify(&session.tokens.access_token, TokenUse::Access)
            .unwrap();
        assert_eq!(claims.sub, session.user.id);

        let counts = AuditTrail::new(&state.db).action_counts().unwrap();
        assert_eq!(counts.get("user_registered"), Some(&1));
    }

    #[tokio::test]
    async fn register_rejects_bad_email_and_short_password() {
        let (state, _dir) = test_state();

        let mut bad_email = register_request("not-an-email");
        bad_email.wallet_address = None;
        let err = register(State(state.clone()), HeaderMap::new(), Json(bad_email))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "validation_error");

        let mut short = register_request("ok@example.com");
        short.password = "short".to_string();
        let err = register(State(state), HeaderMap::new(), Json(short))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "validation_error");
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (state, _dir) = test_state();
        registered(&state, "alice@example.com").await;

        let mut second = register_request("ALICE@example.com");
        second.wallet_address = Some("0xother".to_string());
        let err = register(State(state), HeaderMap::new(), Json(second))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.kind, "conflict");
    }

    #[tokio::test]
    async fn login_round_trip_and_failed_attempts_are_audited() {
        let (state, _dir) = test_state();
        registered(&state, "alice@example.com").await;

        let Json(session) = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "Alice@Example.com".to_string(),
                password: "hunter2hunter2".to_string(),
            }),
        )
        .await
        .expect("login succeeds");
        assert!(session.user.last_login.is_some());

        let err = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "wrong password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let counts = AuditTrail::new(&state.db).action_counts().unwrap();
        assert_eq!(counts.get("login_success"), Some(&1));
        assert_eq!(counts.get("login_failed"), Some(&1));
    }

    #[tokio::test]
    async fn login_failure_does_not_reveal_which_part_was_wrong() {
        let (state, _dir) = test_state();
        registered(&state, "alice@example.com").await;

        let unknown = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
            }),
        )
        .await
        .unwrap_err();
        let wrong = login(
            State(state),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "wrong password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(unknown.message, wrong.message);
    }

    #[tokio::test]
    async fn refresh_rotates_the_access_token() {
        let (state, _dir) = test_state();
        let session = registered(&state, "alice@example.com").await;

        let Json(response) = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: session.tokens.refresh_token.clone(),
            }),
        )
        .await
        .expect("refresh succeeds");

        let claims = state
            .tokens
            .verify(&response.access_token, TokenUse::Access)
            .unwrap();
        assert_eq!(claims.sub, session.user.id);

        // An access token cannot be used to refresh
        let err = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: session.tokens.access_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let (state, _dir) = test_state();
        let session = registered(&state, "alice@example.com").await;
        let auth = Auth(crate::auth::AuthenticatedUser {
            user_id: session.user.id.clone(),
            is_admin: false,
            expires_at: 0,
        });

        let err = change_password(
            Auth(auth.0.clone()),
            State(state.clone()),
            HeaderMap::new(),
            Json(ChangePasswordRequest {
                current_password: "wrong".to_string(),
                new_password: "new password 123".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        change_password(
            auth,
            State(state.clone()),
            HeaderMap::new(),
            Json(ChangePasswordRequest {
                current_password: "hunter2hunter2".to_string(),
                new_password: "new password 123".to_string(),
            }),
        )
        .await
        .expect("password change succeeds");

        // Old password no longer works
        let err = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let counts = AuditTrail::new(&state.db).action_counts().unwrap();
        assert_eq!(counts.get("password_changed"), Some(&1));
        assert_eq!(counts.get("password_change_failed"), Some(&1));
    }

    #[tokio::test]
    async fn profile_update_enforces_wallet_uniqueness() {
        let (state, _dir) = test_state();
        let alice = registered(&state, "alice@example.com").await;
        let (_, Json(bob)) = register(
            State(state.clone()),
            HeaderMap::new(),
            Json(RegisterRequest {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "hunter2hunter2".to_string(),
                wallet_address: Some("0xB0B0".to_string()),
            }),
        )
        .await
        .unwrap();

        let err = update_profile(
            Auth(crate::auth::AuthenticatedUser {
                user_id: bob.user.id,
                is_admin: false,
                expires_at: 0,
            }),
            State(state),
            HeaderMap::new(),
            Json(ProfileUpdateRequest {
                username: None,
                wallet_address: Some(alice.user.wallet_address.unwrap().0),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn user_listing_is_admin_only_data() {
        let (state, _dir) = test_state();
        registered(&state, "alice@example.com").await;

        let Json(listing) = list_users(
            AdminOnly(crate::auth::AuthenticatedUser {
                user_id: "admin".to_string(),
                is_admin: true,
                expires_at: 0,
            }),
            State(state),
            Query(UsersQuery {
                page: 1,
                per_page: 20,
            }),
        )
        .await
        .unwrap();

        assert_eq!(listing.total, 1);
        assert_eq!(listing.users[0].file_count, 0);
    }
}
