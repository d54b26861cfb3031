// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! File registration, verification, listing and deletion.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    models::{Details, FileHash, WalletAddress},
    state::AppState,
    storage::{
        registry::RegistryFilter, AuditLogEntry, AuditTrail, FileRecord, HashRegistry, RecordPage,
        StatsAggregator, UploadStatus, UserRepository, VerificationEvent, VerificationStore,
    },
};
use super::extract::Json;
use crate::auth::{Auth, OptionalAuth};
use crate::storage::stats::UserStats;
use crate::storage::verification::VerificationMethod;

/// File extensions accepted by the two-phase upload.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip",
    "mp3", "mp4", "avi", "mov",
];

/// Verification events shown on the record detail view.
const DETAIL_EVENT_LIMIT: usize = 10;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub file_hash: String,
    pub file_size: u64,
    pub transaction_hash: String,
    #[serde(default)]
    pub ipfs_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub gas_used: Option<u64>,
    pub wallet_address: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpfsUploadResponse {
    pub ipfs_hash: String,
    pub file_hash: String,
    pub file_size: u64,
    pub file_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub exists: bool,
    pub file_hash: String,
    pub verification_time: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_address: Option<WalletAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileDetailResponse {
    #[serde(flatten)]
    pub record: FileRecord,
    pub verifications: Vec<VerificationEvent>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
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

/// Client metadata recorded on uploads and verifications.
fn client_details(headers: &HeaderMap, method: &str) -> (Option<String>, Option<String>, Details) {
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut details = Details::new().with("upload_method", serde_json::json!(method));
    if let Some(ref ip) = client_ip {
        details = details.with("client_ip", serde_json::json!(ip));
    }
    if let Some(ref ua) = user_agent {
        details = details.with("user_agent", serde_json::json!(ua));
    }
    (client_ip, user_agent, details)
}

fn parse_status(raw: Option<&str>) -> Result<Option<UploadStatus>, ApiError> {
    match raw {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => UploadStatus::parse(value)
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("Unknown status filter: {value}"))),
    }
}

/// Commit file metadata to the registry after the client anchored the
/// hash on chain.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    request_body = UploadRequest,
    tag = "Files",
    responses(
        (status = 201, body = FileRecord),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Hash already registered")
    )
)]
pub async fn upload(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    if request.file_name.trim().is_empty() {
        return Err(ApiError::validation("fileName is required"));
    }
    if request.transaction_hash.trim().is_empty() {
        return Err(ApiError::validation("transactionHash is required"));
    }
    if request.wallet_address.trim().is_empty() {
        return Err(ApiError::validation("walletAddress is required"));
    }
    let hash = FileHash::normalize(&request.file_hash);
    if hash.is_empty() {
        return Err(ApiError::validation("fileHash is required"));
    }

    let file_type = mime_guess::from_path(&request.file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let (client_ip, user_agent, details) = client_details(&headers, "metadata");

    let mut record = FileRecord::new(
        request.file_name,
        hash,
        request.file_size,
        file_type,
        WalletAddress(request.wallet_address),
        Some(user.user_id.clone()),
    )
    .with_chain_refs(
        request.ipfs_hash,
        Some(request.transaction_hash),
        request.block_number,
        request.gas_used,
    )
    .with_metadata(details);
    record.mark_uploaded();

    let registry = HashRegistry::new(&state.db);
    registry.insert(&record)?;

    let trail = AuditTrail::new(&state.db);
    trail.record_best_effort(
        &AuditLogEntry::new("file_uploaded")
            .with_actor(&user.user_id)
            .with_resource("file_record", &record.id)
            .with_details(
                Details::new()
                    .with("file_name", serde_json::json!(record.file_name))
                    .with("file_hash", serde_json::json!(record.file_hash.as_str()))
                    .with(
                        "transaction_hash",
                        serde_json::json!(record.transaction_hash),
                    ),
            )
            .with_client(client_ip.as_deref(), user_agent.as_deref()),
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// Push file bytes to IPFS and hash them server-side. Nothing is
/// persisted; the client follows up with the metadata commit.
#[utoipa::path(
    post,
    path = "/api/files/upload-ipfs",
    tag = "Files",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, body = IpfsUploadResponse),
        (status = 400, description = "Missing file or disallowed extension"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 503, description = "IPFS node unavailable")
    )
)]
pub async fn upload_ipfs(
    Auth(_user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IpfsUploadResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .map(String::from)
                .ok_or_else(|| ApiError::validation("File part needs a filename"))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read file: {e}")))?;
            file = Some((file_name, bytes.to_vec()));
        }
    }
    let (file_name, content) =
        file.ok_or_else(|| ApiError::validation("Multipart field 'file' is required"))?;

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    if !extension.as_deref().is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext)) {
        return Err(ApiError::validation(format!(
            "File type not allowed: {file_name}"
        )));
    }
    if content.len() > state.max_upload_bytes {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds the {} byte limit",
            state.max_upload_bytes
        )));
    }

    let file_hash = format!("{:x}", Sha256::digest(&content));
    let file_size = content.len() as u64;
    let added = state.ipfs.add(&file_name, content).await?;

    Ok(Json(IpfsUploadResponse {
        ipfs_hash: added.hash,
        file_hash,
        file_size,
        file_name,
    }))
}

/// Check a content hash against the registry. Public; every attempt is
/// recorded as a verification event, hits and misses alike.
#[utoipa::path(
    get,
    path = "/api/files/verify/{hash}",
    params(("hash" = String, Path, description = "Content hash, 0x prefix optional")),
    tag = "Files",
    responses((status = 200, body = VerifyResponse))
)]
pub async fn verify(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let hash = FileHash::normalize(&hash);
    if hash.is_empty() {
        return Err(ApiError::validation("Hash must not be empty"));
    }

    let registry = HashRegistry::new(&state.db);
    let record = registry.lookup(&hash)?;

    let response = match &record {
        Some(record) => VerifyResponse {
            exists: true,
            file_hash: hash.as_str().to_string(),
            verification_time: Utc::now(),
            file_name: Some(record.file_name.clone()),
            file_size: Some(record.file_size),
            upload_time: record.uploaded_at.or(Some(record.created_at)),
            uploader_address: Some(record.wallet_address.clone()),
            transaction_hash: record.transaction_hash.clone(),
            block_number: record.block_number,
            ipfs_hash: record.ipfs_hash.clone(),
        },
        None => VerifyResponse {
            exists: false,
            file_hash: hash.as_str().to_string(),
            verification_time: Utc::now(),
            file_name: None,
            file_size: None,
            upload_time: None,
            uploader_address: None,
            transaction_hash: None,
            block_number: None,
            ipfs_hash: None,
        },
    };

    let (client_ip, _, _) = client_details(&headers, "api");
    let mut event = VerificationEvent::new(
        hash.as_str().to_string(),
        response.exists,
        VerificationMethod::Api,
    )
    .with_details(
        Details::new().with("result", serde_json::to_value(&response).unwrap_or_default()),
    );
    if let Some(record) = &record {
        event = event.with_record(&record.id);
    }
    if let Some(user) = &user {
        event = event.with_actor(&user.user_id);
        if let Some(wallet) = UserRepository::new(&state.db)
            .get(&user.user_id)?
            .and_then(|u| u.wallet_address)
        {
            event = event.with_verifier(wallet);
        }
    }
    if let Some(ip) = &client_ip {
        event = event.with_client_ip(ip);
    }
    VerificationStore::new(&state.db).record(&event)?;

    Ok(Json(response))
}

/// The caller's records, newest first.
#[utoipa::path(
    get,
    path = "/api/files/my-files",
    params(ListQuery),
    tag = "Files",
    responses((status = 200, body = RecordPage))
)]
pub async fn my_files(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let filter = RegistryFilter {
        status: parse_status(query.status.as_deref())?,
        query: None,
        file_type: None,
    };
    let registry = HashRegistry::new(&state.db);
    let page = registry.list_by_owner(&user.user_id, &filter, query.page, query.per_page)?;
    Ok(Json(page))
}

/// Substring search over the caller's file names and hashes.
#[utoipa::path(
    get,
    path = "/api/files/search",
    params(ListQuery),
    tag = "Files",
    responses((status = 200, body = RecordPage))
)]
pub async fn search(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::validation("Query parameter 'q' is required"))?;

    let filter = RegistryFilter {
        status: parse_status(query.status.as_deref())?,
        query: Some(needle.to_string()),
        file_type: None,
    };
    let registry = HashRegistry::new(&state.db);
    let page = registry.list_by_owner(&user.user_id, &filter, query.page, query.per_page)?;
    Ok(Json(page))
}

/// Per-user dashboard counts.
#[utoipa::path(
    get,
    path = "/api/files/stats",
    tag = "Files",
    responses((status = 200, body = UserStats))
)]
pub async fn stats(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = StatsAggregator::new(&state.db).user_stats(&user.user_id)?;
    Ok(Json(stats))
}

/// One record with its latest verification events. Owner-scoped; other
/// users' records are indistinguishable from absent ones.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    params(("id" = String, Path, description = "File record id")),
    tag = "Files",
    responses((status = 200, body = FileDetailResponse), (status = 404))
)]
pub async fn detail(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileDetailResponse>, ApiError> {
    let registry = HashRegistry::new(&state.db);
    let record = registry
        .get(&id)?
        .filter(|r| user.is_admin || r.owner_user_id.as_deref() == Some(user.user_id.as_str()))
        .ok_or_else(|| ApiError::not_found("File record not found"))?;

    let verifications =
        VerificationStore::new(&state.db).list_for_record(&record.id, DETAIL_EVENT_LIMIT)?;

    Ok(Json(FileDetailResponse {
        record,
        verifications,
    }))
}

/// Delete a record's local metadata. Chain and IPFS state is immutable
/// and deliberately untouched.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    params(("id" = String, Path, description = "File record id")),
    tag = "Files",
    responses(
        (status = 200, description = "Deletion confirmation"),
        (status = 404)
    )
)]
pub async fn delete(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let registry = HashRegistry::new(&state.db);
    let record = registry
        .get(&id)?
        .filter(|r| user.is_admin || r.owner_user_id.as_deref() == Some(user.user_id.as_str()))
        .ok_or_else(|| ApiError::not_found("File record not found"))?;

    let removed = registry.delete(&record.id)?;

    let (client_ip, user_agent, _) = client_details(&headers, "delete");
    AuditTrail::new(&state.db).record_best_effort(
        &AuditLogEntry::new("file_deleted")
            .with_actor(&user.user_id)
            .with_resource("file_record", &removed.id)
            .with_details(
                Details::new()
                    .with("file_name", serde_json::json!(removed.file_name))
                    .with("file_hash", serde_json::json!(removed.file_hash.as_str())),
            )
            .with_client(client_ip.as_deref(), user_agent.as_deref()),
    );

    Ok(Json(serde_json::json!({
        "message": "File record deleted successfully",
        "id": removed.id,
    })))
}
