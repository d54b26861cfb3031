// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Read-only Ethereum queries behind the registry.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::extract::Json;
use crate::{
    auth::Auth,
    chain::{ContractCode, NetworkSnapshot, TransactionDetails},
    error::ApiError,
    models::Details,
    state::AppState,
    storage::{AuditLogEntry, AuditTrail},
};

/// Safety margin applied on top of `eth_estimateGas`: one fifth extra.
fn buffered_gas(gas: u64) -> u64 {
    gas + gas / 5
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChainStatus {
    pub connected: bool,
    pub chain_id: u64,
    pub latest_block: u64,
    pub gas_price_wei: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    #[serde(flatten)]
    pub transaction: TransactionDetails,
    /// Blocks mined on top of the transaction's block; absent while
    /// pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GasEstimateRequest {
    /// Content hash to be anchored, fed to the registry call as data.
    pub file_hash: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GasEstimateResponse {
    /// Raw node estimate.
    pub gas: u64,
    /// Estimate with the 20% safety margin applied.
    pub gas_with_buffer: u64,
    pub gas_price_wei: String,
    /// Cost of the buffered estimate at the current gas price.
    pub estimated_cost_wei: String,
    pub simulated: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VerifyContractRequest {
    /// Address to check; defaults to the configured registry contract.
    #[serde(default)]
    pub address: Option<String>,
}

/// Node connectivity, chain id, head block and gas price.
#[utoipa::path(
    get,
    path = "/api/chain/status",
    tag = "Chain",
    responses(
        (status = 200, body = ChainStatus),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<ChainStatus>, ApiError> {
    let chain_id = state.chain.chain_id().await?;
    let latest_block = state.chain.block_number().await?;
    let gas_price = state.chain.gas_price().await?;

    Ok(Json(ChainStatus {
        connected: true,
        chain_id,
        latest_block,
        gas_price_wei: gas_price.to_string(),
    }))
}

/// A transaction with its receipt and confirmation depth.
#[utoipa::path(
    get,
    path = "/api/chain/transaction/{tx_hash}",
    params(("tx_hash" = String, Path, description = "Transaction hash")),
    tag = "Chain",
    responses(
        (status = 200, body = TransactionResponse),
        (status = 404, description = "Unknown transaction"),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn transaction(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction = state
        .chain
        .transaction(&tx_hash)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    let confirmations = match transaction.block_number {
        Some(mined_at) => {
            let latest = state.chain.block_number().await?;
            Some(latest.saturating_sub(mined_at) + 1)
        }
        None => None,
    };

    Ok(Json(TransactionResponse {
        transaction,
        confirmations,
    }))
}

/// Estimate the cost of anchoring a hash, with a 20% safety margin.
#[utoipa::path(
    post,
    path = "/api/chain/gas-estimate",
    request_body = GasEstimateRequest,
    tag = "Chain",
    responses(
        (status = 200, body = GasEstimateResponse),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn gas_estimate(
    State(state): State<AppState>,
    Json(request): Json<GasEstimateRequest>,
) -> Result<Json<GasEstimateResponse>, ApiError> {
    if request.file_hash.trim().is_empty() {
        return Err(ApiError::validation("file_hash is required"));
    }

    let estimate = state
        .chain
        .estimate_registration(
            state.contract_address.as_deref(),
            request.file_hash.trim().as_bytes(),
        )
        .await?;

    let gas_with_buffer = buffered_gas(estimate.gas);
    let gas_price: u128 = estimate.gas_price_wei.parse().unwrap_or(0);

    Ok(Json(GasEstimateResponse {
        gas: estimate.gas,
        gas_with_buffer,
        gas_price_wei: estimate.gas_price_wei,
        estimated_cost_wei: (gas_with_buffer as u128 * gas_price).to_string(),
        simulated: estimate.simulated,
    }))
}

/// Latest block, gas price and short-window block statistics.
#[utoipa::path(
    get,
    path = "/api/chain/network-stats",
    tag = "Chain",
    responses(
        (status = 200, body = NetworkSnapshot),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn network_stats(
    State(state): State<AppState>,
) -> Result<Json<NetworkSnapshot>, ApiError> {
    Ok(Json(state.chain.snapshot().await?))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContractInfo {
    pub address: String,
    /// Whether bytecode exists at the address.
    pub exists: bool,
    pub code_size: usize,
    pub balance_wei: String,
    pub chain_id: u64,
}

/// The configured registry contract: code presence, balance and chain.
#[utoipa::path(
    get,
    path = "/api/chain/contract-info",
    tag = "Chain",
    responses(
        (status = 200, body = ContractInfo),
        (status = 400, description = "No contract address configured"),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn contract_info(State(state): State<AppState>) -> Result<Json<ContractInfo>, ApiError> {
    let address = state
        .contract_address
        .as_deref()
        .ok_or_else(|| ApiError::validation("No contract address configured"))?
        .to_string();

    let code = state.chain.contract_code(&address).await?;
    let balance_wei = state.chain.balance(&address).await?;
    let chain_id = state.chain.chain_id().await?;

    Ok(Json(ContractInfo {
        address: code.address,
        exists: code.has_code,
        code_size: code.code_size,
        balance_wei,
        chain_id,
    }))
}

/// Check that bytecode exists at the registry contract address.
///
/// The result lands in the audit trail either way.
#[utoipa::path(
    post,
    path = "/api/chain/verify-contract",
    request_body = VerifyContractRequest,
    tag = "Chain",
    responses(
        (status = 200, body = ContractCode),
        (status = 400, description = "No address configured or supplied"),
        (status = 503, description = "Node unreachable")
    )
)]
pub async fn verify_contract(
    Auth(user): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyContractRequest>,
) -> Result<Json<ContractCode>, ApiError> {
    let address = request
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .or(state.contract_address.as_deref())
        .ok_or_else(|| ApiError::validation("No contract address configured or supplied"))?
        .to_string();

    let code = state.chain.contract_code(&address).await?;

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    AuditTrail::new(&state.db).record_best_effort(
        &AuditLogEntry::new("contract_verified")
            .with_actor(&user.user_id)
            .with_resource("contract", &code.address)
            .with_details(
                Details::new()
                    .with("has_code", serde_json::json!(code.has_code))
                    .with("code_size", serde_json::json!(code.code_size)),
            )
            .with_client(client_ip, None),
    );

    Ok(Json(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;

    #[test]
    fn buffer_adds_one_fifth() {
        assert_eq!(buffered_gas(100_000), 120_000);
        assert_eq!(buffered_gas(21_000), 25_200);
        assert_eq!(buffered_gas(0), 0);
    }

    #[tokio::test]
    async fn status_maps_unreachable_node_to_503() {
        let (state, _dir) = test_state();
        let err = status(State(state)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind, "upstream_unavailable");
    }

    #[tokio::test]
    async fn transaction_rejects_malformed_hashes() {
        let (state, _dir) = test_state();
        let err = transaction(State(state), Path("not-a-hash".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_contract_requires_an_address() {
        let (state, _dir) = test_state();
        assert!(state.contract_address.is_none());

        let err = verify_contract(
            Auth(AuthenticatedUser {
                user_id: "u1".to_string(),
                is_admin: false,
                expires_at: 0,
            }),
            State(state),
            HeaderMap::new(),
            Json(VerifyContractRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, "validation_error");
    }

    #[tokio::test]
    async fn contract_info_requires_a_configured_address() {
        let (state, _dir) = test_state();
        assert!(state.contract_address.is_none());

        let err = contract_info(State(state)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, "validation_error");
    }

    #[tokio::test]
    async fn gas_estimate_requires_a_hash() {
        let (state, _dir) = test_state();
        let err = gas_estimate(
            State(state),
            Json(GasEstimateRequest {
                file_hash: "  ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, "validation_error");
    }
}
