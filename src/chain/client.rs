// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Ethereum JSON-RPC client over an alloy HTTP provider.
//!
//! Every RPC call is wrapped in a bounded timeout; a slow or unreachable
//! node surfaces as [`ChainError::Timeout`] rather than hanging the
//! request. The server never signs or submits transactions.

use std::future::IntoFuture;
use std::str::FromStr;
use std::time::Duration;

use alloy::{
    consensus::Transaction as _,
    network::Ethereum,
    primitives::{Address, Bytes, TxKind, B256},
    providers::{Provider, RootProvider},
    rpc::types::{BlockNumberOrTag, TransactionInput, TransactionRequest},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config;

/// Intrinsic transaction cost plus calldata cost per non-zero byte.
const BASE_TX_GAS: u64 = 21_000;
const CALLDATA_GAS_PER_BYTE: u64 = 16;

/// Blocks sampled when computing the average block time.
const BLOCK_TIME_SAMPLE: u64 = 10;

/// HTTP provider without fillers; this client only reads.
type HttpProvider = RootProvider<Ethereum>;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC call timed out")]
    Timeout,
}

/// A transaction merged with its receipt, when mined.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionDetails {
    pub hash: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub value_wei: String,
    pub gas_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    pub nonce: u64,
    pub input_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Receipt status; None while pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
}

/// Gas estimate for registering a content hash on chain.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GasEstimate {
    pub gas: u64,
    pub gas_price_wei: String,
    pub estimated_cost_wei: String,
    /// True when the node simulated the call; false for the intrinsic
    /// fallback used when no contract is configured.
    pub simulated: bool,
}

/// Point-in-time view of the connected network.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NetworkSnapshot {
    pub chain_id: u64,
    pub latest_block: u64,
    pub gas_price_wei: String,
    pub gas_price_gwei: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_block_time_secs: Option<f64>,
    /// gas_used / gas_limit of the latest block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_utilization: Option<f64>,
}

/// Result of a contract bytecode check.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContractCode {
    pub address: String,
    pub has_code: bool,
    pub code_size: usize,
}

/// Read-only Ethereum client.
#[derive(Debug)]
pub struct ChainClient {
    provider: HttpProvider,
    rpc_url: String,
}

impl ChainClient {
    pub fn new(rpc_url: &str) -> Result<Self, ChainError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;
        let provider = RootProvider::new_http(url);
        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        bounded(self.provider.get_chain_id()).await
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        bounded(self.provider.get_block_number()).await
    }

    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        bounded(self.provider.get_gas_price()).await
    }

    /// Fetch a transaction and, when mined, its receipt.
    pub async fn transaction(&self, hash: &str) -> Result<Option<TransactionDetails>, ChainError> {
        let hash = parse_tx_hash(hash)?;

        let Some(tx) = bounded(self.provider.get_transaction_by_hash(hash)).await? else {
            return Ok(None);
        };
        let receipt = bounded(self.provider.get_transaction_receipt(hash)).await?;

        Ok(Some(TransactionDetails {
            hash: format!("{hash:#x}"),
            from: format!("{:#x}", tx.inner.signer()),
            to: tx.inner.to().map(|a| format!("{a:#x}")),
            value_wei: tx.inner.value().to_string(),
            gas_limit: tx.inner.gas_limit(),
            gas_used: receipt.as_ref().map(|r| r.gas_used),
            nonce: tx.inner.nonce(),
            input_bytes: tx.inner.input().len(),
            block_number: tx
                .block_number
                .or_else(|| receipt.as_ref().and_then(|r| r.block_number)),
            status: receipt.as_ref().map(|r| r.status()),
        }))
    }

    /// Estimate the gas cost of anchoring a content hash.
    ///
    /// With a contract configured, the node simulates the call. Without
    /// one, an intrinsic calldata estimate is returned instead.
    pub async fn estimate_registration(
        &self,
        contract_address: Option<&str>,
        payload: &[u8],
    ) -> Result<GasEstimate, ChainError> {
        let gas_price = self.gas_price().await?;

        let (gas, simulated) = match contract_address {
            Some(address) => {
                let to = parse_address(address)?;
                let tx = TransactionRequest {
                    to: Some(TxKind::Call(to)),
                    input: TransactionInput::new(Bytes::copy_from_slice(payload)),
                    ..Default::default()
                };
                (bounded(self.provider.estimate_gas(tx)).await?, true)
            }
            None => (intrinsic_gas(payload.len()), false),
        };

        Ok(GasEstimate {
            gas,
            gas_price_wei: gas_price.to_string(),
            estimated_cost_wei: (gas as u128 * gas_price).to_string(),
            simulated,
        })
    }

    /// Latest block, gas price and derived block-time/utilization stats.
    pub async fn snapshot(&self) -> Result<NetworkSnapshot, ChainError> {
        let chain_id = self.chain_id().await?;
        let latest = self.block_number().await?;
        let gas_price = self.gas_price().await?;

        let latest_block =
            bounded(self.provider.get_block_by_number(BlockNumberOrTag::Number(latest))).await?;

        let mut average_block_time_secs = None;
        let mut gas_utilization = None;
        if let Some(ref block) = latest_block {
            if block.header.gas_limit > 0 {
                gas_utilization =
                    Some(block.header.gas_used as f64 / block.header.gas_limit as f64);
            }
            if latest >= BLOCK_TIME_SAMPLE {
                let earlier = bounded(
                    self.provider
                        .get_block_by_number(BlockNumberOrTag::Number(latest - BLOCK_TIME_SAMPLE)),
                )
                .await?;
                if let Some(earlier) = earlier {
                    let span = block.header.timestamp.saturating_sub(earlier.header.timestamp);
                    average_block_time_secs = Some(span as f64 / BLOCK_TIME_SAMPLE as f64);
                }
            }
        }

        Ok(NetworkSnapshot {
            chain_id,
            latest_block: latest,
            gas_price_wei: gas_price.to_string(),
            gas_price_gwei: wei_to_gwei(gas_price),
            average_block_time_secs,
            gas_utilization,
        })
    }

    /// Check whether an address carries contract bytecode.
    pub async fn contract_code(&self, address: &str) -> Result<ContractCode, ChainError> {
        let addr = parse_address(address)?;
        let code = bounded(self.provider.get_code_at(addr)).await?;
        Ok(ContractCode {
            address: format!("{addr:#x}"),
            has_code: !code.is_empty(),
            code_size: code.len(),
        })
    }

    /// Ether balance of an address, in wei.
    pub async fn balance(&self, address: &str) -> Result<String, ChainError> {
        let addr = parse_address(address)?;
        let balance = bounded(self.provider.get_balance(addr)).await?;
        Ok(balance.to_string())
    }
}

/// Apply the RPC timeout and flatten transport errors.
///
/// Accepts `IntoFuture` so alloy's call builders can be passed directly.
async fn bounded<T, E, F>(fut: F) -> Result<T, ChainError>
where
    E: std::fmt::Display,
    F: IntoFuture<Output = Result<T, E>>,
{
    match tokio::time::timeout(
        Duration::from_secs(config::CHAIN_RPC_TIMEOUT_SECS),
        fut.into_future(),
    )
    .await
    {
        Ok(result) => result.map_err(|e| ChainError::Rpc(e.to_string())),
        Err(_) => Err(ChainError::Timeout),
    }
}

fn parse_address(address: &str) -> Result<Address, ChainError> {
    Address::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
}

fn parse_tx_hash(hash: &str) -> Result<B256, ChainError> {
    B256::from_str(hash).map_err(|e| ChainError::InvalidHash(e.to_string()))
}

fn intrinsic_gas(payload_len: usize) -> u64 {
    BASE_TX_GAS + CALLDATA_GAS_PER_BYTE * payload_len as u64
}

fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1e9
}
