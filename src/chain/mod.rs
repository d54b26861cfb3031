// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Ethereum JSON-RPC client.

mod client;

pub use client::{
    ChainClient, ChainError, ContractCode, GasEstimate, NetworkSnapshot, TransactionDetails,
};
