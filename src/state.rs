// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Shared application state, cloned into every handler.

use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::chain::ChainClient;
use crate::providers::IpfsClient;
use crate::storage::FileDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<FileDatabase>,
    pub tokens: Arc<TokenKeys>,
    pub chain: Arc<ChainClient>,
    pub ipfs: Arc<IpfsClient>,
    /// Configured anchoring contract, if any.
    pub contract_address: Option<String>,
    /// Multipart upload cap, bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: FileDatabase,
        tokens: TokenKeys,
        chain: ChainClient,
        ipfs: IpfsClient,
        contract_address: Option<String>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db: Arc::new(db),
            tokens: Arc::new(tokens),
            chain: Arc::new(chain),
            ipfs: Arc::new(ipfs),
            contract_address,
            max_upload_bytes,
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::config;

    /// State backed by a temp database, a dummy RPC URL and a dummy IPFS
    /// node. Network-touching calls will fail fast; storage and auth are
    /// fully functional.
    pub fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = FileDatabase::open(&dir.path().join("test.redb")).unwrap();
        let state = AppState::new(
            db,
            TokenKeys::from_secret(b"test-secret-not-for-production"),
            ChainClient::new("http://127.0.0.1:1").unwrap(),
            IpfsClient::new("http://127.0.0.1:1").unwrap(),
            None,
            config::DEFAULT_MAX_UPLOAD_BYTES as usize,
        );
        (state, dir)
    }
}
