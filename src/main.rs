// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

use std::{env, net::SocketAddr, path::PathBuf};

use ring::rand::{SecureRandom, SystemRandom};
use tracing_subscriber::EnvFilter;

use fileproof_server::{
    api::router,
    auth::TokenKeys,
    chain::ChainClient,
    config,
    providers::IpfsClient,
    state::AppState,
    storage::FileDatabase,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let format = env::var("LOG_FORMAT").unwrap_or_default();
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// JWT signing secret from the environment, or a process-local random one.
///
/// The random fallback invalidates every outstanding token on restart,
/// which is acceptable for development only.
fn jwt_secret() -> Vec<u8> {
    match env::var(config::JWT_SECRET_ENV) {
        Ok(secret) if !secret.is_empty() => secret.into_bytes(),
        _ => {
            tracing::warn!(
                "{} not set; using a random secret, tokens will not survive a restart",
                config::JWT_SECRET_ENV
            );
            let mut secret = vec![0u8; 32];
            SystemRandom::new()
                .fill(&mut secret)
                .expect("system RNG failure");
            secret
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let data_dir = env::var(config::DATA_DIR_ENV)
        .unwrap_or_else(|_| config::DEFAULT_DATA_DIR.to_string());
    let db_path = PathBuf::from(&data_dir).join("fileproof.redb");
    let db = FileDatabase::open(&db_path).expect("failed to open database");
    tracing::info!(path = %db_path.display(), "database open");

    let rpc_url = env::var(config::ETH_RPC_URL_ENV)
        .unwrap_or_else(|_| config::DEFAULT_ETH_RPC_URL.to_string());
    let chain = ChainClient::new(&rpc_url).expect("invalid ETH_RPC_URL");

    let ipfs_url = env::var(config::IPFS_API_URL_ENV)
        .unwrap_or_else(|_| config::DEFAULT_IPFS_API_URL.to_string());
    let ipfs = IpfsClient::new(&ipfs_url).expect("invalid IPFS_API_URL");

    let contract_address = env::var(config::CONTRACT_ADDRESS_ENV)
        .ok()
        .filter(|a| !a.trim().is_empty());
    if contract_address.is_none() {
        tracing::warn!("no registry contract configured; gas estimates use the intrinsic fallback");
    }

    let max_upload_bytes = env::var(config::MAX_UPLOAD_BYTES_ENV)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(config::DEFAULT_MAX_UPLOAD_BYTES) as usize;

    let state = AppState::new(
        db,
        TokenKeys::from_secret(&jwt_secret()),
        chain,
        ipfs,
        contract_address,
        max_upload_bytes,
    );
    let app = router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    tracing::info!(%addr, rpc = %rpc_url, ipfs = %ipfs_url, "fileproof server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
