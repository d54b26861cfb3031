// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the embedded database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for access/refresh tokens | Required for production |
//! | `ETH_RPC_URL` | Ethereum JSON-RPC endpoint | `http://localhost:8545` |
//! | `CONTRACT_ADDRESS` | Deployed file registry contract address | Optional |
//! | `IPFS_API_URL` | IPFS daemon HTTP API endpoint | `http://localhost:5001` |
//! | `MAX_UPLOAD_BYTES` | Maximum accepted file size in bytes | `16777216` (16 MiB) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the database directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default database directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Environment variable name for the JWT signing secret.
///
/// When unset a process-local random secret is generated, which invalidates
/// all tokens on restart. Fine for development, not for production.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable name for the Ethereum JSON-RPC endpoint.
pub const ETH_RPC_URL_ENV: &str = "ETH_RPC_URL";

/// Default JSON-RPC endpoint (local development node).
pub const DEFAULT_ETH_RPC_URL: &str = "http://localhost:8545";

/// Environment variable name for the registry contract address.
pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";

/// Environment variable name for the IPFS daemon HTTP API endpoint.
pub const IPFS_API_URL_ENV: &str = "IPFS_API_URL";

/// Default IPFS HTTP API endpoint (local daemon).
pub const DEFAULT_IPFS_API_URL: &str = "http://localhost:5001";

/// Environment variable name for the maximum upload size in bytes.
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";

/// Default maximum upload size (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Bounded timeout applied to every outbound chain RPC call.
pub const CHAIN_RPC_TIMEOUT_SECS: u64 = 10;

/// Bounded timeout applied to IPFS daemon requests.
pub const IPFS_TIMEOUT_SECS: u64 = 30;
