// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Fileproof - File Integrity Registry Service
//!
//! This crate provides a REST backend for registering file content hashes
//! against blockchain and IPFS references, verifying hashes against the
//! registry, and keeping an append-only audit trail of everything that
//! happened.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Self-issued JWT authentication and password hashing
//! - `chain` - Ethereum JSON-RPC client (read-only)
//! - `providers` - External services (IPFS)
//! - `storage` - Embedded redb database and repositories

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
