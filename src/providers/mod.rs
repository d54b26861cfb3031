// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! External service providers.

pub mod ipfs;

pub use ipfs::{IpfsAddResult, IpfsClient, IpfsError};
