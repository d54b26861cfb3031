// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Whether a token grants API access or only a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims carried by the server's own HS256 tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiration, Unix seconds.
    pub exp: i64,
    /// Issuer, always the server's own name.
    pub iss: String,
    /// Access vs refresh; refresh tokens cannot call the API.
    pub token_use: TokenUse,
    /// Admin flag, mirrored from the account at issue time.
    #[serde(default)]
    pub is_admin: bool,
}

/// Authenticated user information extracted from a verified token.
///
/// This is the type handlers receive from the `Auth` extractor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user id (the `sub` claim).
    pub user_id: String,
    pub is_admin: bool,
    /// Token expiration, Unix seconds. Not serialized.
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            is_admin: claims.is_admin,
            expires_at: claims.exp,
        }
    }
}
