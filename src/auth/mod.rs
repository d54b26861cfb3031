// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Authentication and authorization.
//!
//! Tokens are self-issued HS256 JWTs signed with the server's
//! `JWT_SECRET`. Access tokens are short-lived; refresh tokens only
//! mint new access tokens. Passwords are hashed with PBKDF2-SHA256.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod tokens;

pub use claims::{AuthenticatedUser, Claims, TokenUse};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use tokens::{hash_password, verify_password, TokenKeys, TokenPair};
