// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! Token issuing/verification and password hashing.
//!
//! Tokens are HS256 JWTs signed with the server secret. Passwords are
//! PBKDF2-SHA256 with a per-user random salt; the stored form is
//! `salt$iterations$derived_key` with base64url fields.

use std::num::NonZeroU32;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use serde::Serialize;
use utoipa::ToSchema;

use super::claims::{Claims, TokenUse};
use super::error::AuthError;

/// Issuer claim on every token.
pub const TOKEN_ISSUER: &str = "fileproof";

/// Access token lifetime, seconds.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime, seconds.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;

/// HS256 signing material derived from `JWT_SECRET`.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Access/refresh token pair returned by register, login and refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime, seconds.
    pub expires_in: i64,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a fresh access/refresh pair for a user.
    pub fn issue_pair(&self, user_id: &str, is_admin: bool) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, is_admin, TokenUse::Access, ACCESS_TOKEN_TTL_SECS)?,
            refresh_token: self.issue(
                user_id,
                is_admin,
                TokenUse::Refresh,
                REFRESH_TOKEN_TTL_SECS,
            )?,
            token_type: "Bearer",
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    fn issue(
        &self,
        user_id: &str,
        is_admin: bool,
        token_use: TokenUse,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl_secs,
            iss: TOKEN_ISSUER.to_string(),
            token_use,
            is_admin,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    /// Verify a token's signature, expiry and issuer, and check it is of
    /// the expected use.
    pub fn verify(&self, token: &str, expected_use: TokenUse) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.validate_aud = false;

        let token_data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                _ => AuthError::MalformedToken,
            }
        })?;

        if token_data.claims.token_use != expected_use {
            return Err(AuthError::WrongTokenUse);
        }
        Ok(token_data.claims)
    }
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| AuthError::InternalError("random source unavailable".to_string()))?;

    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| AuthError::InternalError("invalid iteration count".to_string()))?;
    let mut derived = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut derived,
    );

    Ok(format!(
        "{}${}${}",
        Base64UrlUnpadded::encode_string(&salt),
        PBKDF2_ITERATIONS,
        Base64UrlUnpadded::encode_string(&derived),
    ))
}

/// Check a password against a stored hash. Malformed stored hashes
/// verify as false rather than erroring.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(salt_b64), Some(iters_str), Some(dk_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(salt) = Base64UrlUnpadded::decode_vec(salt_b64) else {
        return false;
    };
    let Ok(derived) = Base64UrlUnpadded::decode_vec(dk_b64) else {
        return false;
    };
    let Some(iterations) = iters_str.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &derived,
    )
    .is_ok()
}
