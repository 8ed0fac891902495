// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rider identity read from the identity provider's bearer token.
//!
//! The token's signature is NOT verified here. The record API validates
//! every call it receives; this module only needs the `sub` claim to tag
//! submissions and the `exp` claim to avoid sending a token we know is stale.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::fmt;

/// Claims we read from the ID token payload.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    email: Option<String>,
}

/// Identity extracted from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject claim, used as the record store's user id
    pub user_id: String,
    pub email: Option<String>,
    /// Token expiry, if the token carries one
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Claim reading only: no signature, audience or expiry checks. Expiry is
/// judged against the session clock by [`Identity::is_expired`].
fn claims_only_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Decode the identity from a JWT-shaped token.
///
/// Returns `None` for anything malformed: bad header or payload encoding,
/// non-JSON claims, or a missing/empty `sub`.
pub fn decode_identity(token: &str) -> Option<Identity> {
    let token_data = decode::<Claims>(
        token.trim(),
        &DecodingKey::from_secret(&[]),
        &claims_only_validation(),
    )
    .ok()?;
    let claims = token_data.claims;

    let user_id = claims.sub.filter(|s| !s.trim().is_empty())?;
    let expires_at = match claims.exp {
        Some(exp) => Some(DateTime::from_timestamp(exp, 0)?),
        None => None,
    };

    Some(Identity {
        user_id,
        email: claims.email,
        expires_at,
    })
}

/// Bearer token with a redacted `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Identity provider hosted UI endpoints.
#[derive(Debug, Clone)]
pub struct HostedUi {
    pub domain: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub logout_uri: Option<String>,
}

impl HostedUi {
    /// Authorization-code login URL.
    pub fn login_url(&self) -> String {
        format!(
            "https://{}/oauth2/authorize?\
             response_type=code&\
             client_id={}&\
             redirect_uri={}&\
             scope=openid+email",
            self.domain,
            self.client_id,
            urlencoding::encode(&self.redirect_uri)
        )
    }

    /// Hosted logout URL, if a logout redirect is configured.
    pub fn logout_url(&self) -> Option<String> {
        let logout_uri = self.logout_uri.as_deref()?;
        Some(format!(
            "https://{}/logout?client_id={}&logout_uri={}",
            self.domain,
            self.client_id,
            urlencoding::encode(logout_uri)
        ))
    }
}
