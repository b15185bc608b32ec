//! Session credential validation and issuing
//!
//! Identity is recomputed from the presented token on every call. Nothing about a
//! previous caller is kept between requests.

use crate::{Error, Result};
use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Claims carried by a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    #[serde(default, alias = "google_id")]
    pub google_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// `None` for an authenticated end-user who is not an administrator
    #[serde(default, alias = "admin_id")]
    pub admin_id: Option<i64>,
    /// Expiry as seconds since the Unix epoch. Zero means "stamp on issue".
    #[serde(default)]
    pub exp: u64,
}

/// An authenticated administrator, derived from one request's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: i64,
    pub claims: SessionClaims,
}

/// Stateless HS256 validator.
#[derive(Clone)]
pub struct CredentialValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl std::fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialValidator")
            .field("algorithm", &Algorithm::HS256)
            .field("leeway", &self.validation.leeway)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl CredentialValidator {
    pub fn new(secret: &str, leeway: Duration, token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway.as_secs();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl,
        }
    }

    /// Decode and check a token without asking for administrator rights.
    pub fn decode(&self, token: &str) -> Result<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::AuthExpired,
                _ => Error::InvalidCredential(e.to_string()),
            })
    }

    /// Validate the credential for an admin-protected operation.
    ///
    /// * absent token: [`Error::AuthRequired`]
    /// * expired: [`Error::AuthExpired`]
    /// * malformed or wrong signature: [`Error::InvalidCredential`]
    /// * valid with a null `adminId`: [`Error::Forbidden`]
    pub fn validate(&self, token: Option<&str>) -> Result<AdminIdentity> {
        let token = token.ok_or(Error::AuthRequired)?;
        let claims = self.decode(token)?;
        match claims.admin_id {
            Some(admin_id) => Ok(AdminIdentity { admin_id, claims }),
            None => Err(Error::Forbidden(
                "You are not authorized to perform this action".to_string(),
            )),
        }
    }

    /// Sign claims, stamping `exp` from the configured lifetime when it is unset.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String> {
        let mut claims = claims.clone();
        if claims.exp == 0 {
            claims.exp = jsonwebtoken::get_current_timestamp().saturating_add(self.token_ttl.as_secs());
        }
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("failed to sign credential: {e}")))
    }
}

/// Extract the bearer token from the request headers.
///
/// Returns `Ok(None)` when no `Authorization` header is present. A header with any
/// other scheme, or with an empty token, is a malformed credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| Error::InvalidCredential("non-ASCII authorization header".into()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| Error::InvalidCredential("missing authorization scheme".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Error::InvalidCredential(format!(
            "unsupported authorization scheme {scheme:?}"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(Error::InvalidCredential("empty bearer token".into()));
    }
    Ok(Some(token))
}
