//! Token issuing and verification
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(mac)`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_ISSUER: &str = "postboard";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Tokens may only be refreshed once they are this close to expiry
pub const REFRESH_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token issued by '{0}'")]
    WrongIssuer(String),
    #[error("token is still valid, refresh not needed")]
    RefreshTooEarly,
    #[error("invalid signing key")]
    InvalidKey,
    #[error("failed to encode token: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub iss: String,
    pub sub: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// A freshly issued token and its lifetime in seconds
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

pub struct AuthService {
    secret: Vec<u8>,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_settings(secret, DEFAULT_TOKEN_TTL, DEFAULT_ISSUER)
    }

    pub fn with_settings(secret: impl AsRef<[u8]>, ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
            issuer: issuer.into(),
        }
    }

    /// Constant-time comparison against the configured secret, used for
    /// static API-key authentication
    pub fn matches_api_key(&self, candidate: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(b"postboard-api-key") else {
            return false;
        };
        mac.update(&self.secret);
        let expected = mac.finalize().into_bytes();

        let Ok(mut mac) = HmacSha256::new_from_slice(b"postboard-api-key") else {
            return false;
        };
        mac.update(candidate.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    pub fn generate_token(&self, user_id: Uuid, username: &str) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = self.ttl.as_secs();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            exp: now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
            iat: now,
            nbf: now,
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
        };

        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(IssuedToken {
            token: format!("{}.{}", signing_input, signature),
            expires_in: ttl,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let signing_input_len = token.len() - token.rsplit('.').next().map_or(0, str::len) - 1;
        let mut mac = self.mac()?;
        mac.update(&token.as_bytes()[..signing_input_len]);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_segment(claims)?;
        let now = Utc::now().timestamp();
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        if claims.nbf > now {
            return Err(TokenError::NotYetValid);
        }
        if claims.iss != self.issuer {
            return Err(TokenError::WrongIssuer(claims.iss));
        }
        Ok(claims)
    }

    /// Issue a new token for a valid one that expires within the refresh window
    pub fn refresh_token(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let claims = self.validate_token(token)?;
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > REFRESH_WINDOW.as_secs() as i64 {
            return Err(TokenError::RefreshTooEarly);
        }
        self.generate_token(claims.user_id, &claims.username)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidKey)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
