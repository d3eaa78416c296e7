//! Authentication collaborators: cookie verification service and the
//! identity token codec.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Session/cookie verification collaborator: raw cookie header in,
/// authenticated or not out.
#[async_trait]
pub trait CookieVerifier: Send + Sync {
    async fn verify(&self, cookie_header: &str) -> AppResult<()>;
}

/// Verifies cookies against the backend's `/jwt/verify/` endpoint.
pub struct HttpCookieVerifier {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCookieVerifier {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CookieVerifier for HttpCookieVerifier {
    async fn verify(&self, cookie_header: &str) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/jwt/verify/", self.base_url))
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// In-process verifier for tests and local development: accepts any cookie
/// header that carries an `access` cookie.
pub struct StaticVerifier;

#[async_trait]
impl CookieVerifier for StaticVerifier {
    async fn verify(&self, cookie_header: &str) -> AppResult<()> {
        if access_token_from_cookies(cookie_header).is_some() {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
}

/// Identity token codec: fixed algorithm and secret, claims out, `None` on
/// any invalid signature/algorithm/expiry.
pub struct TokenCodec {
    secret: String,
    algorithm: Algorithm,
}

impl TokenCodec {
    pub fn new(secret: String, algorithm: Algorithm) -> Self {
        Self { secret, algorithm }
    }

    pub fn decode_access_token(&self, token: &str) -> Option<AccessClaims> {
        let validation = Validation::new(self.algorithm);
        match decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "access token rejected");
                None
            }
        }
    }
}

/// Pulls the `access` cookie out of a raw `Cookie` header.
pub fn access_token_from_cookies(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "access" && !value.is_empty()).then(|| value.to_string())
    })
}
