use dotenvy::dotenv;
use jsonwebtoken::Algorithm;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Pub/sub fabric for cross-instance fanout. When unset the service
    /// runs with in-process fanout only (single instance).
    pub redis_url: Option<String>,
    /// Base URL of the backend hosting cookie verification and
    /// team-membership lookup.
    pub backend_base_url: String,
    pub secret_key: String,
    pub token_algorithm: Algorithm,
    pub cors_origins: Vec<String>,
}

impl Config {
    fn parse_origins(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());

        let backend_base_url = env::var("BACKEND_BASE_URL")
            .map_err(|_| AppError::Config("BACKEND_BASE_URL missing".into()))?;

        let secret_key =
            env::var("SECRET_KEY").map_err(|_| AppError::Config("SECRET_KEY missing".into()))?;

        let token_algorithm = env::var("TOKEN_HASH_ALGORITHM")
            .unwrap_or_else(|_| "HS256".to_string())
            .parse::<Algorithm>()
            .map_err(|e| AppError::Config(format!("TOKEN_HASH_ALGORITHM invalid: {e:?}")))?;

        let cors_origins = Self::parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        Ok(Self {
            port,
            redis_url,
            backend_base_url,
            secret_key,
            token_algorithm,
            cors_origins,
        })
    }
}
