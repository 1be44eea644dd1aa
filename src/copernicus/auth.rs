//! OAuth password-grant token handling for the Copernicus Data Space.
//!
//! Tokens are cached until shortly before expiry. The cache lock is held
//! across the refresh, so concurrent callers wait for one grant request
//! instead of each hammering the identity endpoint.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::CopernicusConfig;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh this long before the reported expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct TokenProvider {
    client: reqwest::Client,
    token_url: String,
    username: Option<String>,
    password: Option<String>,
    client_id: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(config: &CopernicusConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            token_url: config.token_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client_id: config.client_id.clone(),
            cached: Mutex::new(None),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Return a valid bearer token, fetching a fresh one if needed. At most
    /// one refresh runs per expiry window; callers that race it block on the
    /// cache lock and reuse its result.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(c) = cached.as_ref() {
            if c.expires_at > Instant::now() {
                return Ok(c.token.clone());
            }
        }

        let (token, expires_at) = self.fetch_token().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<(String, Instant)> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| Error::Auth("Copernicus username not configured".to_string()))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| Error::Auth("Copernicus password not configured".to_string()))?;

        tracing::debug!(url = %self.token_url, "requesting Copernicus access token");

        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token endpoint returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let body: TokenResponse = resp.json().await?;

        let expires_at = Instant::now() + Duration::from_secs(body.expires_in)
            - EXPIRY_SLACK.min(Duration::from_secs(body.expires_in));

        Ok((body.access_token, expires_at))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_detected() {
        let config = CopernicusConfig::default();
        let provider = TokenProvider::new(&config);
        assert!(!provider.has_credentials());
    }

    #[test]
    fn credentials_detected() {
        let config = CopernicusConfig {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..CopernicusConfig::default()
        };
        let provider = TokenProvider::new(&config);
        assert!(provider.has_credentials());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
