//! Jeton d'accès OAuth obtenu à partir du refresh token longue durée.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};
use ureq::Agent;

use crate::error::{Result, SpotifyError};
use crate::models::TokenResponse;

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Marge avant expiration en deçà de laquelle on rafraîchit
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Détient les secrets et le jeton courant
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    accounts_url: String,
    current: Option<AccessToken>,
}

impl TokenManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            current: None,
        }
    }

    pub fn with_accounts_url(mut self, url: &str) -> Self {
        self.accounts_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Jeton valide, rafraîchi si absent ou proche de l'expiration
    pub fn access_token(&mut self, agent: &Agent) -> Result<String> {
        if let Some(token) = &self.current {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
            debug!("Spotify access token about to expire");
        }
        self.refresh(agent)
    }

    /// Oublie le jeton courant (après un 401)
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn refresh(&mut self, agent: &Agent) -> Result<String> {
        let url = format!("{}/api/token", self.accounts_url);
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let mut response = agent
            .post(&url)
            .header("Authorization", &format!("Basic {}", credentials))
            .send_form([
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        if !(200..300).contains(&status) {
            self.current = None;
            // 400 invalid_grant : refresh token révoqué
            let message = if body.is_empty() { url } else { body };
            return Err(match status {
                400 | 401 => SpotifyError::Unauthorized(message),
                _ => SpotifyError::from_status_code(status, message),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        if let Some(rotated) = token.refresh_token {
            debug!("Spotify rotated the refresh token");
            self.refresh_token = rotated;
        }

        info!(expires_in = token.expires_in, "Spotify access token refreshed");
        self.current = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client_id", &self.client_id)
            .field("accounts_url", &self.accounts_url)
            .field("has_token", &self.current.is_some())
            .finish()
    }
}
