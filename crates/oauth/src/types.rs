use std::{
    net::{Ipv4Addr, SocketAddr},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

pub const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// Scopes requested on every login.
pub const SPOTIFY_SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
];

/// Access tokens are refreshed once they are this close to expiry.
pub const REFRESH_MARGIN_SECS: u64 = 60;

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Loopback address the callback listener binds to.
    pub callback_addr: SocketAddr,
    /// How long `authorize` waits for the browser to come back.
    pub callback_timeout: Duration,
}

impl OAuthConfig {
    /// Spotify endpoints with the fixed loopback redirect.
    pub fn spotify(client_id: impl Into<String>, client_secret: Secret<String>) -> Self {
        Self::spotify_on_port(client_id, client_secret, DEFAULT_CALLBACK_PORT)
    }

    pub fn spotify_on_port(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        port: u16,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_url: SPOTIFY_AUTH_URL.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            redirect_uri: format!("http://localhost:{port}/auth"),
            scopes: SPOTIFY_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            callback_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            callback_timeout: Duration::from_secs(300),
        }
    }
}

/// Body of a successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Persisted authentication state for the single local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    /// Unix timestamp when the access token expires. Older token files do not
    /// carry it, which makes the first call refresh.
    #[serde(default)]
    pub expires_at: u64,
    pub refresh_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CredentialBundle {
    /// Build a bundle from an authorization-code grant issued at `now`.
    ///
    /// Returns `None` when the provider did not hand out a refresh token,
    /// since the bundle would be unusable once the access token expires.
    pub fn from_grant(resp: TokenResponse, now: u64) -> Option<Self> {
        let refresh_token = resp.refresh_token?;
        Some(Self {
            expires_at: now.saturating_add(resp.expires_in),
            access_token: resp.access_token,
            token_type: resp.token_type,
            expires_in: resp.expires_in,
            refresh_token,
            user_id: None,
        })
    }

    /// Fold a refresh grant issued at `now` into the bundle.
    pub fn apply_refresh(&mut self, resp: TokenResponse, now: u64) {
        self.access_token = resp.access_token;
        self.token_type = resp.token_type;
        self.expires_in = resp.expires_in;
        self.expires_at = now.saturating_add(resp.expires_in);
        if let Some(rotated) = resp.refresh_token {
            self.refresh_token = rotated;
        }
    }

    /// Whether the access token is expired or within the refresh margin.
    pub fn needs_refresh(&self, now: u64) -> bool {
        now.saturating_add(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
