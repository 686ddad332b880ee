//! Configuration for spotctl: Spotify app credentials plus a few overrides.
//!
//! Values come from, in order of precedence: explicit overrides (CLI flags or
//! environment, resolved by the caller), then the config file.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

/// Contents of `config.toml` (or `.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotctlConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// Token file location; defaults to `~/.spotctl/access_token.json`.
    pub token_path: Option<PathBuf>,
    /// Loopback port for the login callback. Must match the redirect URI
    /// registered for the Spotify app.
    pub callback_port: Option<u16>,
    pub login_timeout_secs: Option<u64>,
}

/// App credentials, both guaranteed present.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

impl SpotctlConfig {
    /// Apply overrides on top of file values.
    pub fn with_overrides(mut self, client_id: Option<String>, client_secret: Option<String>) -> Self {
        if let Some(id) = client_id.filter(|s| !s.is_empty()) {
            self.client_id = Some(id);
        }
        if let Some(secret) = client_secret.filter(|s| !s.is_empty()) {
            self.client_secret = Some(Secret::new(secret));
        }
        self
    }

    /// Both credentials, or an error naming what is missing.
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty());
        let client_secret = self
            .client_secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty());
        match (client_id, client_secret) {
            (Some(id), Some(secret)) => Ok(Credentials {
                client_id: id.to_string(),
                client_secret: secret.clone(),
            }),
            (None, None) => bail!("client_id and client_secret are not set"),
            (None, _) => bail!("client_id is not set"),
            (_, None) => bail!("client_secret is not set"),
        }
    }
}

/// `~/.config/spotctl/config.toml` (platform equivalent elsewhere).
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "spotctl").map(|d| d.config_dir().join("config.toml"))
}

/// Load the config file. A missing file yields the empty config.
pub fn load_config(path: &Path) -> anyhow::Result<SpotctlConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(SpotctlConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw, path)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SpotctlConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let config: SpotctlConfig = match ext {
        "yaml" | "yml" => serde_yaml::from_str(raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => toml::from_str(raw).with_context(|| format!("invalid TOML in {}", path.display()))?,
    };
    Ok(config)
}
