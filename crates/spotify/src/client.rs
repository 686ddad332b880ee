use {
    reqwest::{RequestBuilder, Response, Url},
    serde::de::DeserializeOwned,
    spotctl_oauth::{CredentialBundle, OAuthConfig, OAuthFlow, TokenStore, unix_now},
    tokio::sync::Mutex,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    types::Profile,
};

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Credentials valid for at least the refresh margin, handed to one request.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    pub user_id: Option<String>,
}

/// Result of a completed login.
#[derive(Debug)]
pub struct LoginSummary {
    pub user_id: String,
    pub display_name: Option<String>,
    /// Set when the tokens were obtained but could not be written to disk.
    pub persist_error: Option<spotctl_oauth::Error>,
}

/// Spotify Web API client with transparent token refresh.
///
/// The credential bundle lives behind a mutex so that "check expiry, refresh,
/// persist" runs as one critical section even when commands overlap.
pub struct SpotifyClient {
    flow: OAuthFlow,
    store: TokenStore,
    http: reqwest::Client,
    api_base: String,
    session: Mutex<Option<CredentialBundle>>,
}

impl SpotifyClient {
    /// No network or disk access happens until the first call.
    pub fn new(config: OAuthConfig, store: TokenStore) -> Self {
        let http = reqwest::Client::new();
        Self {
            flow: OAuthFlow::with_client(config, http.clone()),
            store,
            http,
            api_base: SPOTIFY_API_BASE.to_string(),
            session: Mutex::new(None),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The bundle currently in effect, loading it from disk if needed.
    /// Never refreshes.
    pub async fn credentials(&self) -> Option<CredentialBundle> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = self.store.load();
        }
        session.clone()
    }

    /// Full login using the system browser.
    pub async fn login(&self, cancel: &CancellationToken) -> Result<LoginSummary> {
        let code = self.flow.authorize(cancel).await?;
        self.complete_login(&code).await
    }

    /// Full login with a custom browser launcher.
    pub async fn login_with<F>(&self, launch: F, cancel: &CancellationToken) -> Result<LoginSummary>
    where
        F: FnOnce(&str) -> std::io::Result<()>,
    {
        let code = self.flow.authorize_with(launch, cancel).await?;
        self.complete_login(&code).await
    }

    /// Exchange a captured authorization code, fetch the account id and
    /// persist the new bundle.
    pub async fn complete_login(&self, code: &str) -> Result<LoginSummary> {
        let mut session = self.session.lock().await;

        let issued_at = unix_now();
        let tokens = self.flow.exchange_code(code).await?;
        let mut bundle = CredentialBundle::from_grant(tokens, issued_at).ok_or_else(|| {
            spotctl_oauth::Error::AuthExchangeFailed {
                status: None,
                body: "token response did not include a refresh_token".to_string(),
            }
        })?;

        let profile = self.fetch_profile(&bundle.access_token).await?;
        bundle.user_id = Some(profile.id.clone());

        let persist_error = self.store.save(&bundle).err();
        if let Some(e) = &persist_error {
            warn!(%e, "logged in but failed to save the token file");
        }
        *session = Some(bundle);

        info!(user_id = %profile.id, "logged in");
        Ok(LoginSummary {
            user_id: profile.id,
            display_name: profile.display_name,
            persist_error,
        })
    }

    /// Forget the in-memory bundle and delete the token file.
    pub async fn logout(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        *session = None;
        self.store.delete()?;
        Ok(())
    }

    /// Guard run before every API call: load the bundle if needed and refresh
    /// it when it expires within the refresh margin.
    pub async fn ensure_fresh(&self) -> Result<AccessGrant> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = self.store.load();
        }
        let Some(bundle) = session.as_mut() else {
            return Err(Error::NotAuthenticated);
        };

        let now = unix_now();
        if bundle.needs_refresh(now) {
            debug!(expires_at = bundle.expires_at, now, "access token expiring");
            let tokens = self.flow.refresh(&bundle.refresh_token).await?;
            bundle.apply_refresh(tokens, now);
            info!(expires_at = bundle.expires_at, "refreshed access token");
            if let Err(e) = self.store.save(bundle) {
                warn!(%e, "refreshed access token could not be saved");
            }
        }

        Ok(AccessGrant {
            access_token: bundle.access_token.clone(),
            user_id: bundle.user_id.clone(),
        })
    }

    /// `GET /me`
    pub async fn current_user(&self) -> Result<Profile> {
        let grant = self.ensure_fresh().await?;
        self.fetch_profile(&grant.access_token).await
    }

    /// Account id from the bundle, fetched and cached if an older token file
    /// did not record it.
    pub(crate) async fn account_id(&self, grant: &AccessGrant) -> Result<String> {
        if let Some(id) = &grant.user_id {
            return Ok(id.clone());
        }
        let profile = self.fetch_profile(&grant.access_token).await?;

        let mut session = self.session.lock().await;
        if let Some(bundle) = session.as_mut() {
            bundle.user_id = Some(profile.id.clone());
            if let Err(e) = self.store.save(bundle) {
                warn!(%e, "account id could not be saved");
            }
        }
        Ok(profile.id)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        let url = self.endpoint(&["me"])?;
        let resp = self.send(self.http.get(url).bearer_auth(access_token)).await?;
        Ok(resp.json().await?)
    }

    /// API URL for the given path segments, each percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = || Error::InvalidApiBase(self.api_base.clone());
        let mut url = Url::parse(&self.api_base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        grant: &AccessGrant,
    ) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&grant.access_token)
    }

    /// Request that carries no payload. Spotify rejects bodyless PUT and POST
    /// without an explicit zero length.
    pub(crate) fn empty_request(
        &self,
        method: reqwest::Method,
        url: Url,
        grant: &AccessGrant,
    ) -> RequestBuilder {
        self.request(method, url, grant)
            .header(reqwest::header::CONTENT_LENGTH, 0)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        grant: &AccessGrant,
    ) -> Result<T> {
        let resp = self
            .send(self.request(reqwest::Method::GET, url, grant))
            .await?;
        Ok(resp.json().await?)
    }

    /// Send a request and turn a non-2xx status into [`Error::Api`].
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "Spotify API error");
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }
}
