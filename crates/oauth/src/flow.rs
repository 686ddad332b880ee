use {
    rand::{Rng, distr::Alphanumeric},
    secrecy::ExposeSecret,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    callback_server::CallbackServer,
    error::{Error, Result},
    types::{OAuthConfig, TokenResponse},
};

const STATE_LEN: usize = 32;

/// Random anti-CSRF nonce for a single login attempt.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Authorization-code flow against one provider.
pub struct OAuthFlow {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: OAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Provider authorize URL for the given nonce.
    pub fn authorize_url(&self, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state)
            .finish();
        format!("{}?{query}", self.config.auth_url)
    }

    /// Run the browser half of the login with the system browser.
    pub async fn authorize(&self, cancel: &CancellationToken) -> Result<String> {
        self.authorize_with(|url| open::that(url), cancel).await
    }

    /// Run the browser half of the login: start the callback listener, hand
    /// its root URL to `launch`, and wait for the authorization code.
    pub async fn authorize_with<F>(&self, launch: F, cancel: &CancellationToken) -> Result<String>
    where
        F: FnOnce(&str) -> std::io::Result<()>,
    {
        let state = generate_state();
        let mut server = CallbackServer::start(
            self.config.callback_addr,
            self.authorize_url(&state),
            state,
        )
        .await?;

        let url = server.root_url();
        if let Err(e) = launch(&url) {
            debug!(%e, "browser launch failed");
            server.shutdown().await;
            return Err(Error::BrowserUnavailable { url });
        }
        info!(%url, "waiting for authorization in the browser");

        server
            .wait_for_code(self.config.callback_timeout, cancel)
            .await
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        debug!("exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.token_request(&form)
            .await
            .map_err(|(status, body)| Error::AuthExchangeFailed { status, body })
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_request(&form)
            .await
            .map_err(|(status, body)| Error::RefreshFailed { status, body })
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
    ) -> std::result::Result<TokenResponse, (Option<u16>, String)> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(form)
            .send()
            .await
            .map_err(|e| (None, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| (Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            return Err((Some(status.as_u16()), body));
        }
        serde_json::from_str(&body)
            .map_err(|e| (Some(status.as_u16()), format!("malformed token response: {e}: {body}")))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        net::{Ipv4Addr, SocketAddr},
        time::Duration,
    };

    use {mockito::Matcher, secrecy::Secret};

    use super::*;

    fn config(token_url: String) -> OAuthConfig {
        let mut config = OAuthConfig::spotify("client-id", Secret::new("client-secret".into()));
        config.token_url = token_url;
        config.callback_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        config.callback_timeout = Duration::from_secs(5);
        config
    }

    fn query_of(raw: &str) -> HashMap<String, String> {
        url::Url::parse(raw)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn test_generate_state_shape() {
        let state = generate_state();
        assert_eq!(state.len(), STATE_LEN);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state, generate_state());
    }

    #[test]
    fn test_authorize_url_parameters() {
        let flow = OAuthFlow::new(config("http://unused".into()));
        let url = flow.authorize_url("nonce123");
        assert!(url.starts_with("https://accounts.spotify.com/authorize?response_type=code&"));

        let q = query_of(&url);
        assert_eq!(q["client_id"], "client-id");
        assert_eq!(q["redirect_uri"], "http://localhost:8080/auth");
        assert_eq!(q["state"], "nonce123");
        assert_eq!(
            q["scope"],
            "user-read-playback-state user-modify-playback-state user-read-currently-playing \
             playlist-read-private playlist-read-collaborative user-library-read"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "c0de".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://localhost:8080/auth".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"a1","token_type":"Bearer","expires_in":3600,"refresh_token":"r1","scope":"user-library-read"}"#,
            )
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/api/token", server.url())));
        let tokens = flow.exchange_code("c0de").await.unwrap();
        assert_eq!(tokens.access_token, "a1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
        assert_eq!(tokens.expires_in, 3600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_rejected_carries_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#)
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/api/token", server.url())));
        match flow.exchange_code("stale").await {
            Err(Error::AuthExchangeFailed { status, body }) => {
                assert_eq!(status, Some(400));
                assert!(body.contains("invalid_grant"));
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/token")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/api/token", server.url())));
        assert!(matches!(
            flow.exchange_code("c0de").await,
            Err(Error::AuthExchangeFailed {
                status: Some(200),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_typed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
            ]))
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let flow = OAuthFlow::new(config(format!("{}/api/token", server.url())));
        assert!(matches!(
            flow.refresh("r1").await,
            Err(Error::RefreshFailed {
                status: Some(401),
                ..
            })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authorize_with_simulated_browser() {
        let flow = OAuthFlow::new(config("http://unused".into()));
        let cancel = CancellationToken::new();

        let code = flow
            .authorize_with(
                |root| {
                    let root = root.to_string();
                    tokio::spawn(async move {
                        let http = reqwest::Client::builder()
                            .redirect(reqwest::redirect::Policy::none())
                            .build()
                            .unwrap();
                        let resp = http.get(&root).send().await.unwrap();
                        let location = resp.headers()[reqwest::header::LOCATION]
                            .to_str()
                            .unwrap()
                            .to_string();
                        let state = query_of(&location)["state"].clone();
                        http.get(format!("{root}auth?code=c0de&state={state}"))
                            .send()
                            .await
                            .unwrap();
                    });
                    Ok(())
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(code, "c0de");
    }

    #[tokio::test]
    async fn test_authorize_without_browser() {
        let flow = OAuthFlow::new(config("http://unused".into()));
        let cancel = CancellationToken::new();
        let outcome = flow
            .authorize_with(
                |_| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no opener")),
                &cancel,
            )
            .await;
        match outcome {
            Err(Error::BrowserUnavailable { url }) => assert!(url.starts_with("http://127.0.0.1:")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
