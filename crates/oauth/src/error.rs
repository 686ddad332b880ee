use std::{net::SocketAddr, time::Duration};

/// Failures of the login flow, the token grants, and token persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("OAuth state mismatch (received {received:?}); login aborted, please retry")]
    StateMismatch { received: String },

    #[error("callback is missing the '{0}' query parameter")]
    MissingParam(&'static str),

    #[error("authorization was denied by the provider: {0}")]
    AuthorizationDenied(String),

    #[error("no OAuth callback received within {0:?}")]
    CallbackTimeout(Duration),

    #[error("login cancelled")]
    Cancelled,

    #[error("could not open a browser; open {url} manually and run login again")]
    BrowserUnavailable { url: String },

    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("authorization code exchange failed (HTTP {status:?}): {body}")]
    AuthExchangeFailed { status: Option<u16>, body: String },

    #[error("token refresh failed (HTTP {status:?}): {body}")]
    RefreshFailed { status: Option<u16>, body: String },

    #[error("token file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("token file encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
