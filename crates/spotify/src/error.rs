/// Errors returned by [`crate::SpotifyClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not authenticated yet, run `spotctl login` first")]
    NotAuthenticated,

    #[error(transparent)]
    Auth(#[from] spotctl_oauth::Error),

    #[error("Spotify API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid API base URL: {0}")]
    InvalidApiBase(String),

    #[error("request to Spotify failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
