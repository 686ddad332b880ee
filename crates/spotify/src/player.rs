use {
    reqwest::Method,
    serde_json::{Value, json},
    tracing::info,
};

use crate::{client::SpotifyClient, error::Result};

/// Pseudo-uri the editor uses for the "Liked Songs" collection, which has no
/// context uri of its own.
pub const LIKED_SONGS_URI: &str = "__liked__";

/// What `play` should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTarget {
    /// Resume whatever the active device has queued.
    Resume,
    /// Play an album, artist or playlist, optionally starting at one track.
    Context { uri: String, offset: Option<String> },
    /// Play these tracks in this order.
    Tracks(Vec<String>),
}

impl PlayTarget {
    /// Request body for `PUT /me/player/play`; `None` sends no body.
    pub fn body(&self) -> Option<Value> {
        match self {
            Self::Resume => None,
            Self::Context { uri, offset: None } => Some(json!({ "context_uri": uri })),
            Self::Context {
                uri,
                offset: Some(offset),
            } => Some(json!({ "context_uri": uri, "offset": { "uri": offset } })),
            Self::Tracks(uris) => Some(json!({ "uris": uris })),
        }
    }
}

impl SpotifyClient {
    /// `PUT /me/player/play`
    pub async fn play(&self, target: PlayTarget) -> Result<()> {
        let grant = self.ensure_fresh().await?;
        let url = self.endpoint(&["me", "player", "play"])?;
        let req = match target.body() {
            Some(body) => self.request(Method::PUT, url, &grant).json(&body),
            None => self.empty_request(Method::PUT, url, &grant),
        };
        self.send(req).await?;
        info!(?target, "playback started");
        Ok(())
    }

    /// Play the saved tracks as an explicit list.
    pub async fn play_liked(&self) -> Result<()> {
        let uris = self
            .get_liked_songs()
            .await?
            .into_iter()
            .map(|t| t.uri)
            .collect();
        self.play(PlayTarget::Tracks(uris)).await
    }

    /// `PUT /me/player/pause`
    pub async fn pause(&self) -> Result<()> {
        let grant = self.ensure_fresh().await?;
        let url = self.endpoint(&["me", "player", "pause"])?;
        self.send(self.empty_request(Method::PUT, url, &grant)).await?;
        info!("playback paused");
        Ok(())
    }

    /// `POST /me/player/queue?uri=...`
    pub async fn add_to_queue(&self, uri: &str) -> Result<()> {
        let grant = self.ensure_fresh().await?;
        let mut url = self.endpoint(&["me", "player", "queue"])?;
        url.query_pairs_mut().append_pair("uri", uri);
        self.send(self.empty_request(Method::POST, url, &grant)).await?;
        info!(uri, "queued");
        Ok(())
    }
}
