use tracing::debug;

use crate::{
    client::SpotifyClient,
    error::Result,
    types::{Paging, Playlist, Track, TrackItem},
};

/// Spotify caps list endpoints at 50 items per page.
pub const PAGE_LIMIT: u32 = 50;

impl SpotifyClient {
    /// First page of the current user's playlists.
    pub async fn get_playlists(&self) -> Result<Vec<Playlist>> {
        let grant = self.ensure_fresh().await?;
        let user_id = self.account_id(&grant).await?;
        let mut url = self.endpoint(&["users", user_id.as_str(), "playlists"])?;
        url.query_pairs_mut()
            .append_pair("limit", &PAGE_LIMIT.to_string());

        let page: Paging<Playlist> = self.get_json(url, &grant).await?;
        debug!(count = page.items.len(), total = ?page.total, "fetched playlists");
        Ok(page.items)
    }

    /// First page of the user's saved ("Liked Songs") tracks.
    pub async fn get_liked_songs(&self) -> Result<Vec<Track>> {
        let grant = self.ensure_fresh().await?;
        let mut url = self.endpoint(&["me", "tracks"])?;
        url.query_pairs_mut()
            .append_pair("limit", &PAGE_LIMIT.to_string());

        let page: Paging<TrackItem> = self.get_json(url, &grant).await?;
        Ok(tracks_of(page))
    }

    /// First page of a playlist's tracks. Removed or unavailable entries are
    /// skipped.
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let grant = self.ensure_fresh().await?;
        let mut url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        url.query_pairs_mut()
            .append_pair("limit", &PAGE_LIMIT.to_string());

        let page: Paging<TrackItem> = self.get_json(url, &grant).await?;
        Ok(tracks_of(page))
    }
}

fn tracks_of(page: Paging<TrackItem>) -> Vec<Track> {
    page.items.into_iter().filter_map(|item| item.track).collect()
}

#[cfg(test)]
mod tests {
    use {mockito::Matcher, spotctl_oauth::unix_now};

    use crate::{
        client::tests::{bundle, store_with, test_client},
        error::Error,
    };

    const TRACK_PAGE: &str = r#"{
        "items": [
            {"track": {"id": "1", "name": "First", "uri": "spotify:track:1", "duration_ms": 1000,
                       "artists": [{"name": "A"}]}},
            {"track": null},
            {"track": {"id": "2", "name": "Second", "uri": "spotify:track:2", "duration_ms": 2000,
                       "artists": []}}
        ],
        "next": null,
        "total": 3
    }"#;

    #[tokio::test]
    async fn test_get_playlists_uses_account_and_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/users/wizzler/playlists")
            .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
            .match_header("authorization", "Bearer current")
            .with_status(200)
            .with_body(
                r#"{"items": [
                    {"name": "Focus", "uri": "spotify:playlist:aaa", "id": "aaa", "public": false},
                    {"name": "Road Trip", "uri": "spotify:playlist:bbb", "id": "bbb"}
                ], "next": "https://api.spotify.com/v1/users/wizzler/playlists?offset=50", "total": 70}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(
            &server,
            store_with(&dir, Some(&bundle("current", unix_now() + 3600))),
        );

        let playlists = client.get_playlists().await.unwrap();
        let names: Vec<_> = playlists.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Focus", "Road Trip"]);
        assert_eq!(playlists[1].uri, "spotify:playlist:bbb");
        assert_eq!(playlists[1].id, "bbb");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_account_id_is_fetched_and_cached() {
        let mut server = mockito::Server::new_async().await;
        let me = server
            .mock("GET", "/v1/me")
            .with_status(200)
            .with_body(r#"{"id":"wizzler"}"#)
            .expect(1)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/v1/users/wizzler/playlists")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut legacy = bundle("current", unix_now() + 3600);
        legacy.user_id = None;
        let store = store_with(&dir, Some(&legacy));
        let client = test_client(&server, store.clone());

        assert!(client.get_playlists().await.unwrap().is_empty());
        assert!(client.get_playlists().await.unwrap().is_empty());
        me.assert_async().await;
        assert_eq!(store.load().unwrap().user_id.as_deref(), Some("wizzler"));
    }

    #[tokio::test]
    async fn test_liked_songs_in_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/me/tracks")
            .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
            .with_status(200)
            .with_body(TRACK_PAGE)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(
            &server,
            store_with(&dir, Some(&bundle("current", unix_now() + 3600))),
        );

        let tracks = client.get_liked_songs().await.unwrap();
        let uris: Vec<_> = tracks.iter().map(|t| t.uri.as_str()).collect();
        assert_eq!(uris, ["spotify:track:1", "spotify:track:2"]);
    }

    #[tokio::test]
    async fn test_playlist_tracks_skip_missing_entries() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/playlists/37i9dQZF1DXcBWIGoYBM5M/tracks")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(TRACK_PAGE)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(
            &server,
            store_with(&dir, Some(&bundle("current", unix_now() + 3600))),
        );

        let tracks = client
            .get_playlist_tracks("37i9dQZF1DXcBWIGoYBM5M")
            .await
            .unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "First");
        assert_eq!(tracks[1].duration_ms, 2000);
    }

    #[tokio::test]
    async fn test_unknown_playlist_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/playlists/nope/tracks")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"status":404,"message":"Not found."}}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = test_client(
            &server,
            store_with(&dir, Some(&bundle("current", unix_now() + 3600))),
        );

        match client.get_playlist_tracks("nope").await {
            Err(Error::Api { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Not found."));
            },
            other => panic!("unexpected: {other:?}"),
        }
    }
}
