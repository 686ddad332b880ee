use {
    anyhow::Result,
    spotctl_spotify::{LIKED_SONGS_URI, PlayTarget, Playlist, SpotifyClient, Track},
};

/// What the `play` arguments ask for.
#[derive(Debug, PartialEq, Eq)]
enum PlayRequest {
    Target(PlayTarget),
    Liked,
}

fn play_request(uri: Option<String>, offset: Option<String>, tracks: Vec<String>) -> PlayRequest {
    if !tracks.is_empty() {
        return PlayRequest::Target(PlayTarget::Tracks(tracks));
    }
    match uri {
        None => PlayRequest::Target(PlayTarget::Resume),
        Some(uri) if uri == LIKED_SONGS_URI => PlayRequest::Liked,
        Some(uri) => PlayRequest::Target(PlayTarget::Context { uri, offset }),
    }
}

pub async fn playlists(client: &SpotifyClient, json: bool) -> Result<()> {
    let mut playlists = client.get_playlists().await?;
    // The editor lists "Liked Songs" alongside real playlists.
    playlists.push(Playlist {
        name: "Liked Songs".to_string(),
        uri: LIKED_SONGS_URI.to_string(),
        id: LIKED_SONGS_URI.to_string(),
    });

    if json {
        println!("{}", serde_json::to_string(&playlists)?);
    } else {
        for p in &playlists {
            println!("{}\t{}\t{}", p.name, p.uri, p.id);
        }
    }
    Ok(())
}

pub async fn liked(client: &SpotifyClient, json: bool) -> Result<()> {
    print_tracks(&client.get_liked_songs().await?, json)
}

pub async fn playlist_tracks(client: &SpotifyClient, playlist_id: &str, json: bool) -> Result<()> {
    let tracks = if playlist_id == LIKED_SONGS_URI {
        client.get_liked_songs().await?
    } else {
        client.get_playlist_tracks(playlist_id).await?
    };
    print_tracks(&tracks, json)
}

pub async fn play(
    client: &SpotifyClient,
    uri: Option<String>,
    offset: Option<String>,
    tracks: Vec<String>,
) -> Result<()> {
    match play_request(uri, offset, tracks) {
        PlayRequest::Liked => client.play_liked().await?,
        PlayRequest::Target(target) => client.play(target).await?,
    }
    Ok(())
}

pub async fn pause(client: &SpotifyClient) -> Result<()> {
    client.pause().await?;
    Ok(())
}

pub async fn queue(client: &SpotifyClient, uri: &str) -> Result<()> {
    client.add_to_queue(uri).await?;
    Ok(())
}

fn print_tracks(tracks: &[Track], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(tracks)?);
    } else {
        for line in tracks.iter().map(track_line) {
            println!("{line}");
        }
    }
    Ok(())
}

fn track_line(track: &Track) -> String {
    let artists = track.artist_names();
    if artists.is_empty() {
        format!("{}\t{}", track.name, track.uri)
    } else {
        format!("{} - {}\t{}", track.name, artists, track.uri)
    }
}
