//! Authenticated Spotify Web API client.

pub mod client;
pub mod error;
pub mod library;
pub mod player;
pub mod types;

pub use {
    client::{AccessGrant, LoginSummary, SpotifyClient},
    error::{Error, Result},
    player::{LIKED_SONGS_URI, PlayTarget},
    types::{Playlist, Profile, Track},
};
