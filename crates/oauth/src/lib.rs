//! Spotify OAuth 2.0 authorization-code login and credential persistence.

pub mod callback_server;
pub mod error;
pub mod flow;
pub mod storage;
pub mod types;

pub use {
    callback_server::CallbackServer,
    error::{Error, Result},
    flow::{OAuthFlow, generate_state},
    storage::TokenStore,
    types::{CredentialBundle, OAuthConfig, TokenResponse, unix_now},
};
