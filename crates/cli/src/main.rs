mod auth_commands;
mod player_commands;

use std::{path::PathBuf, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    spotctl_config::{SpotctlConfig, default_config_path, load_config},
    spotctl_oauth::{OAuthConfig, TokenStore, types::DEFAULT_CALLBACK_PORT},
    spotctl_spotify::SpotifyClient,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "spotctl", about = "Spotify playback and library control for editors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Print command results as JSON on stdout.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Config file (defaults to ~/.config/spotctl/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Spotify app client id.
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID")]
    client_id: Option<String>,

    /// Spotify app client secret.
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Spotify through the browser.
    Login,
    /// Forget the stored tokens.
    Logout,
    /// Show who is logged in and when the access token expires.
    Status,
    /// List your playlists.
    Playlists,
    /// List your liked songs.
    Liked,
    /// List the tracks of a playlist.
    Tracks {
        /// Playlist id.
        playlist_id: String,
    },
    /// Start or resume playback.
    Play {
        /// Context uri (album, artist, playlist) or `__liked__`. Omit to resume.
        uri: Option<String>,
        /// Track uri inside the context to start from.
        #[arg(long, requires = "uri")]
        offset: Option<String>,
        /// Play these track uris in order instead of a context.
        #[arg(long, num_args = 1.., conflicts_with_all = ["uri", "offset"])]
        tracks: Vec<String>,
    },
    /// Pause playback.
    Pause,
    /// Add a track or episode uri to the queue.
    Queue {
        uri: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // stdout carries command output; logs go to stderr.
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<SpotctlConfig> {
    let config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_config(&path)?,
        None => SpotctlConfig::default(),
    };
    Ok(config.with_overrides(cli.client_id.clone(), cli.client_secret.clone()))
}

fn build_client(config: &SpotctlConfig) -> anyhow::Result<SpotifyClient> {
    let creds = config
        .credentials()
        .context("set client_id and client_secret in the config file or via SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET")?;

    let mut oauth = OAuthConfig::spotify_on_port(
        creds.client_id,
        creds.client_secret,
        config.callback_port.unwrap_or(DEFAULT_CALLBACK_PORT),
    );
    if let Some(secs) = config.login_timeout_secs {
        oauth.callback_timeout = Duration::from_secs(secs);
    }

    let store = config
        .token_path
        .clone()
        .map(TokenStore::with_path)
        .unwrap_or_default();
    debug!(token_path = %store.path().display(), "using token store");

    Ok(SpotifyClient::new(oauth, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "spotctl starting");

    let config = resolve_config(&cli)?;
    let client = build_client(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Login => auth_commands::login(&client, json).await,
        Commands::Logout => auth_commands::logout(&client, json).await,
        Commands::Status => auth_commands::status(&client, json).await,
        Commands::Playlists => player_commands::playlists(&client, json).await,
        Commands::Liked => player_commands::liked(&client, json).await,
        Commands::Tracks { playlist_id } => {
            player_commands::playlist_tracks(&client, &playlist_id, json).await
        },
        Commands::Play {
            uri,
            offset,
            tracks,
        } => player_commands::play(&client, uri, offset, tracks).await,
        Commands::Pause => player_commands::pause(&client).await,
        Commands::Queue { uri } => player_commands::queue(&client, &uri).await,
    }
}
