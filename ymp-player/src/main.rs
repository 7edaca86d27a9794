//! ymp - Yandex Music command-line player
//!
//! Interactive client: search the catalog, stream tracks to the default
//! output device, walk through the results and save tracks to disk.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ymp_common::human_time::{format_duration, format_millis};
use ymp_player::catalog::CatalogClient;
use ymp_player::cli::{Command, HELP, WELCOME};
use ymp_player::config::{ConfigOverrides, PlayerConfig};
use ymp_player::playback::PlaybackState;
use ymp_player::update::{check_for_update, UpdateStatus, GITHUB_API_URL};
use ymp_player::{MusicSession, StreamPlayer};

/// Search results listed after a search
const LISTED_RESULTS: usize = 10;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ymp")]
#[command(about = "Stream and download music from Yandex Music")]
#[command(version)]
struct Args {
    /// OAuth token
    #[arg(long, env = "YA_MUSIC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Account id (looked up from the token when omitted)
    #[arg(long, env = "YA_MUSIC_ID")]
    uid: Option<u64>,

    /// Path to the TOML config file
    #[arg(short, long, env = "YMP_CONFIG")]
    config: Option<PathBuf>,

    /// API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Directory for downloaded tracks
    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output channel count
    #[arg(long)]
    channels: Option<u16>,

    /// Output sample format (u8, s16le, f32le)
    #[arg(long)]
    format: Option<String>,

    /// Output buffer size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            token: self.token.clone(),
            uid: self.uid,
            api_url: self.api_url.clone(),
            download_dir: self.download_dir.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.format.clone(),
            buffer_size: self.buffer_size,
            log_level: self.log_level.clone(),
        }
    }
}

fn main() -> Result<()> {
    // Credentials may live in a .env file next to the binary
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = PlayerConfig::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;

    // Logs go to stderr; stdout is the interactive console
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ymp_player={0},ymp_common={0}", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting ymp v{}", env!("CARGO_PKG_VERSION"));

    // Playback runs on its own threads and outlives the runtime
    let player = Arc::new(
        StreamPlayer::with_default_output(config.audio).context("Failed to initialize audio output")?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run(config, Arc::clone(&player)));
    // A pending stdin read would otherwise hold up shutdown
    runtime.shutdown_timeout(Duration::from_millis(200));

    if let Err(e) = player.close() {
        warn!("{}", e);
    }
    info!("Goodbye");
    result
}

async fn run(config: PlayerConfig, player: Arc<StreamPlayer>) -> Result<()> {
    let catalog = CatalogClient::new(config.token.clone(), config.api_url.clone())
        .context("Failed to create catalog client")?;

    match config.uid {
        Some(uid) => info!("Using account {}", uid),
        None => match catalog.account_uid().await {
            Ok(uid) => info!("Signed in as account {}", uid),
            Err(e) => warn!("Could not look up account id: {}", e),
        },
    }

    let mut session = MusicSession::new(catalog, player);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", WELCOME);

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted");
                break;
            }
        };

        // End of input behaves like exit
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Command::Exit => break,
            command => {
                if let Err(e) = execute(&mut session, command, &config).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    if let Err(e) = session.stop().await {
        warn!("{}", e);
    }
    Ok(())
}

async fn execute(
    session: &mut MusicSession,
    command: Command,
    config: &PlayerConfig,
) -> ymp_player::Result<()> {
    match command {
        Command::Search(term) => {
            let results = session.search(&term).await?;
            if results.is_empty() {
                println!("Nothing found for '{}'", term);
                return Ok(());
            }
            for (i, track) in results.iter().take(LISTED_RESULTS).enumerate() {
                println!(
                    "{:>2}. {} - {} [{}]",
                    i + 1,
                    track.artist_names(),
                    track.display_title(),
                    format_millis(track.duration_ms)
                );
            }
            session.play_first().await?;
            print_now_playing(session);
        }
        Command::Next => {
            session.play_next().await?;
            print_now_playing(session);
        }
        Command::Previous => {
            session.play_previous().await?;
            print_now_playing(session);
        }
        Command::TogglePause => match session.toggle_pause() {
            PlaybackState::Paused => println!("Paused"),
            PlaybackState::Playing => println!("Playing"),
            _ => println!("Nothing is playing"),
        },
        Command::Stop => {
            session.stop().await?;
            println!("Stopped");
        }
        Command::Info => match session.current_track() {
            Some((title, artists)) => {
                let state = session.player().state();
                println!(
                    "{} - {} [{}] ({})",
                    artists,
                    title,
                    format_duration(session.length()),
                    state
                );
            }
            None => println!("No track selected"),
        },
        Command::Download => {
            let path = session.download_current(&config.download_dir).await?;
            println!("Saved to {}", path.display());
        }
        Command::Update => {
            match check_for_update(GITHUB_API_URL, &config.update_repo, env!("CARGO_PKG_VERSION")).await? {
                UpdateStatus::UpToDate { current } => println!("ymp {} is up to date", current),
                UpdateStatus::Available { current, latest, url } => {
                    println!("A newer release is available: {} (running {})", latest, current);
                    println!("Download it from {}", url);
                }
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Invalid(message) => println!("{}", message),
        Command::Exit => {}
    }
    Ok(())
}

fn print_now_playing(session: &MusicSession) {
    if let Some((title, artists)) = session.current_track() {
        println!("Now playing: {} - {}", artists, title);
    }
}
