use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use stream_recorder::config::DEFAULT_CONFIG_PATH;
use stream_recorder::{
    format_duration, format_size, Config, HistoryStore, SourceKind, Studio, SyncStatus,
    SyntheticConfig, UploadClient, UploadStore,
};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bytes per chunk when replaying a file as a live source
const FILE_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "stream-recorder")]
#[command(about = "Record, catalog and upload media streams")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upload server
    Serve,

    /// Record from the configured device and add the result to history
    Record {
        /// Active recording time in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Pause after this many seconds of recording
        #[arg(long, requires = "pause_for")]
        pause_after: Option<u64>,

        /// Length of the pause in seconds
        #[arg(long, requires = "pause_after")]
        pause_for: Option<u64>,

        /// Replay this file instead of the synthetic camera
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List recordings in the local history
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(&cfg).await,
        Command::Record {
            seconds,
            pause_after,
            pause_for,
            file,
        } => {
            let pause = pause_after.zip(pause_for);
            record(&cfg, seconds, pause, file).await
        }
        Command::History => history(&cfg),
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let uploads = UploadStore::new(cfg.storage.uploads_path(), cfg.storage.max_upload_bytes);
    stream_recorder::http::serve(&cfg.service.http.addr(), uploads).await
}

async fn record(
    cfg: &Config,
    seconds: u64,
    pause: Option<(u64, u64)>,
    file: Option<PathBuf>,
) -> Result<()> {
    let device = cfg.recording.device.clone();
    let source = match file {
        Some(path) => SourceKind::File {
            device,
            path,
            chunk_bytes: FILE_CHUNK_BYTES,
        },
        None => SourceKind::Synthetic(SyntheticConfig {
            device,
            ..SyntheticConfig::default()
        }),
    };

    let history_dir = cfg.storage.history_path();
    let history = HistoryStore::open(&history_dir)
        .with_context(|| format!("Failed to open history at {}", history_dir.display()))?;

    let mut studio = Studio::new(cfg.recording.session_config(), source, history);
    if cfg.remote.enabled {
        studio = studio.with_remote(UploadClient::new(&cfg.remote.base_url));
    }

    let mut notices = studio.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            info!("[{:?}] {}", notice.level, notice.message);
        }
    });

    studio.start_recording().await?;
    match pause {
        Some((after, length)) if after < seconds => {
            sleep(Duration::from_secs(after)).await;
            studio.pause_recording().await?;
            sleep(Duration::from_secs(length)).await;
            studio.resume_recording().await?;
            sleep(Duration::from_secs(seconds - after)).await;
        }
        _ => sleep(Duration::from_secs(seconds)).await,
    }
    let id = studio.stop_recording().await?;

    if let Some(entry) = studio.history().get(&id) {
        println!(
            "{}  {}  {}",
            entry.id,
            format_duration(entry.duration_secs),
            format_size(entry.size)
        );
    }
    studio.shutdown().await;
    Ok(())
}

fn history(cfg: &Config) -> Result<()> {
    let history_dir = cfg.storage.history_path();
    let store = HistoryStore::open(&history_dir)
        .with_context(|| format!("Failed to open history at {}", history_dir.display()))?;

    if store.is_empty() {
        println!("No recordings yet");
        return Ok(());
    }
    for entry in store.list() {
        let sync = match &entry.sync {
            SyncStatus::LocalOnly => "local".to_string(),
            SyncStatus::PendingSync { reason } => format!("pending ({})", reason),
            SyncStatus::Synced { path, .. } => path.clone(),
        };
        println!(
            "{}  {}  {:>6}  {:>10}  {}",
            entry.id,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_duration(entry.duration_secs),
            format_size(entry.size),
            sync
        );
    }
    Ok(())
}
