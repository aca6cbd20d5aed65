mod cli;
mod commands;
mod error;
mod logging;
mod practice;

use crate::cli::{Cli, Commands, SongCommands};
use crate::error::AppResult;
use crate::practice::PracticeOptions;
use clap::Parser;
use lyricloop_core::{Config, CoreError, SqliteStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn main() {
    let cli = Cli::parse();

    let file_logging = std::fs::read_to_string(Config::config_path())
        .is_ok_and(|text| logging::file_logging_requested(&text));
    let log_file = file_logging.then(lyricloop_core::log_file_path);
    logging::init(log_file.as_deref());

    // Load config or create template on first run
    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created config template at {}; using defaults",
                path.display()
            );
            Config::default()
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli, config)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> AppResult<()> {
    let db_path = cli
        .db
        .unwrap_or_else(|| config.storage.database_path());
    let store = SqliteStore::open(&db_path).await?;
    let user = cli.user;

    match cli.command {
        Commands::Song { command } => match command {
            SongCommands::Add {
                title,
                video_id,
                artist,
            } => commands::add_song(&store, &title, artist.as_deref(), &video_id).await?,
            SongCommands::List { json } => commands::list_songs(&store, json).await?,
        },
        Commands::Paste { song_id, file } => commands::paste(&store, song_id, &file).await?,
        Commands::Import { song_id, file } => {
            commands::import(&store, &config, song_id, &file).await?;
        }
        Commands::Export { song_id, out } => commands::export(&store, song_id, &out).await?,
        Commands::Validate { song_id } => commands::validate(&store, song_id).await?,
        Commands::Time {
            song_id,
            line_number,
            start,
            end,
        } => commands::set_time(&store, &config, song_id, line_number, start, end).await?,
        Commands::Practice {
            song_id,
            line,
            repeat,
            hide,
            seconds,
            rate,
        } => {
            // Create shared cancellation token for graceful shutdown
            let cancel_token = CancellationToken::new();

            let ctrlc_token = cancel_token.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                info!("Received Ctrl+C, stopping practice...");
                ctrlc_token.cancel();
            }) {
                warn!("Failed to set Ctrl+C handler: {}", e);
            }

            let options = PracticeOptions {
                line,
                repeat,
                hide,
                seconds,
                rate,
            };
            let report =
                practice::practice(&store, &config, user, song_id, options, cancel_token).await?;
            info!(
                "Practice finished: {} lines shown, {} loops",
                report.shown.len(),
                report.loops
            );
        }
        Commands::Master {
            song_id,
            line_number,
        } => commands::toggle_master(&store, user, song_id, line_number).await?,
        Commands::Stats { song_id, json } => commands::stats(&store, user, song_id, json).await?,
        Commands::Reset { song_id } => commands::reset(&store, user, song_id).await?,
    }

    store.checkpoint().await?;
    Ok(())
}
