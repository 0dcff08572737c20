// Stereux Core - Sliding-window playlist engine for the Stereux player
// Copyright (C) 2025 Stereux contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stereux_core::download::{
    purge_entry_dirs, EntryMaterializer, HttpTransfer, ProgressCallback, TransferProgress,
    TransferState,
};
use stereux_core::source::{populate_catalog, JsonFileSource};
use stereux_core::storage::queries;
use stereux_core::{CatalogStore, Database, PlayerConfig, PlayerError, PlaylistManager, Source};

#[derive(Parser)]
#[command(name = "stereux-cli")]
#[command(about = "Stereux CLI - catalog maintenance and playlist testing", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import songs exported by the scraper
    Import {
        /// JSON array of songs
        file: PathBuf,
        /// Empty the catalog first
        #[arg(long)]
        replace: bool,
    },
    /// Show catalog statistics
    Stats,
    /// Remove every song from the catalog
    Truncate,
    /// Delete downloaded songs and forget their local paths
    Clean,
    /// Build a playlist window and navigate it
    Play {
        /// Number of navigation steps
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
        /// Navigate to previous songs instead of next ones
        #[arg(long)]
        backwards: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("stereux_core={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config_path = cli.config.unwrap_or_else(PlayerConfig::default_path);
    let config = PlayerConfig::load_or_default(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;

    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    match cli.command {
        Commands::Import { file, replace } => {
            let source = JsonFileSource::new(file, Source::Ncs);
            let inserted = populate_catalog(&db, &source, replace).await?;
            println!("Imported {} songs", inserted);
        }
        Commands::Stats => {
            let total = queries::count_songs(db.pool()).await?;
            let materialized = queries::count_materialized(db.pool()).await?;
            let highest = queries::highest_id(db.pool()).await?.unwrap_or(0);
            println!("Songs:        {}", total);
            println!("Downloaded:   {}", materialized);
            println!("Highest id:   {}", highest);
            if let Some(added) = queries::latest_added_at(db.pool()).await? {
                println!("Last import:  {}", added.format("%Y-%m-%d %H:%M"));
            }
            println!("Data root:    {}", config.data_root.display());
        }
        Commands::Truncate => {
            let removed = db.truncate().await?;
            println!("Removed {} songs", removed);
        }
        Commands::Clean => {
            let removed = purge_entry_dirs(&config.data_root).await?;
            let cleared = queries::clear_local_paths(db.pool()).await?;
            println!("Deleted {} song directories, cleared {} catalog rows", removed, cleared);
        }
        Commands::Play { steps, backwards } => {
            play(Arc::new(db), &config, steps, backwards).await?;
        }
    }

    Ok(())
}

async fn play(db: Arc<Database>, config: &PlayerConfig, steps: u32, backwards: bool) -> Result<()> {
    let store: Arc<dyn CatalogStore> = db;
    let transfer = Arc::new(HttpTransfer::from_config(config)?);
    let materializer = EntryMaterializer::from_config(store.clone(), transfer, config)?;

    let mut playlist = match PlaylistManager::new(store, materializer, config).await {
        Ok(playlist) => playlist,
        Err(e) if e.is_user_facing() => {
            eprintln!("{}", e.user_message());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let progress: ProgressCallback = Arc::new(|p: TransferProgress| {
        if p.state != TransferState::Connecting {
            eprintln!("  {}", p.display_string());
        }
    });
    playlist.set_progress_callback(Some(progress));

    let started = playlist.prefetch_neighbors().await?;
    println!("Window of {} songs, prefetching {}", playlist.capacity(), started);

    let current = playlist.current_entry().await?;
    print_entry("Now playing", &current, config);

    for step in 1..=steps {
        let entry = if backwards {
            playlist.retreat().await
        } else {
            playlist.advance().await
        };
        match entry {
            Ok(entry) => print_entry(&format!("Step {}", step), &entry, config),
            Err(e @ PlayerError::MaterializationFailed { .. }) => {
                eprintln!("Step {}: {}", step, e.user_message());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_entry(label: &str, entry: &stereux_core::CatalogEntry, config: &PlayerConfig) {
    println!("{}: {}", label, entry.display_name());
    if let Some(media) = &entry.local_media_path {
        println!("  media:   {}", media.display());
    }
    match (&entry.local_artwork_path, &config.default_artwork) {
        (Some(artwork), _) => println!("  artwork: {}", artwork.display()),
        (None, Some(default)) => println!("  artwork: {} (default)", entry.artwork_or(default).display()),
        (None, None) => {}
    }
    println!("  info:    {}", entry.info_url);
}
