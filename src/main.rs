use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use sacred_melodies::{
  App, Config, ConnectivityMonitor, ExplanationSource, GeminiClient, KeyValueStore, MemoryStore,
  Resolution, SongSearch, SqliteStore, SyncOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "sacred-melodies")]
#[command(about = "Scripture study explanations that keep working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sacred-melodies/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Start with no connectivity (serve saved studies only)
  #[arg(long, global = true)]
  offline: bool,

  /// Keep state in memory for this run only
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Explain a scripture reference
  Explain {
    /// Reference, e.g. "John 3:16"
    #[arg(required = true)]
    reference: Vec<String>,

    /// Save the explanation for offline use
    #[arg(long)]
    save: bool,
  },
  /// List saved studies
  Saved,
  /// Refresh a saved study from the explanation service
  Sync {
    /// Study id (see `saved`)
    #[arg(required_unless_present = "all")]
    id: Option<String>,

    /// Refresh every saved study
    #[arg(long, conflicts_with = "id")]
    all: bool,
  },
  /// Delete a saved study
  Delete { id: String },
  /// Add or remove a favorite song
  Favorite { song_id: String },
  /// Find a song online and keep it
  Song {
    /// Title, first line or theme
    #[arg(required = true)]
    query: Vec<String>,
  },
  /// List songs found through search
  Songs,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  let config = Config::load(args.config.as_deref())?;

  let api_key = match Config::get_api_key() {
    Ok(key) => Some(key),
    Err(e) => {
      warn!("{}", e);
      None
    }
  };
  let fetcher = GeminiClient::new(&config, api_key)?;
  let connectivity = ConnectivityMonitor::new(!args.offline);

  if args.ephemeral {
    let app = App::new(connectivity, Arc::new(MemoryStore::new()), fetcher)?;
    run(app, args.command).await
  } else {
    let path = match &config.database {
      Some(path) => path.clone(),
      None => SqliteStore::default_path()?,
    };
    let app = App::new(connectivity, Arc::new(SqliteStore::open_at(&path)?), fetcher)?;
    run(app, args.command).await
  }
}

/// Log to a file in the data directory; stdout is for command output.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("sacred-melodies");

  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::never(&log_dir, "sacred-melodies.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env("SACRED_MELODIES_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

async fn run<K>(mut app: App<GeminiClient, K>, command: Command) -> Result<()>
where
  K: KeyValueStore + Clone + 'static,
{
  match command {
    Command::Explain { reference, save } => {
      let reference = reference.join(" ");

      match app.resolve(&reference).await? {
        Resolution::Resolved(explanation) => {
          match explanation.source {
            ExplanationSource::Network => {}
            ExplanationSource::Offline => eprintln!("Offline: showing the saved explanation."),
            ExplanationSource::Degraded => {
              eprintln!("Could not load a new explanation, showing the saved version.")
            }
          }

          println!("{}\n\n{}", explanation.reference, explanation.content);

          if save {
            let entry = app.save(&explanation)?;
            eprintln!("Saved for offline use ({})", entry.id);
          }
        }
        Resolution::UnavailableOffline => {
          eprintln!("This explanation is not saved offline. Connect to the internet and try again.")
        }
        Resolution::Failed => eprintln!("Could not load an explanation for '{}'.", reference),
      }
    }

    Command::Saved => {
      for entry in app.saved()? {
        println!(
          "{}  {}  ({})",
          entry.id,
          entry.reference,
          entry.updated_at.format("%Y-%m-%d %H:%M")
        );
      }
    }

    Command::Sync { id, all } => {
      let results = if all {
        app.sync_all().await?
      } else {
        let id = id.ok_or_else(|| eyre!("A study id or --all is required"))?;
        let outcome = app.sync(&id).await?;
        vec![(id, outcome)]
      };

      for (id, outcome) in results {
        let message = match outcome {
          SyncOutcome::Synced(_) => "synced",
          SyncOutcome::Offline => "skipped, offline",
          SyncOutcome::NotFound => "not found",
          SyncOutcome::InFlight => "already syncing",
          SyncOutcome::Failed => "failed, saved content kept",
        };
        println!("{}: {}", id, message);
      }
    }

    Command::Delete { id } => {
      if app.delete(&id)? {
        println!("Deleted {}", id);
      } else {
        println!("No saved study {}", id);
      }
    }

    Command::Favorite { song_id } => {
      if app.toggle_favorite(&song_id)? {
        println!("Added {} to favorites", song_id);
      } else {
        println!("Removed {} from favorites", song_id);
      }
    }

    Command::Song { query } => {
      let query = query.join(" ");

      match app.search_song(&query).await? {
        SongSearch::Found(song) => {
          println!("{} ({})  [{}]\n", song.title, song.reference, song.id);
          for line in &song.lyrics {
            println!("{}", line);
          }
        }
        SongSearch::Offline => eprintln!("Song search needs an internet connection."),
        SongSearch::NotFound => eprintln!("No song found for '{}'. Try different words.", query),
      }
    }

    Command::Songs => {
      for song in app.custom_songs() {
        println!("{}  {}  ({})", song.id, song.title, song.reference);
      }
    }
  }

  Ok(())
}
