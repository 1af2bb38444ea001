use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use bitecache::facade::SubmitOutcome;
use bitecache::interceptor::RequestInterceptor;
use bitecache::types::ReviewDraft;
use bitecache::{Config, Connectivity, DataFacade, HttpRemote, Store};

#[derive(Parser, Debug)]
#[command(name = "bitecache")]
#[command(about = "Offline-resilient data access for the restaurant directory")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/bitecache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Treat the device as offline: writes are queued instead of sent
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List restaurants, optionally filtered
  List {
    /// Cuisine filter ("all" for no filter)
    #[arg(long, default_value = "all")]
    cuisine: String,
    /// Neighborhood filter ("all" for no filter)
    #[arg(long, default_value = "all")]
    neighborhood: String,
  },
  /// Show a single restaurant
  Show { id: u64 },
  /// List the distinct neighborhoods
  Neighborhoods,
  /// List the distinct cuisines
  Cuisines,
  /// Reviews for one restaurant (cached set when offline)
  Reviews { id: u64 },
  /// Toggle a restaurant's favorite flag
  Favorite {
    id: u64,
    #[arg(value_parser = ["on", "off"])]
    state: String,
  },
  /// Submit a review (queued for later delivery when offline)
  Review {
    restaurant_id: String,
    name: String,
    rating: String,
    comments: String,
  },
  /// Mark the device online and deliver any queued writes
  Sync,
  /// Pre-cache the application shell assets
  InstallShell,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let remote = HttpRemote::new(&config)?;
  let store = match Store::open(config.data_dir.as_deref()) {
    Ok(store) => Some(store),
    Err(e) => {
      warn!(error = %e, "continuing network-only: local store unavailable");
      None
    }
  };

  let connectivity = Connectivity::new(!args.offline);
  let facade = DataFacade::new(remote, store, connectivity);

  match args.command {
    Command::List { cuisine, neighborhood } => {
      let restaurants = facade
        .fetch_restaurants_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
        .await?;
      for r in restaurants {
        let marker = if r.is_favorite { "*" } else { " " };
        println!("{} {:>4}  {}  ({}, {})", marker, r.id, r.name, r.cuisine_type, r.neighborhood);
      }
    }
    Command::Show { id } => {
      let r = facade.fetch_restaurant_by_id(id).await?;
      println!("{}", serde_json::to_string_pretty(&r)?);
    }
    Command::Neighborhoods => {
      for n in facade.fetch_distinct_neighborhoods().await? {
        println!("{}", n);
      }
    }
    Command::Cuisines => {
      for c in facade.fetch_distinct_cuisines().await? {
        println!("{}", c);
      }
    }
    Command::Reviews { id } => {
      for review in facade.reviews_for_restaurant(id).await? {
        println!("[{}] {} - {}", review.rating, review.name, review.comments);
      }
    }
    Command::Favorite { id, state } => {
      facade.update_favorite(id, state == "on").await?;
      println!("restaurant {} favorite: {}", id, state);
    }
    Command::Review { restaurant_id, name, rating, comments } => {
      let draft = ReviewDraft {
        restaurant_id,
        name,
        rating,
        comments,
      };
      match facade.submit_review(&draft).await? {
        SubmitOutcome::Sent(review) => println!("review {} saved", review.id),
        SubmitOutcome::Queued => println!("offline: review queued for later delivery"),
      }
    }
    Command::Sync => {
      facade.connectivity().set_online(true);
      let replayed = facade.drain_pending().await?;
      println!("{} queued write(s) delivered", replayed);
    }
    Command::InstallShell => {
      let store = facade
        .store()
        .ok_or_else(|| color_eyre::eyre::eyre!("shell install needs the local store"))?;
      let interceptor = RequestInterceptor::new(&config, store.clone())?;
      let installed = interceptor.install().await?;
      println!("{} shell asset(s) cached", installed);
    }
  }

  Ok(())
}
