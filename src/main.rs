//! playtime-cache
//!
//! Small driver for the caching core: seeds an in-memory repository from a
//! JSON file, then serves the leaderboard and name lookups through the
//! caches.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────────┐
//! │  users.json  │───▶│  Repository  │◀───│ UserService          │
//! └──────────────┘    └──────────────┘    │  ├─ IdentityCache     │
//!                                         │  └─ LeaderboardCache  │
//!                                         └──────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use playtime_cache::adapters::{InMemoryUserRepository, LoggingEventPublisher};
use playtime_cache::config::Settings;
use playtime_cache::domain::User;
use playtime_cache::error::Result;
use playtime_cache::service::UserService;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Serve a playtime leaderboard from a seeded in-memory store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (YAML); defaults apply when omitted
    #[arg(long, env = "PLAYTIME_CONFIG")]
    config: Option<PathBuf>,

    /// JSON array of users to seed the repository with
    #[arg(long, env = "PLAYTIME_SEED")]
    seed: Option<PathBuf>,

    /// Leaderboard size; defaults to leaderboard.query_limit
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i32>,

    /// Names to resolve through the identity cache
    #[arg(long = "lookup")]
    lookups: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let repository = Arc::new(match &args.seed {
        Some(path) => InMemoryUserRepository::load(path)?,
        None => InMemoryUserRepository::new(),
    });

    let service = UserService::from_settings(&settings, repository.clone())
        .with_publisher(Arc::new(LoggingEventPublisher::info_level()));
    let sweeper = service.cache().spawn_sweeper();

    let limit = args.limit.unwrap_or(settings.leaderboard.query_limit);
    info!("Starting playtime cache");
    info!("  Users in store: {}", repository.len());
    info!("  Leaderboard size: {}", limit);

    let top = service.find_top(limit).await;
    print_leaderboard(&top);

    // second request is answered from the snapshot
    let again = service.find_top(limit).await;
    info!(
        entries = again.len(),
        repository_queries = repository.top_queries(),
        "Leaderboard requested twice"
    );

    for name in &args.lookups {
        match service.find_by_name(name).await? {
            Some(user) => println!("{} -> {} ({})", name, user.uuid(), user.playtime()),
            None => println!("{} -> not found", name),
        }
    }

    info!(stats = ?service.cache().stats(), "Identity cache");
    info!(stats = ?service.leaderboard().stats(), "Leaderboard cache");

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

fn print_leaderboard(users: &[User]) {
    if users.is_empty() {
        println!("(leaderboard is empty)");
        return;
    }
    for (rank, user) in users.iter().enumerate() {
        println!("{:>3}. {:<16} {}", rank + 1, user.name(), user.playtime());
    }
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
