use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};

use tweetfeed::auth::{TOKEN_KEY, TOKEN_SCOPE};
use tweetfeed::config::Config;
use tweetfeed::feed::{self, FeedAssembler, FeedOptions};
use tweetfeed::storage::{Database, DatabaseError, MemoryCache, TokenCache};
use tweetfeed::util::write_atomic;

/// Get the config directory path (~/.config/tweetfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("tweetfeed");
    Ok(config_dir)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Atom,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "tweetfeed",
    version,
    about = "Turn an account timeline from the Twitter API into an Atom or JSON feed"
)]
struct Args {
    /// Screen name of the account, without the leading @
    #[arg(long, short, value_name = "NAME")]
    user: Option<String>,

    /// Include replies
    #[arg(long)]
    replies: bool,

    /// Include retweets
    #[arg(long)]
    retweets: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Atom)]
    format: Format,

    /// Write the feed to FILE instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file (default: ~/.config/tweetfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep the bearer token in memory only
    #[arg(long)]
    no_cache: bool,

    /// Delete the cached bearer token (exits unless --user is given)
    #[arg(long)]
    forget_token: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let endpoints = config
        .endpoints()
        .context("Invalid base URL in configuration")?;

    let db = if args.no_cache {
        None
    } else {
        Some(open_cache(&config, &config_dir).await?)
    };
    let memory = MemoryCache::new();
    let cache: &dyn TokenCache = match &db {
        Some(db) => db,
        None => &memory,
    };

    if args.forget_token {
        let removed = cache
            .remove(TOKEN_SCOPE, TOKEN_KEY)
            .await
            .context("Failed to remove cached token")?;
        if removed {
            eprintln!("Cached bearer token removed.");
        } else {
            eprintln!("No cached bearer token.");
        }
        if args.user.is_none() {
            if let Some(db) = &db {
                db.close().await;
            }
            return Ok(());
        }
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("tweetfeed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let options = FeedOptions {
        include_replies: args.replies,
        include_retweets: args.retweets,
    };
    let assembler = FeedAssembler::new(&client, cache, &endpoints, config.request_timeout());
    let result = assembler
        .build_feed(
            args.user.as_deref().unwrap_or_default(),
            options,
            &config.credentials(),
        )
        .await;

    if let Some(db) = &db {
        db.close().await;
    }
    let feed = result.context("Failed to build feed")?;

    let document = match args.format {
        Format::Atom => feed::to_atom(&feed)?,
        Format::Json => feed::to_json(&feed)?,
    };

    match &args.output {
        Some(path) => {
            write_atomic(path, document.as_bytes())?;
            tracing::info!(path = %path.display(), items = feed.items.len(), "Feed written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .context("Failed to write feed to stdout")?;
        }
    }

    Ok(())
}

/// Opens the SQLite token cache, creating its directory (mode 0700) if needed.
async fn open_cache(config: &Config, config_dir: &Path) -> Result<Database> {
    let path = config
        .cache_path
        .clone()
        .unwrap_or_else(|| config_dir.join("token-cache.db"));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory {}", parent.display())
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) =
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                {
                    tracing::warn!(
                        path = %parent.display(),
                        error = %e,
                        "Failed to set cache directory permissions to 0700"
                    );
                }
            }
        }
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in cache path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => anyhow::bail!(
            "Token cache {} is locked by another process; retry or use --no-cache",
            path.display()
        ),
        Err(e) => Err(anyhow::anyhow!("Failed to open token cache: {}", e)),
    }
}
