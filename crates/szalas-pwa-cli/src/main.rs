//! szalas-pwa - drives the offline worker against a running origin.
//!
//! The worker is installed and activated against the on-disk cache, then
//! each requested path goes through the same fetch interception a browser
//! would perform.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use szalas_pwa_core::http::{resolve_url, Request, ResponseSource};
use szalas_pwa_core::worker::{
    build_worker, CacheStorage, DiskCacheStorage, HttpNetwork, Network, StaticNetwork,
};
use szalas_pwa_core::{PwaConfig, WebAppManifest};

/// Overrides `origin` from the config file
const ORIGIN_ENV: &str = "SZALAS_PWA_ORIGIN";

const USAGE: &str = "Usage: szalas-pwa <command>

Commands:
  fetch [--offline] [--navigate] <path>...   Run paths through the worker
  status                                     List cache generations and entries
  clear                                      Delete every cache generation
  manifest <file>                            Validate a web app manifest";

fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=szalas_pwa_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config() -> Result<PwaConfig> {
    let mut config = PwaConfig::load()?;
    if let Ok(origin) = std::env::var(ORIGIN_ENV) {
        config.origin = origin;
    }
    Ok(config)
}

fn open_storage(config: &PwaConfig) -> Result<DiskCacheStorage> {
    let cache_dir = config.cache_dir()?;
    DiskCacheStorage::new(cache_dir.clone())
        .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    match command.as_str() {
        "fetch" => fetch(rest).await,
        "status" => status().await,
        "clear" => clear().await,
        "manifest" => match rest {
            [file] => validate_manifest(Path::new(file)),
            _ => bail!("manifest takes exactly one file\n\n{}", USAGE),
        },
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

async fn fetch(args: &[String]) -> Result<()> {
    let mut offline = false;
    let mut navigate = false;
    let mut paths = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--offline" => offline = true,
            "--navigate" => navigate = true,
            flag if flag.starts_with("--") => bail!("Unknown flag '{}'", flag),
            path => paths.push(path.to_string()),
        }
    }
    if paths.is_empty() {
        bail!("fetch needs at least one path\n\n{}", USAGE);
    }

    let config = load_config()?;
    let caches: Arc<dyn CacheStorage> = Arc::new(open_storage(&config)?);
    let network: Arc<dyn Network> = if offline {
        Arc::new(StaticNetwork::offline())
    } else {
        Arc::new(HttpNetwork::with_timeout(config.request_timeout())?)
    };

    let (runtime, worker) = build_worker(&config, caches, network)?;
    let state = runtime.start().await?;
    info!(origin = %config.origin, %state, "Worker started");
    eprintln!("Worker {} for {} (cache {})", state, config.origin, worker.cache_name());

    for path in &paths {
        let url = resolve_url(&config.origin, path)?;
        let request = if navigate {
            Request::navigate(url.clone())
        } else {
            Request::get(url.clone())
        };

        match runtime.fetch(request).await {
            Ok(result) => match result.response() {
                Some(response) => {
                    let source = match response.source {
                        ResponseSource::Network => "network",
                        ResponseSource::Cache => "cache",
                    };
                    println!(
                        "{}  {}  {}  {} bytes",
                        response.status,
                        source,
                        url,
                        response.body.len()
                    );
                }
                None => println!("---  failed   {}", url),
            },
            Err(e) => println!("---  error    {}  ({})", url, e),
        }
    }

    // Let background cache writes land before the process exits
    worker.flush_cache_writes().await;
    Ok(())
}

async fn status() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config)?;

    let generations = storage.keys().await?;
    if generations.is_empty() {
        println!("No cache generations");
        return Ok(());
    }

    for name in generations {
        let marker = if name == config.cache_name { " (current)" } else { "" };
        let cache = storage.open_disk(&name).await?;
        let entries = cache.entries().await?;
        println!("{}{}: {} entries", name, marker, entries.len());
        for entry in entries {
            println!(
                "  {}  {}  {}",
                entry.response.data.status,
                entry.key,
                entry.response.age_display()
            );
        }
    }
    Ok(())
}

async fn clear() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config)?;

    let mut deleted = 0;
    for name in storage.keys().await? {
        if storage.delete(&name).await? {
            deleted += 1;
        }
    }
    println!("Deleted {} cache generation(s)", deleted);
    Ok(())
}

fn validate_manifest(path: &Path) -> Result<()> {
    let manifest = WebAppManifest::load(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;

    let problems = manifest.problems();
    if problems.is_empty() {
        let icons = manifest.icons.as_ref().map(|i| i.len()).unwrap_or(0);
        println!(
            "✓ {} is valid ({} icons)",
            path.display(),
            icons
        );
        return Ok(());
    }

    for problem in &problems {
        println!("✗ {}", problem);
    }
    bail!("{} has {} problem(s)", path.display(), problems.len())
}
