//! fetch-cache CLI: fetch URLs through the response cache and report cache statistics.
//!
//! Usage:
//!   fetch-cache-cli get <url> [--repeat N] [--token T] [--config PATH] [--base-url URL]
//!   fetch-cache-cli config [--config PATH]      Print the effective configuration

use anyhow::{bail, Context};
use fetch_cache::cache::CacheConfig;
use fetch_cache::{CachedClient, FetchRequest};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fetch_cache=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "get" => cmd_get(&args[2..]).await,
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("fetch-cache-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"fetch-cache-cli: cached HTTP fetches

USAGE:
    fetch-cache-cli <COMMAND> [OPTIONS]

COMMANDS:
    get <url>                   Fetch a URL through the cache
        --repeat <N>            Issue the request N times concurrently (default 1)
        --token <T>             Bearer token (also the cache identity)
        --config <path>         YAML cache configuration
        --base-url <url>        Base URL for relative request URLs
    config [--config <path>]    Print the effective cache configuration
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    FETCH_CACHE_*               Cache overrides (FRESHNESS_MS, MAX_ENTRIES, POLICY, ...)
    RUST_LOG                    Log filter (default fetch_cache=info)"#
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> anyhow::Result<CacheConfig> {
    let config = match flag(args, "--config") {
        Some(path) => CacheConfig::from_path(path)
            .with_context(|| format!("loading cache configuration from {path}"))?,
        None => CacheConfig::default(),
    };
    Ok(config.with_env_overrides())
}

async fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let Some(url) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("missing <url>");
    };
    let repeat = match flag(args, "--repeat") {
        Some(n) => n.parse::<usize>().context("--repeat expects a number")?.max(1),
        None => 1,
    };

    let mut builder = CachedClient::builder().config(load_config(args)?);
    if let Some(base) = flag(args, "--base-url") {
        builder = builder.base_url(base);
    }
    let client = builder.build()?;

    let mut request = FetchRequest::get(url.as_str());
    if let Some(token) = flag(args, "--token") {
        request = request.with_auth_token(token);
    }

    let started = Instant::now();
    let mut tasks = Vec::with_capacity(repeat);
    for _ in 0..repeat {
        let client = client.clone();
        let request = request.clone();
        tasks.push(tokio::spawn(async move { client.execute(request).await }));
    }

    let mut failures = 0usize;
    for (i, task) in tasks.into_iter().enumerate() {
        match task.await? {
            Ok(resp) if i == 0 => {
                println!("HTTP {}", resp.status);
                println!("{}", serde_json::to_string_pretty(&resp.body)?);
            }
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                eprintln!("request {i} failed: {e}");
            }
        }
    }

    // A second pass to show the cached path.
    let cached = client.execute(request).await;
    let stats = client.stats();
    client.shutdown();

    println!();
    println!("=== Cache ===");
    println!("requests:   {} (+1 follow-up, {} failed)", repeat, failures);
    println!("follow-up:  {}", if cached.is_ok() { "ok" } else { "failed" });
    println!("elapsed:    {:?}", started.elapsed());
    println!("entries:    {}", stats.entry_count);
    println!("hits:       {} (ratio {:.2})", stats.hits, stats.hit_ratio());
    println!("misses:     {}", stats.misses);
    println!("coalesced:  {}", stats.coalesced);
    println!("size:       {} bytes", stats.total_size_bytes);

    if failures == repeat {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
