//! CLI entry point for the dataretriever tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dataretriever::attrs::{Attr, Instrument, Physobs, Provider, Source, Time, Wavelength};
use dataretriever::download::{DownloadError, ErrorCallback, FetchResults};
use dataretriever::{
    ClientConfig, DirectStrategy, GenericClient, PatternStrategy, ResolutionStrategy, ResultSet,
};
use serde_json::json;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries results; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = build_client_config(&args)?;
    let strategy = build_strategy(&args)?;
    let query = build_query(&args)?;

    let client = GenericClient::new(strategy, config).context("Failed to create client")?;
    let records = client.search(&query).await.context("Search failed")?;

    if records.is_empty() {
        info!("No records matched the query");
        if args.json {
            println!("{}", json!({ "records": [] }));
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&json!({ "records": records }))?);
        } else {
            print_records(&records, &client.config().time_format);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !args.json {
        print_records(&records, &client.config().time_format);
    }

    let on_error: ErrorCallback = Arc::new(|error: &DownloadError, url: &str| {
        warn!(url, error = %error, "Download failed");
    });
    let handle = client
        .fetch(&records, args.output.as_deref(), Some(on_error))
        .context("Failed to start downloads")?;
    info!(tasks = handle.len(), "Downloads started");

    let results = handle.wait().await;
    info!(
        completed = results.succeeded.len(),
        failed = results.failed.len(),
        "Downloads finished"
    );

    if args.json {
        let output = json!({
            "records": records,
            "downloads": downloads_json(&results),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for done in &results.succeeded {
            println!("{}", done.path.display());
        }
    }

    Ok(if results.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Library defaults, overlaid with the config file, overlaid with flags.
fn build_client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();

    let loaded = app_config::load_default_file_config()?;
    if let Some(file_config) = &loaded.config {
        debug!(path = ?loaded.path, "Loaded config file");
        file_config.apply_to(&mut config)?;
    }

    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = Some(usize::from(concurrency));
    }
    Ok(config)
}

fn build_strategy(args: &Args) -> Result<Arc<dyn ResolutionStrategy>> {
    if let Some(pattern) = &args.pattern {
        let hours = args.step_hours.unwrap_or(24);
        let strategy = PatternStrategy::new(pattern.as_str())
            .with_context(|| format!("Invalid --pattern '{pattern}'"))?
            .with_step(chrono::Duration::hours(i64::from(hours)));
        return Ok(Arc::new(strategy));
    }
    Ok(Arc::new(DirectStrategy::new(args.urls.iter().cloned())))
}

fn build_query(args: &Args) -> Result<Vec<Box<dyn Attr>>> {
    let time = Time::parse(&args.start, &args.end).context("Invalid --start/--end")?;
    let mut query: Vec<Box<dyn Attr>> = vec![Box::new(time)];

    if let Some(value) = &args.instrument {
        query.push(Box::new(Instrument::new(value.as_str())));
    }
    if let Some(value) = &args.source {
        query.push(Box::new(Source::new(value.as_str())));
    }
    if let Some(value) = &args.provider {
        query.push(Box::new(Provider::new(value.as_str())));
    }
    if let Some(value) = &args.physobs {
        query.push(Box::new(Physobs::new(value.as_str())));
    }
    if let Some(wave) = args.wavelength {
        query.push(Box::new(Wavelength::new(wave.min, wave.max)));
    }
    Ok(query)
}

fn print_records(records: &ResultSet, time_format: &str) {
    for record in records {
        let (start, end) = record
            .time
            .format_with(time_format)
            .unwrap_or_else(|| (record.time.start().to_rfc3339(), record.time.end().to_rfc3339()));
        println!(
            "{start}  {end}  {}  {}  {}",
            record.source, record.instrument, record.url
        );
    }
}

fn downloads_json(results: &FetchResults) -> serde_json::Value {
    let succeeded: Vec<_> = results
        .succeeded
        .iter()
        .map(|done| {
            json!({
                "index": done.index,
                "url": done.url,
                "path": done.path.display().to_string(),
                "bytes": done.bytes,
            })
        })
        .collect();
    let failed: Vec<_> = results
        .failed
        .iter()
        .map(|failure| {
            json!({
                "index": failure.index,
                "url": failure.url,
                "error": failure.error.to_string(),
            })
        })
        .collect();
    json!({ "succeeded": succeeded, "failed": failed })
}
