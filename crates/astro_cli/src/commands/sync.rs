//! Queue and sync commands

use crate::app::App;
use anyhow::{bail, Context, Result};
use astro_common::{HttpMethod, Priority};
use astro_sync::{QueueOptions, SyncResult};
use serde_json::Value;

pub struct EnqueueArgs {
    pub url: String,
    pub method: String,
    pub data: Option<String>,
    pub priority: Option<String>,
    pub strategy: String,
    pub depends_on: Option<Vec<String>>,
    pub data_type: Option<String>,
}

pub fn cmd_enqueue(app: &App, args: EnqueueArgs) -> Result<()> {
    let method: HttpMethod = args.method.parse()?;
    let priority = args
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()?;
    let data = args
        .data
        .as_deref()
        .map(|data| serde_json::from_str::<Value>(data))
        .transpose()
        .context("--data must be valid JSON")?;

    let id = app.coordinator.queue_for_sync(
        method,
        args.url,
        data,
        QueueOptions {
            priority,
            strategy: Some(args.strategy),
            dependencies: args.depends_on,
            data_type: args.data_type,
        },
    )?;

    println!("{}", id);
    Ok(())
}

pub fn cmd_status(app: &App, json: bool) -> Result<()> {
    let status = app.coordinator.get_sync_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let counts = status.by_priority;
    println!(
        "Network:  {}",
        if status.is_online { "online" } else { "offline" }
    );
    println!("Syncing:  {}", if status.is_syncing { "yes" } else { "no" });
    println!(
        "Queued:   {} (critical {}, high {}, medium {}, low {})",
        status.total_items, counts.critical, counts.high, counts.medium, counts.low
    );
    if let Some(oldest) = status.oldest_timestamp {
        println!("Oldest:   {}", oldest);
    }
    Ok(())
}

/// Run one strategy pass, or every tier when `strategy` is `None`
pub async fn cmd_sync(app: &App, strategy: Option<&str>, json: bool) -> Result<()> {
    let result = match strategy {
        Some(name) => app.coordinator.sync_with(name).await?,
        None => app.coordinator.sync_all().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.success {
        bail!("sync finished with {} error(s)", result.errors.len());
    }
    Ok(())
}

fn print_result(result: &SyncResult) {
    println!(
        "Synced {}, failed {}, conflicts {}, skipped {} ({}ms)",
        result.synced_items,
        result.failed_items,
        result.conflicts,
        result.skipped_items,
        result.duration_ms
    );
    for error in &result.errors {
        println!("  - {}", error);
    }
}

pub fn cmd_clear_queue(app: &App) -> Result<()> {
    let pending = app.coordinator.queue().len()?;
    app.coordinator.clear_sync_queue()?;
    eprintln!("✓ Cleared {} queued item(s)", pending);
    Ok(())
}
