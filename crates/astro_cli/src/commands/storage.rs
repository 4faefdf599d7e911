//! Cache, maintenance and backup commands

use crate::app::App;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub fn cmd_cache_put(app: &App, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<()> {
    let data = serde_json::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    app.storage
        .cache_set(key, &data, ttl_ms.map(Duration::from_millis))?;
    eprintln!("✓ Cached '{}'", key);
    Ok(())
}

pub fn cmd_cache_get(app: &App, key: &str) -> Result<()> {
    let value: Value = app
        .storage
        .cache_get(key)?
        .ok_or_else(|| anyhow!("No cached value for '{}'", key))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn cmd_cache_delete(app: &App, key: &str) -> Result<()> {
    app.storage.cache_delete(key)?;
    eprintln!("✓ Removed '{}'", key);
    Ok(())
}

pub fn cmd_cache_clear(app: &App) -> Result<()> {
    app.storage.cache_clear()?;
    eprintln!("✓ Cache cleared");
    Ok(())
}

pub fn cmd_cleanup(app: &App) -> Result<()> {
    let removed = app.storage.cleanup_expired()?;
    eprintln!("✓ Removed {} expired record(s)", removed);
    Ok(())
}

pub fn cmd_stats(app: &App, json: bool) -> Result<()> {
    let stats = app.storage.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    for (partition, count) in &stats.partitions {
        println!("{:<12} {}", partition, count);
    }
    println!("{:<12} {}", "total", stats.total);
    Ok(())
}

pub fn cmd_export(app: &App, path: &Path) -> Result<()> {
    let backup = app.storage.export_backup()?;
    let records: usize = backup.partitions.values().map(Vec::len).sum();

    let json = serde_json::to_string_pretty(&backup)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;

    eprintln!("✓ Exported {} record(s) to {}", records, path.display());
    Ok(())
}

pub fn cmd_import(app: &App, path: &Path) -> Result<()> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let imported = app.storage.import_backup(&json)?;
    eprintln!("✓ Imported {} record(s) from {}", imported, path.display());
    Ok(())
}
