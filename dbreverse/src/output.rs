//! File output for built models and captured catalogs.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Serializes `value` as pretty JSON and writes it to `output_path`.
pub async fn save_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    let json_data =
        serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")?;

    tokio::fs::write(output_path, json_data)
        .await
        .with_context(|| format!("Failed to write to {}", output_path.display()))?;
    Ok(())
}
