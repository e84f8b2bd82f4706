//! Prometheus textfile export.
//!
//! Installs the `metrics-exporter-prometheus` recorder without an HTTP listener
//! and writes the rendered exposition to `[metrics].textfile_path` when the
//! command finishes. Point the path into node_exporter's textfile collector
//! directory to scrape it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use infraprobe_core::config::MetricsConfig;

/// Installed recorder and the file it is flushed to.
pub struct MetricsExport {
    handle: PrometheusHandle,
    path: PathBuf,
}

/// Install the global metrics recorder when `[metrics]` is enabled.
///
/// Returns `None` when disabled; `metrics::counter!()` calls are then no-ops.
///
/// # Errors
///
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<Option<MetricsExport>> {
    if !config.enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    infraprobe_core::metrics::describe_all();

    tracing::info!(
        path = config.textfile_path.as_str(),
        "Prometheus textfile export enabled"
    );

    Ok(Some(MetricsExport {
        handle,
        path: PathBuf::from(&config.textfile_path),
    }))
}

impl MetricsExport {
    /// Render the current metrics and write them to the textfile.
    pub async fn flush(&self) -> Result<()> {
        self.handle.run_upkeep();
        write_textfile(&self.path, &self.handle.render()).await?;
        tracing::debug!(path = %self.path.display(), "metrics textfile written");
        Ok(())
    }
}

/// Write to a sibling temp file, then rename into place.
async fn write_textfile(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;
    Ok(())
}
