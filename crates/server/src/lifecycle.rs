//! Startup sequence: install the current generation, then activate it.

use sitecache_client::{ActivationReport, Fetcher, OfflineCache};

/// Install the configured generation and, only if that succeeds, activate it.
///
/// Failures are logged rather than returned: the server still starts and
/// keeps serving whatever generation was serving before.
pub async fn boot<F: Fetcher>(cache: &OfflineCache<F>) -> Option<ActivationReport> {
    let version = cache.version();

    let installed = match cache.install().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(version, error = %e, "install failed, previous generation stays current");
            return None;
        }
    };
    tracing::info!(version, entries = installed.entries, "install complete");

    match cache.activate().await {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(version, failed = ?report.failed, "some stale generations were not deleted");
            }
            tracing::info!(version, deleted = report.deleted.len(), "activation complete");
            Some(report)
        }
        Err(e) => {
            tracing::error!(version, error = %e, "activation failed");
            None
        }
    }
}
