//! Structured logging setup emitting JSON lines.

use crate::common::config::AppCfg;

/// Install the JSON-lines subscriber at the configured level.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(cfg: &AppCfg) {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_max_level(cfg.log_level)
        .with_current_span(false)
        .try_init();
}
