//! Structured logging init (§10.2).
//!
//! Compact human format on a TTY, JSON when `NO_COLOR`/non-TTY or requested
//! explicitly. `events.csv` (written by `dcmrelay-artifact`) remains the
//! durable audit trail; this is for live operational observability.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dcmrelay=info,warn"))
}

fn want_json(force_json: bool) -> bool {
    force_json || !std::io::stdout().is_terminal() || std::env::var_os("NO_COLOR").is_some()
}

/// Initialize the global tracing subscriber. Safe to call once per process;
/// returns an error if a subscriber is already installed.
pub fn init(force_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter();

    if want_json(force_json) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(false))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn want_json_forced() {
        assert!(want_json(true));
    }
}
