//! Tracing subscriber setup for hosts embedding the coordinator.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a stderr fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter comes from `debug`. Returns
/// `false` when a global subscriber was already installed.
pub fn init_tracing(debug: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| build_env_filter(debug));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

fn build_env_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("job_relay=debug,job_api=debug,relay_cli=debug")
    } else {
        EnvFilter::new("job_relay=info,relay_cli=info")
    }
}
