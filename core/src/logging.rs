//! Logging setup
//!
//! Hosts call [`init`] once at startup. The filter honours `RUST_LOG` and
//! otherwise logs this crate at debug and everything else at info.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "clientdesk=debug,info";

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, or a host
/// that configured its own).
pub fn init() -> bool {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized");
    }
    installed
}
