use crate::Environment;
use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install the color-eyre panic and report hooks.
///
/// Binaries call this first thing in `main`. Repeated calls are ignored.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Default filter directive when `RUST_LOG` is not set.
fn default_directive(environment: &Environment) -> &'static str {
    if environment.is_production() {
        "warn,domain_courier=info"
    } else {
        "info,domain_courier=debug"
    }
}

/// Initialize the global tracing subscriber.
///
/// - **Production**: flattened JSON events without targets, for log shipping.
/// - **Development**: pretty, human readable output.
///
/// Both variants carry `tracing_error::ErrorLayer` so errors can capture the
/// active span trace. `RUST_LOG` overrides the default filter.
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case in test binaries.
pub fn init_tracing(environment: &Environment) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(environment)));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(()) => {
            debug!(environment = ?environment, "Tracing initialized");
            true
        }
        Err(_) => false,
    }
}
