use restock_core::config::Environment;
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

/// `RUST_LOG` があればそれを、なければ `info` を使う。
/// production は JSON、それ以外は人が読む形式。
pub fn init_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        debug!("tracing already initialized");
    }
}
