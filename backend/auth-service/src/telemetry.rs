//! Structured logging setup
//!
//! `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=debug,sqlx=warn cargo run`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug,auth_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
