//! Structured logging init, in the manner of `garage`'s `init_tracing`: an
//! `EnvFilter` seeded from the config file's `log.level`, overridable by the
//! `RUST_LOG` environment variable the way `tracing-subscriber` always allows.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(default_level: &str) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(true)
		.init();
}
