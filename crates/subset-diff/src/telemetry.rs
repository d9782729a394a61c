//! Tracing subscriber setup.

use std::io::IsTerminal;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
	layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

#[derive(Debug, Error)]
#[error("installing tracing subscriber")]
pub struct TelemetryError(#[from] TryInitError);

/// Initialize tracing with the given log level.
///
/// Priority for log level:
/// 1. `log_level` argument
/// 2. `RUST_LOG` environment variable
/// 3. Default: info
///
/// Logs go to stderr, pretty printed on a terminal and as JSON otherwise.
/// The subscriber is global, so only the first call in a process succeeds.
pub fn init(log_level: Option<Level>) -> Result<(), TelemetryError> {
	let filter_layer = filter(log_level);

	let fmt_layer = if std::io::stderr().is_terminal() {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed()
	};

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(fmt_layer)
		.try_init()?;

	Ok(())
}

fn filter(log_level: Option<Level>) -> EnvFilter {
	match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	}
}
