//! Main entry point for the order service.
//!
//! Loads the configuration, wires the order engine from the configured
//! backends and serves the HTTP API until interrupted.

use clap::Parser;
use order_config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Write logs to a daily-rolling file instead of stdout
	#[arg(long, env = "ORDERS_LOG_FILE")]
	log_file: Option<PathBuf>,
}

/// Installs the global subscriber. Buffered lines are flushed when the
/// returned guard is dropped.
fn init_tracing(log_level: &str, log_file: Option<&Path>) -> WorkerGuard {
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

	let (writer, guard) = match log_file {
		Some(path) => {
			let directory = path
				.parent()
				.filter(|dir| !dir.as_os_str().is_empty())
				.unwrap_or_else(|| Path::new("."));
			let prefix = path
				.file_name()
				.map(|name| name.to_os_string())
				.unwrap_or_else(|| "orders.log".into());
			tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
		},
		None => tracing_appender::non_blocking(std::io::stdout()),
	};

	fmt()
		.with_env_filter(env_filter)
		.with_writer(writer)
		.with_ansi(log_file.is_none())
		.with_thread_ids(true)
		.with_target(true)
		.init();

	guard
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	let _guard = init_tracing(&args.log_level, args.log_file.as_deref());

	tracing::info!("Started order service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);
	engine.initialize().await?;

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			server::start_server(api_config, Arc::clone(&engine), server::shutdown_signal())
				.await?;
		},
		None => {
			tracing::info!("API disabled, waiting for shutdown signal");
			server::shutdown_signal().await;
		},
	}

	engine.shutdown().await?;
	tracing::info!("Stopped order service");
	Ok(())
}
