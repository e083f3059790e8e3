pub(crate) mod api;
pub(crate) mod backend;
pub(crate) mod config;
pub(crate) mod download;
pub(crate) mod selection;
pub(crate) mod types;
pub(crate) mod utils;

use crate::backend::qido::HttpQidoService;
use crate::backend::wado::HttpWadoService;
use crate::backend::PacsClient;
use crate::config::{AppConfig, Credential, DownloadConfig};
use crate::download::{Downloader, FileCache, Outcome};
use crate::selection::{Selection, TerminalOperator};
use crate::types::FetchDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Exit code when the PACS has no studies for the requested date.
const EXIT_NO_STUDIES: u8 = 3;

/// Download the DICOM series acquired on a given date from the PACS.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Acquisition date: YYYY-MM-DD, "today" or "yesterday"
	#[arg(short = 'd', long = "fetch_date", default_value = "today")]
	fetch_date: FetchDate,
	/// YAML file with the PACS username and password [default: pacs_credentials.yaml]
	#[arg(short = 'a', long = "auth_file")]
	auth_file: Option<PathBuf>,
	/// YAML file with patient id patterns. Without it studies and series are chosen interactively
	#[arg(short = 'c', long = "download_config")]
	download_config: Option<PathBuf>,
	/// Directory the studies are written to [default: current directory]
	#[arg(short = 'o', long = "out_dir")]
	out_dir: Option<PathBuf>,
	/// File listing the series descriptions that were already downloaded
	#[arg(long = "cache_file")]
	cache_file: Option<PathBuf>,
	/// Root URL of the PACS web interface, overrides the configured one
	#[arg(long = "base_url")]
	base_url: Option<Url>,
}

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	};

	guard
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	let config = match AppConfig::new() {
		Ok(config) => config,
		Err(err) => {
			eprintln!("Failed to load configuration: {err}");
			return ExitCode::FAILURE;
		}
	};
	init_logger(config.telemetry.level);

	// Manually create the Tokio runtime because the Sentry client needs to be created *before* the
	// Tokio runtime, which prevents us from using the #[tokio::main] macro.
	// See https://docs.sentry.io/platforms/rust/#async-main-function
	let _sentry = init_sentry(&config);

	let runtime = match tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
	{
		Ok(runtime) => runtime,
		Err(err) => {
			error!("Failed to create async runtime: {err}");
			return ExitCode::FAILURE;
		}
	};

	match runtime.block_on(run(cli, config)) {
		Ok(Outcome::Completed(_)) => ExitCode::SUCCESS,
		Ok(Outcome::NoStudies) => ExitCode::from(EXIT_NO_STUDIES),
		Err(err) => {
			error!("{err:#}");
			ExitCode::FAILURE
		}
	}
}

async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<Outcome> {
	if let Some(base_url) = cli.base_url {
		config.pacs.base_url = base_url;
	}
	let cache_file = cli.cache_file.unwrap_or(config.download.cache_file);

	let credential = Credential::load(cli.auth_file.as_deref())?;
	let download_config = cli
		.download_config
		.as_deref()
		.map(DownloadConfig::load)
		.transpose()?;
	let cache = FileCache::open(cache_file)?;

	let client = PacsClient::new(&config.pacs, credential)?;
	info!("Querying {} for {}", config.pacs.base_url, cli.fetch_date);
	let mut downloader = Downloader::new(
		HttpQidoService::new(client.clone()),
		HttpWadoService::new(client),
		cache,
		cli.out_dir,
	);

	let outcome = if let Some(download_config) = &download_config {
		downloader
			.run(cli.fetch_date, &mut Selection::Declarative(download_config))
			.await?
	} else {
		let mut operator = TerminalOperator::stdio();
		downloader
			.run(cli.fetch_date, &mut Selection::Interactive(&mut operator))
			.await?
	};
	Ok(outcome)
}
