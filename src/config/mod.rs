mod credentials;
mod download;

pub use credentials::Credential;
pub use download::DownloadConfig;

use ::config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub pacs: PacsConfig,
	pub download: DownloadSettings,
}

impl AppConfig {
	/// Loads the built-in defaults, then `config.toml` (if present) and finally
	/// environment variables such as `PACS_FETCH_PACS__BASE_URL`.
	pub fn new() -> Result<Self, ::config::ConfigError> {
		Config::builder()
			.add_source(File::from_str(
				include_str!("defaults.toml"),
				FileFormat::Toml,
			))
			.add_source(File::with_name("config.toml").required(false))
			.add_source(
				Environment::with_prefix("PACS_FETCH")
					.prefix_separator("_")
					.separator("__"),
			)
			.build()?
			.try_deserialize()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	// Also configurable via RUST_LOG and PACS_FETCH_TELEMETRY__LEVEL
	#[serde(deserialize_with = "deserialize_level")]
	pub level: Level,
	/// Sentry DSN. Error reporting is disabled if unset.
	pub sentry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacsConfig {
	/// Root of the PACS web interface. `qidors.php` and `wadors.php` are resolved against it.
	pub base_url: Url,
	/// Total request timeout in seconds.
	pub request_timeout: Option<u64>,
	/// Connect timeout in seconds.
	pub connect_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
	/// Skip-list of series descriptions that were already downloaded.
	pub cache_file: PathBuf,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
	D: Deserializer<'de>,
{
	let level = String::deserialize(deserializer)?;
	level.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Failed to load {}: {source}", path.display())]
	Load {
		path: PathBuf,
		source: ::config::ConfigError,
	},
	#[error("Invalid pattern `{pattern}`: {source}")]
	Pattern {
		pattern: String,
		source: regex::Error,
	},
}

/// Reads a YAML file that must exist and deserializes it into `T`.
fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
	Config::builder()
		.add_source(File::from(path).format(FileFormat::Yaml).required(true))
		.build()
		.and_then(Config::try_deserialize)
		.map_err(|source| ConfigError::Load {
			path: path.to_path_buf(),
			source,
		})
}
