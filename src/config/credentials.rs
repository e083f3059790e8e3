use super::{read_yaml, ConfigError};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Looked up in the working directory when no credential file is given.
pub const DEFAULT_CREDENTIALS_FILE: &str = "pacs_credentials.yaml";

/// HTTP basic authentication credentials for the PACS.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
	username: String,
	password: String,
}

impl Credential {
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			password: password.into(),
		}
	}

	/// Reads a YAML mapping with the keys `username` and `password`.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let path = path.map_or_else(
			|| {
				info!("No credential file provided, using {DEFAULT_CREDENTIALS_FILE} from the working directory");
				PathBuf::from(DEFAULT_CREDENTIALS_FILE)
			},
			Path::to_path_buf,
		);

		read_yaml(&path)
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn password(&self) -> &str {
		&self.password
	}
}

impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credential")
			.field("username", &self.username)
			.field("password", &"***")
			.finish()
	}
}
