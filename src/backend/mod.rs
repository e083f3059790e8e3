//! HTTP backend for the PACS web interface.
//! - QIDO-RS is served by `qidors.php` and answers with DICOM JSON.
//! - WADO-RS is served by `wadors.php` and answers with multipart/related bodies.

pub mod qido;
pub mod wado;

use crate::config::{Credential, PacsConfig};
use reqwest::RequestBuilder;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = concat!("pacs-fetch/", env!("CARGO_PKG_VERSION"));

/// A basic-auth HTTP client bound to the base URL of the PACS.
#[derive(Debug, Clone)]
pub struct PacsClient {
	http: reqwest::Client,
	base_url: Url,
	credential: Credential,
}

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Base URL {0} cannot have path segments")]
	InvalidBaseUrl(Url),
	#[error("Failed to build HTTP client: {0}")]
	Http(#[from] reqwest::Error),
}

impl PacsClient {
	pub fn new(config: &PacsConfig, credential: Credential) -> Result<Self, ClientError> {
		if config.base_url.cannot_be_a_base() {
			return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
		}

		let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
		if let Some(timeout) = config.request_timeout {
			builder = builder.timeout(Duration::from_secs(timeout));
		}
		if let Some(timeout) = config.connect_timeout {
			builder = builder.connect_timeout(Duration::from_secs(timeout));
		}

		Ok(Self {
			http: builder.build()?,
			base_url: config.base_url.clone(),
			credential,
		})
	}

	/// Appends percent-encoded path segments to the base URL.
	pub fn endpoint<I>(&self, segments: I) -> Url
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let mut url = self.base_url.clone();
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}
		url
	}

	/// Starts an authenticated GET request.
	pub fn get(&self, url: Url) -> RequestBuilder {
		self.http.get(url).basic_auth(
			self.credential.username(),
			Some(self.credential.password()),
		)
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn endpoint_extends_base_path() {
		let client = testing::client("https://pacs.example.org/pacsone");
		assert_eq!(
			client
				.endpoint(["qidors.php", "studies", "1.2.3", "series"])
				.as_str(),
			"https://pacs.example.org/pacsone/qidors.php/studies/1.2.3/series"
		);

		let client = testing::client("https://pacs.example.org/pacsone/");
		assert_eq!(
			client.endpoint(["wadors.php"]).as_str(),
			"https://pacs.example.org/pacsone/wadors.php"
		);

		let client = testing::client("http://127.0.0.1:8080");
		assert_eq!(
			client.endpoint(["qidors.php", "studies"]).as_str(),
			"http://127.0.0.1:8080/qidors.php/studies"
		);
	}

	#[test]
	fn endpoint_escapes_segments() {
		let client = testing::client("https://pacs.example.org/pacsone");
		assert_eq!(
			client.endpoint(["qidors.php", "a/b c"]).as_str(),
			"https://pacs.example.org/pacsone/qidors.php/a%2Fb%20c"
		);
	}

	#[test]
	fn reject_opaque_base_url() {
		let config = PacsConfig {
			base_url: "mailto:pacs@example.org".parse().unwrap(),
			request_timeout: None,
			connect_timeout: None,
		};
		assert!(matches!(
			PacsClient::new(&config, Credential::new("a", "b")),
			Err(ClientError::InvalidBaseUrl(_))
		));
	}
}
