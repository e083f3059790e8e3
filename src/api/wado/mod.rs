use crate::types::Instance;
use crate::utils::sanitize;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Provides the retrieve transaction for whole series.
///
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_10.4.html>
#[async_trait]
pub trait WadoService: Send + Sync {
	/// Downloads every instance of a series into `destination` and returns the number of files
	/// written. Part `i` of the response is saved as `<instances[i].instance_id>.dcm`.
	async fn fetch_series_instances(
		&self,
		study_id: &str,
		series_id: &str,
		instances: &[Instance],
		destination: &Path,
	) -> Result<usize, RetrieveError>;
}

/// The instance whose URL is requested to retrieve a series.
///
/// The PACS answers a request for any single instance with a multipart response containing
/// every instance of the series, so only the first one is ever requested.
pub fn representative_instance(instances: &[Instance]) -> Option<&Instance> {
	instances.first()
}

/// Location of the file an instance is written to, always directly inside `destination`.
pub fn instance_path(destination: &Path, instance: &Instance) -> PathBuf {
	destination.join(format!(
		"{}.dcm",
		sanitize::path_component(&instance.instance_id)
	))
}

#[derive(Debug, Error)]
pub enum RetrieveError {
	#[error("PACS responded with {status} for {url}")]
	Remote { status: StatusCode, url: Url },
	#[error("Malformed response: {0}")]
	Malformed(#[from] MalformedResponse),
	#[error("Failed to read multipart response: {0}")]
	Multipart(#[from] multer::Error),
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error("Failed to write {}: {source}", path.display())]
	Write {
		path: PathBuf,
		source: std::io::Error,
	},
}

#[derive(Debug, Error)]
pub enum MalformedResponse {
	#[error("expected {expected} parts (one per instance) but received {received}")]
	PartCount { expected: usize, received: usize },
	#[error("no multipart boundary in content type {content_type:?}")]
	NoBoundary { content_type: Option<String> },
}
