mod record;

pub use record::{AttributeError, Record};

use crate::types::{FetchDate, Instance, Series, Study};
use async_trait::async_trait;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Provides the search transactions needed to walk from a date to the instances of a series.
///
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_10.6.html>
#[async_trait]
pub trait QidoService: Send + Sync {
	/// Studies performed on the given date.
	async fn list_studies(&self, date: FetchDate) -> Result<Vec<Study>, SearchError>;

	/// Series of a study performed on the given date.
	async fn list_series(&self, study_id: &str, date: FetchDate)
		-> Result<Vec<Series>, SearchError>;

	/// Instances of a series in the order reported by the PACS.
	/// The WADO-RS response for the series uses the same order.
	async fn list_instances(
		&self,
		study_id: &str,
		series_id: &str,
	) -> Result<Vec<Instance>, SearchError>;
}

#[derive(Debug, Error)]
pub enum SearchError {
	#[error("Invalid credentials provided - please check your username and password.")]
	Unauthorized,
	#[error("PACS responded with {status} for {url}")]
	Remote { status: StatusCode, url: Url },
	#[error("Malformed response: record {index} is {source}")]
	Malformed {
		index: usize,
		source: AttributeError,
	},
	#[error("Failed to decode response: {0}")]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Http(#[from] reqwest::Error),
}

/// Human-readable labels for the attributes returned by the PACS.
pub static CODE_MAP: &[(Tag, &str)] = &[
	(tags::STUDY_DATE, "Study Date"),
	(tags::STUDY_TIME, "Study Time"),
	(tags::PATIENT_ID, "Patient ID"),
	(tags::RETRIEVE_URL, "Retrieve URL"),
	(tags::STUDY_INSTANCE_UID, "Study Instance UID"),
	(tags::STUDY_ID, "Study ID"),
	(tags::NUMBER_OF_STUDY_RELATED_SERIES, "Number of Study Related Series"),
	(tags::SERIES_DATE, "Series Date"),
	(tags::SERIES_TIME, "Series Time"),
	(tags::SERIES_DESCRIPTION, "Series Description"),
	(tags::SERIES_INSTANCE_UID, "Series Instance UID"),
	(tags::SERIES_NUMBER, "Series Number"),
	(tags::NUMBER_OF_SERIES_RELATED_INSTANCES, "Number of Series Related Instances"),
	(tags::INSTANCE_CREATION_DATE, "Instance Creation Date"),
	(tags::INSTANCE_CREATION_TIME, "Instance Creation Time"),
	(tags::INSTANCE_NUMBER, "Instance Number"),
	(tags::NUMBER_OF_FRAMES, "Number of Frames"),
	(tags::SOP_INSTANCE_UID, "SOP Instance UID"),
];

pub fn tag_label(tag: Tag) -> Option<&'static str> {
	CODE_MAP
		.iter()
		.find(|(known, _)| *known == tag)
		.map(|(_, label)| *label)
}

/// Formats a tag the way DICOM JSON keys it, e.g. `0020000D`.
pub fn tag_key(tag: Tag) -> String {
	format!("{:04X}{:04X}", tag.group(), tag.element())
}

/// Parses a DICOM JSON key such as `0020000D` (case-insensitive).
pub fn parse_tag_key(key: &str) -> Option<Tag> {
	if key.len() != 8 {
		return None;
	}
	let group = u16::from_str_radix(key.get(..4)?, 16).ok()?;
	let element = u16::from_str_radix(key.get(4..)?, 16).ok()?;
	Some(Tag(group, element))
}
