use super::{read_yaml, ConfigError};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct DownloadConfigFile {
	patient_id_pattern: String,
	#[serde(default)]
	patient_subject_id_pattern: Option<String>,
}

/// Rules for selecting studies without operator interaction.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
	/// Studies whose patient id contains a match are downloaded.
	pub patient_id_pattern: Regex,
	/// The matched text becomes the subject id of a study.
	pub patient_subject_id_pattern: Option<Regex>,
}

impl DownloadConfig {
	pub fn new(
		patient_id_pattern: &str,
		patient_subject_id_pattern: Option<&str>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			patient_id_pattern: compile(patient_id_pattern)?,
			// An empty pattern disables the subject id, same as leaving it out.
			patient_subject_id_pattern: patient_subject_id_pattern
				.filter(|pattern| !pattern.is_empty())
				.map(compile)
				.transpose()?,
		})
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let file: DownloadConfigFile = read_yaml(path)?;
		Self::new(
			&file.patient_id_pattern,
			file.patient_subject_id_pattern.as_deref(),
		)
	}
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
	Regex::new(pattern).map_err(|source| ConfigError::Pattern {
		pattern: pattern.to_owned(),
		source,
	})
}
