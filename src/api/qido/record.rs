use super::{parse_tag_key, tag_key, tag_label, CODE_MAP};
use crate::types::{Instance, Series, Study, IS};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::warn;

/// A single attribute of a DICOM JSON object, e.g. `{"vr": "UI", "Value": ["1.2.3"]}`.
///
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_F.2.2.html>
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Attribute {
	#[serde(default)]
	pub vr: Option<String>,
	#[serde(rename = "Value", default)]
	pub value: Vec<Value>,
}

/// One tag-keyed object of a QIDO-RS response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "HashMap<String, Attribute>")]
pub struct Record(HashMap<Tag, Attribute>);

impl From<HashMap<String, Attribute>> for Record {
	fn from(attributes: HashMap<String, Attribute>) -> Self {
		let attributes = attributes
			.into_iter()
			.filter_map(|(key, attribute)| {
				let tag = parse_tag_key(&key);
				if tag.is_none() {
					warn!("Ignoring attribute with invalid tag key {key}");
				}
				tag.map(|tag| (tag, attribute))
			})
			.collect();
		Self(attributes)
	}
}

#[derive(Debug, Error)]
pub enum AttributeError {
	#[error("missing {label} ({key})")]
	Missing { key: String, label: &'static str },
	#[error("carrying an invalid {label} ({key}): {value}")]
	Invalid {
		key: String,
		label: &'static str,
		value: Value,
	},
}

impl Record {
	/// The first value of an attribute. Attributes without values count as missing.
	pub fn first_value(&self, tag: Tag) -> Result<&Value, AttributeError> {
		self.0
			.get(&tag)
			.and_then(|attribute| attribute.value.first())
			.ok_or_else(|| AttributeError::Missing {
				key: tag_key(tag),
				label: tag_label(tag).unwrap_or("attribute"),
			})
	}

	pub fn string(&self, tag: Tag) -> Result<String, AttributeError> {
		match self.first_value(tag)? {
			Value::String(value) => Ok(value.clone()),
			Value::Number(value) => Ok(value.to_string()),
			value => Err(invalid(tag, value)),
		}
	}

	/// Reads an IS value, which servers encode as a JSON number or a numeric string.
	pub fn integer(&self, tag: Tag) -> Result<IS, AttributeError> {
		let value = self.first_value(tag)?;
		let parsed = match value {
			Value::Number(number) => number.as_i64().and_then(|n| IS::try_from(n).ok()),
			Value::String(string) => string.trim().parse().ok(),
			_ => None,
		};
		parsed.ok_or_else(|| invalid(tag, value))
	}
}

fn invalid(tag: Tag, value: &Value) -> AttributeError {
	AttributeError::Invalid {
		key: tag_key(tag),
		label: tag_label(tag).unwrap_or("attribute"),
		value: value.clone(),
	}
}

/// Lists the values of the record with their labels, known attributes first.
impl Display for Record {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let mut entries: Vec<(String, &Attribute)> = self
			.0
			.iter()
			.map(|(tag, attribute)| {
				let label = tag_label(*tag).map_or_else(|| tag_key(*tag), str::to_owned);
				(label, attribute)
			})
			.collect();
		entries.sort_by_key(|(label, _)| {
			let known = CODE_MAP.iter().position(|(_, known)| known == label);
			(known.unwrap_or(usize::MAX), label.clone())
		});

		for (index, (label, attribute)) in entries.iter().enumerate() {
			if index > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{label}: {}", Value::Array(attribute.value.clone()))?;
		}
		Ok(())
	}
}

impl TryFrom<&Record> for Study {
	type Error = AttributeError;

	fn try_from(record: &Record) -> Result<Self, Self::Error> {
		Ok(Self {
			study_id: record.string(tags::STUDY_INSTANCE_UID)?,
			patient_id: record.string(tags::PATIENT_ID)?,
			subject_id: None,
		})
	}
}

impl TryFrom<&Record> for Series {
	type Error = AttributeError;

	fn try_from(record: &Record) -> Result<Self, Self::Error> {
		Ok(Self {
			series_id: record.string(tags::SERIES_INSTANCE_UID)?,
			series_description: record.string(tags::SERIES_DESCRIPTION)?,
			series_number: record.integer(tags::SERIES_NUMBER)?,
		})
	}
}

impl TryFrom<&Record> for Instance {
	type Error = AttributeError;

	fn try_from(record: &Record) -> Result<Self, Self::Error> {
		Ok(Self {
			instance_id: record.string(tags::SOP_INSTANCE_UID)?,
			instance_number: record.integer(tags::INSTANCE_NUMBER)?,
		})
	}
}
