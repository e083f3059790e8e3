use chrono::{Days, Local, NaiveDate};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// UI (Unique Identifier) value representation.
pub type UI = String;

/// LO (Long String) value representation.
pub type LO = String;

/// IS (Integer String) value representation.
pub type IS = i32;

/// A study found by the date query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Study {
	/// The Study Instance UID (0020,000D).
	pub study_id: UI,
	/// The Patient ID (0010,0020).
	pub patient_id: LO,
	/// Derived locally from the patient id, never sent to the PACS.
	pub subject_id: Option<String>,
}

impl Study {
	/// Name of the directory the study is written to.
	pub fn directory_name(&self) -> &str {
		self.subject_id.as_deref().unwrap_or(&self.patient_id)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
	/// The Series Instance UID (0020,000E).
	pub series_id: UI,
	/// The Series Description (0008,103E). Also the skip-list key.
	pub series_description: LO,
	/// The Series Number (0020,0011).
	pub series_number: IS,
}

impl Series {
	/// Name of the directory the series is written to: `<series_number>_<series_description>`.
	pub fn directory_name(&self) -> String {
		format!("{}_{}", self.series_number, self.series_description)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
	/// The SOP Instance UID (0008,0018).
	pub instance_id: UI,
	/// The Instance Number (0020,0013).
	pub instance_number: IS,
}

/// The date studies and series are queried for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FetchDate(NaiveDate);

impl FetchDate {
	pub const fn new(date: NaiveDate) -> Self {
		Self(date)
	}

	pub fn today() -> Self {
		Self(Local::now().date_naive())
	}

	/// Formats the date as a DICOM DA value (`YYYYMMDD`) as expected by the query API.
	pub fn to_query_value(self) -> String {
		self.0.format("%Y%m%d").to_string()
	}
}

impl Display for FetchDate {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0.format("%Y-%m-%d"))
	}
}

#[derive(Debug, Error)]
pub enum ParseFetchDateError {
	#[error("`{value}` is not a date of the form YYYY-MM-DD, `today` or `yesterday`")]
	Invalid { value: String },
}

impl FromStr for FetchDate {
	type Err = ParseFetchDateError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let today = Self::today();
		match s.trim() {
			"today" => Ok(today),
			"yesterday" => today
				.0
				.checked_sub_days(Days::new(1))
				.map(Self)
				.ok_or_else(|| ParseFetchDateError::Invalid { value: s.into() }),
			value => NaiveDate::parse_from_str(value, "%Y-%m-%d")
				.map(Self)
				.map_err(|_| ParseFetchDateError::Invalid { value: s.into() }),
		}
	}
}
