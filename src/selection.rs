//! Decides which studies and series of a date are downloaded.
//!
//! Without a download config an operator picks one study and one series (or all of them) from a
//! numbered menu. With a download config every study whose patient id matches the configured
//! pattern is downloaded with all of its series.

use crate::config::DownloadConfig;
use crate::types::{Series, Study};
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SelectionError {
	#[error("Invalid selection {value}, expected a number between 0 and {max}")]
	OutOfRange { value: i64, max: usize },
	#[error("No selection was made before the end of input")]
	NoInput,
	#[error("There is nothing to choose from")]
	NothingToSelect,
	#[error("No patient id matches the pattern '{pattern}'")]
	NoMatch { pattern: String },
	#[error("Subject id pattern '{pattern}' does not match patient id '{patient_id}'")]
	PatternMismatch { pattern: String, patient_id: String },
	#[error("Failed to interact with the terminal: {0}")]
	Io(#[from] io::Error),
}

/// Someone who chooses what to download.
pub trait Operator {
	fn choose_study(&mut self, studies: &[Study]) -> Result<Study, SelectionError>;

	/// Returns either a single series or every series.
	fn choose_series(&mut self, series: &[Series]) -> Result<Vec<Series>, SelectionError>;
}

/// How the studies and series of a run are selected.
pub enum Selection<'a> {
	Interactive(&'a mut dyn Operator),
	Declarative(&'a DownloadConfig),
}

impl Selection<'_> {
	pub fn studies(&mut self, studies: Vec<Study>) -> Result<Vec<Study>, SelectionError> {
		match self {
			Self::Interactive(operator) => Ok(vec![operator.choose_study(&studies)?]),
			Self::Declarative(config) => select_studies(studies, config),
		}
	}

	pub fn series(&mut self, series: Vec<Series>) -> Result<Vec<Series>, SelectionError> {
		match self {
			Self::Interactive(operator) => operator.choose_series(&series),
			Self::Declarative(_) => Ok(series),
		}
	}
}

/// Keeps the studies whose patient id contains a match of the patient id pattern, in their
/// original order, and derives their subject ids.
///
/// Every subject id is derived before this returns, so a pattern mismatch stops the run before
/// anything is downloaded.
pub fn select_studies(
	studies: Vec<Study>,
	config: &DownloadConfig,
) -> Result<Vec<Study>, SelectionError> {
	let mut selected: Vec<Study> = studies
		.into_iter()
		.filter(|study| config.patient_id_pattern.is_match(&study.patient_id))
		.collect();

	if selected.is_empty() {
		return Err(SelectionError::NoMatch {
			pattern: config.patient_id_pattern.to_string(),
		});
	}
	info!("{} studies match the patient id pattern", selected.len());

	if let Some(pattern) = &config.patient_subject_id_pattern {
		for study in &mut selected {
			let subject_id = pattern
				.find(&study.patient_id)
				.map(|found| found.as_str())
				.filter(|found| !found.is_empty())
				.ok_or_else(|| SelectionError::PatternMismatch {
					pattern: pattern.to_string(),
					patient_id: study.patient_id.clone(),
				})?;
			debug!(patient_id = %study.patient_id, subject_id, "Derived subject id");
			study.subject_id = Some(subject_id.to_owned());
		}
	}

	Ok(selected)
}

/// Menu-driven operator reading choices from `input` and writing menus to `output`.
pub struct TerminalOperator<R, W> {
	input: R,
	output: W,
}

impl TerminalOperator<StdinLock<'static>, Stdout> {
	pub fn stdio() -> Self {
		Self::new(io::stdin().lock(), io::stdout())
	}
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
	pub const fn new(input: R, output: W) -> Self {
		Self { input, output }
	}

	/// Asks for an integer until one is entered.
	fn read_integer(&mut self, prompt: &str) -> Result<i64, SelectionError> {
		loop {
			write!(self.output, "{prompt}: ")?;
			self.output.flush()?;

			let mut line = String::new();
			if self.input.read_line(&mut line)? == 0 {
				return Err(SelectionError::NoInput);
			}
			let line = line.trim();
			match line.parse() {
				Ok(value) => return Ok(value),
				Err(_) => writeln!(self.output, "Error: '{line}' is not a valid integer.")?,
			}
		}
	}

	/// Prints the options and reads an index in `0..=max`.
	fn choose<'o>(
		&mut self,
		options: impl IntoIterator<Item = &'o str>,
		prompt: &str,
	) -> Result<usize, SelectionError> {
		writeln!(self.output, "Options:")?;
		let mut max = 0;
		for (index, option) in options.into_iter().enumerate() {
			writeln!(self.output, "[{index}]: {option}")?;
			max = index;
		}

		let value = self.read_integer(&format!("{prompt} (0 - {max})"))?;
		usize::try_from(value)
			.ok()
			.filter(|index| *index <= max)
			.ok_or(SelectionError::OutOfRange { value, max })
	}
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
	fn choose_study(&mut self, studies: &[Study]) -> Result<Study, SelectionError> {
		if studies.is_empty() {
			return Err(SelectionError::NothingToSelect);
		}
		let index = self.choose(
			studies.iter().map(|study| study.patient_id.as_str()),
			"Choose a study to download",
		)?;
		Ok(studies[index].clone())
	}

	fn choose_series(&mut self, series: &[Series]) -> Result<Vec<Series>, SelectionError> {
		let options = series
			.iter()
			.map(|series| series.series_description.as_str())
			.chain(["ALL SERIES"]);
		let index = self.choose(options, "Choose a series to download")?;

		Ok(series
			.get(index)
			.map_or_else(|| series.to_vec(), |chosen| vec![chosen.clone()]))
	}
}
