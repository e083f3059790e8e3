//! Runs a download: query the studies of a date, select, and retrieve series by series.

mod cache;

pub use cache::{CacheError, FileCache, SeriesCache};

use crate::api::qido::{QidoService, SearchError};
use crate::api::wado::{RetrieveError, WadoService};
use crate::selection::{Selection, SelectionError};
use crate::types::{FetchDate, Series, Study};
use crate::utils::sanitize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum DownloadError {
	#[error(transparent)]
	Search(#[from] SearchError),
	#[error(transparent)]
	Retrieve(#[from] RetrieveError),
	#[error(transparent)]
	Selection(#[from] SelectionError),
	#[error(transparent)]
	Cache(#[from] CacheError),
	#[error("Failed to create directory {}: {source}", path.display())]
	CreateDir {
		path: PathBuf,
		source: std::io::Error,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// The PACS has no studies for the date.
	NoStudies,
	Completed(Summary),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
	pub studies: usize,
	pub series_downloaded: usize,
	pub series_skipped: usize,
	/// Series without instances yet. They are not recorded and are retried on the next run.
	pub series_empty: usize,
	pub instances: usize,
}

impl Display for Summary {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{} studies, {} series downloaded, {} series skipped, {} series empty, {} instances written",
			self.studies,
			self.series_downloaded,
			self.series_skipped,
			self.series_empty,
			self.instances
		)
	}
}

pub struct Downloader<Q, W, C> {
	qido: Q,
	wado: W,
	cache: C,
	out_dir: Option<PathBuf>,
}

impl<Q, W, C> Downloader<Q, W, C>
where
	Q: QidoService,
	W: WadoService,
	C: SeriesCache,
{
	pub const fn new(qido: Q, wado: W, cache: C, out_dir: Option<PathBuf>) -> Self {
		Self {
			qido,
			wado,
			cache,
			out_dir,
		}
	}

	#[instrument(skip_all, fields(date = %date))]
	pub async fn run(
		&mut self,
		date: FetchDate,
		selection: &mut Selection<'_>,
	) -> Result<Outcome, DownloadError> {
		let studies = self.qido.list_studies(date).await?;
		if studies.is_empty() {
			info!("No studies found for {date}");
			return Ok(Outcome::NoStudies);
		}

		let studies = selection.studies(studies)?;
		let mut summary = Summary::default();
		for study in &studies {
			self.download_study(study, date, selection, &mut summary)
				.await?;
			summary.studies += 1;
		}

		info!("Download finished: {summary}");
		Ok(Outcome::Completed(summary))
	}

	#[instrument(skip_all, fields(patient = %study.patient_id))]
	async fn download_study(
		&mut self,
		study: &Study,
		date: FetchDate,
		selection: &mut Selection<'_>,
		summary: &mut Summary,
	) -> Result<(), DownloadError> {
		let series = self.qido.list_series(&study.study_id, date).await?;
		let series = selection.series(series)?;

		let study_dir = self.study_dir(study);
		create_dir(&study_dir)?;

		// Series recorded while this study is processed do not skip its other series
		let downloaded_before: Vec<bool> = series
			.iter()
			.map(|series| self.cache.contains(&series.series_description))
			.collect();

		for (series, downloaded_before) in series.iter().zip(downloaded_before) {
			if downloaded_before {
				warn!(
					"Skipping series '{}', it was downloaded before",
					series.series_description
				);
				summary.series_skipped += 1;
				continue;
			}

			match self.download_series(study, series, &study_dir).await? {
				0 => summary.series_empty += 1,
				written => {
					summary.instances += written;
					summary.series_downloaded += 1;
				}
			}
		}
		Ok(())
	}

	async fn download_series(
		&mut self,
		study: &Study,
		series: &Series,
		study_dir: &Path,
	) -> Result<usize, DownloadError> {
		let instances = self
			.qido
			.list_instances(&study.study_id, &series.series_id)
			.await?;
		if instances.is_empty() {
			warn!(
				"Series '{}' has no instances yet, it will be retried on the next run",
				series.series_description
			);
			return Ok(0);
		}

		let series_dir = study_dir.join(sanitize::path_component(&series.directory_name()));
		create_dir(&series_dir)?;
		let written = self
			.wado
			.fetch_series_instances(
				&study.study_id,
				&series.series_id,
				&instances,
				&series_dir,
			)
			.await?;

		self.cache.record(&series.series_description)?;
		info!(
			"Saved {written} instances of series '{}' to {}",
			series.series_description,
			series_dir.display()
		);
		Ok(written)
	}

	fn study_dir(&self, study: &Study) -> PathBuf {
		let name = sanitize::path_component(study.directory_name());
		self.out_dir
			.as_ref()
			.map_or_else(|| PathBuf::from(&name), |out_dir| out_dir.join(&name))
	}
}

fn create_dir(path: &Path) -> Result<(), DownloadError> {
	std::fs::create_dir_all(path).map_err(|source| DownloadError::CreateDir {
		path: path.to_path_buf(),
		source,
	})
}
