use crate::api::qido::{AttributeError, QidoService, Record, SearchError};
use crate::backend::PacsClient;
use crate::types::{FetchDate, Instance, Series, Study};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, instrument, trace};
use url::Url;

const QUERY_ENDPOINT: &str = "qidors.php";

pub struct HttpQidoService {
	client: PacsClient,
}

impl HttpQidoService {
	pub const fn new(client: PacsClient) -> Self {
		Self { client }
	}

	/// Runs a search and returns the raw records.
	/// A 204 (No Content) response means there are no matches and is never parsed.
	async fn search(&self, url: Url, query: &[(&str, String)]) -> Result<Vec<Record>, SearchError> {
		debug!("Performing lookup on {url}");
		let response = self.client.get(url.clone()).query(query).send().await?;

		match response.status() {
			StatusCode::UNAUTHORIZED => Err(SearchError::Unauthorized),
			StatusCode::NO_CONTENT => Ok(Vec::new()),
			status if status.is_success() => {
				let body = response.bytes().await?;
				if body.iter().all(u8::is_ascii_whitespace) {
					return Ok(Vec::new());
				}
				let records: Vec<Record> = serde_json::from_slice(&body)?;
				for record in &records {
					trace!("{record}");
				}
				Ok(records)
			}
			status => Err(SearchError::Remote { status, url }),
		}
	}
}

fn parse_records<T>(records: &[Record]) -> Result<Vec<T>, SearchError>
where
	T: for<'a> TryFrom<&'a Record, Error = AttributeError>,
{
	records
		.iter()
		.enumerate()
		.map(|(index, record)| {
			T::try_from(record).map_err(|source| SearchError::Malformed { index, source })
		})
		.collect()
}

#[async_trait]
impl QidoService for HttpQidoService {
	#[instrument(skip_all, fields(date = %date))]
	async fn list_studies(&self, date: FetchDate) -> Result<Vec<Study>, SearchError> {
		let url = self.client.endpoint([QUERY_ENDPOINT, "studies"]);
		let records = self
			.search(url, &[("StudyDate", date.to_query_value())])
			.await?;
		let studies: Vec<Study> = parse_records(&records)?;
		info!("Found {} studies", studies.len());
		Ok(studies)
	}

	#[instrument(skip_all, fields(study = study_id, date = %date))]
	async fn list_series(
		&self,
		study_id: &str,
		date: FetchDate,
	) -> Result<Vec<Series>, SearchError> {
		let url = self
			.client
			.endpoint([QUERY_ENDPOINT, "studies", study_id, "series"]);
		let records = self
			.search(url, &[("SeriesDate", date.to_query_value())])
			.await?;
		let series: Vec<Series> = parse_records(&records)?;
		info!("Found {} series", series.len());
		Ok(series)
	}

	#[instrument(skip_all, fields(series = series_id))]
	async fn list_instances(
		&self,
		study_id: &str,
		series_id: &str,
	) -> Result<Vec<Instance>, SearchError> {
		let url = self.client.endpoint([
			QUERY_ENDPOINT,
			"studies",
			study_id,
			"series",
			series_id,
			"instances",
		]);
		let records = self.search(url, &[]).await?;
		let instances: Vec<Instance> = parse_records(&records)?;
		info!("Found {} instances", instances.len());
		Ok(instances)
	}
}
