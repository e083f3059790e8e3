use crate::api::wado::{
	instance_path, representative_instance, MalformedResponse, RetrieveError, WadoService,
};
use crate::backend::PacsClient;
use crate::types::Instance;
use crate::utils::multipart::DicomMultipart;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

const RETRIEVE_ENDPOINT: &str = "wadors.php";
const APPLICATION_DICOM: &str = "application/dicom";

pub struct HttpWadoService {
	client: PacsClient,
}

impl HttpWadoService {
	pub const fn new(client: PacsClient) -> Self {
		Self { client }
	}
}

#[async_trait]
impl WadoService for HttpWadoService {
	#[instrument(skip_all, fields(series = series_id))]
	async fn fetch_series_instances(
		&self,
		study_id: &str,
		series_id: &str,
		instances: &[Instance],
		destination: &Path,
	) -> Result<usize, RetrieveError> {
		let Some(representative) = representative_instance(instances) else {
			warn!("Series has no instances, nothing to retrieve");
			return Ok(0);
		};

		let url = self.client.endpoint([
			RETRIEVE_ENDPOINT,
			study_id,
			"series",
			series_id,
			"instance",
			representative.instance_id.as_str(),
		]);
		info!("Downloading {} instances", instances.len());
		let response = self
			.client
			.get(url.clone())
			.header(ACCEPT, APPLICATION_DICOM)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(RetrieveError::Remote { status, url });
		}

		let content_type = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);
		let boundary = content_type
			.as_deref()
			.map(DicomMultipart::parse_boundary)
			.and_then(Result::ok)
			.ok_or(MalformedResponse::NoBoundary { content_type })?;

		let mut multipart = DicomMultipart::new(response.bytes_stream(), boundary);
		write_parts(&mut multipart, instances, destination).await
	}
}

/// Streams part `i` into the file of `instances[i]`.
/// Fails if the number of parts differs from the number of instances.
async fn write_parts(
	multipart: &mut DicomMultipart<'_>,
	instances: &[Instance],
	destination: &Path,
) -> Result<usize, RetrieveError> {
	let mut received = 0;

	while let Some(mut part) = multipart.next_part().await? {
		let Some(instance) = instances.get(received) else {
			drop(part);
			received += 1;
			while multipart.next_part().await?.is_some() {
				received += 1;
			}
			return Err(MalformedResponse::PartCount {
				expected: instances.len(),
				received,
			}
			.into());
		};

		let path = instance_path(destination, instance);
		let write_error = |source: std::io::Error| RetrieveError::Write {
			path: path.clone(),
			source,
		};
		let mut file = File::create(&path).await.map_err(write_error)?;
		let mut size = 0;
		while let Some(chunk) = part.chunk().await? {
			size += chunk.len();
			file.write_all(&chunk).await.map_err(write_error)?;
		}
		file.flush().await.map_err(write_error)?;

		received += 1;
		debug!(
			"Saved instance {received} of {} ({size} bytes) to {}",
			instances.len(),
			path.display()
		);
	}

	if received == instances.len() {
		Ok(received)
	} else {
		Err(MalformedResponse::PartCount {
			expected: instances.len(),
			received,
		}
		.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::testing::{self, PASSWORD, USERNAME};
	use std::fs;
	use wiremock::matchers::{basic_auth, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const BOUNDARY: &str = "DICOMwebBoundary";

	fn instances(ids: &[&str]) -> Vec<Instance> {
		ids.iter()
			.zip(1..)
			.map(|(id, number)| Instance {
				instance_id: (*id).to_string(),
				instance_number: number,
			})
			.collect()
	}

	fn multipart_response(parts: &[&[u8]]) -> ResponseTemplate {
		let mut body = Vec::new();
		for part in parts {
			body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
			body.extend_from_slice(b"Content-Type: application/dicom\r\n\r\n");
			body.extend_from_slice(part);
			body.extend_from_slice(b"\r\n");
		}
		body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

		ResponseTemplate::new(200).set_body_raw(
			body,
			&format!("multipart/related; type=\"application/dicom\"; boundary={BOUNDARY}"),
		)
	}

	async fn service() -> (MockServer, HttpWadoService) {
		let server = MockServer::start().await;
		let service = HttpWadoService::new(testing::client(&server.uri()));
		(server, service)
	}

	#[tokio::test]
	async fn single_request_writes_every_part() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.and(path("/wadors.php/1.2.840.1/series/1.2.840.1.1/instance/A"))
			.and(header("Accept", "application/dicom"))
			.and(basic_auth(USERNAME, PASSWORD))
			.respond_with(multipart_response(&[b"part-a", b"\x00DICM\r\nb", b"part-c"]))
			.expect(1)
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let written = wado
			.fetch_series_instances(
				"1.2.840.1",
				"1.2.840.1.1",
				&instances(&["A", "B", "C"]),
				dir.path(),
			)
			.await
			.unwrap();

		assert_eq!(written, 3);
		assert_eq!(fs::read(dir.path().join("A.dcm")).unwrap(), b"part-a");
		assert_eq!(fs::read(dir.path().join("B.dcm")).unwrap(), b"\x00DICM\r\nb");
		assert_eq!(fs::read(dir.path().join("C.dcm")).unwrap(), b"part-c");
		assert_eq!(server.received_requests().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn unquoted_type_parameter_is_accepted() {
		let (server, wado) = service().await;
		let body = format!(
			"--{BOUNDARY}\r\nContent-Type: application/dicom\r\n\r\npart-a\r\n--{BOUNDARY}--\r\n"
		);
		Mock::given(method("GET"))
			.and(path("/wadors.php/1.2.840.1/series/1.2.840.1.1/instance/A"))
			.respond_with(ResponseTemplate::new(200).set_body_raw(
				body.into_bytes(),
				&format!("multipart/related; type=application/dicom; boundary={BOUNDARY}"),
			))
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let written = wado
			.fetch_series_instances(
				"1.2.840.1",
				"1.2.840.1.1",
				&instances(&["A"]),
				dir.path(),
			)
			.await
			.unwrap();

		assert_eq!(written, 1);
		assert_eq!(fs::read(dir.path().join("A.dcm")).unwrap(), b"part-a");
	}

	#[tokio::test]
	async fn absolute_instance_id_is_written_inside_destination() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.and(path("/wadors.php/1.2.840.1/series/1.2.840.1.1/instance/A"))
			.respond_with(multipart_response(&[b"part-a", b"part-b"]))
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let elsewhere = tempfile::tempdir().unwrap();
		let escaping_id = elsewhere.path().join("escaped");
		let escaping_id = escaping_id.to_str().unwrap();

		let written = wado
			.fetch_series_instances(
				"1.2.840.1",
				"1.2.840.1.1",
				&instances(&["A", escaping_id]),
				dir.path(),
			)
			.await
			.unwrap();

		assert_eq!(written, 2);
		assert!(!elsewhere.path().join("escaped.dcm").exists());
		assert_eq!(fs::read_dir(elsewhere.path()).unwrap().count(), 0);
		assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
		let sanitized = format!("{}.dcm", escaping_id.replace('/', "_"));
		assert_eq!(fs::read(dir.path().join(sanitized)).unwrap(), b"part-b");
	}

	#[tokio::test]
	async fn too_few_parts_is_malformed() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.and(path("/wadors.php/1.2.840.1/series/1.2.840.1.1/instance/A"))
			.respond_with(multipart_response(&[b"part-a", b"part-b"]))
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let error = wado
			.fetch_series_instances(
				"1.2.840.1",
				"1.2.840.1.1",
				&instances(&["A", "B", "C"]),
				dir.path(),
			)
			.await
			.unwrap_err();

		assert!(matches!(
			error,
			RetrieveError::Malformed(MalformedResponse::PartCount {
				expected: 3,
				received: 2
			})
		));
	}

	#[tokio::test]
	async fn too_many_parts_is_malformed() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.and(path("/wadors.php/1.2.840.1/series/1.2.840.1.1/instance/A"))
			.respond_with(multipart_response(&[b"part-a", b"part-b", b"part-c"]))
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let error = wado
			.fetch_series_instances(
				"1.2.840.1",
				"1.2.840.1.1",
				&instances(&["A"]),
				dir.path(),
			)
			.await
			.unwrap_err();

		assert!(matches!(
			error,
			RetrieveError::Malformed(MalformedResponse::PartCount {
				expected: 1,
				received: 3
			})
		));
	}

	#[tokio::test]
	async fn error_status_is_remote_error() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let error = wado
			.fetch_series_instances("1", "2", &instances(&["A"]), dir.path())
			.await
			.unwrap_err();

		assert!(matches!(error, RetrieveError::Remote { status, .. } if status.as_u16() == 404));
	}

	#[tokio::test]
	async fn non_multipart_body_is_malformed() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.respond_with(
				ResponseTemplate::new(200).set_body_raw(b"DICM".to_vec(), "application/dicom"),
			)
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let error = wado
			.fetch_series_instances("1", "2", &instances(&["A"]), dir.path())
			.await
			.unwrap_err();

		assert!(matches!(
			error,
			RetrieveError::Malformed(MalformedResponse::NoBoundary { content_type: Some(_) })
		));
	}

	#[tokio::test]
	async fn empty_series_issues_no_request() {
		let (server, wado) = service().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(500))
			.expect(0)
			.mount(&server)
			.await;

		let dir = tempfile::tempdir().unwrap();
		let written = wado
			.fetch_series_instances("1", "2", &[], dir.path())
			.await
			.unwrap();
		assert_eq!(written, 0);
	}
}
