use bytes::Bytes;
use futures::Stream;

/// Reads the parts of a WADO-RS response body.
///
/// This uses the `multer` crate, which expects multipart/form-data, for the multipart/related
/// responses sent by the PACS. Parts are expected to carry no Content-Disposition.
pub struct DicomMultipart<'a>(multer::Multipart<'a>);

impl<'a> DicomMultipart<'a> {
	pub fn new<S, O, E>(stream: S, boundary: impl Into<String>) -> Self
	where
		S: Stream<Item = Result<O, E>> + Send + 'a,
		O: Into<Bytes> + 'static,
		E: Into<Box<dyn std::error::Error + Send + Sync>> + 'a,
	{
		Self(multer::Multipart::new(stream, boundary))
	}

	/// This implementation is based on [`multer::parse_boundary`],
	/// but accepts any multipart type instead of multipart/form-data only.
	///
	/// Servers commonly send an unquoted `type=application/dicom` parameter, which is not a valid
	/// token for [`mime`]. Such content types are split into parameters by hand.
	pub fn parse_boundary(content_type: &str) -> multer::Result<String> {
		let Ok(mime) = content_type.parse::<mime::Mime>() else {
			return parse_boundary_lenient(content_type);
		};

		if mime.type_() != mime::MULTIPART {
			return Err(multer::Error::NoMultipart);
		}

		mime.get_param(mime::BOUNDARY)
			.map(|name| name.as_str().trim_matches('"').to_owned())
			.filter(|boundary| !boundary.is_empty())
			.ok_or(multer::Error::NoBoundary)
	}

	/// See [`multer::Multipart::next_field`]. The previous part must be dropped first.
	pub async fn next_part(&mut self) -> multer::Result<Option<multer::Field<'a>>> {
		self.0.next_field().await
	}
}

fn parse_boundary_lenient(content_type: &str) -> multer::Result<String> {
	let mut segments = content_type.split(';').map(str::trim);
	let essence = segments.next().unwrap_or_default();
	let is_multipart = essence
		.split_once('/')
		.is_some_and(|(type_, _)| type_.eq_ignore_ascii_case(mime::MULTIPART.as_str()));
	if !is_multipart {
		return Err(multer::Error::NoMultipart);
	}

	segments
		.filter_map(|parameter| parameter.split_once('='))
		.find(|(name, _)| {
			name.trim()
				.eq_ignore_ascii_case(mime::BOUNDARY.as_str())
		})
		.map(|(_, value)| value.trim().trim_matches('"').to_owned())
		.filter(|boundary| !boundary.is_empty())
		.ok_or(multer::Error::NoBoundary)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn body(boundary: &str, parts: &[&[u8]]) -> Vec<u8> {
		let mut body = Vec::new();
		for part in parts {
			body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
			body.extend_from_slice(b"Content-Type: application/dicom\r\n\r\n");
			body.extend_from_slice(part);
			body.extend_from_slice(b"\r\n");
		}
		body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
		body
	}

	#[test]
	fn parse_related_boundary() {
		let boundary = DicomMultipart::parse_boundary(
			"multipart/related; type=\"application/dicom\"; boundary=\"abc-123\"",
		)
		.unwrap();
		assert_eq!(boundary, "abc-123");

		let boundary =
			DicomMultipart::parse_boundary("multipart/related; boundary=xyz; type=application/dicom")
				.unwrap();
		assert_eq!(boundary, "xyz");
	}

	#[test]
	fn parse_boundary_after_unquoted_type() {
		let boundary = DicomMultipart::parse_boundary(
			"multipart/related; type=application/dicom; boundary=DICOMwebBoundary",
		)
		.unwrap();
		assert_eq!(boundary, "DICOMwebBoundary");

		let boundary = DicomMultipart::parse_boundary(
			"Multipart/Related;type=application/dicom;Boundary=\"quoted\"",
		)
		.unwrap();
		assert_eq!(boundary, "quoted");
	}

	#[test]
	fn reject_unquoted_non_multipart() {
		assert!(matches!(
			DicomMultipart::parse_boundary("application/dicom; type=application/dicom; boundary=x"),
			Err(multer::Error::NoMultipart)
		));
		assert!(matches!(
			DicomMultipart::parse_boundary("multipart/related; type=application/dicom; boundary="),
			Err(multer::Error::NoBoundary)
		));
	}

	#[test]
	fn reject_non_multipart() {
		assert!(matches!(
			DicomMultipart::parse_boundary("application/dicom"),
			Err(multer::Error::NoMultipart)
		));
		assert!(matches!(
			DicomMultipart::parse_boundary("multipart/related; type=application/dicom"),
			Err(multer::Error::NoBoundary)
		));
	}

	#[tokio::test]
	async fn read_parts_in_order() {
		let body = body("frontier", &[b"first", b"\x00\x01DICM\r\n", b"third"]);
		let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(body))]);
		let mut multipart = DicomMultipart::new(stream, "frontier");

		let mut parts = Vec::new();
		while let Some(part) = multipart.next_part().await.unwrap() {
			parts.push(part.bytes().await.unwrap());
		}

		assert_eq!(
			parts,
			vec![
				Bytes::from_static(b"first"),
				Bytes::from_static(b"\x00\x01DICM\r\n"),
				Bytes::from_static(b"third"),
			]
		);
	}
}
