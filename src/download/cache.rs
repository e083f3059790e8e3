use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Remembers which series were already downloaded, keyed by series description.
pub trait SeriesCache {
	fn contains(&self, series_description: &str) -> bool;

	/// Records a completed series. Must be persisted before returning.
	fn record(&mut self, series_description: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
pub enum CacheError {
	#[error("Failed to read cache file {}: {source}", path.display())]
	Read { path: PathBuf, source: io::Error },
	#[error("Failed to write cache file {}: {source}", path.display())]
	Write { path: PathBuf, source: io::Error },
}

/// A skip-list stored as one series description per line.
#[derive(Debug)]
pub struct FileCache {
	path: PathBuf,
	entries: HashSet<String>,
	file: File,
}

impl FileCache {
	/// Reads the existing entries and opens the file for appending, creating it if needed.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let path = path.into();
		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
			Err(source) => return Err(CacheError::Read { path, source }),
		};
		let entries: HashSet<String> = content
			.lines()
			.filter(|line| !line.is_empty())
			.map(str::to_owned)
			.collect();
		debug!(
			"Loaded {} cached series from {}",
			entries.len(),
			path.display()
		);

		let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
			Ok(file) => file,
			Err(source) => return Err(CacheError::Write { path, source }),
		};
		// Appended entries must start on their own line
		if !content.is_empty() && !content.ends_with('\n') {
			if let Err(source) = file.write_all(b"\n") {
				return Err(CacheError::Write { path, source });
			}
		}

		Ok(Self {
			path,
			entries,
			file,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl SeriesCache for FileCache {
	fn contains(&self, series_description: &str) -> bool {
		self.entries.contains(series_description)
	}

	fn record(&mut self, series_description: &str) -> Result<(), CacheError> {
		writeln!(self.file, "{series_description}")
			.and_then(|()| self.file.flush())
			.map_err(|source| CacheError::Write {
				path: self.path.clone(),
				source,
			})?;
		self.entries.insert(series_description.to_owned());
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_starts_empty() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cache.txt");

		let cache = FileCache::open(&path).unwrap();
		assert!(!cache.contains("T1_MRI"));
		assert_eq!(cache.path(), path);
		assert!(path.exists());
	}

	#[test]
	fn entries_survive_reopening() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cache.txt");

		let mut cache = FileCache::open(&path).unwrap();
		cache.record("T1_MRI").unwrap();
		cache.record("DTI").unwrap();
		assert!(cache.contains("T1_MRI"));
		drop(cache);

		assert_eq!(fs::read_to_string(&path).unwrap(), "T1_MRI\nDTI\n");
		let cache = FileCache::open(&path).unwrap();
		assert!(cache.contains("T1_MRI"));
		assert!(cache.contains("DTI"));
		assert!(!cache.contains("T2"));
	}

	#[test]
	fn append_after_unterminated_line() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cache.txt");
		fs::write(&path, "T1_MRI").unwrap();

		let mut cache = FileCache::open(&path).unwrap();
		assert!(cache.contains("T1_MRI"));
		cache.record("DTI").unwrap();

		assert_eq!(fs::read_to_string(&path).unwrap(), "T1_MRI\nDTI\n");
	}

	#[test]
	fn unreadable_cache_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let error = FileCache::open(dir.path()).unwrap_err();
		assert!(matches!(error, CacheError::Read { .. }));
	}
}
