use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read {path:?}.")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Failed to decode JSON from {path:?}.")]
	Json { path: PathBuf, source: serde_json::Error },
	#[error("Failed to decode CSV from {path:?}.")]
	Csv { path: PathBuf, source: csv::Error },
	#[error("Invalid index: {0}")]
	InvalidIndex(String),
}
