use poi_domain::ranking::AlignmentError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Query parse error: {message}")]
	QueryParse { message: String },
	#[error("Search backend error: {message}")]
	Backend { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error(transparent)]
	Alignment(#[from] AlignmentError),
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<poi_storage::Error> for Error {
	fn from(err: poi_storage::Error) -> Self {
		match err {
			poi_storage::Error::InvalidIndex(message) => Self::Index { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
