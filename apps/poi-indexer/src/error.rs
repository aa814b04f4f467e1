pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Validation(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Service(#[from] poi_service::Error),
	#[error(transparent)]
	Storage(#[from] poi_storage::Error),
}
