pub mod corpus;
pub mod index;

mod error;

pub use corpus::ReviewCorpus;
pub use error::Error;
pub use index::FlatIndex;

pub type Result<T, E = Error> = std::result::Result<T, E>;
