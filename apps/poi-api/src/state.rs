use std::sync::Arc;

use poi_service::ResolutionService;
use poi_storage::{FlatIndex, ReviewCorpus};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ResolutionService>,
}
impl AppState {
	/// Loads the review corpus and the neighbor index named by `config`.
	pub fn new(config: poi_config::Config) -> color_eyre::Result<Self> {
		let corpus =
			ReviewCorpus::load(&config.corpus.locations_path, &config.corpus.reviews_path)?;
		let index = FlatIndex::load(
			&config.index.vectors_path,
			&config.index.review_ids_path,
			config.providers.embedding.dimensions as usize,
		)?;

		if index.len() != corpus.reviews().len() {
			tracing::warn!(
				indexed = index.len(),
				reviews = corpus.reviews().len(),
				"Index row count differs from the review corpus. Rebuild the index."
			);
		}

		let service = ResolutionService::new(config, Arc::new(corpus), Arc::new(index));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ResolutionService) -> Self {
		Self { service: Arc::new(service) }
	}
}
