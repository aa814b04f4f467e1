use poi_config::EmbeddingProviderConfig;
use poi_domain::Review;
use poi_service::EmbeddingProvider;
use poi_storage::FlatIndex;

use crate::{Error, Result};

/// Embeds every review comment and lays the vectors out in corpus order.
///
/// Row `i` of the returned index belongs to `reviews[i]`.
pub async fn build_index(
	reviews: &[Review],
	batch_size: usize,
	embedding: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
) -> Result<FlatIndex> {
	if batch_size == 0 {
		return Err(Error::Validation("batch_size must be greater than zero.".to_string()));
	}

	let dimensions = cfg.dimensions as usize;
	let mut vectors = Vec::with_capacity(reviews.len() * dimensions);
	let mut review_ids = Vec::with_capacity(reviews.len());
	let batches = reviews.len().div_ceil(batch_size);

	for (batch_index, batch) in reviews.chunks(batch_size).enumerate() {
		let texts: Vec<String> = batch.iter().map(|review| review.comments.clone()).collect();
		let embedded = embedding.embed(cfg, &texts).await?;

		if embedded.len() != batch.len() {
			return Err(Error::Validation(format!(
				"Embedding provider returned {} vectors for {} reviews.",
				embedded.len(),
				batch.len()
			)));
		}

		for (review, vector) in batch.iter().zip(embedded) {
			if vector.len() != dimensions {
				return Err(Error::Validation(format!(
					"Review {} embedded to {} dimensions, expected {dimensions}.",
					review.review_id,
					vector.len()
				)));
			}

			vectors.extend(vector);
			review_ids.push(review.review_id.clone());
		}

		tracing::info!(batch = batch_index + 1, batches, "Embedded review batch.");
	}

	Ok(FlatIndex::new(dimensions, vectors, review_ids)?)
}
