use std::{collections::HashSet, slice, sync::Arc};

use poi_config::EmbeddingProviderConfig;
use poi_domain::{PlaceResult, RankingPolicy, ranking as algorithm};
use poi_storage::ReviewCorpus;

use crate::{BoxFuture, EmbeddingProvider, Error, Result, SimilarityIndex};

/// One semantic ranking run, as scheduled by the job cache.
pub trait RankingPipeline
where
	Self: Send + Sync,
{
	fn rank<'a>(
		&'a self,
		keywords: &'a [String],
		candidates: &'a [String],
	) -> BoxFuture<'a, Result<Vec<PlaceResult>>>;
}

pub struct RankingEngine {
	corpus: Arc<ReviewCorpus>,
	index: Arc<dyn SimilarityIndex>,
	embedding: Arc<dyn EmbeddingProvider>,
	embedding_cfg: EmbeddingProviderConfig,
	policy: RankingPolicy,
}
impl RankingEngine {
	pub fn new(
		corpus: Arc<ReviewCorpus>,
		index: Arc<dyn SimilarityIndex>,
		embedding: Arc<dyn EmbeddingProvider>,
		embedding_cfg: EmbeddingProviderConfig,
		policy: RankingPolicy,
	) -> Self {
		Self { corpus, index, embedding, embedding_cfg, policy }
	}

	/// Ranks candidate places by how closely their reviews match `keywords`.
	///
	/// Returns an empty list without touching the embedding provider or the index when there is
	/// nothing to rank.
	pub async fn run(
		&self,
		keywords: &[String],
		candidates: &[String],
	) -> Result<Vec<PlaceResult>> {
		if keywords.is_empty() || candidates.is_empty() {
			return Ok(Vec::new());
		}

		let wanted: HashSet<&str> = candidates.iter().map(String::as_str).collect();
		let filtered = self.corpus.reviews_for(&wanted);

		if filtered.is_empty() {
			tracing::debug!(candidates = candidates.len(), "No reviews for candidate places.");

			return Ok(Vec::new());
		}

		let text = keywords.join(" ");
		let vectors = self.embedding.embed(&self.embedding_cfg, slice::from_ref(&text)).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.index.dimensions() {
			return Err(Error::Provider {
				message: format!(
					"Embedding vector has {} dimensions, index expects {}.",
					vector.len(),
					self.index.dimensions()
				),
			});
		}

		let k = self.policy.neighbor_count(filtered.len());
		let index = self.index.clone();
		let neighbors = tokio::task::spawn_blocking(move || index.search(&vector, k))
			.await
			.map_err(|err| Error::Index { message: format!("Index search task failed: {err}.") })??;

		if !neighbors.iter().any(|neighbor| neighbor.is_valid()) {
			return Ok(Vec::new());
		}

		let matches = algorithm::match_reviews(&filtered, &neighbors, self.index.review_ids())?;
		let places = algorithm::rank_places(&matches, |id| self.corpus.place(id), &self.policy);

		tracing::debug!(
			filtered = filtered.len(),
			neighbors = neighbors.len(),
			matches = matches.len(),
			places = places.len(),
			"Semantic ranking finished."
		);

		Ok(places)
	}
}
impl RankingPipeline for RankingEngine {
	fn rank<'a>(
		&'a self,
		keywords: &'a [String],
		candidates: &'a [String],
	) -> BoxFuture<'a, Result<Vec<PlaceResult>>> {
		Box::pin(self.run(keywords, candidates))
	}
}
