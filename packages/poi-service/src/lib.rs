pub mod jobs;
pub mod ranking;
pub mod resolve;

mod error;

pub use error::{Error, Result};
pub use jobs::{JobCache, JobPoll};
pub use ranking::{RankingEngine, RankingPipeline};
pub use resolve::{
	ResolutionService, SearchOutcome, SearchRequest, SearchResponse, SearchResult,
	UNKNOWN_ADDRESS, UNKNOWN_PLACE, UNKNOWN_SUMMARY,
};

use std::{future::Future, pin::Pin, sync::Arc};

use poi_config::{EmbeddingProviderConfig, LlmProviderConfig, SearchBackend};
use poi_domain::{Neighbor, StructuredQuery};
use poi_providers::{embedding, query_parser, search_backend};
use poi_storage::FlatIndex;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait QueryParser
where
	Self: Send + Sync,
{
	fn parse<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<StructuredQuery>>;
}

pub trait CandidateStore
where
	Self: Send + Sync,
{
	fn candidates<'a>(
		&'a self,
		cfg: &'a SearchBackend,
		query: &'a StructuredQuery,
	) -> BoxFuture<'a, Result<Vec<String>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Nearest-neighbor lookup over review vectors.
///
/// `search` returns up to `k` neighbors; positions below zero mark unfilled slots. A valid
/// position indexes into `review_ids`.
pub trait SimilarityIndex
where
	Self: Send + Sync,
{
	fn dimensions(&self) -> usize;

	fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

	fn review_ids(&self) -> &[String];
}

#[derive(Clone)]
pub struct Providers {
	pub query_parser: Arc<dyn QueryParser>,
	pub candidates: Arc<dyn CandidateStore>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(
		query_parser: Arc<dyn QueryParser>,
		candidates: Arc<dyn CandidateStore>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { query_parser, candidates, embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { query_parser: provider.clone(), candidates: provider.clone(), embedding: provider }
	}
}

struct DefaultProviders;
impl QueryParser for DefaultProviders {
	fn parse<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<StructuredQuery>> {
		Box::pin(async move {
			query_parser::parse(cfg, query)
				.await
				.map_err(|err| Error::QueryParse { message: err.to_string() })
		})
	}
}
impl CandidateStore for DefaultProviders {
	fn candidates<'a>(
		&'a self,
		cfg: &'a SearchBackend,
		query: &'a StructuredQuery,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			search_backend::search_candidates(cfg, query)
				.await
				.map_err(|err| Error::Backend { message: err.to_string() })
		})
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			embedding::embed(cfg, texts)
				.await
				.map_err(|err| Error::Provider { message: err.to_string() })
		})
	}
}

impl SimilarityIndex for FlatIndex {
	fn dimensions(&self) -> usize {
		FlatIndex::dimensions(self)
	}

	fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
		Ok(FlatIndex::search(self, query, k)?)
	}

	fn review_ids(&self) -> &[String] {
		FlatIndex::review_ids(self)
	}
}
