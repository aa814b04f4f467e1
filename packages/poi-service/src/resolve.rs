use std::{sync::Arc, time::Duration as StdDuration};

use serde::{Deserialize, Serialize};
use time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use poi_config::Config;
use poi_domain::{RankingPolicy, StructuredQuery};
use poi_storage::ReviewCorpus;

use crate::{
	Error, JobCache, JobPoll, Providers, RankingEngine, RankingPipeline, Result, SimilarityIndex,
};

pub const UNKNOWN_PLACE: &str = "未知地點";
pub const UNKNOWN_ADDRESS: &str = "未知地址";
pub const UNKNOWN_SUMMARY: &str = "無詳細描述";

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	#[serde(default)]
	pub query: String,
}

/// Display record for one attribute-search candidate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SearchResult {
	pub location_id: String,
	pub gmap_location: String,
	pub address: String,
	pub summary_2: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query_id: Option<Uuid>,
	pub query_info: StructuredQuery,
	pub elasticsearch_results: Vec<SearchResult>,
}

#[derive(Clone, Debug)]
pub enum SearchOutcome {
	/// The search backend returned no candidates. Not an error.
	NoResults { query_info: StructuredQuery },
	Found(SearchResponse),
}

pub struct ResolutionService {
	pub cfg: Config,
	pub providers: Providers,
	corpus: Arc<ReviewCorpus>,
	jobs: JobCache,
}
impl ResolutionService {
	pub fn new(cfg: Config, corpus: Arc<ReviewCorpus>, index: Arc<dyn SimilarityIndex>) -> Self {
		Self::with_providers(cfg, corpus, index, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		corpus: Arc<ReviewCorpus>,
		index: Arc<dyn SimilarityIndex>,
		providers: Providers,
	) -> Self {
		let engine = RankingEngine::new(
			corpus.clone(),
			index,
			providers.embedding.clone(),
			cfg.providers.embedding.clone(),
			RankingPolicy::from_config(&cfg.ranking),
		);

		Self::with_pipeline(cfg, corpus, providers, Arc::new(engine))
	}

	pub fn with_pipeline(
		cfg: Config,
		corpus: Arc<ReviewCorpus>,
		providers: Providers,
		pipeline: Arc<dyn RankingPipeline>,
	) -> Self {
		let retention_secs = i64::try_from(cfg.jobs.retention_secs).unwrap_or(i64::MAX);
		let jobs = JobCache::new(pipeline, Duration::seconds(retention_secs));

		Self { cfg, providers, corpus, jobs }
	}

	pub fn jobs(&self) -> &JobCache {
		&self.jobs
	}

	pub fn spawn_reaper(&self) -> JoinHandle<()> {
		self.jobs.spawn_reaper(StdDuration::from_secs(self.cfg.jobs.sweep_interval_secs))
	}

	pub async fn search(&self, req: SearchRequest) -> Result<SearchOutcome> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let parsed =
			self.providers.query_parser.parse(&self.cfg.providers.query_parser, query).await?;

		tracing::info!(query, parsed = ?parsed, "Query parsed.");

		if parsed.is_unconstrained() {
			tracing::warn!(query, "Parsed query carries no attribute constraints.");
		}

		let candidates =
			self.providers.candidates.candidates(&self.cfg.search_backend, &parsed).await?;

		if candidates.is_empty() {
			tracing::info!(query, "Search backend returned no candidates.");

			return Ok(SearchOutcome::NoResults { query_info: parsed });
		}

		let elasticsearch_results = candidates.iter().map(|id| self.display(id)).collect();
		let query_id = parsed.has_semantic_keywords().then(|| {
			let id = self.jobs.submit(parsed.semantic_keywords.clone(), candidates.clone());

			tracing::info!(job_id = %id, candidates = candidates.len(), "Ranking job submitted.");

			id
		});

		Ok(SearchOutcome::Found(SearchResponse {
			query_id,
			query_info: parsed,
			elasticsearch_results,
		}))
	}

	/// Polls a job until it completes or the configured attempt budget runs out.
	///
	/// Never returns [`JobPoll::Pending`]; a job still running after the budget reads as
	/// [`JobPoll::NotFound`].
	pub async fn await_job(&self, query_id: &str) -> JobPoll {
		let attempts = self.cfg.jobs.poll_attempts;
		let interval = StdDuration::from_millis(self.cfg.jobs.poll_interval_ms);

		for attempt in 1..=attempts {
			match self.jobs.poll(query_id) {
				JobPoll::Pending if attempt < attempts => tokio::time::sleep(interval).await,
				JobPoll::Pending => {},
				terminal => return terminal,
			}
		}

		tracing::info!(query_id, attempts, "Ranking job still pending after polling budget.");

		JobPoll::NotFound
	}

	fn display(&self, location_id: &str) -> SearchResult {
		match self.corpus.place(location_id) {
			Some(place) => SearchResult {
				location_id: location_id.to_string(),
				gmap_location: non_blank(&place.gmap_location, UNKNOWN_PLACE),
				address: non_blank(&place.address, UNKNOWN_ADDRESS),
				summary_2: non_blank(&place.summary_2, UNKNOWN_SUMMARY),
			},
			None => SearchResult {
				location_id: location_id.to_string(),
				gmap_location: UNKNOWN_PLACE.to_string(),
				address: UNKNOWN_ADDRESS.to_string(),
				summary_2: UNKNOWN_SUMMARY.to_string(),
			},
		}
	}
}

fn non_blank(value: &str, fallback: &str) -> String {
	if value.trim().is_empty() { fallback.to_string() } else { value.to_string() }
}
