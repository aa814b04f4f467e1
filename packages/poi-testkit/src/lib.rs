//! Deterministic collaborators and fixture data for exercising the resolution pipeline without
//! network access.

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::Map;
use tokio::sync::Semaphore;

use poi_config::{
	Config, Corpus, EmbeddingProviderConfig, Index, Jobs, LlmProviderConfig, Providers, Ranking,
	SearchBackend, Service,
};
use poi_domain::{Neighbor, PlaceInfo, PlaceResult, Review, StructuredQuery};
use poi_service::{
	BoxFuture, CandidateStore, EmbeddingProvider, Error, QueryParser, RankingPipeline, Result,
	SimilarityIndex,
};
use poi_storage::{FlatIndex, ReviewCorpus};

pub const DIMENSIONS: usize = 2;
pub const WEATHER: [f32; DIMENSIONS] = [1.0, 0.0];
pub const CROWDS: [f32; DIMENSIONS] = [0.0, 1.0];

pub const COFFEE_QUERY: &str = "推薦國父紀念館5公里內的咖啡店";
pub const WEATHER_QUERY: &str = "我想了解九份老街的評論中提到天氣的內容";

pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		corpus: Corpus {
			locations_path: PathBuf::from("location_info.json"),
			reviews_path: PathBuf::from("comments.csv"),
		},
		index: Index {
			vectors_path: PathBuf::from("review_vectors.f32"),
			review_ids_path: PathBuf::from("review_ids.json"),
		},
		search_backend: SearchBackend {
			url: "http://127.0.0.1:1".to_string(),
			index: "poi_data".to_string(),
			exact_field: "gmap_location.keyword".to_string(),
			max_candidates: 20,
			timeout_ms: 1_000,
			api_key: None,
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "fake-key".to_string(),
				path: "/embeddings".to_string(),
				model: "fake-embedding".to_string(),
				dimensions: DIMENSIONS as u32,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			query_parser: LlmProviderConfig {
				provider_id: "fake".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "fake-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "fake-parser".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				max_attempts: 1,
				default_headers: Map::new(),
			},
		},
		ranking: Ranking::default(),
		jobs: Jobs {
			retention_secs: 600,
			sweep_interval_secs: 60,
			poll_attempts: 100,
			poll_interval_ms: 20,
		},
	}
}

fn place(location_id: &str, gmap_location: &str, address: &str, summary_2: &str) -> PlaceInfo {
	PlaceInfo {
		location_id: location_id.to_string(),
		gmap_location: gmap_location.to_string(),
		address: address.to_string(),
		summary_2: summary_2.to_string(),
	}
}

fn review(review_id: &str, location_id: &str, comments: &str) -> Review {
	Review {
		review_id: review_id.to_string(),
		location_id: location_id.to_string(),
		comments: comments.to_string(),
		language: Some("zh".to_string()),
	}
}

/// Small corpus around Jiufen and the Sun Yat-sen Memorial Hall.
///
/// Place `199` has reviews but no metadata.
pub fn sample_corpus() -> ReviewCorpus {
	let places = vec![
		place("101", "九份老街", "新北市瑞芳區基山街", "依山而建的老街"),
		place("102", "國父紀念館", "台北市信義區仁愛路四段505號", "紀念國父的文化場館"),
		place("103", "阿妹茶樓", "新北市瑞芳區市下巷20號", ""),
		place("104", "信義咖啡", "台北市信義區光復南路", "安靜的咖啡館"),
	];
	let reviews = vec![
		review("r1", "101", "山上常常下雨，記得帶傘"),
		review("r2", "101", "假日人潮很多"),
		review("r3", "101", "霧很大，看不到海"),
		review("r4", "102", "廣場很大適合散步"),
		review("r5", "103", "下雨天喝茶看雨景很棒"),
		review("r6", "103", "週末要排隊"),
		review("r7", "104", "咖啡好喝"),
		review("r8", "199", "天氣晴朗的時候很漂亮"),
	];

	ReviewCorpus::new(places, reviews)
}

/// Index rows for [`sample_corpus`], one per review in corpus order.
pub fn sample_index() -> poi_storage::Result<FlatIndex> {
	let rows: [(&str, [f32; DIMENSIONS]); 8] = [
		("r1", [0.9, 0.1]),
		("r2", [0.1, 0.9]),
		("r3", [0.8, 0.3]),
		("r4", [0.2, 0.8]),
		("r5", [1.0, 0.1]),
		("r6", [0.0, 1.0]),
		("r7", [0.5, 0.5]),
		("r8", [0.95, 0.0]),
	];
	let vectors = rows.iter().flat_map(|(_, vector)| vector.iter().copied()).collect();
	let ids = rows.iter().map(|(id, _)| id.to_string()).collect();

	FlatIndex::new(DIMENSIONS, vectors, ids)
}

/// `places` places with `reviews_per_place` reviews each, every review vector near [`WEATHER`].
pub fn synthetic_fixture(
	places: usize,
	reviews_per_place: usize,
) -> poi_storage::Result<(ReviewCorpus, FlatIndex)> {
	let mut infos = Vec::with_capacity(places);
	let mut reviews = Vec::with_capacity(places * reviews_per_place);
	let mut vectors = Vec::with_capacity(places * reviews_per_place * DIMENSIONS);
	let mut ids = Vec::with_capacity(places * reviews_per_place);

	for p in 0..places {
		let location_id = (1_000 + p).to_string();

		infos.push(place(&location_id, &format!("景點{p}"), &format!("地址{p}"), "測試景點"));

		for r in 0..reviews_per_place {
			let review_id = format!("s{p}-{r}");

			reviews.push(review(&review_id, &location_id, &format!("景點{p}的第{r}則評論")));
			vectors.extend_from_slice(&[1.0, (p * reviews_per_place + r) as f32 * 0.01]);
			ids.push(review_id);
		}
	}

	let index = FlatIndex::new(DIMENSIONS, vectors, ids)?;

	Ok((ReviewCorpus::new(infos, reviews), index))
}

fn coffee_query() -> StructuredQuery {
	StructuredQuery {
		gmap_location: Some("國父紀念館".to_string()),
		category: Some("咖啡館".to_string()),
		geo_distance: Some("10km".to_string()),
		..Default::default()
	}
}

fn weather_query() -> StructuredQuery {
	StructuredQuery {
		gmap_location: Some("九份老街".to_string()),
		semantic_keywords: vec!["天氣".to_string()],
		..Default::default()
	}
}

#[derive(Default)]
pub struct FakeQueryParser {
	replies: HashMap<String, StructuredQuery>,
	calls: AtomicUsize,
}
impl FakeQueryParser {
	/// Knows the coffee-shop and Jiufen-weather queries.
	pub fn scripted() -> Self {
		Self::default().with(COFFEE_QUERY, coffee_query()).with(WEATHER_QUERY, weather_query())
	}

	pub fn with(mut self, query: &str, parsed: StructuredQuery) -> Self {
		self.replies.insert(query.to_string(), parsed);

		self
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl QueryParser for FakeQueryParser {
	fn parse<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<StructuredQuery>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let reply = self.replies.get(query).cloned().ok_or_else(|| Error::QueryParse {
			message: format!("No scripted reply for {query:?}."),
		});

		Box::pin(async move { reply })
	}
}

/// Resolves exact place names first, then falls back to a fixed fuzzy list.
#[derive(Default)]
pub struct FakeCandidateStore {
	exact: HashMap<String, String>,
	fuzzy: Vec<String>,
	calls: AtomicUsize,
}
impl FakeCandidateStore {
	pub fn scripted() -> Self {
		Self::default()
			.with_exact("九份老街", "101")
			.with_exact("國父紀念館", "102")
			.with_fuzzy(&["101", "103"])
	}

	pub fn with_exact(mut self, name: &str, location_id: &str) -> Self {
		self.exact.insert(name.to_string(), location_id.to_string());

		self
	}

	pub fn with_fuzzy(mut self, location_ids: &[&str]) -> Self {
		self.fuzzy = location_ids.iter().map(|id| id.to_string()).collect();

		self
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl CandidateStore for FakeCandidateStore {
	fn candidates<'a>(
		&'a self,
		_cfg: &'a SearchBackend,
		query: &'a StructuredQuery,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let ids = match query.gmap_location.as_ref().and_then(|name| self.exact.get(name)) {
			Some(id) => vec![id.clone()],
			None => self.fuzzy.clone(),
		};

		Box::pin(async move { Ok(ids) })
	}
}

/// Maps known texts to fixed vectors; anything else embeds to the origin.
pub struct FakeEmbedding {
	vectors: HashMap<String, Vec<f32>>,
	dimensions: usize,
	calls: AtomicUsize,
}
impl FakeEmbedding {
	pub fn new(dimensions: usize) -> Self {
		Self { vectors: HashMap::new(), dimensions, calls: AtomicUsize::new(0) }
	}

	pub fn scripted() -> Self {
		Self::new(DIMENSIONS).with("天氣", &WEATHER).with("人潮", &CROWDS)
	}

	pub fn with(mut self, text: &str, vector: &[f32]) -> Self {
		self.vectors.insert(text.to_string(), vector.to_vec());

		self
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vectors = texts
			.iter()
			.map(|text| {
				self.vectors.get(text).cloned().unwrap_or_else(|| vec![0.0; self.dimensions])
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Counts searches against a wrapped [`FlatIndex`].
pub struct CountingIndex {
	inner: FlatIndex,
	calls: AtomicUsize,
}
impl CountingIndex {
	pub fn new(inner: FlatIndex) -> Self {
		Self { inner, calls: AtomicUsize::new(0) }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SimilarityIndex for CountingIndex {
	fn dimensions(&self) -> usize {
		self.inner.dimensions()
	}

	fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Ok(self.inner.search(query, k)?)
	}

	fn review_ids(&self) -> &[String] {
		self.inner.review_ids()
	}
}

/// Reports fixed neighbors regardless of the query.
pub struct ScriptedIndex {
	pub neighbors: Vec<Neighbor>,
	pub review_ids: Vec<String>,
}
impl SimilarityIndex for ScriptedIndex {
	fn dimensions(&self) -> usize {
		DIMENSIONS
	}

	fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<Neighbor>> {
		Ok(self.neighbors.clone())
	}

	fn review_ids(&self) -> &[String] {
		&self.review_ids
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PipelineBehavior {
	/// Returns one place whose id is the joined keywords.
	Echo,
	Fail,
	Panic,
}

/// Ranking pipeline stand-in. When gated, each run waits for one [`ScriptedPipeline::release`].
pub struct ScriptedPipeline {
	behavior: PipelineBehavior,
	gate: Option<Semaphore>,
	calls: AtomicUsize,
}
impl ScriptedPipeline {
	pub fn new(behavior: PipelineBehavior) -> Arc<Self> {
		Arc::new(Self { behavior, gate: None, calls: AtomicUsize::new(0) })
	}

	pub fn gated(behavior: PipelineBehavior) -> Arc<Self> {
		Arc::new(Self { behavior, gate: Some(Semaphore::new(0)), calls: AtomicUsize::new(0) })
	}

	pub fn release(&self, runs: usize) {
		if let Some(gate) = &self.gate {
			gate.add_permits(runs);
		}
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RankingPipeline for ScriptedPipeline {
	fn rank<'a>(
		&'a self,
		keywords: &'a [String],
		candidates: &'a [String],
	) -> BoxFuture<'a, Result<Vec<PlaceResult>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(gate) = &self.gate {
				gate.acquire()
					.await
					.map_err(|err| Error::Provider { message: err.to_string() })?
					.forget();
			}

			match self.behavior {
				PipelineBehavior::Echo => Ok(vec![PlaceResult {
					location_id: keywords.join(","),
					gmap_location: candidates.join(","),
					address: String::new(),
					summary_2: String::new(),
					comments: keywords.to_vec(),
					weight: 1.0,
				}]),
				PipelineBehavior::Fail =>
					Err(Error::Provider { message: "Scripted pipeline failure.".to_string() }),
				PipelineBehavior::Panic => panic!("Scripted pipeline panic."),
			}
		})
	}
}
