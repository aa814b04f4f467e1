use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub corpus: Corpus,
	pub index: Index,
	pub search_backend: SearchBackend,
	pub providers: Providers,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub jobs: Jobs,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Corpus {
	/// JSON array of location metadata records.
	pub locations_path: PathBuf,
	/// CSV with `review_id`, `location_id`, `comments` and `language` columns.
	pub reviews_path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Index {
	/// Little-endian f32 rows, `providers.embedding.dimensions` values per row.
	pub vectors_path: PathBuf,
	/// JSON array of review ids, one per vector row.
	pub review_ids_path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchBackend {
	pub url: String,
	pub index: String,
	#[serde(default = "default_exact_field")]
	pub exact_field: String,
	#[serde(default = "default_max_candidates")]
	pub max_candidates: u32,
	pub timeout_ms: u64,
	pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub query_parser: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	/// Softmax temperature applied to inverse-distance similarities.
	pub temperature: f64,
	pub max_neighbors: u32,
	pub max_places: u32,
	pub max_comments: u32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { temperature: 5.0, max_neighbors: 300, max_places: 10, max_comments: 5 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Jobs {
	pub retention_secs: u64,
	pub sweep_interval_secs: u64,
	pub poll_attempts: u32,
	pub poll_interval_ms: u64,
}
impl Default for Jobs {
	fn default() -> Self {
		Self {
			retention_secs: 600,
			sweep_interval_secs: 60,
			poll_attempts: 10,
			poll_interval_ms: 1_000,
		}
	}
}

fn default_exact_field() -> String {
	"gmap_location.keyword".to_string()
}

fn default_max_candidates() -> u32 {
	20
}

fn default_max_attempts() -> u32 {
	3
}
