mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Corpus, EmbeddingProviderConfig, Index, Jobs, LlmProviderConfig, Providers, Ranking,
	SearchBackend, Service,
};

use std::{
	fs,
	path::{Path, PathBuf},
};

/// Upper bounds on what one ranking pass may emit.
pub const MAX_PLACES: u32 = 10;
pub const MAX_COMMENTS: u32 = 5;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, path.parent());

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::invalid("service.http_bind", "non-empty"));
	}
	if cfg.search_backend.url.trim().is_empty() {
		return Err(Error::invalid("search_backend.url", "non-empty"));
	}
	if cfg.search_backend.index.trim().is_empty() {
		return Err(Error::invalid("search_backend.index", "non-empty"));
	}
	if cfg.search_backend.exact_field.trim().is_empty() {
		return Err(Error::invalid("search_backend.exact_field", "non-empty"));
	}
	if cfg.search_backend.max_candidates == 0 {
		return Err(Error::invalid("search_backend.max_candidates", "greater than zero"));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions", "greater than zero"));
	}
	if cfg.providers.query_parser.max_attempts == 0 {
		return Err(Error::invalid("providers.query_parser.max_attempts", "greater than zero"));
	}
	if !cfg.providers.query_parser.temperature.is_finite() {
		return Err(Error::invalid("providers.query_parser.temperature", "a finite number"));
	}

	for (key, api_key) in [
		("providers.embedding.api_key", &cfg.providers.embedding.api_key),
		("providers.query_parser.api_key", &cfg.providers.query_parser.api_key),
	] {
		if api_key.trim().is_empty() {
			return Err(Error::invalid(key, "non-empty"));
		}
	}

	validate_ranking(&cfg.ranking)?;
	validate_jobs(&cfg.jobs)?;

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	if !ranking.temperature.is_finite() {
		return Err(Error::invalid("ranking.temperature", "a finite number"));
	}
	if ranking.temperature <= 0.0 {
		return Err(Error::invalid("ranking.temperature", "greater than zero"));
	}
	if ranking.max_neighbors == 0 {
		return Err(Error::invalid("ranking.max_neighbors", "greater than zero"));
	}
	if ranking.max_places == 0 {
		return Err(Error::invalid("ranking.max_places", "greater than zero"));
	}
	if ranking.max_places > MAX_PLACES {
		return Err(Error::invalid("ranking.max_places", format!("at most {MAX_PLACES}")));
	}
	if ranking.max_comments == 0 {
		return Err(Error::invalid("ranking.max_comments", "greater than zero"));
	}
	if ranking.max_comments > MAX_COMMENTS {
		return Err(Error::invalid("ranking.max_comments", format!("at most {MAX_COMMENTS}")));
	}

	Ok(())
}

fn validate_jobs(jobs: &Jobs) -> Result<()> {
	if jobs.retention_secs == 0 {
		return Err(Error::invalid("jobs.retention_secs", "greater than zero"));
	}
	if jobs.sweep_interval_secs == 0 {
		return Err(Error::invalid("jobs.sweep_interval_secs", "greater than zero"));
	}
	if jobs.poll_attempts == 0 {
		return Err(Error::invalid("jobs.poll_attempts", "greater than zero"));
	}

	Ok(())
}

fn normalize(cfg: &mut Config, base_dir: Option<&Path>) {
	if cfg.search_backend.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.search_backend.api_key = None;
	}

	cfg.search_backend.url = cfg.search_backend.url.trim_end_matches('/').to_string();

	let Some(base_dir) = base_dir else {
		return;
	};

	for path in [
		&mut cfg.corpus.locations_path,
		&mut cfg.corpus.reviews_path,
		&mut cfg.index.vectors_path,
		&mut cfg.index.review_ids_path,
	] {
		*path = resolve_relative(base_dir, path);
	}
}

// Data paths in the file are relative to the file itself, not to the working directory.
fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
	if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) }
}
