pub mod indexer;

mod error;

pub use error::{Error, Result};

use std::{fs, path::PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use poi_service::Providers;
use poi_storage::ReviewCorpus;

#[derive(Debug, Parser)]
#[command(
	version = poi_cli::VERSION,
	rename_all = "kebab",
	styles = poi_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Reviews sent to the embedding provider per request.
	#[arg(long, value_name = "N", default_value_t = 64)]
	pub batch_size: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = poi_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let corpus = ReviewCorpus::load(&config.corpus.locations_path, &config.corpus.reviews_path)?;
	let embedding = Providers::default().embedding;
	let index = indexer::build_index(
		corpus.reviews(),
		args.batch_size,
		embedding.as_ref(),
		&config.providers.embedding,
	)
	.await?;

	for path in [&config.index.vectors_path, &config.index.review_ids_path] {
		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
	}

	index.write(&config.index.vectors_path, &config.index.review_ids_path)?;

	tracing::info!(
		rows = index.len(),
		vectors_path = %config.index.vectors_path.display(),
		review_ids_path = %config.index.review_ids_path.display(),
		"Review index written."
	);

	Ok(())
}
