use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = poi_indexer::Args::parse();

	poi_indexer::run(args).await
}
