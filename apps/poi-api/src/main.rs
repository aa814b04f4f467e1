use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = poi_api::Args::parse();

	poi_api::run(args).await
}
