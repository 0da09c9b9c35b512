use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = forage_indexer::Args::parse();

	forage_indexer::run(args).await
}
