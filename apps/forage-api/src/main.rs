use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = forage_api::Args::parse();

	forage_api::run(args).await
}
