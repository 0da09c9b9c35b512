use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use forage_config::EmbeddingSource;
use forage_service::{ForageService, Providers};

#[derive(Debug, Parser)]
#[command(
	version = forage_cli::VERSION,
	rename_all = "kebab",
	styles = forage_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Embed every turn and write the embedded records.
	Embed(Target),
	/// Train and persist an index from existing embedded records.
	Build(Target),
	/// Embed, then build.
	Rebuild(Target),
}
impl Command {
	fn target(&self) -> &Target {
		match self {
			Self::Embed(target) | Self::Build(target) | Self::Rebuild(target) => target,
		}
	}
}

#[derive(Debug, clap::Args)]
pub struct Target {
	/// Corpus to process. Every registered corpus when omitted.
	#[arg(long, value_name = "NAME")]
	pub corpus: Option<String>,
	#[arg(long, value_enum)]
	pub source: Option<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
	Local,
	Remote,
}
impl From<Source> for EmbeddingSource {
	fn from(source: Source) -> Self {
		match source {
			Source::Local => Self::Local,
			Source::Remote => Self::Remote,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = forage_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let corpora = select_corpora(&config, args.command.target())?;
	let service = ForageService::load(config, Providers::default());
	let mut failed = Vec::new();

	for (corpus, outcome) in process(&service, &args.command, &corpora).await {
		match outcome {
			Ok(report) => println!("{report}"),
			Err(err) => {
				tracing::error!(corpus = %corpus, error = %err, "Corpus failed. Continuing.");

				failed.push(corpus);
			},
		}
	}

	if !failed.is_empty() {
		return Err(eyre::eyre!("{} corpora failed: {}.", failed.len(), failed.join(", ")));
	}

	Ok(())
}

/// Runs `command` for each corpus in turn. A failing corpus does not stop the ones after it.
pub async fn process(
	service: &ForageService,
	command: &Command,
	corpora: &[String],
) -> Vec<(String, color_eyre::Result<String>)> {
	let source = command.target().source.map(EmbeddingSource::from);
	let mut outcomes = Vec::with_capacity(corpora.len());

	for corpus in corpora {
		tracing::info!(corpus = %corpus, "Processing corpus.");

		let outcome = process_one(service, command, corpus, source).await;

		outcomes.push((corpus.clone(), outcome));
	}

	outcomes
}

async fn process_one(
	service: &ForageService,
	command: &Command,
	corpus: &str,
	source: Option<EmbeddingSource>,
) -> color_eyre::Result<String> {
	let report = match command {
		Command::Embed(_) => {
			let report = service.embed_corpus(corpus, source).await?;

			serde_json::to_string(&report)?
		},
		Command::Build(_) => serde_json::to_string(&service.build_index(corpus, source)?)?,
		Command::Rebuild(_) => {
			let report = service.rebuild_index(corpus, source).await?;

			serde_json::to_string(&report)?
		},
	};

	Ok(report)
}

fn select_corpora(
	config: &forage_config::Config,
	target: &Target,
) -> color_eyre::Result<Vec<String>> {
	match target.corpus.as_deref() {
		Some(name) => {
			if config.corpus(name).is_none() {
				return Err(eyre::eyre!("Corpus {name:?} is not registered."));
			}

			Ok(vec![name.to_string()])
		},
		None => Ok(config.corpora.iter().map(|corpus| corpus.name.clone()).collect()),
	}
}
