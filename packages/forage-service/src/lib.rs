pub mod admin;
pub mod analysis;
pub mod cache;
pub mod query;
pub mod render;

mod error;

pub use admin::{EmbedReport, RebuildReport};
pub use cache::IndexCache;
pub use error::{Error, Result};
pub use query::{Analysis, QueryRequest, QueryResponse};

use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::{Arc, RwLock},
};

use serde::Serialize;

use forage_config::{Config, EmbeddingProviderConfig, EmbeddingSource, LlmProviderConfig};
use forage_providers::{embedding, llm};
use forage_storage::corpus::CorpusStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, forage_providers::Result<Vec<Vec<f32>>>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		model: &'a str,
		prompt: &'a str,
	) -> BoxFuture<'a, forage_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub llm: Arc<dyn LlmProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LlmProvider>) -> Self {
		Self { embedding, llm }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), llm: provider }
	}
}

/// Availability of one registered corpus as reported to clients.
#[derive(Clone, Debug, Serialize)]
pub struct CorpusStatus {
	pub name: String,
	pub display_name: String,
	pub available: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub audio: bool,
	pub examples: Vec<String>,
}

#[derive(Clone, Debug)]
enum CorpusSlot {
	Loaded(Arc<CorpusStore>),
	Failed(String),
}

pub struct ForageService {
	pub cfg: Arc<Config>,
	pub providers: Providers,
	pub cache: IndexCache,
	corpora: RwLock<HashMap<String, CorpusSlot>>,
}
impl ForageService {
	/// Loads every registered corpus and its default-source index. A corpus that fails to load
	/// is reported unavailable; the others are still served.
	pub fn load(cfg: Config, providers: Providers) -> Self {
		let cfg = Arc::new(cfg);
		let cache = IndexCache::new(cfg.storage.index_dir.clone(), cfg.index.nprobe as usize);
		let default_source = cfg.providers.embedding.default_source;
		let mut corpora = HashMap::new();

		for corpus in &cfg.corpora {
			let slot = match CorpusStore::open(&cfg.storage.index_dir, corpus) {
				Ok(store) => CorpusSlot::Loaded(Arc::new(store)),
				Err(err) => {
					tracing::error!(corpus = %corpus.name, error = %err, "Failed to load corpus.");

					CorpusSlot::Failed(err.to_string())
				},
			};

			if matches!(slot, CorpusSlot::Loaded(_))
				&& let Err(err) = cache.get_or_load(&corpus.name, default_source)
			{
				tracing::error!(
					corpus = %corpus.name,
					source = %default_source,
					error = %err,
					"Failed to load index. Corpus is unavailable until the index is rebuilt."
				);
			}

			corpora.insert(corpus.name.clone(), slot);
		}

		Self { cfg, providers, cache, corpora: RwLock::new(corpora) }
	}

	pub fn corpora(&self) -> Vec<CorpusStatus> {
		let default_source = self.cfg.providers.embedding.default_source;
		let slots = self.corpora.read().unwrap_or_else(|err| err.into_inner());

		self.cfg
			.corpora
			.iter()
			.map(|corpus| {
				let reason = match slots.get(&corpus.name) {
					Some(CorpusSlot::Loaded(_)) => (!self.cache.contains(&corpus.name, default_source))
						.then(|| format!("No {default_source} index is loaded.")),
					Some(CorpusSlot::Failed(reason)) => Some(reason.clone()),
					None => Some("Corpus was not loaded.".to_string()),
				};

				CorpusStatus {
					name: corpus.name.clone(),
					display_name: corpus.display_name.clone(),
					available: reason.is_none(),
					reason,
					audio: corpus.audio_backed(),
					examples: corpus.examples.clone(),
				}
			})
			.collect()
	}

	pub(crate) fn store(&self, corpus: &str) -> Result<Arc<CorpusStore>> {
		let slots = self.corpora.read().unwrap_or_else(|err| err.into_inner());

		match slots.get(corpus) {
			Some(CorpusSlot::Loaded(store)) => Ok(store.clone()),
			Some(CorpusSlot::Failed(message)) => Err(Error::CorpusUnavailable {
				corpus: corpus.to_string(),
				message: message.clone(),
			}),
			None => Err(Error::UnknownCorpus { corpus: corpus.to_string() }),
		}
	}

	pub(crate) fn replace_store(&self, store: CorpusStore) {
		let mut slots = self.corpora.write().unwrap_or_else(|err| err.into_inner());

		slots.insert(store.name().to_string(), CorpusSlot::Loaded(Arc::new(store)));
	}

	pub(crate) fn source(&self, requested: Option<EmbeddingSource>) -> EmbeddingSource {
		requested.unwrap_or(self.cfg.providers.embedding.default_source)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, forage_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl LlmProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		model: &'a str,
		prompt: &'a str,
	) -> BoxFuture<'a, forage_providers::Result<String>> {
		Box::pin(llm::complete(cfg, model, prompt))
	}
}
