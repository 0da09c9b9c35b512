use serde::{Deserialize, Serialize};

use forage_config::EmbeddingSource;
use forage_storage::{
	artifact,
	corpus::{self, CorpusStore},
	ivf::{BuildParams, IvfPqIndex},
	models::EmbeddedTurn,
};

use crate::{Error, ForageService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbedReport {
	pub corpus: String,
	pub source: EmbeddingSource,
	pub embedded_count: u64,
	pub batch_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebuildReport {
	pub corpus: String,
	pub source: EmbeddingSource,
	pub vector_count: u64,
	pub dim: u32,
	pub nlist: u64,
	pub digest: String,
}

impl ForageService {
	/// Embeds every turn of `corpus` with the `source` provider and writes the embedded records.
	pub async fn embed_corpus(
		&self,
		corpus: &str,
		source: Option<EmbeddingSource>,
	) -> Result<EmbedReport> {
		let corpus_cfg = self.corpus_config(corpus)?;
		let source = self.source(source);
		let provider_cfg = self.cfg.embedding(source);
		let store = CorpusStore::open(&self.cfg.storage.index_dir, corpus_cfg)?;
		let expected = provider_cfg.dimensions as usize;
		let batch_size = provider_cfg.batch_size.max(1) as usize;
		let mut embedded = Vec::with_capacity(store.len());
		let mut batch_count = 0;

		for batch in store.turns().chunks(batch_size) {
			let texts: Vec<String> = batch.iter().map(|turn| turn.content.clone()).collect();
			let vectors = self.providers.embedding.embed(provider_cfg, &texts).await?;

			if vectors.len() != batch.len() {
				return Err(Error::Provider {
					message: format!(
						"Embedding provider returned {} vectors for {} turns.",
						vectors.len(),
						batch.len()
					),
				});
			}

			for (turn, vector) in batch.iter().zip(vectors) {
				if vector.len() != expected {
					return Err(Error::DimensionMismatch { expected, actual: vector.len() });
				}

				embedded.push(EmbeddedTurn::new(turn.clone(), vector));
			}

			batch_count += 1;

			tracing::debug!(corpus, source = %source, batch = batch_count, "Embedded batch.");
		}

		let written = corpus::write_embedded_turns(store.dir(), source, &embedded)?;

		tracing::info!(corpus, source = %source, turns = written, batches = batch_count, "Embedded corpus.");

		self.replace_store(store);

		Ok(EmbedReport {
			corpus: corpus.to_string(),
			source,
			embedded_count: written as u64,
			batch_count,
		})
	}

	/// Trains an index from the embedded records, persists it, and swaps it into the cache.
	pub fn build_index(
		&self,
		corpus: &str,
		source: Option<EmbeddingSource>,
	) -> Result<RebuildReport> {
		let corpus_cfg = self.corpus_config(corpus)?;
		let source = self.source(source);
		let store = CorpusStore::open(&self.cfg.storage.index_dir, corpus_cfg)?;
		let embedded = corpus::read_embedded_turns(store.dir(), source)?;
		let expected = self.cfg.embedding(source).dimensions as usize;

		// The index must match the dimension of the encoder that will query it.
		if let Some(record) = embedded.iter().find(|record| record.embedding.len() != expected) {
			return Err(Error::DimensionMismatch { expected, actual: record.embedding.len() });
		}

		let entries: Vec<(usize, Vec<f32>)> =
			embedded.into_iter().map(|record| (record.turn.snippet_index, record.embedding)).collect();
		let index = IvfPqIndex::build(&entries, BuildParams::from(&self.cfg.index))?;
		let header = artifact::write_index(&self.cfg.storage.index_dir, corpus, source, &index)?;
		let nlist = index.nlist() as u64;

		self.cache.replace(corpus, source, index);
		self.replace_store(store);

		tracing::info!(corpus, source = %source, vectors = header.ntotal, nlist, "Rebuilt index.");

		Ok(RebuildReport {
			corpus: corpus.to_string(),
			source,
			vector_count: header.ntotal,
			dim: header.dim,
			nlist,
			digest: header.digest,
		})
	}

	/// Full offline rebuild: embed, train, persist, and invalidate the cached index.
	pub async fn rebuild_index(
		&self,
		corpus: &str,
		source: Option<EmbeddingSource>,
	) -> Result<RebuildReport> {
		let embedded = self.embed_corpus(corpus, source).await?;

		self.build_index(corpus, Some(embedded.source))
	}
}
