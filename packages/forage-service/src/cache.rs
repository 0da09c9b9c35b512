use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{Arc, RwLock},
};

use forage_config::EmbeddingSource;
use forage_storage::{artifact, ivf::IvfPqIndex};

type CacheKey = (String, EmbeddingSource);

/// Loaded indexes keyed by `(corpus, source)`. Entries are only replaced by a rebuild.
pub struct IndexCache {
	index_dir: PathBuf,
	nprobe: usize,
	entries: RwLock<HashMap<CacheKey, Arc<IvfPqIndex>>>,
}
impl IndexCache {
	pub fn new(index_dir: PathBuf, nprobe: usize) -> Self {
		Self { index_dir, nprobe, entries: RwLock::new(HashMap::new()) }
	}

	pub fn contains(&self, corpus: &str, source: EmbeddingSource) -> bool {
		self.get(corpus, source).is_some()
	}

	pub fn get(&self, corpus: &str, source: EmbeddingSource) -> Option<Arc<IvfPqIndex>> {
		let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());

		entries.get(&(corpus.to_string(), source)).cloned()
	}

	/// Returns the cached index or reads its artifact. Failed reads are not cached.
	pub fn get_or_load(
		&self,
		corpus: &str,
		source: EmbeddingSource,
	) -> forage_storage::Result<Arc<IvfPqIndex>> {
		if let Some(index) = self.get(corpus, source) {
			tracing::trace!(corpus, source = %source, "Index cache hit.");

			return Ok(index);
		}

		tracing::debug!(corpus, source = %source, "Index cache miss.");

		let (_, index) = artifact::read_index(&self.index_dir, corpus, source, self.nprobe)?;
		let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());
		let entry = entries.entry((corpus.to_string(), source)).or_insert_with(|| Arc::new(index));

		Ok(entry.clone())
	}

	/// Installs a freshly built index, applying the configured `nprobe`.
	pub fn replace(
		&self,
		corpus: &str,
		source: EmbeddingSource,
		mut index: IvfPqIndex,
	) -> Arc<IvfPqIndex> {
		index.set_nprobe(self.nprobe);

		let index = Arc::new(index);
		let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());

		entries.insert((corpus.to_string(), source), index.clone());

		tracing::info!(corpus, source = %source, "Replaced cached index.");

		index
	}
}
