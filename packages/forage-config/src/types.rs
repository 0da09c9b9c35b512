use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub index: Index,
	pub search: Search,
	pub prompt: Prompt,
	pub providers: Providers,
	pub corpora: Vec<Corpus>,
	pub objectives: Vec<Objective>,
}
impl Config {
	pub fn corpus(&self, name: &str) -> Option<&Corpus> {
		self.corpora.iter().find(|corpus| corpus.name == name)
	}

	pub fn objective(&self, key: &str) -> Option<&Objective> {
		self.objectives.iter().find(|objective| objective.key == key)
	}

	pub fn embedding(&self, source: EmbeddingSource) -> &EmbeddingProviderConfig {
		match source {
			EmbeddingSource::Local => &self.providers.embedding.local,
			EmbeddingSource::Remote => &self.providers.embedding.remote,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// Root directory holding one sub-directory per corpus.
	pub index_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Index {
	/// Inverted lists scanned per query. Applied when an index is loaded.
	pub nprobe: u32,
	#[serde(default = "default_kmeans_iterations")]
	pub kmeans_iterations: u32,
	/// Below this average occupancy per coarse centroid a build logs a degraded-recall warning.
	#[serde(default = "default_min_points_per_centroid")]
	pub min_points_per_centroid: u32,
	#[serde(default)]
	pub seed: u64,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	/// Result count for requests whose scope does not name one.
	pub default_k: u32,
}

#[derive(Debug, Deserialize)]
pub struct Prompt {
	pub max_words: u32,
	pub max_attempts: u32,
	pub line_clip_chars: u32,
	/// Pins the truncation RNG. Unset means a fresh entropy seed per request.
	pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviders,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviders {
	pub default_source: EmbeddingSource,
	pub local: EmbeddingProviderConfig,
	pub remote: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	pub default_model: Option<String>,
	pub models: Vec<AnalysisModel>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl LlmProviderConfig {
	/// Resolves a requested model by label or id, falling back to the configured default and
	/// then to the first registered model.
	pub fn resolve_model(&self, requested: Option<&str>) -> Option<&AnalysisModel> {
		match requested {
			Some(wanted) => self
				.models
				.iter()
				.find(|model| model.label == wanted || model.model == wanted),
			None => match self.default_model.as_deref() {
				Some(default) => self.models.iter().find(|model| model.label == default),
				None => self.models.first(),
			},
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisModel {
	pub label: String,
	pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct Corpus {
	pub name: String,
	pub display_name: String,
	/// Conversation records file, relative to the corpus directory.
	#[serde(default = "default_conversations_file")]
	pub conversations: String,
	pub context_window: Option<u32>,
	pub playback: Option<Playback>,
	#[serde(default)]
	pub speaker_aliases: BTreeMap<String, String>,
	#[serde(default)]
	pub examples: Vec<String>,
}
impl Corpus {
	pub fn audio_backed(&self) -> bool {
		self.playback.is_some()
	}
}

#[derive(Debug, Deserialize)]
pub struct Objective {
	pub key: String,
	pub display: String,
	pub prompt_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingSource {
	Local,
	Remote,
}
impl EmbeddingSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Remote => "remote",
		}
	}
}
impl fmt::Display for EmbeddingSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Playback {
	Fora,
	Youtube,
}

fn default_kmeans_iterations() -> u32 {
	25
}

fn default_min_points_per_centroid() -> u32 {
	39
}

fn default_batch_size() -> u32 {
	1_024
}

fn default_max_input_chars() -> u32 {
	4_000
}

fn default_conversations_file() -> String {
	"conversations.jsonl".to_string()
}
