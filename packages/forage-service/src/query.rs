use serde::{Deserialize, Serialize};

use forage_config::{Corpus, EmbeddingSource};
use forage_domain::{QueryResult, Scope, citation::CitationCounts};
use forage_storage::{corpus::CorpusStore, ivf::SearchHits};

use crate::{Error, ForageService, Result, render};

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
	pub corpus: String,
	pub subject: String,
	pub objective: String,
	pub scope: Scope,
	#[serde(default)]
	pub source: Option<EmbeddingSource>,
	/// Analysis model label or id. Defaults to the configured default model.
	#[serde(default)]
	pub model: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
	pub corpus: String,
	pub scope: Scope,
	pub source: EmbeddingSource,
	pub results: Vec<QueryResult>,
	/// One markdown block per result, in result order.
	pub rendered: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub analysis: Option<Analysis>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
	pub user_input: String,
	pub model: String,
	pub markdown: String,
	pub citation_counts: CitationCounts,
	pub prompt_words: usize,
	pub truncation_attempts: usize,
	pub removed_lines: usize,
}

impl ForageService {
	/// Runs a query end to end: search, enrichment, and for analysing scopes the LLM call and
	/// citation pass. Analysed results come back reordered by citation count.
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let subject = req.subject.trim();

		if subject.is_empty() {
			return Err(Error::InvalidRequest { message: "subject must be non-empty.".to_string() });
		}

		let corpus = self.corpus_config(&req.corpus)?;
		let objective = self.cfg.objective(&req.objective).ok_or_else(|| Error::InvalidRequest {
			message: format!("Unknown objective {:?}.", req.objective),
		})?;
		let model = if req.scope.runs_analysis() {
			let requested = req.model.as_deref();
			let model = self.cfg.providers.llm.resolve_model(requested).ok_or_else(|| {
				Error::InvalidRequest {
					message: format!("Unknown analysis model {:?}.", requested.unwrap_or_default()),
				}
			})?;

			Some(model.clone())
		} else {
			None
		};
		let source = self.source(req.source);
		let mut results = self.search(&corpus.name, subject, req.scope, Some(source)).await?;
		let analysis = match model {
			Some(model) => {
				let user_input = forage_domain::objective::render_objective(
					&objective.prompt_template,
					subject,
				)?;

				Some(self.analyze(corpus, &user_input, &mut results, req.scope, &model).await?)
			},
			None => None,
		};
		let store = self.store(&corpus.name)?;
		let rendered = results
			.iter()
			.map(|result| {
				render::result_markdown(result, corpus, store.conversation(&result.conversation_id))
			})
			.collect();

		tracing::info!(
			corpus = %corpus.name,
			scope = %req.scope,
			source = %source,
			results = results.len(),
			analysed = analysis.is_some(),
			"Query completed."
		);

		Ok(QueryResponse {
			corpus: corpus.name.clone(),
			scope: req.scope,
			source,
			results,
			rendered,
			analysis,
		})
	}

	/// Embeds `subject`, searches the `(corpus, source)` index, and enriches the hits per
	/// `scope`. Ranks are 1-based and dense.
	pub async fn search(
		&self,
		corpus: &str,
		subject: &str,
		scope: Scope,
		source: Option<EmbeddingSource>,
	) -> Result<Vec<QueryResult>> {
		let corpus_cfg = self.corpus_config(corpus)?;
		let store = self.store(corpus)?;
		let source = self.source(source);
		let index = self.cache.get_or_load(corpus, source).map_err(|err| {
			Error::CorpusUnavailable { corpus: corpus.to_string(), message: err.to_string() }
		})?;
		let vector = self.encode(subject, source).await?;
		// Never ask for more slots than the index holds; the rest would all be padding.
		let k = (scope.result_count(self.cfg.search.default_k) as usize).min(index.ntotal());
		let hits = index.search(&vector, k)?;

		Ok(enrich(&store, corpus_cfg, &hits, scope))
	}

	pub(crate) fn corpus_config(&self, corpus: &str) -> Result<&Corpus> {
		self.cfg.corpus(corpus).ok_or_else(|| Error::UnknownCorpus { corpus: corpus.to_string() })
	}

	async fn encode(&self, text: &str, source: EmbeddingSource) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.providers.embedding.embed(self.cfg.embedding(source), &texts).await?;
		let count = vectors.len();
		let mut vectors = vectors.into_iter();

		match (vectors.next(), count) {
			(Some(vector), 1) => Ok(vector),
			_ => Err(Error::Provider {
				message: format!("Embedding provider returned {count} vectors for one query."),
			}),
		}
	}
}

/// Turns raw hits into ranked results. Sentinel slots and ids outside the corpus are skipped.
pub fn enrich(
	store: &CorpusStore,
	corpus: &Corpus,
	hits: &SearchHits,
	scope: Scope,
) -> Vec<QueryResult> {
	let mut results = Vec::with_capacity(hits.len());

	for (turn_id, similarity) in hits.neighbors() {
		let Some(turn) = store.turn(turn_id) else {
			tracing::warn!(
				corpus = %corpus.name,
				turn_id,
				"Index returned a turn id outside the corpus. The index may be stale."
			);

			continue;
		};
		let mut result = QueryResult {
			rank: results.len() as u32 + 1,
			similarity,
			turn_id,
			conversation_id: turn.conversation_id.clone(),
			speaker_name: turn.speaker_name.clone(),
			content: turn.content.clone(),
			index_in_conversation: turn.index_in_conversation,
			audio_start_offset: turn.audio_start_offset,
			speaker_intro: None,
			context: None,
		};

		if scope.with_bio() {
			result.speaker_intro =
				Some(store.speaker_intro(&turn.conversation_id, &turn.speaker_name));
		}
		if let Some(window) = scope.context_window() {
			result.context = Some(store.neighbors(turn_id, window as usize));
		}
		if let Some(window) = corpus.context_window
			&& let Some(content) = store.windowed_content(turn_id, window as usize)
		{
			result.content = content;
		}

		results.push(result);
	}

	results
}
