use rand::{SeedableRng, rngs::StdRng};

use forage_config::{AnalysisModel, Corpus};
use forage_domain::{
	QueryResult, Scope,
	citation::{self, CitationStyle},
	prompt::{self, TruncationBudget},
};

use crate::{Analysis, ForageService, Result};

impl ForageService {
	/// Prompts the analysis model with `results`, resolves the citations in its answer and
	/// reorders `results` by how often each was cited.
	pub async fn analyze(
		&self,
		corpus: &Corpus,
		user_input: &str,
		results: &mut [QueryResult],
		scope: Scope,
		model: &AnalysisModel,
	) -> Result<Analysis> {
		let budget = TruncationBudget::from(&self.cfg.prompt);
		let mut rng = match self.cfg.prompt.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		let assembled = prompt::assemble_prompt(user_input, results, scope);
		let truncation = prompt::truncate_prompt(assembled, &budget, &mut rng);

		tracing::debug!(
			corpus = %corpus.name,
			model = %model.model,
			words = truncation.word_count,
			attempts = truncation.attempts,
			removed_lines = truncation.removed_lines,
			"Prepared analysis prompt."
		);

		let answer = self
			.providers
			.llm
			.complete(&self.cfg.providers.llm, &model.model, &truncation.prompt)
			.await?;
		let resolved = citation::resolve_citations(&answer, results, &CitationStyle::from(corpus));

		citation::rerank_by_citations(results, &resolved.counts);

		Ok(Analysis {
			user_input: user_input.to_string(),
			model: model.label.clone(),
			markdown: resolved.markdown,
			citation_counts: resolved.counts,
			prompt_words: truncation.word_count,
			truncation_attempts: truncation.attempts,
			removed_lines: truncation.removed_lines,
		})
	}
}
