use rand::Rng;

use crate::{QueryResult, Scope};

const PREAMBLE: &str = "Below are remarks from conversations, with an ID shown in brackets:\n\n###\n\n";
const INSTRUCTION: &str =
	"\n\n###\n\nPlease be sure to cite by ID in brackets, and answer the following: ";

#[derive(Debug, Clone, Copy)]
pub struct TruncationBudget {
	pub max_words: usize,
	pub max_attempts: usize,
	pub line_clip_chars: usize,
}
impl From<&forage_config::Prompt> for TruncationBudget {
	fn from(cfg: &forage_config::Prompt) -> Self {
		Self {
			max_words: cfg.max_words as usize,
			max_attempts: cfg.max_attempts as usize,
			line_clip_chars: cfg.line_clip_chars as usize,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Truncation {
	pub prompt: String,
	pub attempts: usize,
	pub removed_lines: usize,
	pub word_count: usize,
}

/// Renders one example line per result, shaped by the scope, and wraps them with the
/// instruction text.
pub fn assemble_prompt(user_input: &str, results: &[QueryResult], scope: Scope) -> String {
	let examples: Vec<String> = results.iter().map(|result| render_example(result, scope)).collect();
	let mut prompt = String::from(PREAMBLE);

	prompt.push_str(&examples.join("\n"));
	prompt.push_str(INSTRUCTION);
	prompt.push_str(user_input);
	prompt.push_str("\n\n");

	prompt
}

pub fn render_example(result: &QueryResult, scope: Scope) -> String {
	if scope.with_bio() {
		return format!(
			"- [{}] \"{}\" (from {}, whose first remarks were: \"{}\")",
			result.rank,
			result.content,
			result.speaker_name,
			result.speaker_intro.as_deref().unwrap_or_default(),
		);
	}
	if scope.context_window().is_some() {
		let context = result.context.as_ref();
		let before = context.map(|ctx| ctx.before.as_slice()).unwrap_or_default();
		let after = context.map(|ctx| ctx.after.as_slice()).unwrap_or_default();
		let lines: Vec<String> = before
			.iter()
			.map(|n| speaker_line(&n.speaker_name, &n.content))
			.chain([speaker_line(&result.speaker_name, &result.content)])
			.chain(after.iter().map(|n| speaker_line(&n.speaker_name, &n.content)))
			.collect();

		return format!("- [{}] {}", result.rank, lines.join("\n"));
	}

	format!("- [{}] \"{}\"", result.rank, result.content)
}

pub fn word_count(text: &str) -> usize {
	text.split_whitespace().count()
}

/// Drops randomly chosen lines until the prompt fits `max_words`.
///
/// The first line and the last two lines are never candidates, and a line ending in `:` is
/// kept even when drawn. Every draw counts against `max_attempts`, so the result may still
/// exceed the budget. Prompts with fewer than four lines have nothing removable and are
/// returned as they are.
pub fn truncate_prompt<R>(prompt: String, budget: &TruncationBudget, rng: &mut R) -> Truncation
where
	R: Rng + ?Sized,
{
	let mut prompt = prompt;
	let mut words = word_count(&prompt);
	let mut attempts = 0;
	let mut removed_lines = 0;

	while words > budget.max_words && attempts < budget.max_attempts {
		let mut lines: Vec<&str> =
			prompt.split('\n').map(|line| clip_chars(line, budget.line_clip_chars)).collect();

		if lines.len() < 4 {
			break;
		}

		let pick = rng.gen_range(1..=lines.len() - 3);

		if !lines[pick].ends_with(':') {
			lines.remove(pick);

			let rebuilt = lines.join("\n");

			prompt = rebuilt;
			words = word_count(&prompt);
			removed_lines += 1;
		}

		attempts += 1;
	}

	if words > budget.max_words {
		tracing::warn!(
			words,
			max_words = budget.max_words,
			attempts,
			"Prompt still exceeds the word budget after truncation."
		);
	}

	Truncation { prompt, attempts, removed_lines, word_count: words }
}

fn speaker_line(speaker: &str, content: &str) -> String {
	format!("{speaker}: \"{content}\"")
}

fn clip_chars(line: &str, max_chars: usize) -> &str {
	match line.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => &line[..byte_idx],
		None => line,
	}
}
