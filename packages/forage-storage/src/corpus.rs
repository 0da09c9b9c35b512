use std::{
	collections::HashMap,
	path::{Path, PathBuf},
};

use forage_config::EmbeddingSource;
use forage_domain::{ConversationId, Neighbor, TurnContext};

use crate::{
	Error, Result, artifact, jsonl,
	models::{Conversation, EmbeddedTurn, TurnRecord},
};

pub const TURNS_FILE: &str = "snippets.jsonl";
/// Earliest utterances kept per speaker and conversation.
pub const SPEAKER_INTRO_LIMIT: usize = 5;

/// Read-only turn and conversation tables for one corpus.
#[derive(Debug)]
pub struct CorpusStore {
	name: String,
	dir: PathBuf,
	turns: Vec<TurnRecord>,
	conversations: HashMap<ConversationId, Conversation>,
	intros: HashMap<(ConversationId, String), Vec<String>>,
}
impl CorpusStore {
	pub fn open(index_dir: &Path, corpus: &forage_config::Corpus) -> Result<Self> {
		let dir = artifact::corpus_dir(index_dir, &corpus.name);
		let turns = jsonl::read_records(&dir.join(TURNS_FILE))?;
		let conversations = jsonl::read_records(&dir.join(&corpus.conversations))?;
		let store = Self::from_records(&corpus.name, dir, turns, conversations)?;

		tracing::info!(
			corpus = %store.name,
			turns = store.turns.len(),
			conversations = store.conversations.len(),
			speakers = store.intros.len(),
			"Loaded corpus."
		);

		Ok(store)
	}

	/// Builds the tables from records in storage order. Turn ids must equal their position.
	pub fn from_records(
		name: &str,
		dir: PathBuf,
		turns: Vec<TurnRecord>,
		conversations: Vec<Conversation>,
	) -> Result<Self> {
		if let Some((position, turn)) =
			turns.iter().enumerate().find(|(position, turn)| turn.snippet_index != *position)
		{
			return Err(Error::InvalidCorpus {
				corpus: name.to_string(),
				message: format!(
					"Turn at position {position} has snippet_index {}, expected dense 0-based ids.",
					turn.snippet_index
				),
			});
		}

		let mut intros: HashMap<(ConversationId, String), Vec<String>> = HashMap::new();

		for turn in &turns {
			let intro = intros
				.entry((turn.conversation_id.clone(), turn.speaker_name.clone()))
				.or_default();

			if intro.len() < SPEAKER_INTRO_LIMIT {
				intro.push(turn.content.clone());
			}
		}

		let conversations = conversations
			.into_iter()
			.map(|conversation| (conversation.id.clone(), conversation))
			.collect();

		Ok(Self { name: name.to_string(), dir, turns, conversations, intros })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn len(&self) -> usize {
		self.turns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}

	pub fn turns(&self) -> &[TurnRecord] {
		&self.turns
	}

	pub fn turn(&self, turn_id: usize) -> Option<&TurnRecord> {
		self.turns.get(turn_id)
	}

	pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
		self.conversations.get(id)
	}

	pub fn intro_turns(&self, conversation_id: &ConversationId, speaker: &str) -> &[String] {
		self.intros
			.get(&(conversation_id.clone(), speaker.to_string()))
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	/// First remarks of a speaker in a conversation, joined with single spaces.
	pub fn speaker_intro(&self, conversation_id: &ConversationId, speaker: &str) -> String {
		self.intro_turns(conversation_id, speaker).join(" ")
	}

	/// Up to `window` turns on each side of `turn_id` in storage order. The neighborhood is not
	/// bounded by conversations, only by the ends of the corpus.
	pub fn neighbors(&self, turn_id: usize, window: usize) -> TurnContext {
		let neighbor = |turn: &TurnRecord| Neighbor {
			turn_id: turn.snippet_index,
			speaker_name: turn.speaker_name.clone(),
			content: turn.content.clone(),
		};
		let start = turn_id.saturating_sub(window).min(self.turns.len());
		let end = turn_id.saturating_add(window).saturating_add(1).min(self.turns.len());
		let before = self.turns.get(start..turn_id.min(self.turns.len())).unwrap_or_default();
		let after = self.turns.get(turn_id.saturating_add(1).min(end)..end).unwrap_or_default();

		TurnContext {
			before: before.iter().map(neighbor).collect(),
			after: after.iter().map(neighbor).collect(),
		}
	}

	/// Content of `turn_id` surrounded by `window` turns per side, the match in bold.
	pub fn windowed_content(&self, turn_id: usize, window: usize) -> Option<String> {
		let matched = self.turn(turn_id)?;
		let context = self.neighbors(turn_id, window);
		let mut content = String::new();

		for turn in &context.before {
			content.push(' ');
			content.push_str(&turn.content);
		}

		content.push_str(" **");
		content.push_str(&matched.content);
		content.push_str("**");

		for turn in &context.after {
			content.push(' ');
			content.push_str(&turn.content);
		}

		Some(content)
	}
}

/// Embedded records are kept per source, so embedding with one source never clobbers the
/// vectors of the other.
pub fn embedded_turns_path(dir: &Path, source: EmbeddingSource) -> PathBuf {
	dir.join(format!("snippets_with_embeddings_{source}.jsonl"))
}

pub fn read_embedded_turns(dir: &Path, source: EmbeddingSource) -> Result<Vec<EmbeddedTurn>> {
	jsonl::read_records(&embedded_turns_path(dir, source))
}

pub fn write_embedded_turns(
	dir: &Path,
	source: EmbeddingSource,
	turns: &[EmbeddedTurn],
) -> Result<usize> {
	jsonl::write_records(&embedded_turns_path(dir, source), turns)
}
