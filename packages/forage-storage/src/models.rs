use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use forage_domain::ConversationId;

/// One transcribed speaker turn. `snippet_index` is the dense, 0-based turn id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
	pub snippet_index: usize,
	pub conversation_id: ConversationId,
	pub speaker_name: String,
	pub content: String,
	pub index_in_conversation: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audio_start_offset: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
	pub id: ConversationId,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub start_time: String,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Conversation {
	/// Calendar date part of `start_time`.
	pub fn start_date(&self) -> &str {
		self.start_time.get(..10).unwrap_or(&self.start_time)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedTurn {
	#[serde(flatten)]
	pub turn: TurnRecord,
	pub embedding: Vec<f32>,
}
impl EmbeddedTurn {
	pub fn new(turn: TurnRecord, mut embedding: Vec<f32>) -> Self {
		round_embedding(&mut embedding);

		Self { turn, embedding }
	}
}

/// Rounds every component to 5 decimal places, the precision embedded records are stored at.
pub fn round_embedding(embedding: &mut [f32]) {
	for value in embedding {
		*value = ((*value as f64 * 100_000.0).round() / 100_000.0) as f32;
	}
}
