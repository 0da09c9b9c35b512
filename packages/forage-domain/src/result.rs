use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation key as persisted: numeric for hosted recordings, textual for video ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationId {
	Number(i64),
	Text(String),
}
impl fmt::Display for ConversationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Number(id) => write!(f, "{id}"),
			Self::Text(id) => f.write_str(id),
		}
	}
}
impl From<i64> for ConversationId {
	fn from(id: i64) -> Self {
		Self::Number(id)
	}
}
impl From<&str> for ConversationId {
	fn from(id: &str) -> Self {
		Self::Text(id.to_string())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
	pub turn_id: usize,
	pub speaker_name: String,
	pub content: String,
}

/// Turns adjacent to a hit in storage order, nearest last in `before` and nearest first in
/// `after`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
	pub before: Vec<Neighbor>,
	pub after: Vec<Neighbor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
	pub rank: u32,
	pub similarity: f32,
	pub turn_id: usize,
	pub conversation_id: ConversationId,
	pub speaker_name: String,
	pub content: String,
	pub index_in_conversation: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audio_start_offset: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub speaker_intro: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<TurnContext>,
}
