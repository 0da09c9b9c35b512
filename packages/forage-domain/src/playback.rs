use std::collections::BTreeMap;

use forage_config::Playback;

use crate::ConversationId;

pub fn playback_link(style: Playback, conversation_id: &ConversationId, offset: f64) -> String {
	match style {
		Playback::Fora => {
			format!("https://app.fora.io/conversation/{conversation_id}?t={offset:.6}")
		},
		Playback::Youtube => format!(
			"https://www.youtube.com/watch?v={conversation_id}&t={}",
			format_offset(offset)
		),
	}
}

/// Applies every configured alias as a substring replacement, in key order.
pub fn display_speaker_name(name: &str, aliases: &BTreeMap<String, String>) -> String {
	aliases.iter().fold(name.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

// Whole seconds keep one decimal place, matching how offsets are written in the records.
fn format_offset(offset: f64) -> String {
	if offset.is_finite() && offset.fract() == 0.0 {
		format!("{offset:.1}")
	} else {
		offset.to_string()
	}
}
