use forage_config::{Corpus, Playback};
use forage_domain::{
	ConversationId, QueryResult,
	playback::{display_speaker_name, playback_link},
};
use forage_storage::models::Conversation;

/// `"{rank}. **:blue[{speaker}]**: {content}"`, followed by a source line linking to the
/// conversation when its record is known.
pub fn result_markdown(
	result: &QueryResult,
	corpus: &Corpus,
	conversation: Option<&Conversation>,
) -> String {
	let speaker = display_speaker_name(&result.speaker_name, &corpus.speaker_aliases);
	let mut md = format!("{}. **:blue[{speaker}]**: {}", result.rank, result.content);

	if let Some(conversation) = conversation {
		let style = corpus.playback.unwrap_or_else(|| link_style(&result.conversation_id));
		let link = playback_link(
			style,
			&result.conversation_id,
			result.audio_start_offset.unwrap_or(0.0),
		);

		md.push_str(&format!(
			"\n*(From [{}]({link}), {})*",
			conversation.title,
			conversation.start_date()
		));
	}

	md
}

// Video ids are textual; hosted recordings are numbered.
fn link_style(id: &ConversationId) -> Playback {
	match id {
		ConversationId::Text(_) => Playback::Youtube,
		ConversationId::Number(_) => Playback::Fora,
	}
}
