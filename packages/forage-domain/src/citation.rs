use std::{
	cmp::Reverse,
	collections::BTreeMap,
	sync::LazyLock,
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use forage_config::{Corpus, Playback};

use crate::{
	QueryResult,
	playback::{display_speaker_name, playback_link},
};

// A parenthesised, comma-separated run of bracketed citations, e.g. "([1], [3])".
static CITATION_LIST: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"\(\[[^\]]+\](, \[[^\]]+\])*\)").ok());

/// Locates the textual markers that cite a rank.
///
/// Counting and replacement only go through this trait, so a tokenizing matcher can replace
/// [`LiteralMarkers`] without touching the resolver.
pub trait MarkerMatcher {
	fn markers(&self, rank: u32) -> Vec<String>;

	fn count(&self, text: &str, rank: u32) -> usize {
		self.markers(rank).iter().map(|marker| text.matches(marker.as_str()).count()).sum()
	}

	fn replace(&self, text: &str, rank: u32, widget: &str) -> String {
		self.markers(rank)
			.iter()
			.fold(text.to_string(), |acc, marker| acc.replace(marker.as_str(), widget))
	}
}

/// Plain substring markers: `[r]`, `[r,`, ` r,` and ` r]`.
///
/// Matching is literal, so a marker for one rank can be a substring of unrelated text. The
/// leading bracket or space keeps `[12]` from counting as `[1]`/`[2]`, but prose such as
/// " 3, 4" is still counted as a citation of 3.
///
/// Widgets are not exempt either. An audio widget for a speaker whose name ends in a digit,
/// e.g. `[[:headphones: Guest 2]](..)`, contains ` 2]` and counts as a citation of rank 2,
/// both later in the same pass and when the resolved text is resolved again.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralMarkers;
impl MarkerMatcher for LiteralMarkers {
	fn markers(&self, rank: u32) -> Vec<String> {
		vec![format!("[{rank}]"), format!("[{rank},"), format!(" {rank},"), format!(" {rank}]")]
	}
}

#[derive(Debug, Clone, Copy)]
pub struct CitationStyle<'a> {
	pub playback: Option<Playback>,
	pub speaker_aliases: &'a BTreeMap<String, String>,
}
impl CitationStyle<'_> {
	pub fn widget(&self, result: &QueryResult) -> String {
		let speaker = display_speaker_name(&result.speaker_name, self.speaker_aliases);

		match self.playback {
			Some(style) => {
				let link = playback_link(
					style,
					&result.conversation_id,
					result.audio_start_offset.unwrap_or(0.0),
				);

				format!("[[:headphones: {speaker}]]({link})")
			},
			None => format!(" <sup>[{speaker} (#{rank})](#cite-{rank})</sup> ", rank = result.rank),
		}
	}
}
impl<'a> From<&'a Corpus> for CitationStyle<'a> {
	fn from(corpus: &'a Corpus) -> Self {
		Self { playback: corpus.playback, speaker_aliases: &corpus.speaker_aliases }
	}
}

/// Citation occurrences per rank. Every rank of the analysed result set has an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationCounts(BTreeMap<u32, usize>);
impl CitationCounts {
	pub fn get(&self, rank: u32) -> usize {
		self.0.get(&rank).copied().unwrap_or(0)
	}

	pub fn total(&self) -> usize {
		self.0.values().sum()
	}

	pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
		self.0.iter().map(|(rank, count)| (*rank, *count))
	}

	fn add(&mut self, rank: u32, count: usize) {
		*self.0.entry(rank).or_insert(0) += count;
	}
}

#[derive(Debug, Clone)]
pub struct ResolvedCitations {
	pub markdown: String,
	pub counts: CitationCounts,
}

/// Rewrites `([1], [3])` style lists into space-separated markers (`[1] [3]`).
pub fn normalize_citation_lists(text: &str) -> String {
	let Some(re) = CITATION_LIST.as_ref() else {
		return text.to_string();
	};

	re.replace_all(text, |caps: &Captures<'_>| {
		let stripped: String =
			caps[0].chars().filter(|ch| !matches!(ch, '(' | ')' | ',')).collect();

		stripped.split_whitespace().collect::<Vec<_>>().join(" ")
	})
	.into_owned()
}

pub fn resolve_citations(
	text: &str,
	results: &[QueryResult],
	style: &CitationStyle<'_>,
) -> ResolvedCitations {
	resolve_citations_with(text, results, style, &LiteralMarkers)
}

/// Normalizes citation lists, then counts and replaces markers one result at a time in result
/// order (not in the order markers appear in the text).
pub fn resolve_citations_with<M>(
	text: &str,
	results: &[QueryResult],
	style: &CitationStyle<'_>,
	matcher: &M,
) -> ResolvedCitations
where
	M: MarkerMatcher + ?Sized,
{
	let mut markdown = normalize_citation_lists(text);
	let mut counts = CitationCounts::default();

	for result in results {
		let found = matcher.count(&markdown, result.rank);

		counts.add(result.rank, found);

		if found > 0 {
			markdown = matcher.replace(&markdown, result.rank, &style.widget(result));
		}
	}

	tracing::debug!(
		results = results.len(),
		citations = counts.total(),
		"Resolved citation markers."
	);

	ResolvedCitations { markdown, counts }
}

/// Stable sort by descending citation count; equal counts keep their current order.
pub fn rerank_by_citations(results: &mut [QueryResult], counts: &CitationCounts) {
	results.sort_by_key(|result| Reverse(counts.get(result.rank)));
}
