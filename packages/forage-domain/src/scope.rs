use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How many hits a request fetches and which enrichment shapes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
	SearchOnly,
	Top { n: u32 },
	TopWithContext { n: u32, window: u32 },
	TopWithBio { n: u32 },
}
impl Scope {
	pub fn parse(raw: &str) -> Result<Self> {
		let invalid = || Error::InvalidScope { raw: raw.to_string() };

		if raw == "search_only" {
			return Ok(Self::SearchOnly);
		}

		let rest = raw.strip_prefix("top_").ok_or_else(invalid)?;
		let (count, modifier) = match rest.split_once('_') {
			Some((count, modifier)) => (count, Some(modifier)),
			None => (rest, None),
		};
		let n = parse_positive(count).ok_or_else(invalid)?;

		match modifier {
			None => Ok(Self::Top { n }),
			Some("with_bio") => Ok(Self::TopWithBio { n }),
			Some(modifier) => {
				let window = modifier
					.strip_prefix("with_context_")
					.and_then(parse_positive)
					.ok_or_else(invalid)?;

				Ok(Self::TopWithContext { n, window })
			},
		}
	}

	/// `k` passed to the index search.
	pub fn result_count(self, default_k: u32) -> u32 {
		match self {
			Self::SearchOnly => default_k,
			Self::Top { n } | Self::TopWithContext { n, .. } | Self::TopWithBio { n } => n,
		}
	}

	pub fn runs_analysis(self) -> bool {
		!matches!(self, Self::SearchOnly)
	}

	pub fn with_bio(self) -> bool {
		matches!(self, Self::TopWithBio { .. })
	}

	pub fn context_window(self) -> Option<u32> {
		match self {
			Self::TopWithContext { window, .. } => Some(window),
			_ => None,
		}
	}
}
impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::SearchOnly => f.write_str("search_only"),
			Self::Top { n } => write!(f, "top_{n}"),
			Self::TopWithContext { n, window } => write!(f, "top_{n}_with_context_{window}"),
			Self::TopWithBio { n } => write!(f, "top_{n}_with_bio"),
		}
	}
}
impl FromStr for Scope {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		Self::parse(raw)
	}
}
impl TryFrom<String> for Scope {
	type Error = Error;

	fn try_from(raw: String) -> Result<Self> {
		Self::parse(&raw)
	}
}
impl From<Scope> for String {
	fn from(scope: Scope) -> Self {
		scope.to_string()
	}
}

fn parse_positive(raw: &str) -> Option<u32> {
	if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
		return None;
	}

	raw.parse().ok().filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_every_scope_shape() {
		assert_eq!(Scope::parse("search_only").unwrap(), Scope::SearchOnly);
		assert_eq!(Scope::parse("top_100").unwrap(), Scope::Top { n: 100 });
		assert_eq!(Scope::parse("top_50_with_bio").unwrap(), Scope::TopWithBio { n: 50 });
		assert_eq!(
			Scope::parse("top_100_with_context_1").unwrap(),
			Scope::TopWithContext { n: 100, window: 1 }
		);
	}

	#[test]
	fn rejects_unknown_or_degenerate_scopes() {
		for raw in [
			"",
			"top_",
			"top_0",
			"top_-5",
			"top_+5",
			"top_ten",
			"top_10_with_context_0",
			"top_10_with_context_",
			"top_10_with_friends",
			"allspeaker_10",
		] {
			assert!(Scope::parse(raw).is_err(), "{raw:?} should be rejected");
		}
	}

	#[test]
	fn derives_result_count() {
		assert_eq!(Scope::SearchOnly.result_count(100), 100);
		assert_eq!(Scope::TopWithBio { n: 50 }.result_count(100), 50);
		assert!(!Scope::SearchOnly.runs_analysis());
		assert!(Scope::Top { n: 3 }.runs_analysis());
	}

	#[test]
	fn display_round_trips() {
		for raw in ["search_only", "top_7", "top_50_with_bio", "top_100_with_context_2"] {
			assert_eq!(Scope::parse(raw).unwrap().to_string(), raw);
		}
	}
}
