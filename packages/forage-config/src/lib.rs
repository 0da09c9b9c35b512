mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	AnalysisModel, Config, Corpus, EmbeddingProviderConfig, EmbeddingProviders, EmbeddingSource,
	Index, LlmProviderConfig, Objective, Playback, Prompt, Providers, Search, Service, Storage,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.index_dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.index_dir must be non-empty.".to_string(),
		});
	}
	if cfg.index.nprobe == 0 {
		return Err(Error::Validation {
			message: "index.nprobe must be greater than zero.".to_string(),
		});
	}
	if cfg.index.kmeans_iterations == 0 {
		return Err(Error::Validation {
			message: "index.kmeans_iterations must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_k == 0 {
		return Err(Error::Validation {
			message: "search.default_k must be greater than zero.".to_string(),
		});
	}
	if cfg.prompt.max_words == 0 {
		return Err(Error::Validation {
			message: "prompt.max_words must be greater than zero.".to_string(),
		});
	}
	if cfg.prompt.max_attempts == 0 {
		return Err(Error::Validation {
			message: "prompt.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.prompt.line_clip_chars == 0 {
		return Err(Error::Validation {
			message: "prompt.line_clip_chars must be greater than zero.".to_string(),
		});
	}

	for (label, provider) in [
		("local", &cfg.providers.embedding.local),
		("remote", &cfg.providers.embedding.remote),
	] {
		if provider.dimensions == 0 || provider.dimensions % 2 != 0 {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding.{label}.dimensions must be a positive even number."
				),
			});
		}
		if provider.batch_size == 0 {
			return Err(Error::Validation {
				message: format!("providers.embedding.{label}.batch_size must be greater than zero."),
			});
		}
		if provider.max_input_chars == 0 {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding.{label}.max_input_chars must be greater than zero."
				),
			});
		}
	}

	if cfg.providers.embedding.remote.api_key.is_none() {
		return Err(Error::Validation {
			message: "providers.embedding.remote.api_key must be non-empty.".to_string(),
		});
	}

	let llm = &cfg.providers.llm;

	if llm.models.is_empty() {
		return Err(Error::Validation {
			message: "providers.llm.models must be non-empty.".to_string(),
		});
	}
	if let Some(default) = llm.default_model.as_deref()
		&& !llm.models.iter().any(|model| model.label == default)
	{
		return Err(Error::Validation {
			message: "providers.llm.default_model must name a registered model label.".to_string(),
		});
	}
	if !llm.temperature.is_finite() || llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number zero or greater."
				.to_string(),
		});
	}

	validate_corpora(cfg)?;
	validate_objectives(cfg)?;

	Ok(())
}

fn validate_corpora(cfg: &Config) -> Result<()> {
	if cfg.corpora.is_empty() {
		return Err(Error::Validation { message: "corpora must be non-empty.".to_string() });
	}

	let mut seen = HashSet::new();

	for corpus in &cfg.corpora {
		let valid_name = !corpus.name.is_empty()
			&& corpus
				.name
				.chars()
				.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');

		if !valid_name {
			return Err(Error::Validation {
				message: format!(
					"corpora.name {:?} must be non-empty and use only ASCII letters, digits, '-' or '_'.",
					corpus.name
				),
			});
		}
		if !seen.insert(corpus.name.as_str()) {
			return Err(Error::Validation {
				message: format!("corpora.name {:?} is duplicated.", corpus.name),
			});
		}
		if corpus.conversations.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("corpora.{}.conversations must be non-empty.", corpus.name),
			});
		}
		if corpus.context_window == Some(0) {
			return Err(Error::Validation {
				message: format!(
					"corpora.{}.context_window must be greater than zero when set.",
					corpus.name
				),
			});
		}
	}

	Ok(())
}

fn validate_objectives(cfg: &Config) -> Result<()> {
	if cfg.objectives.is_empty() {
		return Err(Error::Validation { message: "objectives must be non-empty.".to_string() });
	}

	let mut seen = HashSet::new();

	for objective in &cfg.objectives {
		if objective.key.trim().is_empty() {
			return Err(Error::Validation {
				message: "objectives.key must be non-empty.".to_string(),
			});
		}
		if !seen.insert(objective.key.as_str()) {
			return Err(Error::Validation {
				message: format!("objectives.key {:?} is duplicated.", objective.key),
			});
		}
		if count_placeholders(&objective.prompt_template) != Some(1) {
			return Err(Error::Validation {
				message: format!(
					"objectives.{}.prompt_template must contain exactly one %s placeholder.",
					objective.key
				),
			});
		}
	}

	Ok(())
}

// `%%` is a literal percent sign; any other directive is rejected.
fn count_placeholders(template: &str) -> Option<usize> {
	let mut count = 0;
	let mut chars = template.chars();

	while let Some(ch) = chars.next() {
		if ch != '%' {
			continue;
		}

		match chars.next() {
			Some('%') => {},
			Some('s') => count += 1,
			_ => return None,
		}
	}

	Some(count)
}

fn normalize(cfg: &mut Config) {
	for provider in [&mut cfg.providers.embedding.local, &mut cfg.providers.embedding.remote] {
		if provider.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			provider.api_key = None;
		}
	}

	if cfg.providers.llm.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.providers.llm.api_key = None;
	}
	if cfg
		.providers
		.llm
		.default_model
		.as_deref()
		.map(|model| model.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.llm.default_model = None;
	}
}
