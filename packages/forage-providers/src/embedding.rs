use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Stand-in for empty inputs, which embedding endpoints reject.
pub const EMPTY_INPUT: &str = "none";

/// Embeds `texts` in one request and returns one vector per input, in input order.
pub async fn embed(
	cfg: &forage_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": prepare_inputs(texts, cfg.max_input_chars as usize),
		"dimensions": cfg.dimensions,
	});

	tracing::debug!(provider_id = %cfg.provider_id, inputs = texts.len(), "Requesting embeddings.");

	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response has {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}

	Ok(vectors)
}

/// Clips inputs to `max_chars` characters and replaces empty ones with [`EMPTY_INPUT`].
pub fn prepare_inputs(texts: &[String], max_chars: usize) -> Vec<String> {
	texts
		.iter()
		.map(|text| {
			let clipped: String = text.chars().take(max_chars).collect();

			if clipped.is_empty() { EMPTY_INPUT.to_string() } else { clipped }
		})
		.collect()
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let invalid = |message: &str| Error::InvalidResponse { message: message.to_string() };
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| invalid("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| invalid("Embedding value must be numeric."))?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
