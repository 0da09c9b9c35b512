use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{Error, Result};

/// Sends `prompt` as a single user message and returns the first choice's content.
pub async fn complete(
	cfg: &forage_config::LlmProviderConfig,
	model: &str,
	prompt: &str,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": [{ "role": "user", "content": prompt }],
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;

	if res.status() == StatusCode::BAD_REQUEST {
		let raw = res.text().await?;

		if let Some(message) = context_length_message(&raw) {
			tracing::warn!(provider_id = %cfg.provider_id, model, "Prompt exceeds the model context length.");

			return Err(Error::ContextLengthExceeded { message });
		}

		return Err(Error::InvalidResponse {
			message: format!("Completion request was rejected: {raw}"),
		});
	}

	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_content(json)
}

fn parse_completion_content(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing message content.".to_string(),
		})
}

// OpenAI-compatible servers report an overlong prompt as a 400 with this error code, or at
// least with a message naming the context length.
fn context_length_message(raw: &str) -> Option<String> {
	let json: Value = serde_json::from_str(raw).ok()?;
	let error = json.get("error")?;
	let message = error.get("message").and_then(|m| m.as_str()).unwrap_or_default();
	let by_code = error.get("code").and_then(|c| c.as_str()) == Some("context_length_exceeded");

	if by_code || message.to_ascii_lowercase().contains("context length") {
		Some(message.to_string())
	} else {
		None
	}
}
