use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use poi_config::LlmProviderConfig;
use poi_domain::StructuredQuery;

use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "\
You turn a Taiwanese travel question into a JSON object. Reply with the JSON object only.

Fields (omit any field the question does not mention):
- gmap_location: a specific place name in Traditional Chinese, e.g. \"士林夜市\".
- address: a city or county when no specific place is named, e.g. \"台北市\", \"新竹縣\".
  Never set both gmap_location and address.
- class: the Google Maps category in Traditional Chinese, e.g. \"博物館\", \"咖啡館\".
- geo_distance: a radius such as \"5km\" or \"10km\"; use \"10km\" for \"nearby\".
- tags: amenities such as \"適合兒童\", \"無障礙停車場\", \"Wi-Fi\".
- opening_hours: time hints such as [\"週二\", \"下午\"].
- entrance_fee: a ticket price ceiling as a number, e.g. 200.
- semantic_keywords: descriptive words the traveller wants reviews to talk about, kept verbatim.

Example: 「我想了解九份老街的評論中提到天氣的內容」
{\"gmap_location\": \"九份老街\", \"semantic_keywords\": [\"天氣\"]}";

static OPENING_FENCE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^```[A-Za-z]*").ok());

pub async fn parse(cfg: &LlmProviderConfig, query: &str) -> Result<StructuredQuery> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": build_messages(query),
	});
	let mut last_error = None;

	for attempt in 1..=cfg.max_attempts {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match decode_reply(&json) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => {
				tracing::warn!(attempt, error = %err, "Query parser reply was not a structured query.");

				last_error = Some(err);
			},
		}
	}

	Err(last_error.unwrap_or_else(|| Error::InvalidConfig {
		message: "providers.query_parser.max_attempts must be greater than zero.".to_string(),
	}))
}

pub fn build_messages(query: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": query }),
	]
}

/// Decodes a chat-completions reply, or a bare JSON object, into a [`StructuredQuery`].
pub fn decode_reply(json: &Value) -> Result<StructuredQuery> {
	let parsed = match reply_content(json) {
		Some(content) => serde_json::from_str::<Value>(strip_code_fence(content)).map_err(|_| {
			Error::InvalidResponse {
				message: "Query parser content is not valid JSON.".to_string(),
			}
		})?,
		None if json.get("choices").is_none() && json.is_object() => json.clone(),
		None => {
			return Err(Error::InvalidResponse {
				message: "Query parser response is missing message content.".to_string(),
			});
		},
	};

	if !parsed.is_object() {
		return Err(Error::InvalidResponse {
			message: "Query parser content is not a JSON object.".to_string(),
		});
	}

	let query: StructuredQuery = serde_json::from_value(parsed)?;

	Ok(query.normalize())
}

/// Removes a leading and a trailing Markdown fence; either may be missing.
pub fn strip_code_fence(text: &str) -> &str {
	let mut body = text.trim();

	match OPENING_FENCE.as_ref().and_then(|re| re.find(body)) {
		Some(fence) => body = &body[fence.end()..],
		None =>
			if let Some(rest) = body.strip_prefix("```") {
				body = rest;
			},
	}

	if let Some(rest) = body.strip_suffix("```") {
		body = rest;
	}

	body.trim()
}

fn reply_content(json: &Value) -> Option<&str> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(|content| content.as_str())
}
