use std::{collections::HashSet, time::Duration};

use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use serde_json::{Map, Value};

use poi_config::SearchBackend;
use poi_domain::{StructuredQuery, place};

use crate::{Error, Result};

/// Resolves a structured query into candidate place ids.
///
/// A named place is first looked up by exact name; the fuzzy query only runs when that lookup
/// finds nothing. A rejected query yields no candidates instead of an error.
pub async fn search_candidates(
	cfg: &SearchBackend,
	query: &StructuredQuery,
) -> Result<Vec<String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

	if let Some(name) = query.gmap_location.as_deref() {
		match post_search(&client, cfg, &exact_match_body(&cfg.exact_field, name)).await {
			Ok(ids) if !ids.is_empty() => {
				tracing::debug!(name, location_id = %ids[0], "Exact place match.");

				return Ok(ids.into_iter().take(1).collect());
			},
			Ok(_) => {},
			Err(Error::BadQuery { message }) => {
				tracing::warn!(
					name,
					reason = %message,
					"Exact place lookup rejected. Falling back to fuzzy search."
				);
			},
			Err(err) => return Err(err),
		}
	}

	match post_search(&client, cfg, &fuzzy_body(query, cfg.max_candidates)).await {
		Ok(ids) => Ok(ids),
		Err(Error::BadQuery { message }) => {
			tracing::warn!(reason = %message, "Fuzzy place search rejected. Returning no candidates.");

			Ok(Vec::new())
		},
		Err(err) => Err(err),
	}
}

pub fn exact_match_body(field: &str, name: &str) -> Value {
	let mut term = Map::new();

	term.insert(field.to_string(), Value::from(name));

	serde_json::json!({
		"query": { "term": term },
		"size": 1,
	})
}

pub fn fuzzy_body(query: &StructuredQuery, size: u32) -> Value {
	let mut must = Vec::new();
	let mut filter = Vec::new();

	if let Some(name) = &query.gmap_location {
		must.push(serde_json::json!({
			"match": { "gmap_location": { "query": name, "fuzziness": "AUTO" } }
		}));
	}
	if let Some(address) = &query.address {
		must.push(serde_json::json!({ "match_phrase": { "address": { "query": address } } }));
	}
	if let Some(category) = &query.category {
		must.push(serde_json::json!({
			"match": { "class": { "query": category, "fuzziness": "AUTO", "boost": 3.0 } }
		}));
	}
	if !query.tags.is_empty() {
		must.push(serde_json::json!({
			"match": { "tags": { "query": query.tags.join(" "), "fuzziness": "AUTO" } }
		}));
	}
	if !query.opening_hours.is_empty() {
		must.push(serde_json::json!({
			"match": { "opening_hours": { "query": query.opening_hours.join(" ") } }
		}));
	}
	if let Some(fee) = query.entrance_fee {
		filter.push(serde_json::json!({ "range": { "entrance_fee": { "lt": fee } } }));
	}

	serde_json::json!({
		"query": { "bool": { "must": must, "filter": filter } },
		"size": size,
	})
}

/// Extracts `_source.location_id` from each hit, keeping first occurrences in hit order.
pub fn parse_hits(json: &Value) -> Result<Vec<String>> {
	let hits = json
		.get("hits")
		.and_then(|hits| hits.get("hits"))
		.and_then(|hits| hits.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing hits.hits array.".to_string(),
		})?;
	let mut seen = HashSet::new();
	let mut ids = Vec::with_capacity(hits.len());

	for hit in hits {
		let Some(id) = hit
			.get("_source")
			.and_then(|source| source.get("location_id"))
			.and_then(place::id_text)
		else {
			continue;
		};

		if seen.insert(id.clone()) {
			ids.push(id);
		}
	}

	Ok(ids)
}

async fn post_search(client: &Client, cfg: &SearchBackend, body: &Value) -> Result<Vec<String>> {
	let url = format!("{}/{}/_search", cfg.url, cfg.index);
	let mut request = client.post(url).json(body);

	if let Some(api_key) = &cfg.api_key {
		request = request.header(AUTHORIZATION, format!("ApiKey {api_key}"));
	}

	let res = request.send().await?;

	if res.status() == StatusCode::BAD_REQUEST {
		let message = res.text().await.unwrap_or_default();

		return Err(Error::BadQuery { message });
	}

	let json: Value = res.error_for_status()?.json().await?;

	parse_hits(&json)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_body_targets_keyword_field() {
		let body = exact_match_body("gmap_location.keyword", "九份老街");

		assert_eq!(body["query"]["term"]["gmap_location.keyword"], "九份老街");
		assert_eq!(body["size"], 1);
	}

	#[test]
	fn fuzzy_body_carries_every_constraint() {
		let query = StructuredQuery {
			address: Some("台北市".to_string()),
			category: Some("博物館".to_string()),
			tags: vec!["適合兒童".to_string(), "Wi-Fi".to_string()],
			opening_hours: vec!["週二".to_string(), "下午".to_string()],
			entrance_fee: Some(200.0),
			..Default::default()
		};
		let body = fuzzy_body(&query, 20);
		let must = body["query"]["bool"]["must"].as_array().expect("must array");

		assert_eq!(must.len(), 4);
		assert_eq!(must[0]["match_phrase"]["address"]["query"], "台北市");
		assert_eq!(must[1]["match"]["class"]["boost"], 3.0);
		assert_eq!(must[2]["match"]["tags"]["query"], "適合兒童 Wi-Fi");
		assert_eq!(must[3]["match"]["opening_hours"]["query"], "週二 下午");
		assert_eq!(body["query"]["bool"]["filter"][0]["range"]["entrance_fee"]["lt"], 200.0);
		assert_eq!(body["size"], 20);
	}

	#[test]
	fn hits_are_deduplicated_in_order() {
		let json = serde_json::json!({
			"hits": { "hits": [
				{ "_source": { "location_id": 7 } },
				{ "_source": { "location_id": "3" } },
				{ "_source": { "location_id": "7" } },
				{ "_source": {} }
			] }
		});

		assert_eq!(parse_hits(&json).expect("parse failed"), vec!["7", "3"]);
	}
}
