use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type PlaceId = String;
pub type ReviewId = String;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlaceInfo {
	#[serde(deserialize_with = "id_string")]
	pub location_id: PlaceId,
	#[serde(default)]
	pub gmap_location: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub summary_2: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Review {
	pub review_id: ReviewId,
	pub location_id: PlaceId,
	pub comments: String,
	#[serde(default)]
	pub language: Option<String>,
}

/// One ranked place from a semantic pass.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlaceResult {
	pub location_id: PlaceId,
	pub gmap_location: String,
	pub address: String,
	pub summary_2: String,
	pub comments: Vec<String>,
	pub weight: f64,
}

/// Renders a JSON string or integer id as text; ids arrive in both shapes.
pub fn id_text(value: &Value) -> Option<String> {
	match value {
		Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;

	id_text(&value).ok_or_else(|| serde::de::Error::custom("location_id must be a string or number"))
}
