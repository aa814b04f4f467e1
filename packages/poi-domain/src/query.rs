use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_GEO_DISTANCE: &str = "10km";

const NEARBY_ALIASES: [&str; 2] = ["附近", "nearest"];

/// Field-decomposed form of a free-text location request.
///
/// `gmap_location` and `address` are normally exclusive, but nothing here enforces it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StructuredQuery {
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "text")]
	pub gmap_location: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "text")]
	pub address: Option<String>,
	#[serde(
		rename = "class",
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "text"
	)]
	pub category: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "text_list")]
	pub tags: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "text_list")]
	pub opening_hours: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "fee_ceiling")]
	pub entrance_fee: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "text")]
	pub geo_distance: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "text_list")]
	pub semantic_keywords: Vec<String>,
}
impl StructuredQuery {
	pub fn normalize(mut self) -> Self {
		if let Some(distance) = self.geo_distance.as_deref()
			&& NEARBY_ALIASES.iter().any(|alias| distance.eq_ignore_ascii_case(alias))
		{
			self.geo_distance = Some(DEFAULT_GEO_DISTANCE.to_string());
		}

		self
	}

	pub fn has_semantic_keywords(&self) -> bool {
		!self.semantic_keywords.is_empty()
	}

	/// True when no field can be turned into a backend clause.
	pub fn is_unconstrained(&self) -> bool {
		self.gmap_location.is_none()
			&& self.address.is_none()
			&& self.category.is_none()
			&& self.tags.is_empty()
			&& self.opening_hours.is_empty()
			&& self.entrance_fee.is_none()
	}
}

fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;

	Ok(value.as_ref().and_then(scalar_text))
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;
	let items = match value {
		Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
		Some(other) => scalar_text(&other).into_iter().collect(),
		None => Vec::new(),
	};

	Ok(items)
}

fn fee_ceiling<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;
	let fee = match value {
		Some(Value::Number(number)) => number.as_f64(),
		Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
		_ => None,
	};

	Ok(fee.filter(|fee| fee.is_finite()))
}

fn scalar_text(value: &Value) -> Option<String> {
	let raw = match value {
		Value::String(raw) => raw.trim().to_string(),
		Value::Number(number) => number.to_string(),
		_ => return None,
	};

	if raw.is_empty() { None } else { Some(raw) }
}
