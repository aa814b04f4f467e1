use std::{
	collections::{HashMap, HashSet},
	fs,
	path::Path,
};

use poi_domain::{PlaceId, PlaceInfo, Review};

use crate::{Error, Result};

/// Location metadata and reviews, loaded once and read-only afterwards.
#[derive(Debug, Default)]
pub struct ReviewCorpus {
	places: HashMap<PlaceId, PlaceInfo>,
	reviews: Vec<Review>,
}
impl ReviewCorpus {
	pub fn new(places: impl IntoIterator<Item = PlaceInfo>, reviews: Vec<Review>) -> Self {
		let places = places.into_iter().map(|place| (place.location_id.clone(), place)).collect();

		Self { places, reviews }
	}

	pub fn load(locations_path: &Path, reviews_path: &Path) -> Result<Self> {
		let places = load_locations(locations_path)?;
		let reviews = load_reviews(reviews_path)?;
		let corpus = Self::new(places, reviews);

		tracing::info!(
			places = corpus.places.len(),
			reviews = corpus.reviews.len(),
			"Review corpus loaded."
		);

		Ok(corpus)
	}

	pub fn place(&self, location_id: &str) -> Option<&PlaceInfo> {
		self.places.get(location_id)
	}

	pub fn reviews(&self) -> &[Review] {
		&self.reviews
	}

	pub fn place_count(&self) -> usize {
		self.places.len()
	}

	/// Reviews belonging to any of `candidates`, in corpus order.
	pub fn reviews_for(&self, candidates: &HashSet<&str>) -> Vec<&Review> {
		if candidates.is_empty() {
			return Vec::new();
		}

		self.reviews
			.iter()
			.filter(|review| candidates.contains(review.location_id.as_str()))
			.collect()
	}
}

pub fn load_locations(path: &Path) -> Result<Vec<PlaceInfo>> {
	let raw =
		fs::read_to_string(path).map_err(|err| Error::Io { path: path.to_path_buf(), source: err })?;

	serde_json::from_str(&raw).map_err(|err| Error::Json { path: path.to_path_buf(), source: err })
}

pub fn load_reviews(path: &Path) -> Result<Vec<Review>> {
	let mut reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.trim(csv::Trim::Headers)
		.from_path(path)
		.map_err(|err| Error::Csv { path: path.to_path_buf(), source: err })?;
	let mut reviews = Vec::new();
	let mut skipped = 0_usize;

	for record in reader.deserialize::<Review>() {
		let review = record.map_err(|err| Error::Csv { path: path.to_path_buf(), source: err })?;

		if review.review_id.trim().is_empty() || review.location_id.trim().is_empty() {
			skipped += 1;

			continue;
		}

		reviews.push(review);
	}

	if skipped > 0 {
		tracing::warn!(path = %path.display(), skipped, "Skipped reviews without identifiers.");
	}

	Ok(reviews)
}
