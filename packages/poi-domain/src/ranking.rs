use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use crate::place::{PlaceInfo, PlaceResult, Review};

/// Sentinel position reported by the neighbor index for unfilled result slots.
pub const INVALID_POSITION: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankingPolicy {
	pub temperature: f64,
	pub max_neighbors: usize,
	pub max_places: usize,
	pub max_comments: usize,
}
impl RankingPolicy {
	/// Output caps never exceed [`poi_config::MAX_PLACES`] and [`poi_config::MAX_COMMENTS`].
	pub fn from_config(cfg: &poi_config::Ranking) -> Self {
		Self {
			temperature: cfg.temperature,
			max_neighbors: cfg.max_neighbors as usize,
			max_places: cfg.max_places.min(poi_config::MAX_PLACES) as usize,
			max_comments: cfg.max_comments.min(poi_config::MAX_COMMENTS) as usize,
		}
	}

	pub fn neighbor_count(&self, filtered_reviews: usize) -> usize {
		self.max_neighbors.min(filtered_reviews)
	}
}
impl Default for RankingPolicy {
	fn default() -> Self {
		Self { temperature: 5.0, max_neighbors: 300, max_places: 10, max_comments: 5 }
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
	pub position: i64,
	pub distance: f32,
}
impl Neighbor {
	pub fn is_valid(&self) -> bool {
		self.position >= 0
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReviewMatch<'a> {
	pub review_id: &'a str,
	pub place_id: &'a str,
	pub comment: &'a str,
	pub distance: f32,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AlignmentError {
	#[error("Neighbor position {position} is outside the review id table of {table_len} entries.")]
	PositionOutOfRange { position: i64, table_len: usize },
}

struct PlaceGroup<'a> {
	info: &'a PlaceInfo,
	weight: f64,
	comments: Vec<&'a str>,
}

/// Inverse-distance transform; 1.0 at distance zero, approaching 0.0 as distance grows.
pub fn similarity(distance: f32) -> f64 {
	let distance = if distance.is_nan() { f64::INFINITY } else { f64::from(distance).max(0.0) };

	1.0 / (1.0 + distance)
}

/// Temperature-scaled softmax over `scores`. The output sums to 1.0 unless `scores` is empty.
pub fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
	let Some(max) = scores.iter().copied().reduce(f64::max) else {
		return Vec::new();
	};
	let exps: Vec<f64> = scores.iter().map(|score| ((score - max) * temperature).exp()).collect();
	let total: f64 = exps.iter().sum();

	exps.into_iter().map(|value| value / total).collect()
}

/// Joins neighbor hits back to the candidate-filtered reviews.
///
/// The output follows `filtered` order. Each match carries the distance reported for its own
/// position, so a neighbor outside the filter never shifts another review's score.
pub fn match_reviews<'a>(
	filtered: &[&'a Review],
	neighbors: &[Neighbor],
	review_ids: &[String],
) -> Result<Vec<ReviewMatch<'a>>, AlignmentError> {
	let mut distances: HashMap<&str, f32> = HashMap::with_capacity(neighbors.len());

	for neighbor in neighbors.iter().filter(|neighbor| neighbor.is_valid()) {
		let review_id = usize::try_from(neighbor.position)
			.ok()
			.and_then(|position| review_ids.get(position))
			.ok_or(AlignmentError::PositionOutOfRange {
				position: neighbor.position,
				table_len: review_ids.len(),
			})?;

		distances.entry(review_id.as_str()).or_insert(neighbor.distance);
	}

	let mut seen = HashSet::new();
	let matches = filtered
		.iter()
		.filter_map(|&review| {
			let distance = *distances.get(review.review_id.as_str())?;

			seen.insert(review.review_id.as_str()).then_some(ReviewMatch {
				review_id: &review.review_id,
				place_id: &review.location_id,
				comment: &review.comments,
				distance,
			})
		})
		.collect();

	Ok(matches)
}

/// Aggregates review matches into at most `policy.max_places` places.
///
/// Review weights are a softmax over every match in `matches`. A match whose place has no
/// metadata still contributes to the denominator but to no place, so place weights sum to at
/// most 1.0.
pub fn rank_places<'a, F>(
	matches: &[ReviewMatch<'a>],
	place_info: F,
	policy: &RankingPolicy,
) -> Vec<PlaceResult>
where
	F: Fn(&str) -> Option<&'a PlaceInfo>,
{
	let similarities: Vec<f64> = matches.iter().map(|m| similarity(m.distance)).collect();
	let weights = softmax(&similarities, policy.temperature);
	let mut slots: HashMap<&str, usize> = HashMap::new();
	let mut groups: Vec<PlaceGroup<'a>> = Vec::new();

	for (review, weight) in matches.iter().zip(weights) {
		let slot = match slots.get(review.place_id) {
			Some(slot) => *slot,
			None => {
				let Some(info) = place_info(review.place_id) else {
					continue;
				};

				groups.push(PlaceGroup { info, weight: 0.0, comments: Vec::new() });
				slots.insert(review.place_id, groups.len() - 1);

				groups.len() - 1
			},
		};
		let group = &mut groups[slot];

		group.weight += weight;

		if group.comments.len() < policy.max_comments {
			group.comments.push(review.comment);
		}
	}

	// Stable sort keeps first-appearance order for equal weights.
	groups.sort_by(|a, b| cmp_f64_desc(a.weight, b.weight));
	groups.truncate(policy.max_places);

	groups
		.into_iter()
		.map(|group| PlaceResult {
			location_id: group.info.location_id.clone(),
			gmap_location: group.info.gmap_location.clone(),
			address: group.info.address.clone(),
			summary_2: group.info.summary_2.clone(),
			comments: group.comments.into_iter().map(str::to_string).collect(),
			weight: group.weight,
		})
		.collect()
}

pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	b.total_cmp(&a)
}
