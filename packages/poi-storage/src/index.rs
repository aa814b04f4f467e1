use std::{fs, path::Path};

use poi_domain::{Neighbor, ranking::INVALID_POSITION};

use crate::{Error, Result};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Exact squared-L2 index over review vectors.
///
/// Row `i` of the vector table belongs to `review_ids[i]`. Searches asking for more neighbors
/// than there are rows pad the tail with [`INVALID_POSITION`].
#[derive(Debug)]
pub struct FlatIndex {
	dimensions: usize,
	vectors: Vec<f32>,
	review_ids: Vec<String>,
}
impl FlatIndex {
	pub fn new(dimensions: usize, vectors: Vec<f32>, review_ids: Vec<String>) -> Result<Self> {
		if dimensions == 0 {
			return Err(Error::InvalidIndex("dimensions must be greater than zero.".to_string()));
		}
		if vectors.len() != dimensions * review_ids.len() {
			return Err(Error::InvalidIndex(format!(
				"{} values do not form {} rows of {dimensions} dimensions.",
				vectors.len(),
				review_ids.len()
			)));
		}

		Ok(Self { dimensions, vectors, review_ids })
	}

	pub fn load(vectors_path: &Path, review_ids_path: &Path, dimensions: usize) -> Result<Self> {
		let bytes = fs::read(vectors_path)
			.map_err(|err| Error::Io { path: vectors_path.to_path_buf(), source: err })?;

		if bytes.len() % F32_BYTES != 0 {
			return Err(Error::InvalidIndex(format!(
				"{} is not a whole number of f32 values.",
				vectors_path.display()
			)));
		}

		let vectors = bytes
			.chunks_exact(F32_BYTES)
			.map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
			.collect();
		let raw_ids = fs::read_to_string(review_ids_path)
			.map_err(|err| Error::Io { path: review_ids_path.to_path_buf(), source: err })?;
		let review_ids: Vec<String> = serde_json::from_str(&raw_ids)
			.map_err(|err| Error::Json { path: review_ids_path.to_path_buf(), source: err })?;
		let index = Self::new(dimensions, vectors, review_ids)?;

		tracing::info!(rows = index.len(), dimensions, "Flat index loaded.");

		Ok(index)
	}

	pub fn write(&self, vectors_path: &Path, review_ids_path: &Path) -> Result<()> {
		let mut bytes = Vec::with_capacity(self.vectors.len() * F32_BYTES);

		for value in &self.vectors {
			bytes.extend_from_slice(&value.to_le_bytes());
		}

		fs::write(vectors_path, bytes)
			.map_err(|err| Error::Io { path: vectors_path.to_path_buf(), source: err })?;

		let ids = serde_json::to_vec(&self.review_ids)
			.map_err(|err| Error::Json { path: review_ids_path.to_path_buf(), source: err })?;

		fs::write(review_ids_path, ids)
			.map_err(|err| Error::Io { path: review_ids_path.to_path_buf(), source: err })
	}

	pub fn dimensions(&self) -> usize {
		self.dimensions
	}

	pub fn len(&self) -> usize {
		self.review_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.review_ids.is_empty()
	}

	pub fn review_ids(&self) -> &[String] {
		&self.review_ids
	}

	/// Returns exactly `k` neighbors ordered by ascending distance.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
		if query.len() != self.dimensions {
			return Err(Error::InvalidIndex(format!(
				"query has {} dimensions, index has {}.",
				query.len(),
				self.dimensions
			)));
		}
		if k == 0 {
			return Ok(Vec::new());
		}

		let mut scored: Vec<(usize, f32)> = self
			.vectors
			.chunks_exact(self.dimensions)
			.map(|row| squared_l2(query, row))
			.enumerate()
			.collect();
		let by_distance =
			|a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

		if k < scored.len() {
			scored.select_nth_unstable_by(k - 1, by_distance);
			scored.truncate(k);
		}

		scored.sort_by(by_distance);

		let mut neighbors: Vec<Neighbor> = scored
			.into_iter()
			.map(|(position, distance)| Neighbor { position: position as i64, distance })
			.collect();

		neighbors.resize(k, Neighbor { position: INVALID_POSITION, distance: f32::MAX });

		Ok(neighbors)
	}
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
