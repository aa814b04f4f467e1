use std::{
	collections::HashSet,
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

use poi_domain::ranking::INVALID_POSITION;
use poi_storage::{Error, FlatIndex, ReviewCorpus};

fn temp_path(label: &str, extension: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();

	env::temp_dir().join(format!("poi_storage_test_{label}_{pid}_{ordinal}.{extension}"))
}

fn write_corpus_files() -> (PathBuf, PathBuf) {
	let locations = temp_path("locations", "json");
	let reviews = temp_path("reviews", "csv");

	fs::write(
		&locations,
		serde_json::json!([
			{ "location_id": 101, "gmap_location": "九份老街", "address": "新北市瑞芳區", "summary_2": "山城老街" },
			{ "location_id": "102", "gmap_location": "國父紀念館", "address": "台北市信義區" },
			{ "location_id": 103, "address": "基隆市中正區" }
		])
		.to_string(),
	)
	.expect("Failed to write locations.");
	fs::write(
		&reviews,
		"review_id,location_id,comments,language\n\
		 r1,101,常常下雨,zh\n\
		 r2,102,很大的廣場,zh\n\
		 ,101,missing id,en\n\
		 r3,101,\"霧很大, 看不到海\",zh\n",
	)
	.expect("Failed to write reviews.");

	(locations, reviews)
}

#[test]
fn loads_corpus_and_filters_in_corpus_order() {
	let (locations, reviews) = write_corpus_files();
	let corpus = ReviewCorpus::load(&locations, &reviews).expect("Failed to load corpus.");

	fs::remove_file(&locations).expect("Failed to remove locations.");
	fs::remove_file(&reviews).expect("Failed to remove reviews.");

	assert_eq!(corpus.place_count(), 3);
	assert_eq!(corpus.reviews().len(), 3);
	assert_eq!(corpus.place("101").map(|place| place.gmap_location.as_str()), Some("九份老街"));
	assert_eq!(corpus.place("102").map(|place| place.summary_2.as_str()), Some(""));
	assert_eq!(corpus.place("103").map(|place| place.gmap_location.as_str()), Some(""));

	let candidates: HashSet<&str> = ["101"].into_iter().collect();
	let filtered: Vec<&str> =
		corpus.reviews_for(&candidates).iter().map(|review| review.review_id.as_str()).collect();

	assert_eq!(filtered, vec!["r1", "r3"]);
	assert!(corpus.reviews_for(&HashSet::new()).is_empty());
}

#[test]
fn missing_locations_file_is_reported() {
	let err = ReviewCorpus::load(&temp_path("absent", "json"), &temp_path("absent", "csv"))
		.expect_err("Expected missing file error.");

	assert!(matches!(err, Error::Io { .. }));
}

fn sample_index() -> FlatIndex {
	let vectors = vec![
		0.0, 0.0, //
		1.0, 0.0, //
		0.0, 3.0, //
		0.5, 0.5,
	];
	let ids = ["r1", "r2", "r3", "r4"].iter().map(|id| id.to_string()).collect();

	FlatIndex::new(2, vectors, ids).expect("Failed to build index.")
}

#[test]
fn search_orders_by_squared_distance() {
	let index = sample_index();
	let neighbors = index.search(&[1.0, 0.0], 3).expect("Search failed.");
	let positions: Vec<i64> = neighbors.iter().map(|neighbor| neighbor.position).collect();

	assert_eq!(positions, vec![1, 3, 0]);
	assert_eq!(neighbors[0].distance, 0.0);
	assert_eq!(neighbors[1].distance, 0.5);
	assert_eq!(neighbors[2].distance, 1.0);
}

#[test]
fn search_pads_with_invalid_positions() {
	let index = sample_index();
	let neighbors = index.search(&[0.0, 0.0], 6).expect("Search failed.");

	assert_eq!(neighbors.len(), 6);
	assert!(neighbors[..4].iter().all(|neighbor| neighbor.is_valid()));
	assert!(neighbors[4..].iter().all(|neighbor| neighbor.position == INVALID_POSITION));
}

#[test]
fn search_rejects_dimension_mismatch() {
	let err = sample_index().search(&[1.0, 0.0, 0.0], 2).expect_err("Expected mismatch.");

	assert!(matches!(err, Error::InvalidIndex(_)));
}

#[test]
fn rejects_ragged_vector_table() {
	let err = FlatIndex::new(3, vec![0.0; 5], vec!["r1".to_string(), "r2".to_string()])
		.expect_err("Expected ragged table error.");

	assert!(matches!(err, Error::InvalidIndex(_)));
}

#[test]
fn written_index_loads_back() {
	let index = sample_index();
	let vectors = temp_path("vectors", "f32");
	let ids = temp_path("ids", "json");

	index.write(&vectors, &ids).expect("Failed to write index.");

	let loaded = FlatIndex::load(&vectors, &ids, 2).expect("Failed to load index.");

	fs::remove_file(&vectors).expect("Failed to remove vectors.");
	fs::remove_file(&ids).expect("Failed to remove ids.");

	assert_eq!(loaded.len(), 4);
	assert_eq!(loaded.review_ids(), index.review_ids());
	assert_eq!(
		loaded.search(&[0.0, 3.0], 1).expect("Search failed.")[0].position,
		2,
		"Row order must survive a write and load."
	);
}
