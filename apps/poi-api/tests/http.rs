use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use poi_api::{routes, state::AppState};
use poi_service::{Providers, ResolutionService};
use poi_testkit::{
	FakeCandidateStore, FakeEmbedding, FakeQueryParser, PipelineBehavior, ScriptedPipeline,
};

fn providers(candidates: FakeCandidateStore) -> Providers {
	Providers::new(
		Arc::new(FakeQueryParser::scripted()),
		Arc::new(candidates),
		Arc::new(FakeEmbedding::scripted()),
	)
}

fn app_with(candidates: FakeCandidateStore) -> Router {
	let service = ResolutionService::with_providers(
		poi_testkit::test_config(),
		Arc::new(poi_testkit::sample_corpus()),
		Arc::new(poi_testkit::sample_index().expect("Failed to build sample index.")),
		providers(candidates),
	);

	routes::router(AppState::from_service(service))
}

fn app() -> Router {
	app_with(FakeCandidateStore::scripted())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if body.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&body).expect("Failed to parse response.")
	};

	(status, json)
}

fn search_request(payload: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/search")
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

fn search_for(query: &str) -> Request<Body> {
	search_request(&serde_json::json!({ "query": query }).to_string())
}

fn result_request(query_id: &str) -> Request<Body> {
	Request::builder()
		.uri(format!("/faiss_result/{query_id}"))
		.body(Body::empty())
		.expect("Failed to build request.")
}

#[tokio::test]
async fn health_ok() {
	let request =
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let (status, _) = send(&app(), request).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn empty_query_is_a_bad_request() {
	let app = app();
	let (status, json) = send(&app, search_for("")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");

	let (status, _) = send(&app, search_request("{}")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, json) = send(&app, search_request("not json")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn coffee_query_returns_candidates_without_job() {
	let (status, json) = send(&app(), search_for(poi_testkit::COFFEE_QUERY)).await;

	assert_eq!(status, StatusCode::OK);
	assert!(json.get("query_id").is_none());
	assert_eq!(json["query_info"]["gmap_location"], "國父紀念館");
	assert_eq!(json["query_info"]["class"], "咖啡館");
	assert_eq!(json["query_info"]["geo_distance"], "10km");
	assert!(json["query_info"].get("semantic_keywords").is_none());
	assert_eq!(json["elasticsearch_results"][0]["gmap_location"], "國父紀念館");
	assert_eq!(json["elasticsearch_results"][0]["address"], "台北市信義區仁愛路四段505號");
}

#[tokio::test]
async fn weather_query_ranks_reviews_in_the_background() {
	let app = app();
	let (status, json) = send(&app, search_for(poi_testkit::WEATHER_QUERY)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["query_info"]["semantic_keywords"][0], "天氣");
	assert_eq!(json["elasticsearch_results"][0]["gmap_location"], "九份老街");

	let query_id = json["query_id"].as_str().expect("Missing query_id.").to_string();
	let (status, json) = send(&app, result_request(&query_id)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["query_id"], query_id.as_str());
	assert_eq!(json["status"], "done");

	let places = json["faiss_results"].as_array().expect("Missing faiss_results.");
	let total: f64 = places.iter().filter_map(|place| place["weight"].as_f64()).sum();

	assert!(!places.is_empty() && places.len() <= 10);
	assert!(places.iter().all(|place| {
		place["comments"].as_array().is_some_and(|comments| comments.len() <= 5)
	}));
	assert!(total <= 1.0 + 1e-9);
	assert_eq!(places[0]["gmap_location"], "九份老街");
}

#[tokio::test]
async fn zero_candidates_is_not_found() {
	let (status, json) =
		send(&app_with(FakeCandidateStore::default()), search_for(poi_testkit::COFFEE_QUERY)).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "no_results");
}

#[tokio::test]
async fn unparseable_query_is_a_bad_gateway() {
	let (status, json) = send(&app(), search_for("隨便")).await;

	assert_eq!(status, StatusCode::BAD_GATEWAY);
	assert_eq!(json["error_code"], "query_parse_failed");
}

#[tokio::test]
async fn unknown_job_is_not_found() {
	let (status, json) = send(&app(), result_request("1700000000")).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["query_id"], "1700000000");
	assert_eq!(json["status"], "not_found");
	assert!(json.get("faiss_results").is_none());
}

#[tokio::test]
async fn failed_job_reports_failed_status() {
	let service = ResolutionService::with_pipeline(
		poi_testkit::test_config(),
		Arc::new(poi_testkit::sample_corpus()),
		providers(FakeCandidateStore::scripted()),
		ScriptedPipeline::new(PipelineBehavior::Fail),
	);
	let app = routes::router(AppState::from_service(service));
	let (_, json) = send(&app, search_for(poi_testkit::WEATHER_QUERY)).await;
	let query_id = json["query_id"].as_str().expect("Missing query_id.").to_string();
	let (status, json) = send(&app, result_request(&query_id)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["status"], "failed");
	assert_eq!(json["faiss_results"], serde_json::json!([]));
}
