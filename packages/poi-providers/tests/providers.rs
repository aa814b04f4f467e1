use std::{
	future::IntoFuture,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use poi_config::{LlmProviderConfig, SearchBackend};
use poi_domain::StructuredQuery;
use poi_providers::{Error, query_parser, search_backend};

#[derive(Clone, Copy)]
enum BackendMode {
	ExactHit,
	ExactMiss,
	Rejecting,
	Failing,
}

struct BackendStub {
	mode: BackendMode,
	calls: AtomicUsize,
	last_auth: Mutex<Option<String>>,
}
impl BackendStub {
	fn new(mode: BackendMode) -> Arc<Self> {
		Arc::new(Self { mode, calls: AtomicUsize::new(0), last_auth: Mutex::new(None) })
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

async fn serve(app: Router) -> (String, Sender<()>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind stub server.");
	let addr = listener.local_addr().expect("Failed to read stub server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

async fn search_handler(
	State(stub): State<Arc<BackendStub>>,
	headers: HeaderMap,
	Json(body): Json<Value>,
) -> impl IntoResponse {
	stub.calls.fetch_add(1, Ordering::SeqCst);

	if let Some(value) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
		&& let Ok(mut last_auth) = stub.last_auth.lock()
	{
		*last_auth = Some(value.to_string());
	}

	let is_exact = body["query"].get("term").is_some();

	match stub.mode {
		BackendMode::Rejecting =>
			(StatusCode::BAD_REQUEST, "parsing_exception").into_response(),
		BackendMode::Failing => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
		BackendMode::ExactHit if is_exact => hits(&[serde_json::json!(42)]),
		BackendMode::ExactMiss if is_exact => hits(&[]),
		_ => hits(&[serde_json::json!("5"), serde_json::json!(6), serde_json::json!("5")]),
	}
}

fn hits(ids: &[Value]) -> axum::response::Response {
	let hits: Vec<Value> =
		ids.iter().map(|id| serde_json::json!({ "_source": { "location_id": id } })).collect();

	(StatusCode::OK, Json(serde_json::json!({ "hits": { "hits": hits } }))).into_response()
}

async fn start_backend(mode: BackendMode) -> (Arc<BackendStub>, SearchBackend, Sender<()>) {
	let stub = BackendStub::new(mode);
	let app = Router::new()
		.route("/poi_data/_search", routing::post(search_handler))
		.with_state(stub.clone());
	let (url, shutdown) = serve(app).await;
	let cfg = SearchBackend {
		url,
		index: "poi_data".to_string(),
		exact_field: "gmap_location.keyword".to_string(),
		max_candidates: 20,
		timeout_ms: 5_000,
		api_key: Some("secret".to_string()),
	};

	(stub, cfg, shutdown)
}

fn named_query() -> StructuredQuery {
	StructuredQuery {
		gmap_location: Some("九份老街".to_string()),
		semantic_keywords: vec!["天氣".to_string()],
		..Default::default()
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		poi_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_header() {
	let mut default_headers = Map::new();

	default_headers.insert("x-team".to_string(), serde_json::json!(7));

	assert!(matches!(
		poi_providers::auth_headers("secret", &default_headers),
		Err(Error::InvalidConfig { .. })
	));
}

#[tokio::test]
async fn exact_match_short_circuits_fuzzy_search() {
	let (stub, cfg, shutdown) = start_backend(BackendMode::ExactHit).await;
	let ids = search_backend::search_candidates(&cfg, &named_query())
		.await
		.expect("Candidate search failed.");

	assert_eq!(ids, vec!["42"]);
	assert_eq!(stub.count(), 1);
	assert_eq!(
		stub.last_auth.lock().expect("Failed to lock auth header.").as_deref(),
		Some("ApiKey secret")
	);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn exact_miss_falls_back_to_fuzzy_search() {
	let (stub, cfg, shutdown) = start_backend(BackendMode::ExactMiss).await;
	let ids = search_backend::search_candidates(&cfg, &named_query())
		.await
		.expect("Candidate search failed.");

	assert_eq!(ids, vec!["5", "6"]);
	assert_eq!(stub.count(), 2);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn unnamed_query_skips_exact_lookup() {
	let (stub, cfg, shutdown) = start_backend(BackendMode::ExactHit).await;
	let query = StructuredQuery { address: Some("台北市".to_string()), ..Default::default() };
	let ids =
		search_backend::search_candidates(&cfg, &query).await.expect("Candidate search failed.");

	assert_eq!(ids, vec!["5", "6"]);
	assert_eq!(stub.count(), 1);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn rejected_query_yields_no_candidates() {
	let (stub, cfg, shutdown) = start_backend(BackendMode::Rejecting).await;
	let ids = search_backend::search_candidates(&cfg, &named_query())
		.await
		.expect("Rejected query must not be an error.");

	assert!(ids.is_empty());
	assert_eq!(stub.count(), 2);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn backend_failure_is_an_error() {
	let (_stub, cfg, shutdown) = start_backend(BackendMode::Failing).await;
	let result = search_backend::search_candidates(&cfg, &named_query()).await;

	assert!(matches!(result, Err(Error::Reqwest(_))));

	let _ = shutdown.send(());
}

async fn chat_handler(State(calls): State<Arc<AtomicUsize>>) -> impl IntoResponse {
	let content = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
		"I think you are asking about Jiufen."
	} else {
		"```json\n{\"gmap_location\": \"九份老街\", \"semantic_keywords\": [\"天氣\"]}\n```"
	};

	Json(serde_json::json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
}

fn parser_config(api_base: String, max_attempts: u32) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "stub".to_string(),
		api_base,
		api_key: "parser-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "query-parser".to_string(),
		temperature: 0.0,
		timeout_ms: 5_000,
		max_attempts,
		default_headers: Map::new(),
	}
}

#[tokio::test]
async fn parser_retries_until_reply_decodes() {
	let calls = Arc::new(AtomicUsize::new(0));
	let app = Router::new()
		.route("/v1/chat/completions", routing::post(chat_handler))
		.with_state(calls.clone());
	let (api_base, shutdown) = serve(app).await;
	let query = query_parser::parse(&parser_config(api_base, 3), "九份老街的天氣如何")
		.await
		.expect("Query parse failed.");

	assert_eq!(query, named_query());
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn parser_gives_up_after_max_attempts() {
	let calls = Arc::new(AtomicUsize::new(0));
	let app = Router::new()
		.route("/v1/chat/completions", routing::post(chat_handler))
		.with_state(calls.clone());
	let (api_base, shutdown) = serve(app).await;
	let result = query_parser::parse(&parser_config(api_base, 1), "九份老街的天氣如何").await;

	assert!(matches!(result, Err(Error::InvalidResponse { .. })));
	assert_eq!(calls.load(Ordering::SeqCst), 1);

	let _ = shutdown.send(());
}
