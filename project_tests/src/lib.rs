//! In-process stand-in for the upstream games, votes and thumbnails endpoints,
//! plus a relay route, used by the integration tests.
//!
//! By default every endpoint answers from a fixed catalog. Tests can queue
//! scripted responses per endpoint or make every batch containing a given id
//! fail with `503`. All requests are recorded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{self, HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use lib_common::configs::{AggregationPolicy, PipelineConfig};

/// Upstream endpoint served by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /v1/games`
    Games,
    /// `GET /v1/games/votes`
    Votes,
    /// `GET /v1/games/multiget/thumbnails`
    Thumbnails,
}

/// One game known to the mock.
#[derive(Debug, Clone)]
pub struct FakeGame {
    pub id: u64,
    pub root_place_id: u64,
    pub name: String,
    pub playing: u64,
    pub visits: u64,
    pub up_votes: u64,
    pub down_votes: u64,
    pub icon: Option<String>,
}

impl FakeGame {
    pub fn new(id: u64, playing: u64, visits: u64, up_votes: u64, down_votes: u64) -> Self {
        Self {
            id,
            root_place_id: id * 10,
            name: format!("Game {id}"),
            playing,
            visits,
            up_votes,
            down_votes,
            icon: Some(format!("https://img.example/{id}.png")),
        }
    }
}

/// Canned response consumed by the next request to an endpoint.
#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<String>,
    pub delay: Duration,
}

impl Scripted {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({"errors": [{"code": 0, "message": "scripted"}]}).to_string(),
            retry_after: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_retry_after(mut self, value: &str) -> Self {
        self.retry_after = Some(value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Request seen by the mock.
#[derive(Debug, Clone)]
pub struct Hit {
    pub endpoint: Endpoint,
    pub ids: Vec<u64>,
    pub origin: Option<String>,
    pub via_relay: bool,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    catalog: HashMap<u64, FakeGame>,
    scripts: Mutex<HashMap<Endpoint, VecDeque<Scripted>>>,
    failing: Mutex<HashMap<Endpoint, HashSet<u64>>>,
    hits: Mutex<Vec<Hit>>,
}

/// Running mock server; stopped on drop.
pub struct MockRoblox {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockRoblox {
    pub async fn start(games: Vec<FakeGame>) -> Self {
        let state = Arc::new(MockState {
            catalog: games.into_iter().map(|g| (g.id, g)).collect(),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/v1/games", get(games_handler))
            .route("/v1/games/votes", get(votes_handler))
            .route("/v1/games/multiget/thumbnails", get(thumbnails_handler))
            .route("/relay", get(relay_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock listener address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Prefix to use as relay URL.
    pub fn relay_prefix(&self) -> String {
        format!("http://{}/relay?url=", self.addr)
    }

    pub fn script(&self, endpoint: Endpoint, response: Scripted) {
        self.state
            .scripts
            .lock()
            .expect("scripts lock")
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }

    /// Every request to `endpoint` whose batch contains `id` gets a `503`.
    pub fn fail_batches_containing(&self, endpoint: Endpoint, id: u64) {
        self.state
            .failing
            .lock()
            .expect("failing lock")
            .entry(endpoint)
            .or_default()
            .insert(id);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().expect("hits lock").clone()
    }

    pub fn hit_count(&self, endpoint: Endpoint) -> usize {
        self.hits().iter().filter(|h| h.endpoint == endpoint).count()
    }

    /// A configuration pointed at this server with tight retry timings.
    pub fn config(&self, ids: Vec<u64>, batch_size: usize, output: &Path) -> PipelineConfig {
        PipelineConfig {
            universe_ids: ids,
            batch_size,
            request_timeout_ms: 2_000,
            max_attempts: 3,
            backoff_initial_ms: 1,
            backoff_cap_ms: 5,
            inter_batch_pause_ms: 0,
            relay_url: None,
            games_api_base: self.base_url(),
            thumbnails_api_base: self.base_url(),
            output_path: output.to_path_buf(),
            aggregation: AggregationPolicy::DropMissing,
            ..PipelineConfig::default()
        }
    }
}

impl Drop for MockRoblox {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn parse_ids(query: &HashMap<String, String>) -> Vec<u64> {
    query
        .get("universeIds")
        .map(|raw| raw.split(',').filter_map(|id| id.trim().parse().ok()).collect())
        .unwrap_or_default()
}

fn origin_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn json_response(status: u16, body: String, retry_after: Option<&str>) -> Response {
    let mut builder = http::Response::builder()
        .status(StatusCode::from_u16(status).expect("valid status"))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = retry_after {
        builder = builder.header(header::RETRY_AFTER, value);
    }
    builder.body(Body::from(body)).expect("mock response")
}

fn catalog_body(state: &MockState, endpoint: Endpoint, ids: &[u64]) -> String {
    let known = ids.iter().filter_map(|id| state.catalog.get(id));
    let data: Vec<serde_json::Value> = match endpoint {
        Endpoint::Games => known
            .map(|g| {
                json!({
                    "id": g.id,
                    "rootPlaceId": g.root_place_id,
                    "name": g.name,
                    "playing": g.playing,
                    "visits": g.visits,
                })
            })
            .collect(),
        Endpoint::Votes => known
            .map(|g| json!({"id": g.id, "upVotes": g.up_votes, "downVotes": g.down_votes}))
            .collect(),
        Endpoint::Thumbnails => known
            .map(|g| {
                json!({
                    "universeId": g.id,
                    "error": null,
                    "thumbnails": [{
                        "targetId": g.id,
                        "state": if g.icon.is_some() { "Completed" } else { "Blocked" },
                        "imageUrl": g.icon,
                    }],
                })
            })
            .collect(),
    };
    json!({ "data": data }).to_string()
}

async fn dispatch(
    state: Arc<MockState>,
    endpoint: Endpoint,
    ids: Vec<u64>,
    origin: Option<String>,
    via_relay: bool,
) -> Response {
    state.hits.lock().expect("hits lock").push(Hit {
        endpoint,
        ids: ids.clone(),
        origin,
        via_relay,
        at: Instant::now(),
    });

    let scripted = state
        .scripts
        .lock()
        .expect("scripts lock")
        .get_mut(&endpoint)
        .and_then(VecDeque::pop_front);
    if let Some(scripted) = scripted {
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        let retry_after = scripted.retry_after.as_deref();
        return json_response(scripted.status, scripted.body, retry_after);
    }

    let failing = state
        .failing
        .lock()
        .expect("failing lock")
        .get(&endpoint)
        .is_some_and(|failing| ids.iter().any(|id| failing.contains(id)));
    if failing {
        return json_response(503, "{\"errors\":[]}".to_string(), None);
    }

    json_response(200, catalog_body(&state, endpoint, &ids), None)
}

async fn games_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let ids = parse_ids(&query);
    dispatch(state, Endpoint::Games, ids, origin_of(&headers), false).await
}

async fn votes_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let ids = parse_ids(&query);
    dispatch(state, Endpoint::Votes, ids, origin_of(&headers), false).await
}

async fn thumbnails_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let ids = parse_ids(&query);
    dispatch(state, Endpoint::Thumbnails, ids, origin_of(&headers), false).await
}

/// `/relay?url=<percent-encoded target>`: decodes the target and serves it as
/// if it had been requested directly.
async fn relay_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(target) = query.get("url").and_then(|raw| url::Url::parse(raw).ok()) else {
        return json_response(400, "{\"error\":\"missing url\"}".to_string(), None);
    };

    let endpoint = match target.path() {
        "/v1/games" => Endpoint::Games,
        "/v1/games/votes" => Endpoint::Votes,
        "/v1/games/multiget/thumbnails" => Endpoint::Thumbnails,
        _ => return json_response(404, "{}".to_string(), None),
    };
    let inner: HashMap<String, String> = target.query_pairs().into_owned().collect();

    dispatch(state, endpoint, parse_ids(&inner), origin_of(&headers), true).await
}
