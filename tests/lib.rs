//! Shared fixtures for the behavior tests: a scripted HTTP transport, a store
//! that cannot be written and a client wired to virtual time.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pantry_core::{
    ClientConfig, EpochMillis, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    KeyValueStore, ManualClock, MemoryStore, PantryClient, StorageKey, StoreError,
};
use serde_json::Value;

pub const BASE_URL: &str = "http://pantry.test/api";
pub const START: EpochMillis = EpochMillis::new(1_700_000_000_000);

type Reply = Result<HttpResponse, HttpError>;

/// Answers requests from per-route queues. The last reply of a route repeats;
/// unscripted routes answer 404.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON reply for `"GET /dashboard"` style routes.
    pub fn reply(&self, route: &str, status: u16, body: Value) -> &Self {
        self.push(route, Ok(HttpResponse::new(status, body.to_string())))
    }

    pub fn fail(&self, route: &str, message: &str) -> &Self {
        self.push(route, Err(HttpError::new(message)))
    }

    fn push(&self, route: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .expect("routes lock")
            .entry(route.to_owned())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| route_of(request) == route)
            .count()
    }

    pub fn last_body(&self, route: &str) -> Option<Value> {
        self.requests()
            .iter()
            .rev()
            .find(|request| route_of(request) == route)
            .and_then(|request| request.body.as_deref())
            .and_then(|body| serde_json::from_str(body).ok())
    }

    fn answer(&self, request: &HttpRequest) -> Reply {
        let route = route_of(request);
        let mut routes = self.routes.lock().expect("routes lock");
        match routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self.answer(&request);
            self.requests.lock().expect("requests lock").push(request);
            reply
        })
    }
}

fn not_found() -> Reply {
    Ok(HttpResponse::new(404, r#"{"message":"not found"}"#))
}

fn route_of(request: &HttpRequest) -> String {
    let path = request
        .url
        .strip_prefix(BASE_URL)
        .unwrap_or(request.url.as_str());
    let method = match request.method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
    };
    format!("{method} {path}")
}

/// Reads and removals reach `inner`; every write fails like a full disk.
pub struct FullDiskStore {
    inner: Arc<MemoryStore>,
}

impl FullDiskStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }
}

impl KeyValueStore for FullDiskStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("state.json"),
            source: io::Error::other("no space left on device"),
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}

/// Client over the scripted transport, an in-memory store and virtual time.
pub struct Harness {
    pub client: PantryClient,
    pub http: Arc<ScriptedHttpClient>,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(config, store.clone(), store)
    }

    /// The client writes through a [`FullDiskStore`]; `store` still holds
    /// whatever was seeded directly.
    pub fn with_full_disk() -> Self {
        let store = Arc::new(MemoryStore::new());
        let full_disk = Arc::new(FullDiskStore::new(store.clone()));
        Self::build(ClientConfig::default(), full_disk, store)
    }

    fn build(
        config: ClientConfig,
        client_store: Arc<dyn KeyValueStore>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let http = ScriptedHttpClient::new();
        let clock = ManualClock::new(START);
        let client = PantryClient::new(
            config.with_api_url(BASE_URL),
            http.clone(),
            client_store,
            Arc::new(clock.clone()),
        )
        .expect("valid client config");

        Self {
            client,
            http,
            store,
            clock,
        }
    }

    pub fn signed_in(self) -> Self {
        self.store
            .set(StorageKey::Token.as_str(), "token-abc")
            .expect("store token");
        self
    }
}
