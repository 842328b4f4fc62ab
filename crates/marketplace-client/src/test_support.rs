//! In-process marketplace server for tests
//!
//! Binds `127.0.0.1:0` and serves the endpoints the client consumes. The
//! server accepts exactly one access token at a time (`state.access`) and
//! one refresh token (`state.refresh`); a successful refresh rotates both to
//! `state.next_pair`. Every protected hit records its Authorization header
//! and request id so tests can assert on what was sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use marketplace_auth::{CredentialPair, MemoryStore};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::client::{AuthenticatedClient, ClientOptions, REQUEST_ID_HEADER};

pub(crate) struct MockState {
    pub access: Mutex<String>,
    pub refresh: Mutex<String>,
    pub next_pair: Mutex<(String, String)>,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    /// Refresh endpoint answers 401 regardless of the token
    pub refresh_fails: AtomicBool,
    /// Protected endpoints answer 401 regardless of the token
    pub reject_all: AtomicBool,
    pub seen_auth: Mutex<Vec<Option<String>>>,
    pub seen_request_ids: Mutex<Vec<String>>,
    pub seen_fields: Mutex<Vec<String>>,
    pub seen_queries: Mutex<Vec<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            access: Mutex::new("at1".into()),
            refresh: Mutex::new("rt1".into()),
            next_pair: Mutex::new(("at2".into(), "rt2".into())),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            reject_all: AtomicBool::new(false),
            seen_auth: Mutex::new(Vec::new()),
            seen_request_ids: Mutex::new(Vec::new()),
            seen_fields: Mutex::new(Vec::new()),
            seen_queries: Mutex::new(Vec::new()),
        }
    }
}

pub(crate) struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh-token", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/signup", post(signup))
            .route("/api/auth/verify-otp", post(verify_otp))
            .route("/api/auth/resend-verification-otp", post(acknowledge))
            .route("/api/auth/forgot-password", post(acknowledge))
            .route("/api/user/profile", get(own_profile).put(update_profile))
            .route("/api/user/profile/{id}", get(other_profile))
            .route("/api/products", get(list_products).post(create_product))
            .route("/api/products/search", get(search_products))
            .route(
                "/api/products/{id}",
                get(get_product).put(update_product).delete(delete_product),
            )
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

/// Client against `server` with an optional stored `(access, refresh)` pair.
pub(crate) async fn client_for(
    server: &MockServer,
    tokens: Option<(&str, &str)>,
) -> (AuthenticatedClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client =
        AuthenticatedClient::new(ClientOptions::new(&server.base_url), store.clone()).unwrap();
    if let Some((access, refresh)) = tokens {
        client
            .credentials()
            .store(&CredentialPair::new(access, refresh))
            .await
            .unwrap();
    }
    (client, store)
}

fn user_json(id: &str, first: &str, last: &str) -> Value {
    json!({
        "id": id,
        "email": "a@b.com",
        "firstName": first,
        "lastName": last,
        "isEmailVerified": true
    })
}

fn product_json(id: &str, title: &str, images: usize) -> Value {
    let images: Vec<Value> = (0..images)
        .map(|i| json!({ "url": format!("https://img.test/{id}/{i}.jpg") }))
        .collect();
    json!({
        "_id": id,
        "title": title,
        "description": "desc",
        "price": 120.0,
        "location": { "name": "Lisbon", "latitude": 38.72, "longitude": -9.14 },
        "images": images,
        "user": { "_id": "u1" }
    })
}

fn ok(data: Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": { "message": message } })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    failure(StatusCode::UNAUTHORIZED, "Unauthorized")
}

/// Record the request's credentials and check the bearer token.
fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    state.seen_auth.lock().unwrap().push(auth.clone());
    if let Some(id) = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        state.seen_request_ids.lock().unwrap().push(id.to_owned());
    }

    if state.reject_all.load(Ordering::SeqCst) {
        return false;
    }
    let expected = format!("Bearer {}", state.access.lock().unwrap());
    auth.as_deref() == Some(expected.as_str())
}

/// Drain a multipart body into `seen_fields` as `name=value` / `name:file_name`.
async fn record_fields(state: &MockState, mut multipart: Multipart) -> HashMap<String, Vec<String>> {
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let entry = match file_name {
            Some(file_name) => {
                let _ = field.bytes().await.unwrap();
                fields.entry(name.clone()).or_default().push(file_name.clone());
                format!("{name}:{file_name}")
            }
            None => {
                let value = field.text().await.unwrap();
                fields.entry(name.clone()).or_default().push(value.clone());
                format!("{name}={value}")
            }
        };
        state.seen_fields.lock().unwrap().push(entry);
    }
    fields
}

fn first<'a>(fields: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(|v| v.first()).map(String::as_str)
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    authorized(&state, &headers);
    if body["password"] == "secret1" && body["token_expires_in"] == "1y" {
        let access = state.access.lock().unwrap().clone();
        let refresh = state.refresh.lock().unwrap().clone();
        ok(json!({ "accessToken": access, "refreshToken": refresh }))
    } else {
        failure(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let valid = state.refresh.lock().unwrap().clone();
    if state.refresh_fails.load(Ordering::SeqCst) || body["refreshToken"] != valid.as_str() {
        return failure(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    let (access, refresh) = state.next_pair.lock().unwrap().clone();
    *state.access.lock().unwrap() = access.clone();
    *state.refresh.lock().unwrap() = refresh.clone();
    ok(json!({ "accessToken": access, "refreshToken": refresh }))
}

async fn logout(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    assert!(body["refreshToken"].is_string());
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

async fn signup(State(state): State<Arc<MockState>>, multipart: Multipart) -> Response {
    let fields = record_fields(&state, multipart).await;
    match first(&fields, "email") {
        Some("taken@b.com") => failure(StatusCode::CONFLICT, "Email already registered"),
        Some(_) => ok(json!({ "message": "OTP sent" })),
        None => failure(StatusCode::BAD_REQUEST, "Email is required"),
    }
}

async fn verify_otp(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    match body["otp"].as_str() {
        Some("123456") => {
            let access = state.access.lock().unwrap().clone();
            let refresh = state.refresh.lock().unwrap().clone();
            ok(json!({ "accessToken": access, "refreshToken": refresh }))
        }
        Some("111111") => ok(json!({ "verified": true })),
        _ => failure(StatusCode::BAD_REQUEST, "Invalid OTP"),
    }
}

async fn acknowledge(Json(body): Json<Value>) -> Response {
    if body["email"].is_string() {
        (StatusCode::OK, Json(json!({ "success": true }))).into_response()
    } else {
        failure(StatusCode::BAD_REQUEST, "Email is required")
    }
}

async fn own_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    ok(json!({ "user": user_json("u1", "Ada", "Lovelace") }))
}

async fn other_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    ok(json!({ "user": user_json(&id, "Other", "User") }))
}

async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = record_fields(&state, multipart).await;
    let first_name = first(&fields, "firstName").unwrap_or_default();
    let last_name = first(&fields, "lastName").unwrap_or_default();
    ok(json!({ "user": user_json("u1", first_name, last_name) }))
}

async fn list_products(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    state
        .seen_queries
        .lock()
        .unwrap()
        .push(raw.unwrap_or_default());
    let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let items = vec![
        product_json(&format!("p{page}a"), "Bike", 1),
        product_json(&format!("p{page}b"), "Lamp", 0),
    ];
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": items,
            "pagination": { "hasNextPage": page < 2 }
        })),
    )
        .into_response()
}

async fn search_products(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let term = query.get("query").cloned().unwrap_or_default();
    ok(json!([product_json("s1", &term, 0)]))
}

async fn get_product(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    match id.as_str() {
        "missing" => (StatusCode::OK, Json(json!({ "success": false }))).into_response(),
        "gone" => failure(StatusCode::NOT_FOUND, "Product was removed"),
        _ => ok(product_json(&id, "Bike", 1)),
    }
}

async fn create_product(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = record_fields(&state, multipart).await;
    let title = first(&fields, "title").unwrap_or_default();
    let images = fields.get("images").map(Vec::len).unwrap_or(0);
    ok(product_json("new1", title, images))
}

async fn update_product(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let fields = record_fields(&state, multipart).await;
    let title = first(&fields, "title").unwrap_or("Bike");
    ok(product_json(&id, title, 1))
}

async fn delete_product(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}
