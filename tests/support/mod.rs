//! Purpose: In-process mock of the storefront REST API for integration tests.
//! Exports: `MockBackend`, `TestResult`, fixture helpers.
//! Role: Loopback axum server with fixed users, products, and a per-server cart.
//! Invariants: Binds 127.0.0.1 on an ephemeral port; shuts down on drop.
//! Invariants: Token `tok-1` is valid, `revoked` yields 403, missing yields 401.
#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

pub const VALID_TOKEN: &str = "tok-1";
pub const REVOKED_TOKEN: &str = "revoked";

#[derive(Default)]
struct Backend {
    cart: Mutex<Vec<(String, u32)>>,
    requests: AtomicUsize,
    last_recent_view: Mutex<Option<String>>,
}

pub struct MockBackend {
    base_url: String,
    state: Arc<Backend>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MockBackend {
    pub fn start() -> TestResult<Self> {
        let state = Arc::new(Backend::default());
        let app = router(state.clone());
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = addr_tx.send(Err(err.to_string()));
                    return;
                }
            };
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
                    Ok(listener) => listener,
                    Err(err) => {
                        let _ = addr_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                let _ = addr_tx.send(listener.local_addr().map_err(|err| err.to_string()));
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });
        let addr = addr_rx.recv_timeout(Duration::from_secs(5))??;
        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn last_recent_view(&self) -> Option<String> {
        self.state
            .last_recent_view
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn router(state: Arc<Backend>) -> Router {
    Router::new()
        .route("/user/sign-in", post(sign_in))
        .route("/user/sign-up", post(sign_up))
        .route("/user/request-code-reset-token", post(request_code_reset))
        .route("/product/home-product-listing", get(home_listing))
        .route("/product/all-categories", get(categories))
        .route("/product/search/", get(search))
        .route("/product/:id", get(product))
        .route("/cart/add-to-cart", patch(add_to_cart))
        .route("/cart/get-user-cart", get(user_cart))
        .route("/cart/empty-cart", delete(empty_cart))
        .route("/order/get-all-users-orders", get(orders))
        .route("/broken", get(broken))
        .route("/html-error", get(html_error))
        .with_state(state)
}

pub fn envelope(data: Value) -> Value {
    json!({"message": "ok", "status_code": 200, "success": true, "data": data})
}

pub fn identity_json(username: &str, token: &str) -> Value {
    json!({
        "id": "66f1c0a2",
        "username": username,
        "location": "Lagos",
        "age": 27,
        "gender": "female",
        "created_at": "2024-09-01T10:00:00",
        "updated_at": "2024-09-02T10:00:00",
        "tkn": token
    })
}

pub fn product_json(id: &str) -> Value {
    json!({
        "id": id,
        "category_id": "c1",
        "product_name": format!("Product {id}"),
        "product_description": "Everyday item",
        "product_price": "40.00",
        "product_discount": "5.00",
        "product_discount_type": "FIXED",
        "product_quantity": 12,
        "slug": id,
        "image_url": "https://img.example/p.png",
        "location": "Lagos",
        "max_age_range": 60,
        "created_at": "2024-09-01T10:00:00",
        "updated_at": "2024-09-01T10:00:00",
        "selling_price": "35.00",
        "avg_rating": 4.5,
        "is_rated": false,
        "rating_given": 0.0
    })
}

fn category_json() -> Value {
    json!({"id": "c1", "name": "Shoes", "created_at": "2024-09-01", "updated_at": "2024-09-01"})
}

fn count(state: &Backend) {
    state.requests.fetch_add(1, Ordering::SeqCst);
}

fn ok(data: Value) -> Response {
    (StatusCode::OK, Json(envelope(data))).into_response()
}

/// 401 without a bearer token, 403 for a revoked one.
fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match token {
        Some(VALID_TOKEN) => Ok(()),
        Some(_) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"detail": {"message": "Token revoked"}})),
        )
            .into_response()),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": {"message": "Not authenticated"}})),
        )
            .into_response()),
    }
}

async fn sign_in(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    count(&state);
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let code = body["code"].as_u64().unwrap_or_default();
    match (username.as_str(), code) {
        ("kejiah", 123456) => ok(identity_json("kejiah", VALID_TOKEN)),
        ("stale", 123456) => ok(identity_json("stale", REVOKED_TOKEN)),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": {"message": "Invalid username or code"}})),
        )
            .into_response(),
    }
}

async fn sign_up(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    count(&state);
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": {"message": "Username already taken", "status_code": 400, "success": false}})),
        )
            .into_response();
    }
    if body.get("gender").and_then(Value::as_str) == Some("") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"loc": ["body", "gender"], "msg": "gender is required"}]})),
        )
            .into_response();
    }
    let mut data = identity_json(body["username"].as_str().unwrap_or_default(), "");
    if let Some(object) = data.as_object_mut() {
        object.remove("tkn");
    }
    ok(data)
}

async fn request_code_reset(State(state): State<Arc<Backend>>) -> Response {
    count(&state);
    (
        StatusCode::OK,
        Json(json!({"message": "Reset token sent", "status_code": 200, "success": true})),
    )
        .into_response()
}

async fn home_listing(
    State(state): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    count(&state);
    *state
        .last_recent_view
        .lock()
        .unwrap_or_else(|poison| poison.into_inner()) = query.get("recent_view").cloned();
    ok(json!({
        "new_added": [product_json("p1")],
        "trending": [],
        "similar_to_recent_view": [],
        "explore": [],
        "same_location": [],
        "age_range": [],
        "might_interest_you": []
    }))
}

async fn categories(State(state): State<Arc<Backend>>) -> Response {
    count(&state);
    ok(json!({"categories": [category_json()]}))
}

async fn search(
    State(state): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    count(&state);
    let name = query.get("name").cloned().unwrap_or_default();
    ok(json!([product_json(&format!("{name}-1"))]))
}

async fn product(State(state): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    count(&state);
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response();
    }
    let mut details = product_json(&id);
    details["category_id"] = category_json();
    details["product_ratings"] = json!([]);
    ok(details)
}

fn cart_json(items: &[(String, u32)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(id, quantity)| json!({"product_id": id, "quantity": quantity}))
        .collect();
    json!({
        "id": "cart1",
        "user_id": "66f1c0a2",
        "cart_items": items,
        "created_at": "2024-09-01",
        "updated_at": "2024-09-02"
    })
}

/// Quantity 99 answers after a delay, for supersession tests.
async fn add_to_cart(
    State(state): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    count(&state);
    if let Err(response) = authorize(&headers) {
        return response;
    }
    let product_id = body["product_id"].as_str().unwrap_or_default().to_string();
    let quantity = body["quantity"].as_u64().unwrap_or(1) as u32;
    if quantity == 99 {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
    let snapshot = {
        let mut cart = state.cart.lock().unwrap_or_else(|poison| poison.into_inner());
        match cart.iter_mut().find(|(id, _)| *id == product_id) {
            Some(line) => line.1 += quantity,
            None => cart.push((product_id, quantity)),
        }
        cart.clone()
    };
    ok(cart_json(&snapshot))
}

async fn user_cart(State(state): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    count(&state);
    if let Err(response) = authorize(&headers) {
        return response;
    }
    let cart = state.cart.lock().unwrap_or_else(|poison| poison.into_inner()).clone();
    let mut value = cart_json(&[]);
    value["cart_items"] = cart
        .iter()
        .map(|(id, quantity)| json!({"product_id": product_json(id), "quantity": quantity}))
        .collect();
    ok(value)
}

async fn empty_cart(State(state): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    count(&state);
    if let Err(response) = authorize(&headers) {
        return response;
    }
    state.cart.lock().unwrap_or_else(|poison| poison.into_inner()).clear();
    ok(cart_json(&[]))
}

async fn orders(State(state): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    count(&state);
    if let Err(response) = authorize(&headers) {
        return response;
    }
    ok(json!([]))
}

async fn broken(State(state): State<Arc<Backend>>) -> Response {
    count(&state);
    (StatusCode::OK, "{\"message\":\"ok\"").into_response()
}

async fn html_error(State(state): State<Arc<Backend>>) -> Response {
    count(&state);
    (StatusCode::BAD_REQUEST, "<html>bad gateway</html>").into_response()
}
