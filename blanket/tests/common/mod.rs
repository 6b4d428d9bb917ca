use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use blanket::models::PageData;
use blanket::startup::build_router;
use blanket::AppState;
use tower::util::ServiceExt;

pub fn page_data() -> PageData {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/page_data.json");
    PageData::load(path).expect("sample page data should load")
}

pub fn app() -> Router {
    build_router(AppState::new(page_data(), 3))
}

pub async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    send(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
    send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}
