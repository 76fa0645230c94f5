//! Demo routes.

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use treblle_axum::{RouterExt, Treblle};

/// Returns a greeting.
async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// Returns the JSON request body unchanged.
async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

/// Creates the demo router observed by the Treblle middleware.
pub fn router(treblle: Treblle) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/echo", post(echo))
        .with_treblle(treblle)
        .layer(TraceLayer::new_for_http())
}
