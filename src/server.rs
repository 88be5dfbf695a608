//! Local HTTP proxy speaking the `/api/gemini` contract, so browser or
//! [`ProxyGateway`](crate::gateway::ProxyGateway) clients never hold the
//! provider endpoint themselves.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::Result;
use crate::gateway::wire::{WireError, WireRequest, WireResponse};
use crate::gateway::{GeminiGateway, ModelGateway};

pub const ROUTE: &str = "/api/gemini";

pub fn router(gateway: Arc<GeminiGateway>) -> Router {
    Router::new()
        .route(
            ROUTE,
            post(generate)
                .options(|| async { StatusCode::OK })
                .fallback(method_not_allowed),
        )
        .with_state(gateway)
        .layer(CorsLayer::permissive())
}

pub async fn serve(addr: SocketAddr, gateway: Arc<GeminiGateway>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Gemini proxy listening on http://{}{} (model {})",
        listener.local_addr()?,
        ROUTE,
        gateway.model()
    );
    axum::serve(listener, router(gateway)).await?;
    Ok(())
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(WireError {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn generate(State(gateway): State<Arc<GeminiGateway>>, body: Bytes) -> Response {
    let request: WireRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)),
    };

    let Some(api_key) = request.api_key.filter(|k| !k.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "API key is required");
    };
    let Some(prompt) = request.prompt.filter(|p| !p.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Prompt is required");
    };
    let model = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| gateway.model().to_string());
    let images = request.images.unwrap_or_default();
    let system_instruction = request.system_instruction.filter(|s| !s.is_empty());

    match gateway
        .generate(&api_key, &model, &prompt, &images, system_instruction.as_deref())
        .await
    {
        Ok(text) => (StatusCode::OK, Json(WireResponse { text })).into_response(),
        Err(e) => {
            tracing::error!("[Gemini proxy] {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
