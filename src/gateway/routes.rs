//! HTTP surface of the gateway: preflight, method and origin checks, body parsing.

use std::any::Any;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use super::{Gateway, GatewayRequest, ProxyBody};
use crate::config::GATEWAY_PATH;
use crate::error::GatewayError;

/// Shared state for gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<Gateway>,
    /// Origin allowed to call the proxy. `None` accepts any origin.
    pub allowed_origin: Option<String>,
}

impl GatewayState {
    fn allow_origin_header(&self) -> HeaderValue {
        self.allowed_origin
            .as_deref()
            .and_then(|o| HeaderValue::from_str(o).ok())
            .unwrap_or_else(|| HeaderValue::from_static("*"))
    }
}

/// Build the gateway router.
pub fn gateway_routes(state: GatewayState) -> Router {
    Router::new()
        .route(GATEWAY_PATH, any(ai_proxy))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lead-assist-gateway"
    }))
}

// ── Proxy ───────────────────────────────────────────────────────────────

async fn ai_proxy(
    State(state): State<GatewayState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let allow_origin = state.allow_origin_header();

    // Preflight answers before any other check.
    if method == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin),
                (
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("POST, OPTIONS"),
                ),
                (
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("Content-Type"),
                ),
            ],
        )
            .into_response();
    }

    let mut response = match proxy(&state, &method, &headers, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    };
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    response
}

async fn proxy(
    state: &GatewayState,
    method: &Method,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<super::GatewayResponse, GatewayError> {
    if *method != Method::POST {
        debug!(method = %method, "Rejecting non-POST proxy request");
        return Err(GatewayError::MethodNotAllowed);
    }

    if let Some(ref allowed) = state.allowed_origin {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok());
        if origin != Some(allowed.as_str()) {
            warn!(origin = ?origin, "Rejecting request from disallowed origin");
            return Err(GatewayError::Unauthorized);
        }
    }

    let request = GatewayRequest::try_from(parse_body(body)?)?;
    state.gateway.handle(request).await
}

/// An empty body reads as `{}`; anything else must be a JSON object.
fn parse_body(body: &Bytes) -> Result<ProxyBody, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProxyBody::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    GatewayError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_reads_as_empty_object() {
        let parsed = parse_body(&Bytes::from_static(b"  \n")).unwrap();
        assert!(parsed.message.is_none());
        assert!(parsed.history.is_empty());
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = parse_body(&Bytes::from_static(b"{\"message\": ")).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn history_roles_are_validated() {
        let err = parse_body(&Bytes::from_static(
            br#"{"message":"hi","history":[{"role":"system","content":"x"}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn allow_origin_defaults_to_wildcard() {
        let state = GatewayState {
            gateway: Arc::new(Gateway::new(Default::default())),
            allowed_origin: None,
        };
        assert_eq!(state.allow_origin_header(), "*");

        let state = GatewayState {
            allowed_origin: Some("https://example.com".into()),
            ..state
        };
        assert_eq!(state.allow_origin_header(), "https://example.com");
    }
}
