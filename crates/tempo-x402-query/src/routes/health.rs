use actix_web::{guard, web, HttpRequest, HttpResponse};

use super::ENDPOINTS;
use crate::error::GatewayError;
use crate::metrics::metrics_output;
use crate::security::constant_time_eq;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "x402-query-gateway";

/// GET / - Service identity and endpoint listing
pub async fn index() -> HttpResponse {
    let endpoints: serde_json::Map<String, serde_json::Value> = ENDPOINTS
        .iter()
        .map(|(route, what)| (route.to_string(), serde_json::json!(what)))
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "service": SERVICE_NAME,
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    if let Some(ref expected_token) = state.config.metrics_token {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| constant_time_eq(token.as_bytes(), expected_token.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Valid Bearer token required for /metrics"
            })));
        }
    }

    let output = metrics_output()
        .map_err(|e| GatewayError::Internal(format!("failed to encode metrics: {e}")))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(output))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").guard(guard::Get()).to(index))
        .service(web::resource("/metrics").guard(guard::Get()).to(metrics));
}
