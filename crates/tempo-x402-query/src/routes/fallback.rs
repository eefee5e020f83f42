use actix_web::HttpResponse;

use super::ENDPOINTS;

/// OPTIONS on any path: CORS preflight. Headers come from the default-headers middleware.
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Any unknown route or method.
pub async fn not_found() -> HttpResponse {
    let endpoints: Vec<&str> = ENDPOINTS.iter().map(|(route, _)| *route).collect();
    HttpResponse::NotFound().json(serde_json::json!({
        "error": "Not found",
        "availableEndpoints": endpoints,
    }))
}
