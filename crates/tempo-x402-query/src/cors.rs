//! Permissive CORS and cache-busting response headers.
//!
//! Any origin may call the gateway, so there is no origin negotiation: the
//! same headers go on every response, and preflights are answered by the
//! catch-all `OPTIONS` route with 204.

use actix_web::middleware::DefaultHeaders;

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-PAYMENT";
pub const EXPOSED_HEADERS: &str = "X-PAYMENT-RESPONSE";
pub const CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate, no-transform";

/// Headers added to every response that doesn't already set them.
pub fn default_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", ALLOWED_METHODS))
        .add(("Access-Control-Allow-Headers", ALLOWED_HEADERS))
        .add(("Access-Control-Expose-Headers", EXPOSED_HEADERS))
        .add(("Access-Control-Max-Age", "3600"))
        .add(("Cache-Control", CACHE_CONTROL))
        .add(("Pragma", "no-cache"))
        .add(("Expires", "0"))
}
