use actix_web::{guard, web};

pub mod fallback;
pub mod health;
pub mod query;
pub mod schema;

/// Public endpoint listing, shown by `GET /` and the 404 handler.
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /", "Service info and endpoint listing"),
    ("GET /schema", "Tables and columns of the database (free)"),
    (
        "GET /validate?query=<sql>",
        "Check SQL syntax without executing it (free)",
    ),
    (
        "POST /query",
        "Execute a SQL query; body is {\"query\": \"...\"} or raw SQL (x402 payment required)",
    ),
];

/// Register every route. Resources are method-guarded so a wrong method
/// falls through to the app's default service, [`fallback::not_found`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Registered first so OPTIONS never reaches a method-specific resource.
    cfg.service(
        web::resource("/{tail:.*}")
            .guard(guard::Options())
            .to(fallback::preflight),
    )
    .configure(health::configure)
    .configure(schema::configure)
    .configure(query::configure);
}
