use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{dev::Service, middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402_query::{
    catalog, config::GatewayConfig, cors, db::Database, metrics, middleware::GateConfig,
    middleware::PaymentGate, query_route_pricing, routes, state::AppState,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();
    let port = config.port;
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!("Starting x402-query on port {}", port);
    tracing::info!("Database: {}", config.database_url);
    tracing::info!("Facilitator: {}", config.facilitator_url);
    tracing::info!("Query price: {} on {}", config.query_price, config.network);
    if config.metrics_token.is_none() {
        tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
    }

    let db = Database::new(&config).map_err(|e| {
        tracing::error!(error = %e, "failed to create database client");
        std::io::Error::other(e)
    })?;

    // One-time snapshot; the advertised table list is not refreshed afterwards.
    let tables = catalog::list_tables(&db).await;
    tracing::info!("Discovered {} tables", tables.len());

    let gate = PaymentGate::builder(GateConfig::from(&config))
        .route("POST", "/query", query_route_pricing(&config, &tables))
        .build()
        .map_err(|e| {
            tracing::error!(error = %e, "failed to configure payment gate");
            std::io::Error::other(e)
        })?;

    metrics::register_metrics();

    let state_data = web::Data::new(AppState::new(config, db, gate));

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
        .expect("Failed to create rate limiter config");

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(1024 * 1024)) // 1MB body limit
            .wrap_fn(|req, srv| {
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    let route = res
                        .request()
                        .match_pattern()
                        .unwrap_or_else(|| "unmatched".to_string());
                    metrics::REQUESTS_TOTAL
                        .with_label_values(&[route.as_str(), res.status().as_str()])
                        .inc();
                    Ok(res)
                }
            })
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_conf))
            .wrap(cors::default_headers())
            .configure(routes::configure)
            .default_service(web::to(routes::fallback::not_found))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
