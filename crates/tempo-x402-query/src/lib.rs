//! Pay-per-query SQL gateway.
//!
//! Puts an x402 payment gate in front of a ClickHouse HTTP endpoint:
//! `POST /query` costs a micropayment, verified and settled by a remote
//! facilitator; schema discovery and syntax validation are free.

pub mod catalog;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod normalize;
pub mod payment;
pub mod pricing;
pub mod routes;
pub mod security;
pub mod state;

pub use config::GatewayConfig;
pub use db::Database;
pub use error::GatewayError;
pub use middleware::PaymentGate;
pub use state::AppState;

use catalog::TableDescriptor;
use pricing::RoutePricing;

/// Pricing for `POST /query`. `tables` is the snapshot taken at startup;
/// the advertised description is never refreshed afterwards.
pub fn query_route_pricing(config: &GatewayConfig, tables: &[TableDescriptor]) -> RoutePricing {
    RoutePricing {
        price: config.query_price.clone(),
        network: config.network.clone(),
        description: catalog::tables_description(tables),
        discoverable: true,
        input_schema: serde_json::json!({
            "query": {
                "type": "string",
                "required": true,
                "description": "SQL query (ClickHouse dialect). FORMAT JSON is appended if no format is given."
            }
        }),
        output_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "data": { "type": "array", "description": "Result rows" },
                "error": { "type": "string", "description": "Error message if the query failed" }
            }
        }),
    }
}
