use crate::config::GatewayConfig;
use crate::db::Database;
use crate::middleware::PaymentGate;
use std::sync::Arc;

/// Shared application state. Nothing in here changes after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub db: Arc<Database>,
    /// Pricing for `POST /query`, including the table list captured at startup
    pub gate: Arc<PaymentGate>,
}

impl AppState {
    pub fn new(config: GatewayConfig, db: Database, gate: PaymentGate) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(db),
            gate: Arc::new(gate),
        }
    }
}
