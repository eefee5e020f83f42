use std::env;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
const DEFAULT_NETWORK: &str = "base-sepolia";
const DEFAULT_QUERY_PRICE: &str = "$0.01";
const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;

#[derive(Clone)]
pub struct GatewayConfig {
    /// ClickHouse HTTP endpoint (e.g. "https://host:8443")
    pub database_url: String,
    pub database_user: String,
    pub database_password: String,
    /// Wallet that receives query payments
    pub payout_address: String,
    /// Facilitator base URL for payment verification and settlement
    pub facilitator_url: String,
    pub facilitator_api_key_id: String,
    pub facilitator_api_key_secret: String,
    /// Settlement network name (e.g. "base", "base-sepolia")
    pub network: String,
    /// Token contract override; None = USDC for `network`
    pub asset: Option<String>,
    /// Price of one `POST /query` call (e.g. "$0.01")
    pub query_price: String,
    /// Server port
    pub port: u16,
    /// Outbound database call timeout
    pub db_timeout_secs: u64,
    /// Largest database response body the gateway will buffer
    pub max_response_bytes: usize,
    /// Rate limit requests per minute per IP
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("database_url", &self.database_url)
            .field("database_user", &self.database_user)
            .field("database_password", &redact(&self.database_password))
            .field("payout_address", &self.payout_address)
            .field("facilitator_url", &self.facilitator_url)
            .field("facilitator_api_key_id", &self.facilitator_api_key_id)
            .field(
                "facilitator_api_key_secret",
                &redact(&self.facilitator_api_key_secret),
            )
            .field("network", &self.network)
            .field("asset", &self.asset)
            .field("query_price", &self.query_price)
            .field("port", &self.port)
            .field("db_timeout_secs", &self.db_timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    ///
    /// Connection settings and credentials default to empty strings and are
    /// not checked here; a bad value surfaces as an outbound call error.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str| lookup(key).unwrap_or_default();
        let with_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_timeout_secs = lookup("DB_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_DB_TIMEOUT_SECS);

        let max_response_bytes = lookup("MAX_RESPONSE_BYTES")
            .and_then(|s| s.parse().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES);

        let rate_limit_rpm = lookup("RATE_LIMIT_RPM")
            .and_then(|s| s.parse().ok())
            .filter(|rpm| *rpm > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        Self {
            database_url: string("CLICKHOUSE_URL"),
            database_user: string("CLICKHOUSE_USER"),
            database_password: string("CLICKHOUSE_PASSWORD"),
            payout_address: string("PAYOUT_ADDRESS"),
            facilitator_url: with_default("FACILITATOR_URL", DEFAULT_FACILITATOR_URL),
            facilitator_api_key_id: string("FACILITATOR_API_KEY_ID"),
            facilitator_api_key_secret: string("FACILITATOR_API_KEY_SECRET"),
            network: with_default("X402_NETWORK", DEFAULT_NETWORK),
            asset: lookup("X402_ASSET").filter(|s| !s.trim().is_empty()),
            query_price: with_default("QUERY_PRICE", DEFAULT_QUERY_PRICE),
            port,
            db_timeout_secs,
            max_response_bytes,
            rate_limit_rpm,
            metrics_token: lookup("METRICS_TOKEN").filter(|s| !s.is_empty()),
        }
    }
}
