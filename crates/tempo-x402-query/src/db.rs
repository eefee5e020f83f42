//! ClickHouse HTTP client.
//!
//! Sends SQL as the raw request body and hands back status + body text
//! untouched. Interpreting a non-2xx status is the caller's job.

use std::time::{Duration, Instant};

use crate::config::GatewayConfig;
use crate::metrics::DB_LATENCY;

/// Transport-level failures. A database error reply is not one of these.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("database response too large (max {limit} bytes)")]
    ResponseTooLarge { limit: usize },
}

/// Raw reply from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbResponse {
    pub status: u16,
    pub body: String,
}

impl DbResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone)]
pub struct Database {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    max_response_bytes: usize,
}

impl Database {
    pub fn new(config: &GatewayConfig) -> Result<Self, DbError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.db_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            url: config.database_url.clone(),
            user: config.database_user.clone(),
            password: config.database_password.clone(),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// POST `query` to the database. No retries.
    ///
    /// Latency is observed on every outcome, failures included.
    pub async fn execute(&self, query: &str) -> Result<DbResponse, DbError> {
        let started = Instant::now();
        let _timer = DB_LATENCY.start_timer();

        let mut response = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Accept", "application/json")
            .header("Cache-Control", "no-cache, no-store, no-transform")
            .header("Pragma", "no-cache")
            .body(query.to_string())
            .send()
            .await?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes as u64 {
                return Err(DbError::ResponseTooLarge {
                    limit: self.max_response_bytes,
                });
            }
        }

        // Chunked replies carry no Content-Length, so enforce the cap while reading.
        let mut buf = Vec::with_capacity(
            response
                .content_length()
                .map(|len| len as usize)
                .unwrap_or(8192)
                .min(self.max_response_bytes),
        );
        while let Some(chunk) = response.chunk().await? {
            if buf.len() + chunk.len() > self.max_response_bytes {
                return Err(DbError::ResponseTooLarge {
                    limit: self.max_response_bytes,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            status,
            bytes = buf.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "database call finished"
        );

        Ok(DbResponse {
            status,
            body: String::from_utf8_lossy(&buf).into_owned(),
        })
    }
}
