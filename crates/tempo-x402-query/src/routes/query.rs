use actix_web::{guard, http::StatusCode, web, HttpRequest, HttpResponse};

use crate::db::DbResponse;
use crate::error::GatewayError;
use crate::metrics::QUERIES_TOTAL;
use crate::middleware::payment_response_header;
use crate::normalize::normalize;
use crate::payment::PAYMENT_RESPONSE_HEADER;
use crate::state::AppState;

/// Pull the SQL out of a request body: `{"query": "..."}` or the raw text itself.
pub fn extract_query(body: &[u8]) -> Result<String, GatewayError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| GatewayError::BadRequest("Request body must be UTF-8 text".to_string()))?;

    if text.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "Request body is required".to_string(),
        ));
    }

    let value = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value,
        // Not JSON: the body is the query.
        Err(_) => return Ok(text.to_string()),
    };

    match value.get("query") {
        Some(serde_json::Value::String(q)) if !q.trim().is_empty() => Ok(q.clone()),
        Some(serde_json::Value::String(_)) => {
            Err(GatewayError::BadRequest("Query is required".to_string()))
        }
        Some(_) => Err(GatewayError::BadRequest(
            "'query' must be a string".to_string(),
        )),
        None => Err(GatewayError::BadRequest(
            "Missing 'query' field in JSON body".to_string(),
        )),
    }
}

/// Relay a database rejection with the database's own status.
fn upstream_error(resp: DbResponse) -> HttpResponse {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    HttpResponse::build(status).json(serde_json::json!({
        "error": "Query failed",
        "details": resp.body,
    }))
}

/// POST /query - Execute SQL (x402 payment required)
pub async fn query(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let payment = match state.gate.intercept(&req).await {
        Ok(p) => p,
        Err(http_response) => return Ok(http_response),
    };

    let sql = match extract_query(&body) {
        Ok(q) => normalize(&q),
        Err(e) => {
            QUERIES_TOTAL.with_label_values(&["bad_request"]).inc();
            return Err(e);
        }
    };

    let resp = state.db.execute(&sql).await?;

    if !resp.is_success() {
        QUERIES_TOTAL.with_label_values(&["db_error"]).inc();
        tracing::warn!(status = resp.status, "query rejected by database");
        return Ok(upstream_error(resp));
    }

    let mut builder = HttpResponse::Ok();

    // Charge only for queries that ran.
    if let Some(ref payment) = payment {
        match state.gate.settle(payment).await {
            Ok(settle) => {
                builder.insert_header((PAYMENT_RESPONSE_HEADER, payment_response_header(&settle)));
            }
            Err(http_response) => return Ok(http_response),
        }
    }

    QUERIES_TOTAL.with_label_values(&["ok"]).inc();

    let is_json = serde_json::from_str::<serde::de::IgnoredAny>(&resp.body).is_ok();
    if is_json {
        Ok(builder.content_type("application/json").body(resp.body))
    } else {
        Ok(builder
            .content_type("text/plain; charset=utf-8")
            .body(resp.body))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/query").guard(guard::Post()).to(query));
}
