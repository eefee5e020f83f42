use actix_web::{guard, web, HttpResponse};
use serde::Deserialize;

use crate::catalog::{self, CatalogError};
use crate::error::GatewayError;
use crate::state::AppState;

/// GET /schema - Tables and columns, grouped by table
pub async fn schema(state: web::Data<AppState>) -> Result<HttpResponse, GatewayError> {
    match catalog::get_schema(&state.db).await {
        Ok(parsed) => {
            tracing::debug!(
                structured = parsed.is_structured(),
                columns = parsed.rows().len(),
                "schema fetched"
            );
            let document = catalog::build_schema_document(parsed.into_rows());
            Ok(HttpResponse::Ok().json(document))
        }
        Err(CatalogError::Upstream { status, body }) => {
            tracing::warn!(status, "schema query rejected by database");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to fetch schema",
                "details": body,
            })))
        }
        Err(CatalogError::Database(e)) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub query: Option<String>,
}

/// Wrap a query so the database only parses it.
pub fn explain_syntax(query: &str) -> String {
    let trimmed = query.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    format!("EXPLAIN SYNTAX {body}")
}

/// GET /validate?query=... - Syntax check. A rejected query is still a 200;
/// the verdict is the payload.
pub async fn validate(
    params: web::Query<ValidateParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let query = params
        .into_inner()
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("Query parameter 'query' is required".to_string()))?;

    let resp = state.db.execute(&explain_syntax(&query)).await?;

    let verdict = if resp.is_success() {
        serde_json::json!({
            "valid": true,
            "explanation": resp.body,
        })
    } else {
        serde_json::json!({
            "valid": false,
            "error": resp.body,
        })
    };
    Ok(HttpResponse::Ok().json(verdict))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/schema").guard(guard::Get()).to(schema))
        .service(web::resource("/validate").guard(guard::Get()).to(validate));
}
