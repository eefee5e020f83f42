//! x402 payment gate.
//!
//! Routes are priced once at startup through [`PaymentGateBuilder`]. For a
//! gated request, [`PaymentGate::intercept`] either answers with a 402
//! challenge or asks the facilitator to verify the attached proof. The proof
//! itself is opaque here; only the facilitator interprets it. After the
//! handler succeeds, [`PaymentGate::settle`] settles the verified payment.

use std::collections::HashMap;
use std::time::Duration;

use actix_web::{HttpRequest, HttpResponse};
use base64::Engine;
use serde::de::DeserializeOwned;

use crate::config::GatewayConfig;
use crate::error::internal_error;
use crate::metrics::PAYMENTS_TOTAL;
use crate::payment::{
    PaymentRequiredBody, PaymentRequirements, SettleResponse, VerifyResponse, PAYMENT_HEADER,
    X402_VERSION,
};
use crate::pricing::{PriceError, RoutePricing};
use crate::security::sign_body;

const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("failed to build facilitator client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Facilitator connection and payout settings.
#[derive(Clone)]
pub struct GateConfig {
    pub facilitator_url: String,
    pub api_key_id: String,
    pub api_key_secret: String,
    pub pay_to: String,
    pub asset: Option<String>,
}

impl From<&GatewayConfig> for GateConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            facilitator_url: config.facilitator_url.clone(),
            api_key_id: config.facilitator_api_key_id.clone(),
            api_key_secret: config.facilitator_api_key_secret.clone(),
            pay_to: config.payout_address.clone(),
            asset: config.asset.clone(),
        }
    }
}

/// A payment the facilitator accepted, waiting to be settled.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payload: serde_json::Value,
    pub requirements: PaymentRequirements,
    pub payer: Option<String>,
}

pub struct PaymentGateBuilder {
    config: GateConfig,
    routes: Vec<(String, String, RoutePricing)>,
}

impl PaymentGateBuilder {
    /// Price a route (e.g. `route("POST", "/query", pricing)`).
    pub fn route(mut self, method: &str, path: &str, pricing: RoutePricing) -> Self {
        self.routes
            .push((method.to_string(), path.to_string(), pricing));
        self
    }

    /// Resolve every route. A route whose price or asset cannot be resolved
    /// stays gated and answers 500 until the configuration is fixed.
    pub fn build(self) -> Result<PaymentGate, GateError> {
        let mut routes = HashMap::new();
        for (method, path, pricing) in self.routes {
            let key = format!("{method} {path}");
            let resolved = pricing
                .to_requirements(&method, &self.config.pay_to, self.config.asset.as_deref())
                .map_err(|e: PriceError| {
                    tracing::error!(route = %key, error = %e, "route pricing misconfigured");
                    e.to_string()
                });
            routes.insert(key, resolved);
        }

        let http = reqwest::Client::builder()
            .timeout(FACILITATOR_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(PaymentGate {
            http,
            facilitator_url: self.config.facilitator_url.trim_end_matches('/').to_string(),
            api_key_id: self.config.api_key_id,
            api_key_secret: self.config.api_key_secret,
            routes,
        })
    }
}

/// Immutable after startup; shared by every worker.
pub struct PaymentGate {
    http: reqwest::Client,
    facilitator_url: String,
    api_key_id: String,
    api_key_secret: String,
    routes: HashMap<String, Result<PaymentRequirements, String>>,
}

impl PaymentGate {
    pub fn builder(config: GateConfig) -> PaymentGateBuilder {
        PaymentGateBuilder {
            config,
            routes: Vec::new(),
        }
    }

    /// Requirements template for a priced route.
    pub fn requirements(&self, method: &str, path: &str) -> Option<&PaymentRequirements> {
        self.routes
            .get(&format!("{method} {path}"))
            .and_then(|r| r.as_ref().ok())
    }

    /// Why a priced route could not be resolved, if it couldn't.
    pub fn misconfiguration(&self, method: &str, path: &str) -> Option<&str> {
        self.routes
            .get(&format!("{method} {path}"))
            .and_then(|r| r.as_ref().err())
            .map(String::as_str)
    }

    /// Decide whether `req` may reach its handler.
    ///
    /// `Ok(None)`: route is not priced. `Ok(Some(_))`: payment verified.
    /// `Err(resp)`: return `resp` to the caller as-is.
    pub async fn intercept(
        &self,
        req: &HttpRequest,
    ) -> Result<Option<VerifiedPayment>, HttpResponse> {
        let method = req.method().as_str();
        if let Some(reason) = self.misconfiguration(method, req.path()) {
            PAYMENTS_TOTAL.with_label_values(&["error"]).inc();
            return Err(internal_error(&format!("payment configuration error: {reason}")));
        }
        let Some(template) = self.requirements(method, req.path()) else {
            return Ok(None);
        };
        let requirements = with_resource(template, req);

        let header = req
            .headers()
            .get(PAYMENT_HEADER)
            .and_then(|v| v.to_str().ok());

        let Some(header) = header else {
            PAYMENTS_TOTAL.with_label_values(&["required"]).inc();
            return Err(payment_required_response(
                requirements,
                "X-PAYMENT header is required",
            ));
        };

        let payload = match decode_payment_header(header) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "invalid payment header");
                PAYMENTS_TOTAL.with_label_values(&["rejected"]).inc();
                return Err(payment_required_response(requirements, &e));
            }
        };

        let verify: VerifyResponse = match self
            .call_facilitator("verify", &payload, &requirements)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                PAYMENTS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(error = %e, "facilitator communication error");
                return Err(internal_error("payment processing failed"));
            }
        };

        if !verify.is_valid {
            PAYMENTS_TOTAL.with_label_values(&["rejected"]).inc();
            let reason = verify
                .invalid_reason
                .unwrap_or_else(|| "payment verification failed".to_string());
            tracing::warn!(payer = ?verify.payer, reason = %reason, "payment rejected");
            return Err(payment_required_response(requirements, &reason));
        }

        PAYMENTS_TOTAL.with_label_values(&["verified"]).inc();
        tracing::info!(payer = ?verify.payer, "payment verified");

        Ok(Some(VerifiedPayment {
            payload,
            requirements,
            payer: verify.payer,
        }))
    }

    /// Settle a verified payment. Called only after the handler produced a
    /// successful response.
    pub async fn settle(&self, payment: &VerifiedPayment) -> Result<SettleResponse, HttpResponse> {
        let settle: SettleResponse = match self
            .call_facilitator("settle", &payment.payload, &payment.requirements)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                PAYMENTS_TOTAL.with_label_values(&["error"]).inc();
                tracing::error!(error = %e, "facilitator communication error");
                return Err(internal_error("payment processing failed"));
            }
        };

        if !settle.success {
            PAYMENTS_TOTAL.with_label_values(&["settle_failed"]).inc();
            let reason = settle
                .error_reason
                .clone()
                .unwrap_or_else(|| "settlement failed".to_string());
            tracing::warn!(payer = ?settle.payer, reason = %reason, "settlement failed");
            return Err(payment_required_response(
                payment.requirements.clone(),
                &reason,
            ));
        }

        PAYMENTS_TOTAL.with_label_values(&["settled"]).inc();
        tracing::info!(
            payer = ?settle.payer,
            transaction = settle.transaction.as_deref().unwrap_or(""),
            "payment settled"
        );
        Ok(settle)
    }

    /// POST `{x402Version, paymentPayload, paymentRequirements}` to a facilitator endpoint.
    async fn call_facilitator<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<T, String> {
        let url = format!("{}/{endpoint}", self.facilitator_url);
        let body = serde_json::json!({
            "x402Version": X402_VERSION,
            "paymentPayload": payload,
            "paymentRequirements": requirements,
        });
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| format!("serialization failed: {e}"))?;

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");

        if !self.api_key_id.is_empty() {
            request = request.header("X-Api-Key-Id", &self.api_key_id);
        }
        if !self.api_key_secret.is_empty() {
            let sig = sign_body(self.api_key_secret.as_bytes(), &body_bytes);
            request = request.header("X-Facilitator-Auth", sig);
        }

        let resp = request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| format!("facilitator request failed: {e}"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err("facilitator authentication failed".to_string());
        }

        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read facilitator response: {e}"))?;

        serde_json::from_str(&text).map_err(|e| {
            format!("facilitator response parse failed (status {status}): {e}")
        })
    }
}

/// Fill in the caller-visible resource URL.
fn with_resource(template: &PaymentRequirements, req: &HttpRequest) -> PaymentRequirements {
    let info = req.connection_info();
    let mut requirements = template.clone();
    requirements.resource = format!("{}://{}{}", info.scheme(), info.host(), req.path());
    requirements
}

/// Decode the X-PAYMENT header: base64 of a JSON document.
pub fn decode_payment_header(header_value: &str) -> Result<serde_json::Value, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON payload: {e}"))
}

/// Build the 402 Payment Required response body.
pub fn payment_required_body(requirements: PaymentRequirements, error: &str) -> PaymentRequiredBody {
    PaymentRequiredBody {
        x402_version: X402_VERSION,
        error: error.to_string(),
        accepts: vec![requirements],
    }
}

pub fn payment_required_response(requirements: PaymentRequirements, error: &str) -> HttpResponse {
    HttpResponse::PaymentRequired().json(payment_required_body(requirements, error))
}

/// Value for the X-PAYMENT-RESPONSE header: base64 of the settlement JSON.
pub fn payment_response_header(settle: &SettleResponse) -> String {
    let json = serde_json::json!({
        "success": settle.success,
        "transaction": settle.transaction,
        "network": settle.network,
        "payer": settle.payer,
    });
    base64::engine::general_purpose::STANDARD.encode(json.to_string())
}
