//! Route pricing: human-readable prices to atomic token amounts, and the
//! static requirements template advertised for each paid route.

use crate::payment::PaymentRequirements;

/// x402 scheme used for all routes.
pub const SCHEME_EXACT: &str = "exact";

/// USDC has 6 decimal places.
pub const USDC_DECIMALS: u32 = 6;

const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
const USDC_SOLANA: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const USDC_SOLANA_DEVNET: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

const MAX_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("invalid price '{price}': {reason}")]
    Invalid { price: String, reason: String },

    #[error("no default asset for network '{0}'; set X402_ASSET")]
    UnknownAsset(String),
}

fn invalid(price: &str, reason: impl Into<String>) -> PriceError {
    PriceError::Invalid {
        price: price.to_string(),
        reason: reason.into(),
    }
}

/// USDC contract address for a supported network.
pub fn usdc_asset(network: &str) -> Option<&'static str> {
    match network {
        "base" => Some(USDC_BASE),
        "base-sepolia" => Some(USDC_BASE_SEPOLIA),
        "solana" => Some(USDC_SOLANA),
        "solana-devnet" => Some(USDC_SOLANA_DEVNET),
        _ => None,
    }
}

/// Parse a price like `"$0.01"`, `"0.5"` or `"$2"` into atomic units.
///
/// Integer arithmetic only; extra fractional digits beyond `decimals` are truncated.
pub fn parse_price(price: &str, decimals: u32) -> Result<String, PriceError> {
    let cleaned = price.trim().trim_start_matches('$');
    if cleaned.is_empty() {
        return Err(invalid(price, "no numeric content"));
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid(price, "unexpected characters"));
    }

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned, ""));
    if fractional_part.contains('.') {
        return Err(invalid(price, "more than one decimal point"));
    }
    if integer_part.is_empty() && fractional_part.is_empty() {
        return Err(invalid(price, "no numeric content"));
    }

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part
            .parse()
            .map_err(|e| invalid(price, format!("integer part: {e}")))?
    };

    let decimals_usize = decimals as usize;
    let frac_digits = &fractional_part[..fractional_part.len().min(decimals_usize)];
    let fractional: u64 = if frac_digits.is_empty() {
        0
    } else {
        frac_digits
            .parse()
            .map_err(|e| invalid(price, format!("fractional part: {e}")))?
    };
    let scale = 10u64.pow((decimals_usize - frac_digits.len()) as u32);

    let amount = integer
        .checked_mul(10u64.pow(decimals))
        .and_then(|whole| fractional.checked_mul(scale).map(|frac| (whole, frac)))
        .and_then(|(whole, frac)| whole.checked_add(frac))
        .ok_or_else(|| invalid(price, "overflow"))?;

    Ok(amount.to_string())
}

/// Per-route pricing metadata handed to the payment gate.
#[derive(Debug, Clone)]
pub struct RoutePricing {
    pub price: String,
    pub network: String,
    pub description: String,
    /// Advertise the route to automated discovery
    pub discoverable: bool,
    /// Request body fields, e.g. `{"query": {"type": "string", "required": true}}`
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

impl RoutePricing {
    /// Resolve into a requirements template. `resource` is left empty and
    /// filled per request with the caller-visible URL.
    pub fn to_requirements(
        &self,
        method: &str,
        pay_to: &str,
        asset_override: Option<&str>,
    ) -> Result<PaymentRequirements, PriceError> {
        let asset = match asset_override {
            Some(asset) => asset,
            None => usdc_asset(&self.network)
                .ok_or_else(|| PriceError::UnknownAsset(self.network.clone()))?,
        };
        let amount = parse_price(&self.price, USDC_DECIMALS)?;

        Ok(PaymentRequirements {
            scheme: SCHEME_EXACT.to_string(),
            network: self.network.clone(),
            max_amount_required: amount,
            resource: String::new(),
            description: self.description.clone(),
            mime_type: "application/json".to_string(),
            pay_to: pay_to.to_string(),
            max_timeout_seconds: MAX_TIMEOUT_SECONDS,
            asset: asset.to_string(),
            output_schema: Some(serde_json::json!({
                "input": {
                    "type": "http",
                    "method": method,
                    "discoverable": self.discoverable,
                    "bodyType": "json",
                    "bodyFields": self.input_schema,
                },
                "output": self.output_schema,
            })),
            extra: Some(serde_json::json!({
                "name": "USDC",
                "version": "2",
            })),
        })
    }
}
