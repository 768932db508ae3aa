//! VNPay gateway client.
//!
//! Builds canonically ordered, HMAC-SHA512 signed redirect URLs for outbound
//! payment requests and verifies the signature of inbound callbacks before
//! any of their payment-status claims are surfaced to callers.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::VnPayConfig;

type HmacSha512 = Hmac<Sha512>;

/// Query field carrying the claimed signature. Never part of the signed set.
pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
/// Optional algorithm hint some gateway versions attach. Also unsigned.
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

const GATEWAY_FIELD_PREFIX: &str = "vnp_";
const RESPONSE_CODE_FIELD: &str = "vnp_ResponseCode";
const SUCCESS_RESPONSE_CODE: &str = "00";

/// RFC 3986 unreserved characters stay literal; everything else, space
/// included, becomes `%XX` (never `+`). The gateway signs over this exact
/// byte form, so the set must not drift.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static RESPONSE_CODE_DESCRIPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("00", "Transaction completed successfully"),
        ("01", "Transaction is incomplete"),
        ("02", "Transaction failed with an error"),
        (
            "04",
            "Transaction reversed: the customer was charged but gateway settlement is pending",
        ),
        ("05", "The gateway is processing a refund for this transaction"),
        ("06", "A refund request was forwarded to the issuing bank"),
        ("07", "Transaction flagged as suspected fraud"),
        ("09", "Refund request was rejected"),
    ])
});

/// Human-readable description for a gateway response code. Codes outside the
/// published table are still valid outcomes and keep the raw code visible
/// for diagnostics.
pub fn response_code_description(code: &str) -> String {
    match RESPONSE_CODE_DESCRIPTIONS.get(code) {
        Some(description) => (*description).to_string(),
        None => format!("Unknown payment error (code {})", code),
    }
}

/// Why an inbound callback could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("callback carries no vnp_SecureHash field")]
    MissingSignature,

    #[error("callback signature does not match the signed payload")]
    Mismatch,
}

/// Order data supplied by the checkout workflow for one redirect URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: i64,
    /// Major currency units; multiplied by 100 before transmission.
    pub amount: Decimal,
    pub full_name: String,
    pub description: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Validated, trusted view of a gateway callback. Only constructed after the
/// signature check passed, so every field here may be acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCallbackResult {
    /// True iff the signature verified and the gateway reported code "00".
    pub success: bool,
    pub payment_method: String,
    pub order_description: String,
    pub order_id: String,
    pub transaction_id: String,
    /// The signature echoed back to the caller.
    pub token: String,
    pub response_code: String,
    pub response_description: String,
}

/// Deterministically ordered field set shared by the signing and
/// verification paths.
///
/// Keys are compared byte-wise ascending (the map's `String` ordering),
/// which is the ordinal ordering the gateway protocol mandates; locale
/// collation must never be involved. Values are stored verbatim: the codec
/// performs no type coercion and no empty-value filtering, so callers must
/// only insert non-empty, transmit-ready strings.
#[derive(Debug, Clone, Default)]
pub struct SignedQuery {
    fields: BTreeMap<String, String>,
}

impl SignedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical `key=value&…` serialization over percent-encoded values,
    /// in sorted key order. Both the signing input and the transmitted
    /// query string are this exact byte sequence.
    fn canonical(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.fields {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(name);
            out.push('=');
            out.extend(utf8_percent_encode(value, QUERY_ENCODE_SET));
        }
        out
    }

    /// The string the HMAC is computed over.
    pub fn hash_data(&self) -> String {
        self.canonical()
    }

    /// The query-string portion of the redirect URL, built independently of
    /// the hash data but with identical structure.
    pub fn query_string(&self) -> String {
        self.canonical()
    }

    /// Full signed redirect URL:
    /// `{base_url}?{query}&vnp_SecureHash={signature}`.
    pub fn signed_redirect_url(&self, base_url: &str, secret_key: &str) -> String {
        let query = self.query_string();
        let signature = hmac_sha512_hex(secret_key, &self.hash_data());
        format!("{base_url}?{query}&{SECURE_HASH_FIELD}={signature}")
    }

    /// Recomputes the signature over the stored fields and compares it with
    /// the claimed one. Hex comparison is case-insensitive and constant
    /// time.
    pub fn verify_signature(&self, claimed: &str, secret_key: &str) -> bool {
        let expected = hmac_sha512_hex(secret_key, &self.hash_data());
        constant_time_eq(&expected, &claimed.to_ascii_lowercase())
    }
}

/// Lowercase-hex HMAC-SHA512 of `data`, keyed by the UTF-8 bytes of `key`.
pub fn hmac_sha512_hex(key: &str, data: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// VNPay gateway client.
///
/// Holds only immutable merchant configuration, so one instance can serve
/// any number of concurrent requests without coordination. Both operations
/// are pure transforms over their inputs; no network or storage access
/// happens here.
#[derive(Debug, Clone)]
pub struct VnPayGateway {
    config: VnPayConfig,
}

impl VnPayGateway {
    pub fn new(config: VnPayConfig) -> Self {
        Self { config }
    }

    /// Assembles the protocol fields for `request` and returns the signed
    /// redirect URL the customer should be sent to.
    ///
    /// The transaction reference is a microsecond clock reading, unique
    /// within one process. Horizontally scaled deployments need an external
    /// reference scheme on top.
    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    pub fn create_payment_url(&self, request: &PaymentRequest, client_ip: &str) -> String {
        // The gateway expects minor currency units: amount * 100, integral.
        let amount_minor = (request.amount * Decimal::from(100)).trunc();
        let txn_ref = Utc::now().timestamp_micros();

        let mut query = SignedQuery::new();
        query.insert("vnp_Version", self.config.version.as_str());
        query.insert("vnp_Command", self.config.command.as_str());
        query.insert("vnp_TmnCode", self.config.tmn_code.as_str());
        query.insert("vnp_Amount", amount_minor.to_string());
        query.insert(
            "vnp_CreateDate",
            request.created_at.format("%Y%m%d%H%M%S").to_string(),
        );
        query.insert("vnp_CurrCode", self.config.currency_code.as_str());
        query.insert("vnp_IpAddr", client_ip);
        query.insert("vnp_Locale", self.config.locale.as_str());
        query.insert(
            "vnp_OrderInfo",
            format!("Payment for order {}", request.order_id),
        );
        query.insert("vnp_OrderType", "other");
        query.insert("vnp_ReturnUrl", self.config.return_url.as_str());
        query.insert("vnp_TxnRef", txn_ref.to_string());

        let url = query.signed_redirect_url(&self.config.base_url, &self.config.hash_secret);

        info!(
            order_id = request.order_id,
            txn_ref,
            amount = %request.amount,
            "built signed payment redirect"
        );

        url
    }

    /// Filters the gateway-prefixed fields out of a raw callback query,
    /// verifies the claimed signature, and only then reads the payload.
    ///
    /// On a mismatch no field of the callback is surfaced; callers must
    /// treat the request as untrusted.
    #[instrument(skip_all)]
    pub fn verify_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<PaymentCallbackResult, SignatureError> {
        let claimed = params
            .get(SECURE_HASH_FIELD)
            .filter(|hash| !hash.is_empty())
            .ok_or(SignatureError::MissingSignature)?;

        let signed = SignedQuery::from_fields(params.iter().filter_map(|(name, value)| {
            let in_signed_set = name.starts_with(GATEWAY_FIELD_PREFIX)
                && name != SECURE_HASH_FIELD
                && name != SECURE_HASH_TYPE_FIELD;
            in_signed_set.then(|| (name.clone(), value.clone()))
        }));

        if !signed.verify_signature(claimed, &self.config.hash_secret) {
            warn!("callback signature mismatch; payload rejected");
            return Err(SignatureError::Mismatch);
        }

        let field = |name: &str| signed.get(name).unwrap_or_default().to_string();
        let response_code = field(RESPONSE_CODE_FIELD);

        let result = PaymentCallbackResult {
            success: response_code == SUCCESS_RESPONSE_CODE,
            payment_method: "VnPay".to_string(),
            order_description: field("vnp_OrderInfo"),
            order_id: field("vnp_TxnRef"),
            transaction_id: field("vnp_TransactionNo"),
            token: claimed.clone(),
            response_description: response_code_description(&response_code),
            response_code,
        };

        info!(
            order_id = %result.order_id,
            response_code = %result.response_code,
            success = result.success,
            "verified gateway callback"
        );

        Ok(result)
    }
}
