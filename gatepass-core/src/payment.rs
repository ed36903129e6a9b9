use chrono::{DateTime, FixedOffset, Offset, Utc};
use gatepass_shared::Masked;
use serde::Deserialize;
use uuid::Uuid;

use crate::repository::StoreError;
use crate::signing::{self, QueryParams};

pub const VNP_VERSION: &str = "2.1.0";
pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
pub const RESPONSE_CODE_SUCCESS: &str = "00";

/// Merchant credentials and endpoints for the hosted payment page.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub tmn_code: String,
    pub hash_secret: Masked<String>,
    pub payment_url: String,
    pub return_url: String,
    /// Offset of the gateway's local clock, used for `vnp_CreateDate`.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_order_info_prefix")]
    pub order_info_prefix: String,
}

fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

fn default_order_info_prefix() -> String {
    "Thanh toan don hang".to_string()
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    /// Whole currency units; the gateway receives this ×100.
    pub amount: i64,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
}

/// A callback whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    pub order_id: Uuid,
    pub amount_minor: i64,
    pub response_code: String,
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
}

impl GatewayCallback {
    pub fn is_success(&self) -> bool {
        self.response_code == RESPONSE_CODE_SUCCESS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Amount mismatch: order total is {expected}, got {declared}")]
    AmountMismatch { expected: i64, declared: i64 },

    #[error("Callback signature is invalid")]
    InvalidSignature,

    #[error("Missing gateway parameter: {0}")]
    MissingField(String),

    #[error("Malformed gateway parameter {field}: {value}")]
    InvalidField { field: String, value: String },

    #[error("Order {order_id} is {status} and cannot be paid")]
    NotPayable { order_id: Uuid, status: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::OrderNotFound(_) => "order_not_found",
            PaymentError::AmountMismatch { .. } => "amount_mismatch",
            PaymentError::InvalidSignature => "invalid_signature",
            PaymentError::MissingField(_) | PaymentError::InvalidField { .. } => "invalid_callback",
            PaymentError::NotPayable { .. } => "not_payable",
            PaymentError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            PaymentError::Store(_) => "store_error",
        }
    }
}

/// Signed redirect-and-callback protocol of a hosted payment page.
pub trait PaymentGateway: Send + Sync {
    /// Redirect URL for the buyer. Amount checks belong to the caller.
    fn build_payment_url(&self, request: &PaymentRequest) -> String;

    /// Checks the callback signature and extracts the settlement fields.
    fn verify_callback(&self, params: &QueryParams) -> Result<GatewayCallback, PaymentError>;
}

pub struct VnpayGateway {
    config: GatewayConfig,
}

impl VnpayGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn secret(&self) -> &[u8] {
        self.config.hash_secret.expose().as_bytes()
    }

    fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Outbound parameter set before signing.
    pub fn payment_params(&self, request: &PaymentRequest) -> QueryParams {
        let create_date = request
            .created_at
            .with_timezone(&self.local_offset())
            .format("%Y%m%d%H%M%S")
            .to_string();

        let mut params = QueryParams::new();
        params.insert("vnp_Version".into(), VNP_VERSION.into());
        params.insert("vnp_Command".into(), "pay".into());
        params.insert("vnp_TmnCode".into(), self.config.tmn_code.clone());
        params.insert("vnp_Locale".into(), "vn".into());
        params.insert("vnp_CurrCode".into(), "VND".into());
        params.insert("vnp_TxnRef".into(), request.order_id.to_string());
        params.insert(
            "vnp_OrderInfo".into(),
            format!("{} {}", self.config.order_info_prefix, request.order_id),
        );
        params.insert("vnp_OrderType".into(), "other".into());
        params.insert("vnp_Amount".into(), (request.amount * 100).to_string());
        params.insert("vnp_ReturnUrl".into(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".into(), request.client_ip.clone());
        params.insert("vnp_CreateDate".into(), create_date);
        params
    }
}

impl PaymentGateway for VnpayGateway {
    fn build_payment_url(&self, request: &PaymentRequest) -> String {
        let canonical = signing::canonical_query(&self.payment_params(request));
        let signature = signing::sign(self.secret(), &canonical);
        format!(
            "{}?{}&{}={}",
            self.config.payment_url, canonical, SECURE_HASH, signature
        )
    }

    fn verify_callback(&self, params: &QueryParams) -> Result<GatewayCallback, PaymentError> {
        let provided = params
            .get(SECURE_HASH)
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| PaymentError::MissingField(SECURE_HASH.to_string()))?;

        let signed: QueryParams = params
            .iter()
            .filter(|(key, _)| key.as_str() != SECURE_HASH && key.as_str() != SECURE_HASH_TYPE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let canonical = signing::canonical_query(&signed);
        if !signing::verify(self.secret(), &canonical, provided) {
            tracing::warn!(
                txn_ref = signed.get("vnp_TxnRef").map(String::as_str).unwrap_or(""),
                "Rejected gateway callback with invalid signature"
            );
            return Err(PaymentError::InvalidSignature);
        }

        let order_id = required(&signed, "vnp_TxnRef")?;
        let order_id = Uuid::parse_str(order_id).map_err(|_| PaymentError::InvalidField {
            field: "vnp_TxnRef".to_string(),
            value: order_id.to_string(),
        })?;

        let amount = required(&signed, "vnp_Amount")?;
        let amount_minor = amount.parse::<i64>().map_err(|_| PaymentError::InvalidField {
            field: "vnp_Amount".to_string(),
            value: amount.to_string(),
        })?;

        Ok(GatewayCallback {
            order_id,
            amount_minor,
            response_code: required(&signed, "vnp_ResponseCode")?.to_string(),
            transaction_no: optional(&signed, "vnp_TransactionNo"),
            bank_code: optional(&signed, "vnp_BankCode"),
            pay_date: optional(&signed, "vnp_PayDate"),
        })
    }
}

fn required<'a>(params: &'a QueryParams, key: &str) -> Result<&'a str, PaymentError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PaymentError::MissingField(key.to_string()))
}

fn optional(params: &QueryParams, key: &str) -> Option<String> {
    params.get(key).filter(|value| !value.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "TESTSECRET0123456789";

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(GatewayConfig {
            tmn_code: "GATEPASS".to_string(),
            hash_secret: Masked::new(SECRET.to_string()),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://tickets.test/payment/vnpay-return".to_string(),
            utc_offset_minutes: 420,
            order_info_prefix: "Thanh toan don hang".to_string(),
        })
    }

    fn request(order_id: Uuid) -> PaymentRequest {
        PaymentRequest {
            order_id,
            amount: 150_000,
            client_ip: "203.0.113.9".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 17, 30, 0).unwrap(),
        }
    }

    fn signed_callback(order_id: Uuid, response_code: &str) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("vnp_TmnCode".into(), "GATEPASS".into());
        params.insert("vnp_TxnRef".into(), order_id.to_string());
        params.insert("vnp_Amount".into(), "15000000".into());
        params.insert("vnp_ResponseCode".into(), response_code.into());
        params.insert("vnp_TransactionNo".into(), "14123456".into());
        params.insert("vnp_BankCode".into(), "NCB".into());
        params.insert("vnp_PayDate".into(), "20240302003100".into());
        params.insert("vnp_OrderInfo".into(), format!("Thanh toan don hang {}", order_id));
        let hash = signing::sign(SECRET.as_bytes(), &signing::canonical_query(&params));
        params.insert(SECURE_HASH_TYPE.into(), "HmacSHA512".into());
        params.insert(SECURE_HASH.into(), hash);
        params
    }

    #[test]
    fn test_payment_params_are_bit_exact() {
        let order_id = Uuid::new_v4();
        let params = gateway().payment_params(&request(order_id));

        assert_eq!(params["vnp_Version"], "2.1.0");
        assert_eq!(params["vnp_Command"], "pay");
        assert_eq!(params["vnp_CurrCode"], "VND");
        assert_eq!(params["vnp_OrderType"], "other");
        assert_eq!(params["vnp_Locale"], "vn");
        assert_eq!(params["vnp_Amount"], "15000000");
        assert_eq!(params["vnp_TxnRef"], order_id.to_string());
        // 17:30 UTC is 00:30 the next day at UTC+7
        assert_eq!(params["vnp_CreateDate"], "20240302003000");
    }

    #[test]
    fn test_payment_url_signature_covers_canonical_query() {
        let url = gateway().build_payment_url(&request(Uuid::new_v4()));

        let (base, query) = url.split_once('?').unwrap();
        assert_eq!(base, "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html");

        let (canonical, hash) = query.rsplit_once("&vnp_SecureHash=").unwrap();
        assert!(canonical.starts_with("vnp_Amount=15000000&vnp_Command=pay"));
        assert!(canonical.contains("vnp_OrderInfo=Thanh+toan+don+hang+"));
        assert!(signing::verify(SECRET.as_bytes(), canonical, hash));
    }

    #[test]
    fn test_verify_callback_accepts_valid_signature() {
        let order_id = Uuid::new_v4();
        let callback = gateway()
            .verify_callback(&signed_callback(order_id, "00"))
            .unwrap();

        assert_eq!(callback.order_id, order_id);
        assert_eq!(callback.amount_minor, 15_000_000);
        assert!(callback.is_success());
        assert_eq!(callback.transaction_no.as_deref(), Some("14123456"));
        assert_eq!(callback.bank_code.as_deref(), Some("NCB"));
    }

    #[test]
    fn test_verify_callback_accepts_uppercase_hash() {
        let mut params = signed_callback(Uuid::new_v4(), "24");
        let upper = params[SECURE_HASH].to_ascii_uppercase();
        params.insert(SECURE_HASH.into(), upper);

        let callback = gateway().verify_callback(&params).unwrap();
        assert!(!callback.is_success());
        assert_eq!(callback.response_code, "24");
    }

    #[test]
    fn test_verify_callback_rejects_tampered_amount() {
        let mut params = signed_callback(Uuid::new_v4(), "00");
        params.insert("vnp_Amount".into(), "100".into());

        let result = gateway().verify_callback(&params);
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_verify_callback_requires_hash() {
        let mut params = signed_callback(Uuid::new_v4(), "00");
        params.remove(SECURE_HASH);

        let result = gateway().verify_callback(&params);
        assert!(matches!(result, Err(PaymentError::MissingField(field)) if field == SECURE_HASH));
    }

    #[test]
    fn test_verify_callback_rejects_bad_txn_ref() {
        let mut params = QueryParams::new();
        params.insert("vnp_TxnRef".into(), "not-a-uuid".into());
        params.insert("vnp_Amount".into(), "100".into());
        params.insert("vnp_ResponseCode".into(), "00".into());
        let hash = signing::sign(SECRET.as_bytes(), &signing::canonical_query(&params));
        params.insert(SECURE_HASH.into(), hash);

        let result = gateway().verify_callback(&params);
        assert!(matches!(result, Err(PaymentError::InvalidField { .. })));
    }
}
