use crate::config::Config;
use anyhow::{Context, Result, bail};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde_json::{Value as JsonValue, json};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";
const MAX_RECEIPT_LEN: usize = 40;

/// Bridge to the payment processor: order creation and payment-signature
/// verification. Orders are denominated in paise.
pub struct PaymentGateway {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
}

impl PaymentGateway {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build payment http client")?;

        Ok(PaymentGateway {
            http,
            key_id: cfg.razorpay.key_id.clone(),
            key_secret: cfg.razorpay.key_secret.clone(),
        })
    }

    pub async fn create_order(
        &self,
        amount_paise: i64,
        receipt: &str,
        notes: JsonValue,
    ) -> Result<JsonValue> {
        let body = json!({
            "amount": amount_paise,
            "currency": "INR",
            "receipt": receipt,
            "notes": notes,
        });

        let resp = self
            .http
            .post(ORDERS_URL)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .context("order creation request failed")?;

        let status = resp.status();
        let order: JsonValue = resp.json().await.context("bad order payload")?;
        if !status.is_success() {
            bail!("payment gateway returned {}: {}", status, order);
        }
        Ok(order)
    }

    /// Verify the gateway's payment signature: hex HMAC-SHA256 of
    /// `order_id|payment_id` under the key secret, compared in constant
    /// time. Returns false for malformed signatures rather than erroring.
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.key_secret.as_bytes()) else {
            return false;
        };
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

pub fn order_amount_paise(price: f64) -> i64 {
    (price * 100.0) as i64
}

/// Receipt ids carry the book id plus a random suffix, trimmed to the
/// gateway's 40-character cap.
pub fn make_receipt(book_id: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    let mut receipt = format!("receipt_{}_{}", book_id, suffix);
    receipt.truncate(MAX_RECEIPT_LEN);
    receipt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn gateway(secret: &str) -> PaymentGateway {
        let yaml = format!(
            r#"
app:
  port: 8080
supabase:
  url: http://localhost:54321
  service_key: key
razorpay:
  key_id: rzp_test_id
  key_secret: {}
gemini:
  api_key: key
"#,
            secret
        );
        let cfg: Config = serde_yaml::from_str(&yaml).unwrap();
        PaymentGateway::new(&cfg).unwrap()
    }

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let gw = gateway("s3cr3t");
        let sig = sign("s3cr3t", "order_1", "pay_1");
        assert!(gw.verify_signature("order_1", "pay_1", &sig));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let gw = gateway("s3cr3t");
        let sig = sign("s3cr3t", "order_1", "pay_1");
        assert!(!gw.verify_signature("order_1", "pay_2", &sig));
        assert!(!gw.verify_signature("order_2", "pay_1", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let gw = gateway("s3cr3t");
        let sig = sign("other_key", "order_1", "pay_1");
        assert!(!gw.verify_signature("order_1", "pay_1", &sig));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let gw = gateway("s3cr3t");
        assert!(!gw.verify_signature("order_1", "pay_1", "not-hex!"));
        assert!(!gw.verify_signature("order_1", "pay_1", ""));
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(order_amount_paise(199.0), 19900);
        assert_eq!(order_amount_paise(0.5), 50);
    }

    #[test]
    fn test_receipt_stays_within_gateway_cap() {
        let long_id = "b".repeat(64);
        let receipt = make_receipt(&long_id);
        assert_eq!(receipt.len(), MAX_RECEIPT_LEN);
        assert!(receipt.starts_with("receipt_"));

        let short = make_receipt("42");
        assert!(short.len() <= MAX_RECEIPT_LEN);
    }
}
