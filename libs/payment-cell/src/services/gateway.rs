use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{failure_reason_for, GatewayCallback, GatewayError, PayDate, PaymentOrder};

type HmacSha512 = Hmac<Sha512>;

/// Gateway amounts travel in a scaled minor unit: local values are
/// multiplied by 100 on the way out and divided by 100 on the way back.
pub const AMOUNT_SCALE: i64 = 100;

const SUCCESS_CODE: &str = "00";
const REDIRECT_VALIDITY_MINUTES: i64 = 15;

/// Pure translation layer between the local records and the external
/// payment processor. Builds signed redirect URLs and normalizes callback
/// parameters; touches no storage.
pub struct PaymentGatewayAdapter {
    url: String,
    terminal_code: String,
    hash_secret: String,
}

impl PaymentGatewayAdapter {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            url: config.gateway_url.clone(),
            terminal_code: config.gateway_terminal_code.clone(),
            hash_secret: config.gateway_hash_secret.clone(),
        }
    }

    /// Build the opaque redirect URL the caller navigates to. Parameters
    /// are signed in sorted order with HMAC-SHA512 over the
    /// value-encoded pairs; the signature rides along as `secure_hash`.
    pub fn build_redirect(&self, order: &PaymentOrder) -> String {
        let now = Utc::now();
        let expire = now + Duration::minutes(REDIRECT_VALIDITY_MINUTES);

        let mut params: BTreeMap<&'static str, String> = BTreeMap::new();
        params.insert("version", "2.1.0".to_string());
        params.insert("command", "pay".to_string());
        params.insert("terminal_code", self.terminal_code.clone());
        params.insert("amount", (order.amount * AMOUNT_SCALE).to_string());
        params.insert("curr_code", "VND".to_string());
        params.insert("txn_ref", order.reference.clone());
        params.insert("order_info", order.order_info.clone());
        params.insert("order_type", "other".to_string());
        params.insert("locale", "en".to_string());
        params.insert("return_url", order.return_url.clone());
        params.insert("create_date", now.format("%Y%m%d%H%M%S").to_string());
        params.insert("expire_date", expire.format("%Y%m%d%H%M%S").to_string());

        let mut hash_data = String::new();
        let mut query = String::new();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            if !hash_data.is_empty() {
                hash_data.push('&');
                query.push('&');
            }
            let encoded_value = urlencoding::encode(value);
            // Hash data encodes only the value; the query encodes both
            hash_data.push_str(key);
            hash_data.push('=');
            hash_data.push_str(&encoded_value);

            query.push_str(&urlencoding::encode(key));
            query.push('=');
            query.push_str(&encoded_value);
        }

        let secure_hash = self.sign(&hash_data);
        debug!(
            "Gateway redirect built for {} (amount {})",
            order.reference, order.amount
        );

        format!("{}?{}&secure_hash={}", self.url, query, secure_hash)
    }

    /// Verify the checksum of a callback parameter map. The hash covers
    /// every non-empty parameter except the hash fields themselves, in
    /// sorted key order.
    pub fn verify_checksum(&self, params: &HashMap<String, String>) -> bool {
        let Some(received_hash) = params.get("secure_hash") else {
            return false;
        };

        let mut sorted: BTreeMap<&str, &str> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        sorted.remove("secure_hash");
        sorted.remove("secure_hash_type");

        let mut hash_data = String::new();
        for (key, value) in sorted.iter().filter(|(_, v)| !v.is_empty()) {
            if !hash_data.is_empty() {
                hash_data.push('&');
            }
            hash_data.push_str(key);
            hash_data.push('=');
            hash_data.push_str(&urlencoding::encode(value));
        }

        let expected = self.sign(&hash_data);
        let valid = expected.eq_ignore_ascii_case(received_hash);
        if !valid {
            warn!("Gateway checksum mismatch (expected {})", expected);
        }
        valid
    }

    /// Normalize a callback into a `GatewayCallback`. Checksum and the
    /// mandatory fields are hard requirements; display-only fields
    /// degrade to `None`.
    pub fn parse_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError> {
        if !self.verify_checksum(params) {
            return Err(GatewayError::InvalidChecksum);
        }

        let response_code = params
            .get("response_code")
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::MissingField("response_code"))?
            .clone();
        let reference = params
            .get("txn_ref")
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::MissingField("txn_ref"))?
            .clone();

        let amount = match params.get("amount").filter(|v| !v.is_empty()) {
            Some(raw) => {
                let scaled: i64 = raw
                    .parse()
                    .map_err(|_| GatewayError::MalformedField("amount"))?;
                Some(scaled / AMOUNT_SCALE)
            }
            None => None,
        };

        let success = response_code == SUCCESS_CODE;

        Ok(GatewayCallback {
            success,
            failure_reason: (!success).then(|| failure_reason_for(&response_code).to_string()),
            response_code,
            reference,
            gateway_ref: params.get("transaction_no").cloned().filter(|v| !v.is_empty()),
            amount,
            bank_code: params.get("bank_code").cloned().filter(|v| !v.is_empty()),
            order_info: params.get("order_info").cloned().filter(|v| !v.is_empty()),
            pay_date: params.get("pay_date").and_then(|raw| PayDate::parse(raw)),
        })
    }

    fn sign(&self, data: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.hash_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(data.as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
