use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::domain::{Appointment, PaymentMethod, Transaction};

// ==============================================================================
// OUTBOUND REDIRECT
// ==============================================================================

/// What the adapter needs to build a redirect; the caller supplies the
/// return address so appointment payments and top-ups can land on
/// different callback endpoints.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub reference: String,
    pub amount: i64,
    pub order_info: String,
    pub return_url: String,
}

// ==============================================================================
// CALLBACK PARSING
// ==============================================================================

/// Normalized gateway callback. Mandatory fields are enforced by
/// `parse_callback`; display-only fields (bank code, pay date, order info)
/// degrade to `None` when absent or unparseable - that degradation is the
/// whole fallback policy, nothing is patched with invented values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCallback {
    pub success: bool,
    pub response_code: String,
    pub reference: String,
    /// The processor's own transaction number.
    pub gateway_ref: Option<String>,
    /// Paid amount, already descaled back to local units.
    pub amount: Option<i64>,
    pub bank_code: Option<String>,
    pub order_info: Option<String>,
    pub pay_date: Option<PayDate>,
    pub failure_reason: Option<String>,
}

/// Gateway timestamps arrive as `yyyyMMddHHmmss`; split once on parse so
/// display layers never re-slice the raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl PayDate {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            year: raw[0..4].parse().ok()?,
            month: raw[4..6].parse().ok()?,
            day: raw[6..8].parse().ok()?,
            hour: raw[8..10].parse().ok()?,
            minute: raw[10..12].parse().ok()?,
            second: raw[12..14].parse().ok()?,
        })
    }
}

impl std::fmt::Display for PayDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Fixed response-code reason table. Unknown codes fall through to a
/// generic failure message instead of erroring.
pub fn failure_reason_for(code: &str) -> &'static str {
    match code {
        "07" => "Amount captured but the transaction is flagged as suspicious",
        "09" => "Card or account not enrolled for online banking",
        "10" => "Card or account authentication failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Wrong one-time password entered more than 3 times",
        "24" => "Transaction cancelled by the customer",
        "51" => "Insufficient funds in the account",
        "65" => "Daily transaction limit exceeded",
        "70" => "Transaction declined due to invalid card details",
        "75" => "The issuing bank is under maintenance",
        "79" => "Wrong payment password entered too many times",
        "97" => "Invalid checksum",
        "99" => "Unknown error",
        _ => "Payment failed, please try again later",
    }
}

// ==============================================================================
// ERRORS AND OUTCOMES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Malformed callback: missing field {0}")]
    MissingField(&'static str),

    #[error("Malformed callback: field {0} is not a valid value")]
    MalformedField(&'static str),

    #[error("Callback checksum verification failed")]
    InvalidChecksum,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    #[error("No transaction found for reference {0}")]
    TransactionNotFound(String),
}

/// Result of merging a callback with the local records. `replayed` marks
/// a redelivered callback that found the transaction already terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub transaction: Transaction,
    pub appointment: Option<Appointment>,
    pub replayed: bool,
}

// ==============================================================================
// TOP-UP
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpResponse {
    pub payment_url: String,
    pub transaction_ref: String,
    pub transaction_id: Uuid,
}
