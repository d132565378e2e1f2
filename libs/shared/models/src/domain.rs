use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Set when the booking is made on behalf of a relative.
    pub family_member_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub fee: i64,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A non-cancelled appointment holds its (doctor, date, time) slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Requested,
    PendingPayment,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Closed transition table. Anything not listed here is an illegal
    /// transition and must be rejected before any record is touched.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Requested => &[
                AppointmentStatus::PendingPayment,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::PendingPayment => &[
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: &AppointmentStatus) -> bool {
        self.valid_transitions().contains(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "requested"),
            AppointmentStatus::PendingPayment => write!(f, "pending_payment"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Wallet,
    Gateway,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "CASH"),
            PaymentMethod::Wallet => write!(f, "WALLET"),
            PaymentMethod::Gateway => write!(f, "GATEWAY"),
        }
    }
}

// ==============================================================================
// TRANSACTION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// The appointment this transaction funds; deposits carry none.
    pub appointment_id: Option<Uuid>,
    /// Caller-facing reference, also used as the gateway order id.
    pub reference: String,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub payment_method: PaymentMethod,
    /// External reference number echoed back by the gateway.
    pub gateway_ref: Option<String>,
    /// Loyalty points granted (or clawed back, negative) by this transaction.
    pub points_earned: i64,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn can_transition_to(&self, next: &TransactionStatus) -> bool {
        matches!(self, TransactionStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Deposit,
    Refund,
    Withdrawal,
    Reward,
}

impl TransactionType {
    /// Whether a completed transaction of this type adds to the balance.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::Refund | TransactionType::Reward
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Payment => write!(f, "PAYMENT"),
            TransactionType::Deposit => write!(f, "DEPOSIT"),
            TransactionType::Refund => write!(f, "REFUND"),
            TransactionType::Withdrawal => write!(f, "WITHDRAWAL"),
            TransactionType::Reward => write!(f, "REWARD"),
        }
    }
}

// ==============================================================================
// WALLET AND LOYALTY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub patient_id: Uuid,
    pub balance: i64,
    pub loyalty_points: i64,
}

impl Wallet {
    pub fn new(patient_id: Uuid) -> Self {
        Self {
            patient_id,
            balance: 0,
            loyalty_points: 0,
        }
    }

    /// Tier is derived from points on every read; it is never stored.
    pub fn tier(&self) -> LoyaltyTier {
        LoyaltyTier::from_points(self.loyalty_points)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn from_points(points: i64) -> Self {
        if points >= 10_000 {
            LoyaltyTier::Platinum
        } else if points >= 5_000 {
            LoyaltyTier::Gold
        } else if points >= 1_000 {
            LoyaltyTier::Silver
        } else {
            LoyaltyTier::Bronze
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoyaltyTier::Bronze => write!(f, "BRONZE"),
            LoyaltyTier::Silver => write!(f, "SILVER"),
            LoyaltyTier::Gold => write!(f, "GOLD"),
            LoyaltyTier::Platinum => write!(f, "PLATINUM"),
        }
    }
}

// ==============================================================================
// DOCTOR, PATIENT, FAMILY MEMBER
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: String,
    pub consultation_fee: i64,
    pub is_active: bool,
    pub schedule: WorkSchedule,
}

/// Daily working-hours template. Slots are enumerated on a fixed grid
/// inside the two spans; end times are exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub morning_start: NaiveTime,
    pub morning_end: NaiveTime,
    pub afternoon_start: NaiveTime,
    pub afternoon_end: NaiveTime,
    pub slot_minutes: u32,
}

impl Default for WorkSchedule {
    fn default() -> Self {
        Self {
            morning_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            morning_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            afternoon_start: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            afternoon_end: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            slot_minutes: 30,
        }
    }
}

impl WorkSchedule {
    /// The full daily time grid, ascending.
    pub fn grid(&self) -> Vec<NaiveTime> {
        let mut slots = Vec::new();
        self.fill_span(&mut slots, self.morning_start, self.morning_end);
        self.fill_span(&mut slots, self.afternoon_start, self.afternoon_end);
        slots
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.grid().contains(&time)
    }

    fn fill_span(&self, slots: &mut Vec<NaiveTime>, start: NaiveTime, end: NaiveTime) {
        if self.slot_minutes == 0 || start >= end {
            return;
        }
        let step = chrono::Duration::minutes(self.slot_minutes as i64);
        let mut current = start;
        while current < end {
            slots.push(current);
            current += step;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Uuid,
    /// The account holder allowed to book on this member's behalf.
    pub patient_id: Uuid,
    pub full_name: String,
    pub relationship: String,
}
