use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::domain::{Appointment, AppointmentStatus, PaymentMethod};
use wallet_cell::models::WalletError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub doctor_id: Uuid,
    /// Booking on behalf of a relative; must belong to the requester.
    pub family_member_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

/// What a booking resolves to. `payment_url` is set only on the gateway
/// path, where the appointment stays PENDING_PAYMENT until the callback
/// (or the expiry sweep) finalizes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub appointment: Appointment,
    pub payment_url: Option<String>,
    pub transaction_ref: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment slot is already taken")]
    SlotTaken,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorInactive,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Family member not found or does not belong to this patient")]
    FamilyMemberNotFound,

    #[error("Cannot book an appointment in the past")]
    PastDate,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment does not belong to this patient")]
    NotOwned,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}
