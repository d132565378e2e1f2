use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::domain::Appointment;
use shared_models::error::AppError;
use shared_store::AppState;
use wallet_cell::models::WalletError;

use crate::models::{BookingError, BookingResponse, CreateBookingRequest};
use crate::services::booking::BookingService;

fn patient_id_from(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Session does not identify a patient".to_string()))
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SlotTaken => {
            AppError::Conflict("Appointment slot is already taken".to_string())
        }
        BookingError::Wallet(WalletError::InsufficientFunds { required, available }) => {
            AppError::BadRequest(format!(
                "Insufficient wallet balance: required {}, available {}",
                required, available
            ))
        }
        BookingError::Wallet(WalletError::InvalidAmount(msg)) => AppError::BadRequest(msg),
        BookingError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        BookingError::FamilyMemberNotFound => {
            AppError::NotFound(e.to_string())
        }
        BookingError::NotOwned => AppError::Forbidden(e.to_string()),
        BookingError::DoctorInactive
        | BookingError::PastDate
        | BookingError::InvalidTime(_)
        | BookingError::InvalidStatusTransition(_) => AppError::ValidationError(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let patient_id = patient_id_from(&user)?;

    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    let response = service
        .create_booking(patient_id, request)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let patient_id = patient_id_from(&user)?;

    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    Ok(Json(service.patient_appointments(patient_id).await))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_booking_error)?;

    let is_owner = appointment.patient_id.to_string() == user.id;
    if !is_owner && !user.is_admin() && !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let patient_id = patient_id_from(&user)?;

    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    let appointment = service
        .cancel_appointment(appointment_id, patient_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    if !user.is_doctor() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only a doctor can complete an appointment".to_string(),
        ));
    }

    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    let appointment = service
        .complete_appointment(appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(appointment))
}
