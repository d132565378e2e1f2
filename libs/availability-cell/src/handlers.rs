use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{AvailabilityError, AvailabilityQuery, AvailabilityResponse};
use crate::services::slots::SlotAvailabilityService;

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let service = SlotAvailabilityService::new(Arc::clone(&state.store));

    let slots = service
        .available_slots(doctor_id, query.date)
        .await
        .map_err(|e| match e {
            AvailabilityError::PastDate => {
                AppError::ValidationError("Date must not be in the past".to_string())
            }
        })?;

    Ok(Json(AvailabilityResponse {
        doctor_id,
        date: query.date,
        slots: slots
            .into_iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect(),
    }))
}
