use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_store::DataStore;

use crate::models::AvailabilityError;

/// Computes bookable slots by subtracting occupied times from the
/// doctor's daily working-hours grid. Read-only; safe to call
/// concurrently with bookings in flight.
pub struct SlotAvailabilityService {
    store: Arc<DataStore>,
}

impl SlotAvailabilityService {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    /// Open slot start times for a doctor on a date, ascending. An unknown
    /// doctor, an inactive doctor, or a fully booked day all yield an empty
    /// list; only a past date is an error.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AvailabilityError> {
        if date < Utc::now().date_naive() {
            return Err(AvailabilityError::PastDate);
        }

        let Some(doctor) = self.store.doctor(doctor_id).await else {
            debug!("No doctor {} - returning no availability", doctor_id);
            return Ok(vec![]);
        };
        if !doctor.is_active {
            return Ok(vec![]);
        }

        let occupied = self.occupied_times(doctor_id, date).await;

        let slots: Vec<NaiveTime> = doctor
            .schedule
            .grid()
            .into_iter()
            .filter(|slot| !occupied.contains(slot))
            .collect();

        debug!(
            "Doctor {} has {} open slots on {}",
            doctor_id,
            slots.len(),
            date
        );
        Ok(slots)
    }

    /// Whether one specific slot is on the doctor's grid and unoccupied.
    /// The booking orchestrator calls this under the slot lock to close
    /// the race between quote and submit.
    pub async fn is_bookable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, AvailabilityError> {
        if date < Utc::now().date_naive() {
            return Err(AvailabilityError::PastDate);
        }

        let Some(doctor) = self.store.doctor(doctor_id).await else {
            return Ok(false);
        };
        if !doctor.is_active || !doctor.schedule.contains(time) {
            return Ok(false);
        }

        Ok(!self.occupied_times(doctor_id, date).await.contains(&time))
    }

    /// Times held by any non-cancelled appointment. Cancelled bookings
    /// release their slot back to this computation automatically.
    async fn occupied_times(&self, doctor_id: Uuid, date: NaiveDate) -> HashSet<NaiveTime> {
        self.store
            .appointments_for_doctor_date(doctor_id, date)
            .await
            .into_iter()
            .filter(|a| a.occupies_slot())
            .map(|a| a.time)
            .collect()
    }
}
