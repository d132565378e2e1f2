use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::AvailabilityError;
use availability_cell::services::slots::SlotAvailabilityService;
use payment_cell::models::PaymentOrder;
use payment_cell::services::gateway::PaymentGatewayAdapter;
use payment_cell::services::reconcile::TransactionReconciler;
use shared_config::AppConfig;
use shared_store::DataStore;
use shared_models::domain::{
    Appointment, AppointmentStatus, Doctor, PaymentMethod, TransactionStatus, TransactionType,
};
use wallet_cell::services::ledger::WalletLedgerService;

use crate::models::{BookingError, BookingResponse, CreateBookingRequest};
use crate::services::lifecycle::AppointmentLifecycleService;

/// The booking state machine. Takes a booking request through slot
/// validation and one of the three payment paths, and owns the explicit
/// cancellation and completion transitions afterwards.
pub struct BookingService {
    store: Arc<DataStore>,
    availability: SlotAvailabilityService,
    ledger: WalletLedgerService,
    gateway: PaymentGatewayAdapter,
    reconciler: TransactionReconciler,
    lifecycle: AppointmentLifecycleService,
    appointment_return_url: String,
}

impl BookingService {
    pub fn new(store: Arc<DataStore>, config: &AppConfig) -> Self {
        Self {
            availability: SlotAvailabilityService::new(Arc::clone(&store)),
            ledger: WalletLedgerService::new(Arc::clone(&store)),
            gateway: PaymentGatewayAdapter::new(config),
            reconciler: TransactionReconciler::new(Arc::clone(&store)),
            lifecycle: AppointmentLifecycleService::new(),
            appointment_return_url: config.gateway_appointment_return_url.clone(),
            store,
        }
    }

    /// Create a booking and resolve its payment path. The slot re-check
    /// and everything that commits the slot run under the slot's mutex,
    /// so two concurrent requests for the same slot cannot both win.
    pub async fn create_booking(
        &self,
        patient_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, BookingError> {
        info!(
            "Booking request: patient {} with doctor {} on {} at {}",
            patient_id, request.doctor_id, request.date, request.time
        );

        let doctor = self.validate_request(patient_id, &request).await?;

        let guard = self
            .store
            .slot_guard(request.doctor_id, request.date, request.time)
            .await;
        let _locked = guard.lock().await;

        // Re-check against the resolver now that the slot is locked; this
        // closes the race between quote and submit.
        let bookable = self
            .availability
            .is_bookable(request.doctor_id, request.date, request.time)
            .await
            .map_err(|e| match e {
                AvailabilityError::PastDate => BookingError::PastDate,
            })?;
        if !bookable {
            warn!(
                "Slot conflict for doctor {} on {} at {}",
                request.doctor_id, request.date, request.time
            );
            return Err(BookingError::SlotTaken);
        }

        let fee = doctor.consultation_fee;

        if fee == 0 {
            // Nothing to pay; no transaction is created at all.
            let appointment = self
                .insert_appointment(patient_id, &request, fee, AppointmentStatus::Confirmed)
                .await;
            return Ok(BookingResponse {
                appointment,
                payment_url: None,
                transaction_ref: None,
            });
        }

        match request.payment_method {
            PaymentMethod::Cash => {
                let appointment = self
                    .insert_appointment(patient_id, &request, fee, AppointmentStatus::Confirmed)
                    .await;
                self.ledger
                    .record_cash_payment(
                        patient_id,
                        fee,
                        appointment.id,
                        &format!("Consultation fee - {}", doctor.full_name),
                    )
                    .await;
                info!("Appointment {} confirmed (cash on site)", appointment.id);
                Ok(BookingResponse {
                    appointment,
                    payment_url: None,
                    transaction_ref: None,
                })
            }
            PaymentMethod::Wallet => {
                // Debit first: if funds are short the booking fails whole,
                // with no appointment left behind.
                let appointment_id = Uuid::new_v4();
                let transaction = self
                    .ledger
                    .debit(
                        patient_id,
                        fee,
                        Some(appointment_id),
                        &format!("Consultation fee - {}", doctor.full_name),
                    )
                    .await?;

                let appointment = self
                    .insert_appointment_with_id(
                        appointment_id,
                        patient_id,
                        &request,
                        fee,
                        AppointmentStatus::Confirmed,
                    )
                    .await;
                info!(
                    "Appointment {} confirmed (wallet debit {})",
                    appointment.id, transaction.reference
                );
                Ok(BookingResponse {
                    appointment,
                    payment_url: None,
                    transaction_ref: None,
                })
            }
            PaymentMethod::Gateway => {
                let appointment = self
                    .insert_appointment(
                        patient_id,
                        &request,
                        fee,
                        AppointmentStatus::PendingPayment,
                    )
                    .await;

                let reference = format!("APT-{}", Uuid::new_v4());
                let now = Utc::now();
                self.store
                    .insert_transaction(shared_models::domain::Transaction {
                        id: Uuid::new_v4(),
                        patient_id,
                        appointment_id: Some(appointment.id),
                        reference: reference.clone(),
                        amount: fee,
                        transaction_type: TransactionType::Payment,
                        payment_method: PaymentMethod::Gateway,
                        gateway_ref: None,
                        points_earned: 0,
                        description: format!("Consultation fee - {}", doctor.full_name),
                        status: TransactionStatus::Pending,
                        created_at: now,
                        updated_at: now,
                    })
                    .await;

                let payment_url = self.gateway.build_redirect(&PaymentOrder {
                    reference: reference.clone(),
                    amount: fee,
                    order_info: format!("Consultation fee - {}", doctor.full_name),
                    return_url: self.appointment_return_url.clone(),
                });

                info!(
                    "Appointment {} pending payment, redirect issued ({})",
                    appointment.id, reference
                );
                Ok(BookingResponse {
                    appointment,
                    payment_url: Some(payment_url),
                    transaction_ref: Some(reference),
                })
            }
        }
    }

    /// Cancel an appointment on the patient's behalf, refunding a
    /// completed wallet payment back to the ledger.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        debug!("Cancelling appointment {}", appointment_id);

        let appointment = self
            .store
            .appointment(appointment_id)
            .await
            .ok_or(BookingError::NotFound)?;

        if appointment.patient_id != patient_id {
            return Err(BookingError::NotOwned);
        }

        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        // A pending gateway payment is terminalized through the
        // reconciler so the transaction cannot complete afterwards.
        if appointment.status == AppointmentStatus::PendingPayment {
            if let Some(transaction) = self.store.transaction_for_appointment(appointment_id).await
            {
                if let Ok(outcome) = self
                    .reconciler
                    .fail_pending(&transaction.reference, "Cancelled by patient")
                    .await
                {
                    if let Some(cancelled) = outcome.appointment {
                        info!("Appointment {} cancelled before payment", appointment_id);
                        return Ok(cancelled);
                    }
                }
            }
        }

        if appointment.payment_method == PaymentMethod::Wallet && appointment.fee > 0 {
            let funding = self.store.transaction_for_appointment(appointment_id).await;
            if matches!(funding, Some(ref t) if t.status == TransactionStatus::Completed) {
                self.ledger
                    .credit(
                        patient_id,
                        appointment.fee,
                        TransactionType::Refund,
                        Some(appointment_id),
                        &format!(
                            "Refund for cancelled appointment on {} at {}",
                            appointment.date, appointment.time
                        ),
                    )
                    .await?;
                info!(
                    "Refund processed for cancelled appointment {}",
                    appointment_id
                );
            }
        }

        let cancelled = self
            .store
            .update_appointment(appointment_id, |a| {
                a.status = AppointmentStatus::Cancelled;
                a.cancellation_reason = Some("Cancelled by patient".to_string());
            })
            .await
            .ok_or(BookingError::NotFound)?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Move a confirmed appointment to COMPLETED once the consultation
    /// has taken place.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        let appointment = self
            .store
            .appointment(appointment_id)
            .await
            .ok_or(BookingError::NotFound)?;

        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Completed)?;

        let completed = self
            .store
            .update_appointment(appointment_id, |a| {
                a.status = AppointmentStatus::Completed;
            })
            .await
            .ok_or(BookingError::NotFound)?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .appointment(appointment_id)
            .await
            .ok_or(BookingError::NotFound)
    }

    pub async fn patient_appointments(&self, patient_id: Uuid) -> Vec<Appointment> {
        self.store.appointments_for_patient(patient_id).await
    }

    async fn validate_request(
        &self,
        patient_id: Uuid,
        request: &CreateBookingRequest,
    ) -> Result<Doctor, BookingError> {
        let doctor = self
            .store
            .doctor(request.doctor_id)
            .await
            .ok_or(BookingError::DoctorNotFound)?;
        if !doctor.is_active {
            return Err(BookingError::DoctorInactive);
        }

        if self.store.patient(patient_id).await.is_none() {
            return Err(BookingError::PatientNotFound);
        }

        if let Some(member_id) = request.family_member_id {
            let member = self
                .store
                .family_member(member_id)
                .await
                .ok_or(BookingError::FamilyMemberNotFound)?;
            if member.patient_id != patient_id {
                return Err(BookingError::FamilyMemberNotFound);
            }
        }

        if request.date < Utc::now().date_naive() {
            return Err(BookingError::PastDate);
        }
        if !doctor.schedule.contains(request.time) {
            return Err(BookingError::InvalidTime(format!(
                "{} is not on the doctor's schedule",
                request.time.format("%H:%M")
            )));
        }

        Ok(doctor)
    }

    async fn insert_appointment(
        &self,
        patient_id: Uuid,
        request: &CreateBookingRequest,
        fee: i64,
        status: AppointmentStatus,
    ) -> Appointment {
        self.insert_appointment_with_id(Uuid::new_v4(), patient_id, request, fee, status)
            .await
    }

    async fn insert_appointment_with_id(
        &self,
        id: Uuid,
        patient_id: Uuid,
        request: &CreateBookingRequest,
        fee: i64,
        status: AppointmentStatus,
    ) -> Appointment {
        let now = Utc::now();
        let appointment = Appointment {
            id,
            doctor_id: request.doctor_id,
            patient_id,
            family_member_id: request.family_member_id,
            date: request.date,
            time: request.time,
            fee,
            notes: request.notes.clone(),
            payment_method: request.payment_method,
            status,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_appointment(appointment.clone()).await;
        appointment
    }
}
