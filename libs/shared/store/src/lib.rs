use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::domain::{
    Appointment, Doctor, FamilyMember, Patient, Transaction, TransactionStatus, Wallet,
};

/// Shared application state handed to every router.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<DataStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: Arc::new(DataStore::new()),
        }
    }
}

type SlotKey = (Uuid, NaiveDate, NaiveTime);

/// Typed in-process record store. Collections are independently locked;
/// the lock maps below provide the critical sections the booking and
/// ledger services build on.
#[derive(Default)]
pub struct DataStore {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
    patients: RwLock<HashMap<Uuid, Patient>>,
    family_members: RwLock<HashMap<Uuid, FamilyMember>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    transactions: RwLock<HashMap<Uuid, Transaction>>,
    wallets: RwLock<HashMap<Uuid, Wallet>>,
    slot_locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
    wallet_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    reconcile_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Doctors / patients / family members
    // ==========================================================================

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }

    pub async fn doctor(&self, id: Uuid) -> Option<Doctor> {
        self.doctors.read().await.get(&id).cloned()
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn patient(&self, id: Uuid) -> Option<Patient> {
        self.patients.read().await.get(&id).cloned()
    }

    pub async fn insert_family_member(&self, member: FamilyMember) {
        self.family_members.write().await.insert(member.id, member);
    }

    pub async fn family_member(&self, id: Uuid) -> Option<FamilyMember> {
        self.family_members.read().await.get(&id).cloned()
    }

    // ==========================================================================
    // Appointments
    // ==========================================================================

    pub async fn insert_appointment(&self, appointment: Appointment) {
        debug!("Storing appointment {}", appointment.id);
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment);
    }

    pub async fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.read().await.get(&id).cloned()
    }

    /// Apply a mutation to an appointment and return the updated record.
    pub async fn update_appointment<F>(&self, id: Uuid, mutate: F) -> Option<Appointment>
    where
        F: FnOnce(&mut Appointment),
    {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments.get_mut(&id)?;
        mutate(appointment);
        appointment.updated_at = Utc::now();
        Some(appointment.clone())
    }

    pub async fn appointments_for_doctor_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Vec<Appointment> {
        self.appointments
            .read()
            .await
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date)
            .cloned()
            .collect()
    }

    /// A patient's appointments, newest first.
    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        appointments
    }

    // ==========================================================================
    // Transactions
    // ==========================================================================

    pub async fn insert_transaction(&self, transaction: Transaction) {
        debug!(
            "Storing transaction {} ({})",
            transaction.id, transaction.reference
        );
        self.transactions
            .write()
            .await
            .insert(transaction.id, transaction);
    }

    pub async fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.transactions.read().await.get(&id).cloned()
    }

    /// The transaction funding an appointment. At most one exists.
    pub async fn transaction_for_appointment(&self, appointment_id: Uuid) -> Option<Transaction> {
        self.transactions
            .read()
            .await
            .values()
            .find(|t| t.appointment_id == Some(appointment_id))
            .cloned()
    }

    pub async fn transaction_by_reference(&self, reference: &str) -> Option<Transaction> {
        self.transactions
            .read()
            .await
            .values()
            .find(|t| t.reference == reference)
            .cloned()
    }

    pub async fn update_transaction<F>(&self, id: Uuid, mutate: F) -> Option<Transaction>
    where
        F: FnOnce(&mut Transaction),
    {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions.get_mut(&id)?;
        mutate(transaction);
        transaction.updated_at = Utc::now();
        Some(transaction.clone())
    }

    /// A patient's transaction history, newest first.
    pub async fn transactions_for_patient(&self, patient_id: Uuid) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|t| t.patient_id == patient_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions
    }

    /// Pending transactions created before the cutoff; the expiry sweep
    /// feeds these back through the reconciliation path.
    pub async fn pending_transactions_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Vec<Transaction> {
        self.transactions
            .read()
            .await
            .values()
            .filter(|t| t.status == TransactionStatus::Pending && t.created_at < cutoff)
            .cloned()
            .collect()
    }

    // ==========================================================================
    // Wallets
    // ==========================================================================

    /// One wallet per patient, created implicitly on first access.
    pub async fn wallet(&self, patient_id: Uuid) -> Wallet {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(patient_id)
            .or_insert_with(|| Wallet::new(patient_id))
            .clone()
    }

    pub async fn update_wallet<F>(&self, patient_id: Uuid, mutate: F) -> Wallet
    where
        F: FnOnce(&mut Wallet),
    {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets
            .entry(patient_id)
            .or_insert_with(|| Wallet::new(patient_id));
        mutate(wallet);
        wallet.clone()
    }

    // ==========================================================================
    // Critical sections
    // ==========================================================================

    /// Mutex guarding one (doctor, date, time) slot. Holding it makes the
    /// availability re-check and the appointment insert a single atomic
    /// unit, so two concurrent bookings cannot both win the slot.
    pub async fn slot_guard(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Arc<Mutex<()>> {
        let mut locks = self.slot_locks.lock().await;
        locks
            .entry((doctor_id, date, time))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Mutex serializing balance changes on one wallet. Two concurrent
    /// debits must never read the same pre-debit balance.
    pub async fn wallet_guard(&self, patient_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.wallet_locks.lock().await;
        locks
            .entry(patient_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Mutex serializing reconciliation of one transaction reference, so
    /// a redelivered callback observes the first delivery's terminal state.
    pub async fn reconcile_guard(&self, reference: &str) -> Arc<Mutex<()>> {
        let mut locks = self.reconcile_locks.lock().await;
        locks
            .entry(reference.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
