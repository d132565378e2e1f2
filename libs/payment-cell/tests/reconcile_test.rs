use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveTime, Utc};
use uuid::Uuid;

use payment_cell::models::{failure_reason_for, GatewayCallback, ReconcileError};
use payment_cell::services::reconcile::TransactionReconciler;
use shared_models::domain::{
    Appointment, AppointmentStatus, PaymentMethod, Transaction, TransactionStatus,
    TransactionType,
};
use shared_store::DataStore;
use shared_utils::test_utils::TestData;

struct PendingPayment {
    appointment_id: Uuid,
    reference: String,
    patient_id: Uuid,
}

async fn seed_pending_payment(store: &DataStore, fee: i64) -> PendingPayment {
    let doctor = TestData::seed_doctor(store, fee).await;
    let patient = TestData::seed_patient(store).await;
    let now = Utc::now();

    let appointment_id = Uuid::new_v4();
    store
        .insert_appointment(Appointment {
            id: appointment_id,
            doctor_id: doctor.id,
            patient_id: patient.id,
            family_member_id: None,
            date: Utc::now().date_naive() + Duration::days(7),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            fee,
            notes: None,
            payment_method: PaymentMethod::Gateway,
            status: AppointmentStatus::PendingPayment,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        })
        .await;

    let reference = format!("APT-{}", Uuid::new_v4());
    store
        .insert_transaction(Transaction {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            appointment_id: Some(appointment_id),
            reference: reference.clone(),
            amount: fee,
            transaction_type: TransactionType::Payment,
            payment_method: PaymentMethod::Gateway,
            gateway_ref: None,
            points_earned: 0,
            description: "Consultation fee".to_string(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        })
        .await;

    PendingPayment {
        appointment_id,
        reference,
        patient_id: patient.id,
    }
}

fn success_callback(reference: &str, amount: i64) -> GatewayCallback {
    GatewayCallback {
        success: true,
        response_code: "00".to_string(),
        reference: reference.to_string(),
        gateway_ref: Some("14422574".to_string()),
        amount: Some(amount),
        bank_code: Some("NCB".to_string()),
        order_info: None,
        pay_date: None,
        failure_reason: None,
    }
}

fn failure_callback(reference: &str, code: &str) -> GatewayCallback {
    GatewayCallback {
        success: false,
        response_code: code.to_string(),
        reference: reference.to_string(),
        gateway_ref: None,
        amount: None,
        bank_code: None,
        order_info: None,
        pay_date: None,
        failure_reason: Some(failure_reason_for(code).to_string()),
    }
}

#[tokio::test]
async fn success_confirms_appointment_and_completes_transaction() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler
        .reconcile(&success_callback(&pending.reference, 200_000))
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert_eq!(outcome.transaction.gateway_ref.as_deref(), Some("14422574"));
    assert_eq!(
        outcome.appointment.unwrap().status,
        AppointmentStatus::Confirmed
    );
}

#[tokio::test]
async fn user_cancellation_fails_transaction_and_releases_slot() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler
        .reconcile(&failure_callback(&pending.reference, "24"))
        .await
        .unwrap();

    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
    let appointment = outcome.appointment.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(
        appointment.cancellation_reason.as_deref(),
        Some("Transaction cancelled by the customer")
    );
    // A cancelled appointment no longer occupies its slot
    assert!(!appointment.occupies_slot());
}

#[tokio::test]
async fn replayed_callback_is_a_no_op() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;
    let callback = success_callback(&pending.reference, 200_000);

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let first = reconciler.reconcile(&callback).await.unwrap();
    let second = reconciler.reconcile(&callback).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.transaction.status, TransactionStatus::Completed);
    assert_eq!(
        second.transaction.updated_at,
        first.transaction.updated_at,
        "replay must not touch the record"
    );
    assert_eq!(
        second.appointment.unwrap().status,
        AppointmentStatus::Confirmed
    );
}

#[tokio::test]
async fn failure_replay_after_failure_keeps_terminal_state() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    reconciler
        .reconcile(&failure_callback(&pending.reference, "24"))
        .await
        .unwrap();

    // A late success for the same reference must not resurrect anything
    let late = reconciler
        .reconcile(&success_callback(&pending.reference, 200_000))
        .await
        .unwrap();
    assert!(late.replayed);
    assert_eq!(late.transaction.status, TransactionStatus::Failed);
    assert_eq!(
        late.appointment.unwrap().status,
        AppointmentStatus::Cancelled
    );
}

#[tokio::test]
async fn amount_mismatch_is_a_failure() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler
        .reconcile(&success_callback(&pending.reference, 150_000))
        .await
        .unwrap();

    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
    assert_eq!(
        outcome.appointment.unwrap().status,
        AppointmentStatus::Cancelled
    );
}

#[tokio::test]
async fn success_without_echoed_amount_does_not_confirm() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let mut callback = success_callback(&pending.reference, 200_000);
    callback.amount = None;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler.reconcile(&callback).await.unwrap();

    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn deposit_success_credits_wallet_once() {
    let store = Arc::new(DataStore::new());
    let patient = TestData::seed_patient(&store).await;
    let now = Utc::now();
    let reference = format!("DEP-{}", Uuid::new_v4());

    store
        .insert_transaction(Transaction {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            appointment_id: None,
            reference: reference.clone(),
            amount: 500_000,
            transaction_type: TransactionType::Deposit,
            payment_method: PaymentMethod::Gateway,
            gateway_ref: None,
            points_earned: 0,
            description: "Wallet top-up".to_string(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        })
        .await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let callback = success_callback(&reference, 500_000);

    let outcome = reconciler.reconcile(&callback).await.unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert_eq!(outcome.transaction.points_earned, 5_000);

    let wallet = store.wallet(patient.id).await;
    assert_eq!(wallet.balance, 500_000);
    assert_eq!(wallet.loyalty_points, 5_000);

    // Redelivery must not double-credit the ledger
    let replay = reconciler.reconcile(&callback).await.unwrap();
    assert!(replay.replayed);
    let wallet = store.wallet(patient.id).await;
    assert_eq!(wallet.balance, 500_000);
    assert_eq!(wallet.loyalty_points, 5_000);
}

#[tokio::test]
async fn failed_deposit_leaves_wallet_untouched() {
    let store = Arc::new(DataStore::new());
    let patient = TestData::seed_patient(&store).await;
    let now = Utc::now();
    let reference = format!("DEP-{}", Uuid::new_v4());

    store
        .insert_transaction(Transaction {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            appointment_id: None,
            reference: reference.clone(),
            amount: 500_000,
            transaction_type: TransactionType::Deposit,
            payment_method: PaymentMethod::Gateway,
            gateway_ref: None,
            points_earned: 0,
            description: "Wallet top-up".to_string(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        })
        .await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler
        .reconcile(&failure_callback(&reference, "51"))
        .await
        .unwrap();

    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
    assert!(outcome.appointment.is_none());
    assert_eq!(store.wallet(patient.id).await.balance, 0);
}

#[tokio::test]
async fn fail_pending_terminalizes_and_is_idempotent() {
    let store = Arc::new(DataStore::new());
    let pending = seed_pending_payment(&store, 200_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    let outcome = reconciler
        .fail_pending(&pending.reference, "payment timed out")
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.transaction.status, TransactionStatus::Failed);
    let appointment = outcome.appointment.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(
        appointment.cancellation_reason.as_deref(),
        Some("payment timed out")
    );

    let again = reconciler
        .fail_pending(&pending.reference, "payment timed out")
        .await
        .unwrap();
    assert!(again.replayed);
}

#[tokio::test]
async fn unknown_reference_is_an_error() {
    let store = Arc::new(DataStore::new());
    let reconciler = TransactionReconciler::new(Arc::clone(&store));

    let result = reconciler.reconcile(&success_callback("APT-missing", 1)).await;
    assert_matches!(result, Err(ReconcileError::TransactionNotFound(_)));
}

#[tokio::test]
async fn payment_appointment_consistency_holds_either_way() {
    let store = Arc::new(DataStore::new());

    // Success path
    let a = seed_pending_payment(&store, 100_000).await;
    // Failure path
    let b = seed_pending_payment(&store, 100_000).await;

    let reconciler = TransactionReconciler::new(Arc::clone(&store));
    reconciler
        .reconcile(&success_callback(&a.reference, 100_000))
        .await
        .unwrap();
    reconciler
        .reconcile(&failure_callback(&b.reference, "11"))
        .await
        .unwrap();

    let tx_a = store.transaction_by_reference(&a.reference).await.unwrap();
    let apt_a = store.appointment(a.appointment_id).await.unwrap();
    assert_eq!(apt_a.status, AppointmentStatus::Confirmed);
    assert_eq!(tx_a.status, TransactionStatus::Completed);

    let tx_b = store.transaction_by_reference(&b.reference).await.unwrap();
    let apt_b = store.appointment(b.appointment_id).await.unwrap();
    assert_eq!(apt_b.status, AppointmentStatus::Cancelled);
    assert_eq!(tx_b.status, TransactionStatus::Failed);

    let _ = (a.patient_id, b.patient_id);
}
