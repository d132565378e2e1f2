use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, NaiveTime, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use booking_cell::models::{BookingError, CreateBookingRequest};
use booking_cell::router::appointment_routes;
use booking_cell::services::booking::BookingService;
use shared_models::domain::{
    AppointmentStatus, PaymentMethod, TransactionStatus, TransactionType,
};
use shared_store::DataStore;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestData, TestUser};
use wallet_cell::models::WalletError;

fn slot(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn booking_request(doctor_id: Uuid, method: PaymentMethod) -> CreateBookingRequest {
    CreateBookingRequest {
        doctor_id,
        family_member_id: None,
        date: Utc::now().date_naive() + Duration::days(7),
        time: slot(9, 0),
        notes: Some("First visit".to_string()),
        payment_method: method,
    }
}

fn service(store: &Arc<DataStore>) -> BookingService {
    BookingService::new(Arc::clone(store), &TestConfig::default().to_app_config())
}

#[tokio::test]
async fn zero_fee_booking_confirms_without_a_transaction() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let patient = TestData::seed_patient(&store).await;

    let response = service(&store)
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(response.appointment.status, AppointmentStatus::Confirmed);
    assert!(response.payment_url.is_none());
    assert!(store.transactions_for_patient(patient.id).await.is_empty());
}

#[tokio::test]
async fn cash_booking_confirms_with_record_keeping_transaction() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let patient = TestData::seed_patient(&store).await;

    let response = service(&store)
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(response.appointment.status, AppointmentStatus::Confirmed);

    let transaction = store
        .transaction_for_appointment(response.appointment.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.payment_method, PaymentMethod::Cash);
    // Cash changes hands outside the system
    assert_eq!(store.wallet(patient.id).await.balance, 0);
}

#[tokio::test]
async fn wallet_booking_debits_and_confirms_atomically() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let patient = TestData::seed_patient(&store).await;
    TestData::fund_wallet(&store, patient.id, 500_000).await;

    let response = service(&store)
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Wallet))
        .await
        .unwrap();

    assert_eq!(response.appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(store.wallet(patient.id).await.balance, 300_000);

    let transaction = store
        .transaction_for_appointment(response.appointment.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.transaction_type, TransactionType::Payment);
    assert_eq!(transaction.amount, 200_000);
}

#[tokio::test]
async fn insufficient_funds_creates_no_appointment() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 100_000).await;
    let patient = TestData::seed_patient(&store).await;
    TestData::fund_wallet(&store, patient.id, 50_000).await;

    let result = service(&store)
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Wallet))
        .await;

    assert_matches!(
        result,
        Err(BookingError::Wallet(WalletError::InsufficientFunds {
            required: 100_000,
            available: 50_000
        }))
    );
    assert_eq!(store.wallet(patient.id).await.balance, 50_000);
    assert!(store.appointments_for_patient(patient.id).await.is_empty());
    assert!(store.transactions_for_patient(patient.id).await.is_empty());
}

#[tokio::test]
async fn gateway_booking_stays_pending_and_returns_redirect() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let patient = TestData::seed_patient(&store).await;

    let response = service(&store)
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Gateway))
        .await
        .unwrap();

    assert_eq!(
        response.appointment.status,
        AppointmentStatus::PendingPayment
    );
    let payment_url = response.payment_url.unwrap();
    // 200_000 scaled x100 on the wire
    assert!(payment_url.contains("amount=20000000"));

    let reference = response.transaction_ref.unwrap();
    let transaction = store.transaction_by_reference(&reference).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.appointment_id, Some(response.appointment.id));
    // No money moved yet
    assert_eq!(store.wallet(patient.id).await.balance, 0);
}

#[tokio::test]
async fn taken_slot_is_rejected_even_while_pending_payment() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let first = TestData::seed_patient(&store).await;
    let second = TestData::seed_patient(&store).await;

    service(&store)
        .create_booking(first.id, booking_request(doctor.id, PaymentMethod::Gateway))
        .await
        .unwrap();

    let result = service(&store)
        .create_booking(second.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await;
    assert_matches!(result, Err(BookingError::SlotTaken));
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_resolve_to_a_single_winner() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let service = Arc::new(BookingService::new(
        Arc::clone(&store),
        &TestConfig::default().to_app_config(),
    ));

    let mut patients = Vec::new();
    for _ in 0..4 {
        patients.push(TestData::seed_patient(&store).await);
    }

    let attempts: Vec<_> = patients
        .iter()
        .map(|p| {
            let service = Arc::clone(&service);
            let patient_id = p.id;
            let doctor_id = doctor.id;
            tokio::spawn(async move {
                service
                    .create_booking(patient_id, booking_request(doctor_id, PaymentMethod::Cash))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one booking may win the slot");
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(BookingError::SlotTaken));
    }

    let date = Utc::now().date_naive() + Duration::days(7);
    let holding = store
        .appointments_for_doctor_date(doctor.id, date)
        .await
        .into_iter()
        .filter(|a| a.time == slot(9, 0) && a.occupies_slot())
        .count();
    assert_eq!(holding, 1);
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let first = TestData::seed_patient(&store).await;
    let second = TestData::seed_patient(&store).await;
    let service = service(&store);

    let booked = service
        .create_booking(first.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();
    service
        .cancel_appointment(booked.appointment.id, first.id)
        .await
        .unwrap();

    let rebooked = service
        .create_booking(second.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(rebooked.appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn family_member_bookings_are_ownership_checked() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let patient = TestData::seed_patient(&store).await;
    let other = TestData::seed_patient(&store).await;
    let member = TestData::seed_family_member(&store, patient.id).await;
    let service = service(&store);

    let mut request = booking_request(doctor.id, PaymentMethod::Cash);
    request.family_member_id = Some(member.id);
    let response = service.create_booking(patient.id, request).await.unwrap();
    assert_eq!(response.appointment.family_member_id, Some(member.id));

    let mut foreign = booking_request(doctor.id, PaymentMethod::Cash);
    foreign.time = slot(9, 30);
    foreign.family_member_id = Some(member.id);
    let result = service.create_booking(other.id, foreign).await;
    assert_matches!(result, Err(BookingError::FamilyMemberNotFound));
}

#[tokio::test]
async fn past_dates_and_off_grid_times_are_rejected() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let patient = TestData::seed_patient(&store).await;
    let service = service(&store);

    let mut past = booking_request(doctor.id, PaymentMethod::Cash);
    past.date = Utc::now().date_naive() - Duration::days(1);
    assert_matches!(
        service.create_booking(patient.id, past).await,
        Err(BookingError::PastDate)
    );

    let mut off_grid = booking_request(doctor.id, PaymentMethod::Cash);
    off_grid.time = slot(9, 15);
    assert_matches!(
        service.create_booking(patient.id, off_grid).await,
        Err(BookingError::InvalidTime(_))
    );

    let mut lunch = booking_request(doctor.id, PaymentMethod::Cash);
    lunch.time = slot(12, 30);
    assert_matches!(
        service.create_booking(patient.id, lunch).await,
        Err(BookingError::InvalidTime(_))
    );
}

#[tokio::test]
async fn cancelling_a_wallet_paid_appointment_refunds_and_claws_back_points() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let patient = TestData::seed_patient(&store).await;
    TestData::fund_wallet(&store, patient.id, 200_000).await;
    let service = service(&store);

    let booked = service
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Wallet))
        .await
        .unwrap();
    assert_eq!(store.wallet(patient.id).await.balance, 0);
    assert_eq!(store.wallet(patient.id).await.loyalty_points, 2_000);

    let cancelled = service
        .cancel_appointment(booked.appointment.id, patient.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let wallet = store.wallet(patient.id).await;
    assert_eq!(wallet.balance, 200_000);
    assert_eq!(wallet.loyalty_points, 0);

    let refund = store
        .transactions_for_patient(patient.id)
        .await
        .into_iter()
        .find(|t| t.transaction_type == TransactionType::Refund)
        .unwrap();
    assert_eq!(refund.amount, 200_000);
    assert_eq!(refund.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn cancelling_a_pending_payment_booking_fails_its_transaction() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 200_000).await;
    let patient = TestData::seed_patient(&store).await;
    let service = service(&store);

    let booked = service
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Gateway))
        .await
        .unwrap();
    let reference = booked.transaction_ref.unwrap();

    let cancelled = service
        .cancel_appointment(booked.appointment.id, patient.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let transaction = store.transaction_by_reference(&reference).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn completed_and_cancelled_appointments_cannot_be_cancelled_again() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let patient = TestData::seed_patient(&store).await;
    let service = service(&store);

    let booked = service
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();
    let completed = service
        .complete_appointment(booked.appointment.id)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_matches!(
        service
            .cancel_appointment(booked.appointment.id, patient.id)
            .await,
        Err(BookingError::InvalidStatusTransition(
            AppointmentStatus::Completed
        ))
    );
}

#[tokio::test]
async fn cancellation_is_owner_only() {
    let store = Arc::new(DataStore::new());
    let doctor = TestData::seed_doctor(&store, 0).await;
    let patient = TestData::seed_patient(&store).await;
    let stranger = TestData::seed_patient(&store).await;
    let service = service(&store);

    let booked = service
        .create_booking(patient.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();

    assert_matches!(
        service
            .cancel_appointment(booked.appointment.id, stranger.id)
            .await,
        Err(BookingError::NotOwned)
    );
}

#[tokio::test]
async fn booking_endpoint_returns_created_appointment() {
    let test_config = TestConfig::default();
    let state = test_config.to_app_state();
    let doctor = TestData::seed_doctor(&state.store, 200_000).await;
    let patient = TestData::seed_patient(&state.store).await;
    let date = Utc::now().date_naive() + Duration::days(7);

    let app = appointment_routes(state.clone());
    let user = TestUser::for_patient(patient.id);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&user, &test_config.jwt_secret),
                )
                .body(Body::from(
                    json!({
                        "doctor_id": doctor.id,
                        "family_member_id": null,
                        "date": date,
                        "time": "09:00:00",
                        "notes": "First visit",
                        "payment_method": "GATEWAY"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["appointment"]["status"], "pending_payment");
    assert!(body["payment_url"].as_str().unwrap().contains("txn_ref"));
}

#[tokio::test]
async fn conflicting_booking_maps_to_http_conflict() {
    let test_config = TestConfig::default();
    let state = test_config.to_app_state();
    let doctor = TestData::seed_doctor(&state.store, 0).await;
    let first = TestData::seed_patient(&state.store).await;
    let second = TestData::seed_patient(&state.store).await;
    let date = Utc::now().date_naive() + Duration::days(7);

    let service = BookingService::new(Arc::clone(&state.store), &state.config);
    service
        .create_booking(first.id, booking_request(doctor.id, PaymentMethod::Cash))
        .await
        .unwrap();

    let app = appointment_routes(state.clone());
    let user = TestUser::for_patient(second.id);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&user, &test_config.jwt_secret),
                )
                .body(Body::from(
                    json!({
                        "doctor_id": doctor.id,
                        "family_member_id": null,
                        "date": date,
                        "time": "09:00:00",
                        "notes": null,
                        "payment_method": "CASH"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}
