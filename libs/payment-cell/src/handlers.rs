use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::domain::PaymentMethod;
use shared_models::error::AppError;
use shared_store::AppState;
use wallet_cell::models::WalletError;
use wallet_cell::services::ledger::WalletLedgerService;

use crate::models::{
    GatewayCallback, GatewayError, PaymentOrder, ReconcileOutcome, TopUpRequest, TopUpResponse,
};
use crate::services::gateway::PaymentGatewayAdapter;
use crate::services::reconcile::TransactionReconciler;

#[axum::debug_handler]
pub async fn top_up(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, AppError> {
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Session does not identify a patient".to_string()))?;

    if request.payment_method != PaymentMethod::Gateway {
        return Err(AppError::BadRequest(
            "Wallet top-up is only available through the payment gateway".to_string(),
        ));
    }

    let ledger = WalletLedgerService::new(Arc::clone(&state.store));
    let description = match state.store.patient(patient_id).await {
        Some(patient) => format!("Wallet top-up - {}", patient.full_name),
        None => "Wallet top-up".to_string(),
    };

    let transaction = ledger
        .create_pending_deposit(patient_id, request.amount, &description)
        .await
        .map_err(|e| match e {
            WalletError::InvalidAmount(msg) => AppError::BadRequest(msg),
            WalletError::InsufficientFunds { .. } => AppError::BadRequest(e.to_string()),
        })?;

    let adapter = PaymentGatewayAdapter::new(&state.config);
    let payment_url = adapter.build_redirect(&PaymentOrder {
        reference: transaction.reference.clone(),
        amount: transaction.amount,
        order_info: description,
        return_url: state.config.gateway_return_url.clone(),
    });

    info!(
        "Top-up {} opened for patient {}: amount {}",
        transaction.reference, patient_id, transaction.amount
    );

    Ok(Json(TopUpResponse {
        payment_url,
        transaction_ref: transaction.reference,
        transaction_id: transaction.id,
    }))
}

/// Callback endpoint for wallet top-up payments. Always lands the caller
/// on the frontend result page; the reconciliation outcome rides along in
/// the query string.
#[axum::debug_handler]
pub async fn gateway_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    info!("Gateway callback received with {} params", params.len());
    let result_page = format!("{}/patient/wallet/payment/result", state.config.frontend_url);
    handle_callback(&state, &params, &result_page, false).await
}

/// Callback endpoint for appointment payments; same flow, different
/// result page, and the funded appointment id is surfaced to the caller.
#[axum::debug_handler]
pub async fn appointment_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    info!(
        "Gateway appointment callback received with {} params",
        params.len()
    );
    let result_page = format!(
        "{}/patient/appointment/payment/result",
        state.config.frontend_url
    );
    handle_callback(&state, &params, &result_page, true).await
}

async fn handle_callback(
    state: &AppState,
    params: &HashMap<String, String>,
    result_page: &str,
    include_appointment: bool,
) -> Redirect {
    let adapter = PaymentGatewayAdapter::new(&state.config);
    let reconciler = TransactionReconciler::new(Arc::clone(&state.store));

    let callback = match adapter.parse_callback(params) {
        Ok(callback) => callback,
        Err(GatewayError::InvalidChecksum) => {
            warn!("Invalid gateway checksum");
            // The reference is untrusted here, but the transaction must
            // not stay pending over a forged or corrupted callback.
            if let Some(reference) = params.get("txn_ref").filter(|v| !v.is_empty()) {
                if let Err(e) = reconciler.fail_pending(reference, "Invalid checksum").await {
                    error!("Could not fail transaction {}: {}", reference, e);
                }
            }
            return Redirect::to(&format!(
                "{}?code=97&message={}",
                result_page,
                urlencoding::encode("Invalid checksum")
            ));
        }
        Err(e) => {
            error!("Malformed gateway callback: {}", e);
            return Redirect::to(&format!(
                "{}?code=99&message={}",
                result_page,
                urlencoding::encode("Malformed callback")
            ));
        }
    };

    match reconciler.reconcile(&callback).await {
        Ok(outcome) => Redirect::to(&result_url(
            result_page,
            &callback,
            &outcome,
            include_appointment,
        )),
        Err(e) => {
            error!("Reconciliation failed for {}: {}", callback.reference, e);
            Redirect::to(&format!(
                "{}?code=99&message={}",
                result_page,
                urlencoding::encode("Transaction not found")
            ))
        }
    }
}

fn result_url(
    result_page: &str,
    callback: &GatewayCallback,
    outcome: &ReconcileOutcome,
    include_appointment: bool,
) -> String {
    let mut query = format!(
        "?code={}&txn_ref={}",
        urlencoding::encode(&callback.response_code),
        urlencoding::encode(&callback.reference)
    );

    if include_appointment {
        if let Some(appointment) = &outcome.appointment {
            query.push_str(&format!("&appointment_id={}", appointment.id));
        }
    }
    if let Some(gateway_ref) = &callback.gateway_ref {
        query.push_str(&format!("&transaction_no={}", urlencoding::encode(gateway_ref)));
    }
    if let Some(amount) = callback.amount {
        query.push_str(&format!("&amount={}", amount));
    }
    if let Some(bank_code) = &callback.bank_code {
        query.push_str(&format!("&bank_code={}", urlencoding::encode(bank_code)));
    }
    if let Some(pay_date) = &callback.pay_date {
        query.push_str(&format!(
            "&pay_date={}",
            urlencoding::encode(&pay_date.to_string())
        ));
    }

    let message = if callback.success {
        "Payment successful".to_string()
    } else {
        callback
            .failure_reason
            .clone()
            .unwrap_or_else(|| "Payment failed".to_string())
    };
    query.push_str(&format!("&message={}", urlencoding::encode(&message)));

    format!("{}{}", result_page, query)
}
