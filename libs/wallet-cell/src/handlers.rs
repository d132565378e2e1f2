use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{TransactionHistoryQuery, TransactionPage, WalletView};
use crate::services::ledger::WalletLedgerService;

fn patient_id_from(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Session does not identify a patient".to_string()))
}

#[axum::debug_handler]
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<WalletView>, AppError> {
    let patient_id = patient_id_from(&user)?;

    let wallet = state.store.wallet(patient_id).await;
    Ok(Json(WalletView::from(wallet)))
}

#[axum::debug_handler]
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionHistoryQuery>,
) -> Result<Json<TransactionPage>, AppError> {
    let patient_id = patient_id_from(&user)?;
    let ledger = WalletLedgerService::new(Arc::clone(&state.store));

    let page = ledger
        .transactions(
            patient_id,
            query.page.unwrap_or(0),
            query.size.unwrap_or(10),
        )
        .await;

    Ok(Json(page))
}
