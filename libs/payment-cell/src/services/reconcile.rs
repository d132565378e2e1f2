use std::sync::Arc;

use tracing::{info, warn};

use shared_store::DataStore;
use shared_models::domain::{
    Appointment, AppointmentStatus, TransactionStatus, TransactionType,
};
use wallet_cell::services::ledger::WalletLedgerService;

use crate::models::{GatewayCallback, ReconcileError, ReconcileOutcome};

/// Merges an asynchronous gateway outcome with the locally pending
/// transaction and drives both the transaction and whatever it funds to a
/// consistent terminal state. The only non-timeout path out of
/// PENDING_PAYMENT.
pub struct TransactionReconciler {
    store: Arc<DataStore>,
    ledger: WalletLedgerService,
}

impl TransactionReconciler {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            ledger: WalletLedgerService::new(Arc::clone(&store)),
            store,
        }
    }

    /// Idempotent: a redelivered callback finds the transaction terminal
    /// and returns the existing state unchanged.
    pub async fn reconcile(
        &self,
        callback: &GatewayCallback,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let guard = self.store.reconcile_guard(&callback.reference).await;
        let _locked = guard.lock().await;

        let transaction = self
            .store
            .transaction_by_reference(&callback.reference)
            .await
            .ok_or_else(|| ReconcileError::TransactionNotFound(callback.reference.clone()))?;

        if transaction.status.is_terminal() {
            info!(
                "Replayed callback for terminal transaction {} - no-op",
                callback.reference
            );
            let appointment = self.appointment_of(&transaction).await;
            return Ok(ReconcileOutcome {
                transaction,
                appointment,
                replayed: true,
            });
        }

        // Echoed amounts are descaled before this comparison; a success
        // without a matching amount must not confirm anything.
        let amount_mismatch = match callback.amount {
            Some(paid) => paid != transaction.amount,
            None => callback.success,
        };

        if callback.success && !amount_mismatch {
            self.finalize_success(&transaction, callback.gateway_ref.clone())
                .await
        } else {
            let reason = if callback.success {
                format!(
                    "Paid amount does not match the transaction amount ({:?} vs {})",
                    callback.amount, transaction.amount
                )
            } else {
                callback
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "Payment failed".to_string())
            };
            self.finalize_failure(&transaction, &reason).await
        }
    }

    /// Terminalize a pending transaction with no callback - the expiry
    /// sweep path for abandoned redirects.
    pub async fn fail_pending(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let guard = self.store.reconcile_guard(reference).await;
        let _locked = guard.lock().await;

        let transaction = self
            .store
            .transaction_by_reference(reference)
            .await
            .ok_or_else(|| ReconcileError::TransactionNotFound(reference.to_string()))?;

        if transaction.status.is_terminal() {
            let appointment = self.appointment_of(&transaction).await;
            return Ok(ReconcileOutcome {
                transaction,
                appointment,
                replayed: true,
            });
        }

        self.finalize_failure(&transaction, reason).await
    }

    async fn finalize_success(
        &self,
        transaction: &shared_models::domain::Transaction,
        gateway_ref: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut updated = self
            .store
            .update_transaction(transaction.id, |t| {
                t.status = TransactionStatus::Completed;
                t.gateway_ref = gateway_ref;
            })
            .await
            .ok_or_else(|| ReconcileError::TransactionNotFound(transaction.reference.clone()))?;

        let appointment = match transaction.transaction_type {
            TransactionType::Payment => {
                self.transition_appointment(
                    transaction,
                    AppointmentStatus::Confirmed,
                    None,
                )
                .await
            }
            TransactionType::Deposit => {
                let points = self
                    .ledger
                    .apply_deposit_credit(transaction.patient_id, transaction.amount)
                    .await;
                updated = self
                    .store
                    .update_transaction(transaction.id, |t| {
                        t.points_earned = points;
                    })
                    .await
                    .unwrap_or(updated);
                None
            }
            _ => None,
        };

        info!(
            "Transaction {} reconciled as COMPLETED",
            transaction.reference
        );
        Ok(ReconcileOutcome {
            transaction: updated,
            appointment,
            replayed: false,
        })
    }

    async fn finalize_failure(
        &self,
        transaction: &shared_models::domain::Transaction,
        reason: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let updated = self
            .store
            .update_transaction(transaction.id, |t| {
                t.status = TransactionStatus::Failed;
                t.description = format!("{} - {}", t.description, reason);
            })
            .await
            .ok_or_else(|| ReconcileError::TransactionNotFound(transaction.reference.clone()))?;

        let appointment = if transaction.transaction_type == TransactionType::Payment {
            self.transition_appointment(
                transaction,
                AppointmentStatus::Cancelled,
                Some(reason.to_string()),
            )
            .await
        } else {
            None
        };

        info!(
            "Transaction {} reconciled as FAILED: {}",
            transaction.reference, reason
        );
        Ok(ReconcileOutcome {
            transaction: updated,
            appointment,
            replayed: false,
        })
    }

    async fn transition_appointment(
        &self,
        transaction: &shared_models::domain::Transaction,
        next: AppointmentStatus,
        cancellation_reason: Option<String>,
    ) -> Option<Appointment> {
        let appointment_id = transaction.appointment_id?;
        let current = self.store.appointment(appointment_id).await?;

        if !current.status.can_transition_to(&next) {
            warn!(
                "Appointment {} cannot move {} -> {} during reconciliation",
                appointment_id, current.status, next
            );
            return Some(current);
        }

        self.store
            .update_appointment(appointment_id, |a| {
                a.status = next;
                if cancellation_reason.is_some() {
                    a.cancellation_reason = cancellation_reason;
                }
            })
            .await
    }

    async fn appointment_of(
        &self,
        transaction: &shared_models::domain::Transaction,
    ) -> Option<Appointment> {
        match transaction.appointment_id {
            Some(id) => self.store.appointment(id).await,
            None => None,
        }
    }
}
