use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_store::DataStore;
use shared_models::domain::{
    PaymentMethod, Transaction, TransactionStatus, TransactionType,
};

use crate::models::{TransactionPage, TransactionView, WalletError};

pub const MIN_TOP_UP_AMOUNT: i64 = 10_000;
pub const MAX_TOP_UP_AMOUNT: i64 = 50_000_000;

/// Point-accrual policy for completed payments and deposits. Kept behind a
/// trait so the rate can change without touching ledger call sites.
pub trait LoyaltyPolicy: Send + Sync {
    fn points_for(&self, amount: i64) -> i64;
}

/// Default accrual: 1 point per 100 currency units, floor division.
pub struct PercentagePolicy;

impl LoyaltyPolicy for PercentagePolicy {
    fn points_for(&self, amount: i64) -> i64 {
        amount / 100
    }
}

/// All wallet balance changes go through this service; each one is backed
/// by exactly one transaction record, written under the wallet's mutex.
pub struct WalletLedgerService {
    store: Arc<DataStore>,
    policy: Arc<dyn LoyaltyPolicy>,
}

impl WalletLedgerService {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            store,
            policy: Arc::new(PercentagePolicy),
        }
    }

    pub fn with_policy(store: Arc<DataStore>, policy: Arc<dyn LoyaltyPolicy>) -> Self {
        Self { store, policy }
    }

    pub async fn balance(&self, patient_id: Uuid) -> i64 {
        self.store.wallet(patient_id).await.balance
    }

    /// Debit the wallet and record the funding transaction as one atomic
    /// unit. Fails without touching anything when funds are short.
    pub async fn debit(
        &self,
        patient_id: Uuid,
        amount: i64,
        appointment_id: Option<Uuid>,
        description: &str,
    ) -> Result<Transaction, WalletError> {
        if amount < 0 {
            return Err(WalletError::InvalidAmount(
                "Debit amount must not be negative".to_string(),
            ));
        }

        let guard = self.store.wallet_guard(patient_id).await;
        let _locked = guard.lock().await;

        let wallet = self.store.wallet(patient_id).await;
        if wallet.balance < amount {
            warn!(
                "Insufficient balance for patient {}: required {}, available {}",
                patient_id, amount, wallet.balance
            );
            return Err(WalletError::InsufficientFunds {
                required: amount,
                available: wallet.balance,
            });
        }

        let points = self.policy.points_for(amount);
        self.store
            .update_wallet(patient_id, |wallet| {
                wallet.balance -= amount;
                wallet.loyalty_points += points;
            })
            .await;

        let transaction = self
            .record_transaction(
                patient_id,
                appointment_id,
                format!("WPAY-{}", Uuid::new_v4()),
                amount,
                TransactionType::Payment,
                PaymentMethod::Wallet,
                points,
                description,
            )
            .await;

        info!(
            "Wallet debit completed for patient {}: amount {}, points {}",
            patient_id, amount, points
        );
        Ok(transaction)
    }

    /// Credit the wallet for a refund or reward. Refunds claw back the
    /// points the original payment earned, floored at zero.
    pub async fn credit(
        &self,
        patient_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        appointment_id: Option<Uuid>,
        description: &str,
    ) -> Result<Transaction, WalletError> {
        if amount < 0 {
            return Err(WalletError::InvalidAmount(
                "Credit amount must not be negative".to_string(),
            ));
        }
        if !transaction_type.is_credit() {
            return Err(WalletError::InvalidAmount(format!(
                "{} is not a credit transaction type",
                transaction_type
            )));
        }

        let guard = self.store.wallet_guard(patient_id).await;
        let _locked = guard.lock().await;

        let points = match transaction_type {
            TransactionType::Refund => -self.policy.points_for(amount),
            _ => self.policy.points_for(amount),
        };

        self.store
            .update_wallet(patient_id, |wallet| {
                wallet.balance += amount;
                wallet.loyalty_points = (wallet.loyalty_points + points).max(0);
            })
            .await;

        let transaction = self
            .record_transaction(
                patient_id,
                appointment_id,
                format!("CRED-{}", Uuid::new_v4()),
                amount,
                transaction_type,
                PaymentMethod::Wallet,
                points,
                description,
            )
            .await;

        info!(
            "Wallet credit completed for patient {}: amount {}, type {}",
            patient_id, amount, transaction_type
        );
        Ok(transaction)
    }

    /// Record-keeping entry for cash paid on site. No balance movement and
    /// no points; the money never passes through the wallet.
    pub async fn record_cash_payment(
        &self,
        patient_id: Uuid,
        amount: i64,
        appointment_id: Uuid,
        description: &str,
    ) -> Transaction {
        self.record_transaction(
            patient_id,
            Some(appointment_id),
            format!("CASH-{}", Uuid::new_v4()),
            amount,
            TransactionType::Payment,
            PaymentMethod::Cash,
            0,
            description,
        )
        .await
    }

    /// Open a gateway top-up: bounds-checked, PENDING until the callback
    /// reconciles it.
    pub async fn create_pending_deposit(
        &self,
        patient_id: Uuid,
        amount: i64,
        description: &str,
    ) -> Result<Transaction, WalletError> {
        if amount < MIN_TOP_UP_AMOUNT {
            return Err(WalletError::InvalidAmount(format!(
                "Top-up amount must be at least {}",
                MIN_TOP_UP_AMOUNT
            )));
        }
        if amount > MAX_TOP_UP_AMOUNT {
            return Err(WalletError::InvalidAmount(format!(
                "Top-up amount must not exceed {}",
                MAX_TOP_UP_AMOUNT
            )));
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            patient_id,
            appointment_id: None,
            reference: format!("DEP-{}", Uuid::new_v4()),
            amount,
            transaction_type: TransactionType::Deposit,
            payment_method: PaymentMethod::Gateway,
            gateway_ref: None,
            points_earned: 0,
            description: description.to_string(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(transaction.clone()).await;

        debug!(
            "Pending deposit {} opened for patient {}: amount {}",
            transaction.reference, patient_id, amount
        );
        Ok(transaction)
    }

    /// Apply a reconciled gateway deposit to the wallet. The transaction
    /// record is finalized by the reconciler; this only moves the balance
    /// and accrues points, returning the points granted.
    pub async fn apply_deposit_credit(&self, patient_id: Uuid, amount: i64) -> i64 {
        let guard = self.store.wallet_guard(patient_id).await;
        let _locked = guard.lock().await;

        let points = self.policy.points_for(amount);
        let wallet = self
            .store
            .update_wallet(patient_id, |wallet| {
                wallet.balance += amount;
                wallet.loyalty_points += points;
            })
            .await;

        info!(
            "Deposit applied for patient {}: amount {}, new balance {}, points {}",
            patient_id, amount, wallet.balance, points
        );
        points
    }

    /// Paginated transaction history, newest first.
    pub async fn transactions(
        &self,
        patient_id: Uuid,
        page: usize,
        size: usize,
    ) -> TransactionPage {
        let size = size.max(1);
        let all = self.store.transactions_for_patient(patient_id).await;
        let total_elements = all.len();
        let total_pages = total_elements.div_ceil(size);

        let transactions = all
            .into_iter()
            .skip(page * size)
            .take(size)
            .map(TransactionView::from)
            .collect();

        TransactionPage {
            transactions,
            total_elements,
            total_pages,
            current_page: page,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_transaction(
        &self,
        patient_id: Uuid,
        appointment_id: Option<Uuid>,
        reference: String,
        amount: i64,
        transaction_type: TransactionType,
        payment_method: PaymentMethod,
        points_earned: i64,
        description: &str,
    ) -> Transaction {
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            patient_id,
            appointment_id,
            reference,
            amount,
            transaction_type,
            payment_method,
            gateway_ref: None,
            points_earned,
            description: description.to_string(),
            status: TransactionStatus::Completed,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(transaction.clone()).await;
        transaction
    }
}
