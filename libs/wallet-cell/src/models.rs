use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::domain::{
    LoyaltyTier, PaymentMethod, Transaction, TransactionStatus, TransactionType, Wallet,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletView {
    pub balance: i64,
    pub loyalty_points: i64,
    pub loyalty_tier: LoyaltyTier,
}

impl From<Wallet> for WalletView {
    fn from(wallet: Wallet) -> Self {
        Self {
            balance: wallet.balance,
            loyalty_points: wallet.loyalty_points,
            loyalty_tier: wallet.tier(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionHistoryQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub points_earned: i64,
    pub description: String,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            transaction_type: t.transaction_type,
            amount: t.amount,
            points_earned: t.points_earned,
            description: t.description,
            status: t.status,
            payment_method: t.payment_method,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionView>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub current_page: usize,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("Insufficient wallet balance: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
