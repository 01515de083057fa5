use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::ServiceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Commission,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Commission => "commission",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TransactionType::Credit),
            "debit" => Some(TransactionType::Debit),
            "commission" => Some(TransactionType::Commission),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reversed => "reversed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "reversed" => Some(TransactionStatus::Reversed),
            _ => None,
        }
    }

    /// `completed` only from `pending` or a prior reversal, `reversed` only
    /// from `completed`.
    pub fn can_transition(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Pending, Completed) | (Reversed, Completed) | (Pending, Failed) | (Completed, Reversed)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger row. Amount fields never change after insert; only `status` moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    /// Wallet owner the entry settles to (payee for captures).
    pub user_id: Uuid,
    pub payer_id: Option<Uuid>,
    pub shipping_type: Option<ServiceType>,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub processor_fee: Decimal,
    pub commission_amount: Decimal,
    pub status: TransactionStatus,
    pub description: String,
    pub processor_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Signed effect on the owner's available balance while this entry is
    /// `completed`.
    pub fn balance_effect(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Credit => self.amount - self.processor_fee - self.commission_amount,
            TransactionType::Debit => -self.amount,
            TransactionType::Commission => Decimal::ZERO,
        }
    }
}

/// Change to a wallet's available balance caused by a release or reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub user_id: Uuid,
    pub amount: Decimal,
}

/// Result of a release/reverse: the updated entry and its balance effect.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerMovement {
    pub transaction: WalletTransaction,
    pub delta: BalanceDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub user_id: Uuid,
    /// Net payee share of completed credits.
    pub credits: Decimal,
    /// Completed payouts.
    pub debits: Decimal,
    pub available_balance: Decimal,
    /// Payee share of captured credits still awaiting release.
    pub pending_credits: Decimal,
}

/// Platform-wide aggregates for the admin wallet screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPools {
    /// Gross amount of completed captures.
    pub master: Decimal,
    pub commission: Decimal,
    pub processor_fees: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_edges() {
        use TransactionStatus::*;
        assert!(Pending.can_transition(Completed));
        assert!(Reversed.can_transition(Completed));
        assert!(Completed.can_transition(Reversed));
        assert!(!Completed.can_transition(Completed));
        assert!(!Pending.can_transition(Reversed));
        assert!(!Failed.can_transition(Completed));
    }

    #[test]
    fn credit_effect_nets_fees() {
        let now = Utc::now();
        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            order_id: None,
            user_id: Uuid::new_v4(),
            payer_id: None,
            shipping_type: None,
            transaction_type: TransactionType::Credit,
            amount: Decimal::from(100),
            processor_fee: Decimal::from(3),
            commission_amount: Decimal::from(10),
            status: TransactionStatus::Pending,
            description: String::new(),
            processor_ref: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(tx.balance_effect(), Decimal::from(87));

        let payout = WalletTransaction {
            transaction_type: TransactionType::Debit,
            amount: Decimal::from(40),
            processor_fee: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            ..tx
        };
        assert_eq!(payout.balance_effect(), Decimal::from(-40));
    }
}
