//! The administrative face of the ledger: manual entries, loans, refunds and gateway top-ups.
use std::fmt::Debug;

use log::*;
use wallet_common::Pesewas;

use crate::{
    db_types::{LedgerEntry, LedgerEntryType, NewLedgerEntry, NewTopUp, SettlementOutcome},
    traits::{LedgerManagement, LoanManagement, TopUpManagement, WalletError},
    wallet_api::{LoanOutcome, TopUpResult},
};

pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement + LoanManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Posts an arbitrary entry through the balance mutator.
    pub async fn apply_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WalletError> {
        self.db.apply_ledger_entry(entry).await
    }

    pub async fn find_entry_by_reference(
        &self,
        account_id: i64,
        entry_type: LedgerEntryType,
        reference: &str,
    ) -> Result<Option<LedgerEntry>, WalletError> {
        self.db.find_entry_by_reference(account_id, entry_type, reference).await
    }

    pub async fn assign_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        self.db.assign_loan(account_id, amount).await
    }

    pub async fn repay_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        self.db.repay_loan(account_id, amount).await
    }

    pub async fn deduct_admin_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        self.db.deduct_admin_loan(account_id, amount).await
    }

    pub async fn set_loan_status(&self, account_id: i64, has_loan: bool) -> Result<LoanOutcome, WalletError> {
        self.db.set_loan_status(account_id, has_loan).await
    }

    pub async fn refund(&self, account_id: i64, amount: Pesewas, reference: &str) -> Result<LedgerEntry, WalletError> {
        self.db.refund(account_id, amount, reference).await
    }
}

/// Intake for payment gateway notifications. Webhooks and status polls for the same payment may both arrive; only
/// the first successful one credits the account.
pub struct TopUpApi<B> {
    db: B,
}

impl<B> Debug for TopUpApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TopUpApi")
    }
}

impl<B> TopUpApi<B>
where B: TopUpManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn process_top_up(
        &self,
        top_up: NewTopUp,
        outcome: SettlementOutcome,
    ) -> Result<TopUpResult, WalletError> {
        let reference = top_up.gateway_reference.clone();
        let result = self.db.process_top_up(top_up, outcome).await?;
        match &result.credit {
            Some(entry) => info!("💳️ Top-up {reference} credited. Balance is now {}", entry.balance),
            None => debug!("💳️ Top-up {reference} recorded as {}", result.top_up.status),
        }
        Ok(result)
    }
}
