use wallet_common::Pesewas;

use crate::{
    db_types::{LedgerEntry, LedgerEntryType, NewLedgerEntry, NewTopUp, SettlementOutcome},
    traits::WalletError,
    wallet_api::{LoanOutcome, TopUpResult},
};

#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Applies a signed amount to an account balance and appends the matching ledger entry, in one unit of work.
    ///
    /// The entry records the balance before and after the change. Zero amounts are allowed. The entry type and
    /// reference are recorded as given and not interpreted.
    async fn apply_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WalletError>;

    async fn find_entry_by_reference(
        &self,
        account_id: i64,
        entry_type: LedgerEntryType,
        reference: &str,
    ) -> Result<Option<LedgerEntry>, WalletError>;
}

/// Administrative credit lines.
///
/// `admin_loan_balance` tracks the principal an administrator has advanced, separately from the spendable balance.
#[allow(async_fn_in_trait)]
pub trait LoanManagement {
    /// Credits `amount` to the account and adds it to the outstanding principal.
    async fn assign_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError>;

    /// Debits up to `amount` from the spendable balance (never taking it below zero) and reduces the principal by
    /// `amount`, down to a minimum of zero.
    async fn repay_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError>;

    /// Debits `amount` and reduces the principal by the same amount. Fails with
    /// [`WalletError::InsufficientLoanBalance`] if that would take the principal below zero.
    async fn deduct_admin_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError>;

    /// Activating a loan makes the current balance the outstanding principal. Deactivating requires the balance to
    /// have been spent or repaid; any remainder is written off to zero.
    async fn set_loan_status(&self, account_id: i64, has_loan: bool) -> Result<LoanOutcome, WalletError>;

    /// Credits a manual refund. Calling this again with the same reference returns the original entry.
    async fn refund(&self, account_id: i64, amount: Pesewas, reference: &str) -> Result<LedgerEntry, WalletError>;
}

#[allow(async_fn_in_trait)]
pub trait TopUpManagement {
    /// Records the gateway's verdict on a top-up, keyed by the gateway reference.
    ///
    /// A successful top-up credits the account exactly once, however many times the notification is delivered.
    async fn process_top_up(&self, top_up: NewTopUp, outcome: SettlementOutcome) -> Result<TopUpResult, WalletError>;
}
