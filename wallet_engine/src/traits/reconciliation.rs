use crate::{
    db_types::LedgerEntry,
    traits::WalletError,
    wallet_api::{
        AuditLogEntry,
        AuditLogFilter,
        BalanceSummary,
        LedgerChainReport,
        LedgerQueryFilter,
        Page,
        StatusCount,
        TransactionStatistics,
    },
};

/// Read-only reporting over the ledger. Results may be slightly stale and must never be used to gate a write.
#[allow(async_fn_in_trait)]
pub trait ReconciliationQueries {
    async fn user_transactions(
        &self,
        account_id: i64,
        filter: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError>;

    async fn balance_summary(&self, account_id: i64) -> Result<BalanceSummary, WalletError>;

    async fn audit_log(&self, filter: AuditLogFilter) -> Result<Page<AuditLogEntry>, WalletError>;

    async fn transaction_statistics(&self, filter: AuditLogFilter) -> Result<TransactionStatistics, WalletError>;

    /// Walks the account's ledger from the first entry and reports every place where the chain does not add up.
    async fn ledger_chain(&self, account_id: i64) -> Result<LedgerChainReport, WalletError>;

    async fn order_item_status_counts(&self) -> Result<Vec<StatusCount>, WalletError>;
}
