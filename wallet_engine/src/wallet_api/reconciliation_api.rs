//! Reporting queries over the ledger, with a short-lived cache in front of the store.
use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    cache::TtlCache,
    db_types::LedgerEntry,
    traits::{ReconciliationQueries, WalletError},
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

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;

/// The caches used by [`ReconciliationApi`]. Cloning shares the underlying entries.
#[derive(Clone, Debug)]
pub struct ReconciliationCache {
    transactions: TtlCache<(i64, LedgerQueryFilter), Vec<LedgerEntry>>,
    balances: TtlCache<i64, BalanceSummary>,
    audit_log: TtlCache<AuditLogFilter, Page<AuditLogEntry>>,
    statistics: TtlCache<AuditLogFilter, TransactionStatistics>,
    status_counts: TtlCache<(), Vec<StatusCount>>,
}

impl Default for ReconciliationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_MAX_ENTRIES)
    }
}

impl ReconciliationCache {
    /// Each query kind gets its own cache with the given TTL and capacity. A zero TTL disables caching.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            transactions: TtlCache::new(ttl, max_entries),
            balances: TtlCache::new(ttl, max_entries),
            audit_log: TtlCache::new(ttl, max_entries),
            statistics: TtlCache::new(ttl, max_entries),
            status_counts: TtlCache::new(ttl, 1),
        }
    }

    /// Drops expired entries from every cache and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.transactions.purge_expired() +
            self.balances.purge_expired() +
            self.audit_log.purge_expired() +
            self.statistics.purge_expired() +
            self.status_counts.purge_expired()
    }

    pub fn clear(&self) {
        self.transactions.clear();
        self.balances.clear();
        self.audit_log.clear();
        self.statistics.clear();
        self.status_counts.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len() +
            self.balances.len() +
            self.audit_log.len() +
            self.statistics.len() +
            self.status_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ReconciliationApi<B> {
    db: B,
    cache: ReconciliationCache,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({} cached results)", self.cache.len())
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationQueries
{
    pub fn new(db: B, cache: ReconciliationCache) -> Self {
        Self { db, cache }
    }

    pub fn cache(&self) -> &ReconciliationCache {
        &self.cache
    }

    /// The account's transactions, newest first. At most 1000 unless the filter says otherwise.
    pub async fn user_transactions(
        &self,
        account_id: i64,
        filter: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let key = (account_id, filter.clone());
        if let Some(hit) = self.cache.transactions.get(&key) {
            trace!("📊️ Transactions for account #{account_id} served from cache");
            return Ok(hit);
        }
        let entries = self.db.user_transactions(account_id, filter).await?;
        self.cache.transactions.insert(key, entries.clone());
        Ok(entries)
    }

    pub async fn balance_summary(&self, account_id: i64) -> Result<BalanceSummary, WalletError> {
        if let Some(hit) = self.cache.balances.get(&account_id) {
            trace!("📊️ Balance summary for account #{account_id} served from cache");
            return Ok(hit);
        }
        let summary = self.db.balance_summary(account_id).await?;
        self.cache.balances.insert(account_id, summary.clone());
        Ok(summary)
    }

    pub async fn audit_log(&self, filter: AuditLogFilter) -> Result<Page<AuditLogEntry>, WalletError> {
        if let Some(hit) = self.cache.audit_log.get(&filter) {
            return Ok(hit);
        }
        let page = self.db.audit_log(filter.clone()).await?;
        self.cache.audit_log.insert(filter, page.clone());
        Ok(page)
    }

    pub async fn transaction_statistics(&self, filter: AuditLogFilter) -> Result<TransactionStatistics, WalletError> {
        let filter = filter.without_paging();
        if let Some(hit) = self.cache.statistics.get(&filter) {
            return Ok(hit);
        }
        let stats = self.db.transaction_statistics(filter.clone()).await?;
        self.cache.statistics.insert(filter, stats);
        Ok(stats)
    }

    /// Always reads through to the store.
    pub async fn verify_ledger_chain(&self, account_id: i64) -> Result<LedgerChainReport, WalletError> {
        let report = self.db.ledger_chain(account_id).await?;
        if report.is_consistent() {
            debug!("📊️ Ledger for account #{account_id} is consistent over {} entries", report.entries_checked);
        } else {
            warn!("📊️ Ledger for account #{account_id} has {} inconsistencies", report.breaks.len());
        }
        Ok(report)
    }

    pub async fn order_item_status_counts(&self) -> Result<Vec<StatusCount>, WalletError> {
        if let Some(hit) = self.cache.status_counts.get(&()) {
            return Ok(hit);
        }
        let counts = self.db.order_item_status_counts().await?;
        self.cache.status_counts.insert((), counts.clone());
        Ok(counts)
    }
}
