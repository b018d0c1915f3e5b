use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wallet_common::Pesewas;

use crate::db_types::{Account, FulfillmentStatus, LedgerEntry, LedgerEntryType, TopUp};

pub const DEFAULT_TRANSACTION_LIMIT: i64 = 1000;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

//--------------------------------------  LedgerQueryFilter   ---------------------------------------------------------
/// Filter for an account's own transaction history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerQueryFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub entry_type: Option<LedgerEntryType>,
    pub limit: Option<i64>,
}

impl LedgerQueryFilter {
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_entry_type(mut self, entry_type: LedgerEntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_TRANSACTION_LIMIT)
    }
}

//--------------------------------------    AuditLogFilter    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSign {
    /// Credits, including zero-amount audit entries
    Positive,
    /// Debits
    Negative,
}

/// Filter for the administrative, cross-account view of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditLogFilter {
    pub account_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub entry_type: Option<LedgerEntryType>,
    pub sign: Option<AmountSign>,
    /// Case-insensitive substring match on the account name
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AuditLogFilter {
    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_entry_type(mut self, entry_type: LedgerEntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_sign(mut self, sign: AmountSign) -> Self {
        self.sign = Some(sign);
        self
    }

    pub fn with_search<S: Into<String>>(mut self, search: S) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_page(mut self, page: i64, limit: i64) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// The same filter without paging, as used for aggregate statistics.
    pub fn without_paging(&self) -> Self {
        Self { page: None, limit: None, ..self.clone() }
    }
}

/// A ledger row together with the name of the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub account_name: String,
}

//--------------------------------------  Loans and top-ups   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOutcome {
    /// The account after the operation
    pub account: Account,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpResult {
    pub top_up: TopUp,
    /// The credit written by this call. `None` if nothing was credited, including when an earlier notification for
    /// the same top-up already did.
    pub credit: Option<LedgerEntry>,
}

//--------------------------------------      Pagination      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let limit = limit.max(1);
        let total_pages = (total + limit - 1) / limit;
        Self { page, limit, total, total_pages, has_next: page < total_pages, has_prev: page > 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

//--------------------------------------   Balance summary    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TypeTotal {
    pub entry_type: LedgerEntryType,
    pub total: Pesewas,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub account_id: i64,
    /// The stored balance. This is authoritative; the totals below are for display.
    pub current_balance: Pesewas,
    pub has_loan: bool,
    pub admin_loan_balance: Pesewas,
    pub total_topups: Pesewas,
    /// Magnitude of all order debits
    pub total_orders: Pesewas,
    pub total_refunds: Pesewas,
    pub total_loan_assignments: Pesewas,
    /// Magnitude of all loan repayments
    pub total_loan_repayments: Pesewas,
    /// Magnitude of all administrative loan deductions
    pub total_loan_deductions: Pesewas,
    /// Loan deductions not yet matched by repayments
    pub outstanding_loan_balance: Pesewas,
    pub transaction_count: i64,
    pub by_type: Vec<TypeTotal>,
}

impl BalanceSummary {
    pub fn from_totals(
        account_id: i64,
        current_balance: Pesewas,
        has_loan: bool,
        admin_loan_balance: Pesewas,
        by_type: Vec<TypeTotal>,
    ) -> Self {
        let sum_of = |types: &[LedgerEntryType]| -> Pesewas {
            by_type.iter().filter(|t| types.contains(&t.entry_type)).map(|t| t.total).sum()
        };
        let total_topups = sum_of(&[LedgerEntryType::TopupApproved]);
        let total_orders = sum_of(&[LedgerEntryType::Order]).abs();
        let total_refunds =
            sum_of(&[LedgerEntryType::OrderItemRefund, LedgerEntryType::OrderItemsRefund, LedgerEntryType::Refund]);
        let total_loan_assignments = sum_of(&[LedgerEntryType::LoanAssignment]);
        let total_loan_repayments = sum_of(&[LedgerEntryType::LoanRepayment]).abs();
        let total_loan_deductions = sum_of(&[LedgerEntryType::LoanDeduction]).abs();
        let transaction_count = by_type.iter().map(|t| t.count).sum();
        Self {
            account_id,
            current_balance,
            has_loan,
            admin_loan_balance,
            total_topups,
            total_orders,
            total_refunds,
            total_loan_assignments,
            total_loan_repayments,
            total_loan_deductions,
            outstanding_loan_balance: total_loan_deductions - total_loan_repayments,
            transaction_count,
            by_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TransactionStatistics {
    pub total_transactions: i64,
    /// Sum of all non-negative amounts
    pub total_credits: Pesewas,
    /// Sum of all negative amounts (a non-positive number)
    pub total_debits: Pesewas,
    pub net: Pesewas,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: FulfillmentStatus,
    pub count: i64,
}

//--------------------------------------     Chain check      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub entry_id: i64,
    pub reason: String,
}

/// The result of walking an account's ledger from the first entry to the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerChainReport {
    pub account_id: i64,
    pub entries_checked: usize,
    pub last_balance: Option<Pesewas>,
    pub account_balance: Pesewas,
    pub breaks: Vec<ChainBreak>,
}

impl LedgerChainReport {
    /// Checks that every entry is internally consistent, that each entry starts where the previous one ended, and
    /// that the chain ends at the stored account balance. `entries` must be in creation order.
    pub fn verify(account_id: i64, account_balance: Pesewas, entries: &[LedgerEntry]) -> Self {
        let mut breaks = Vec::new();
        let mut last: Option<&LedgerEntry> = None;
        for entry in entries {
            if entry.previous_balance + entry.amount != entry.balance {
                breaks.push(ChainBreak {
                    entry_id: entry.id,
                    reason: format!(
                        "previous balance {} plus amount {} does not equal balance {}",
                        entry.previous_balance, entry.amount, entry.balance
                    ),
                });
            }
            let expected_previous = last.map(|e| e.balance).unwrap_or_default();
            if entry.previous_balance != expected_previous {
                breaks.push(ChainBreak {
                    entry_id: entry.id,
                    reason: format!(
                        "previous balance {} does not follow on from {expected_previous}",
                        entry.previous_balance
                    ),
                });
            }
            last = Some(entry);
        }
        let last_balance = last.map(|e| e.balance);
        if last_balance.unwrap_or_default() != account_balance {
            breaks.push(ChainBreak {
                entry_id: last.map(|e| e.id).unwrap_or_default(),
                reason: format!(
                    "ledger ends at {} but the account balance is {account_balance}",
                    last_balance.unwrap_or_default()
                ),
            });
        }
        Self { account_id, entries_checked: entries.len(), last_balance, account_balance, breaks }
    }

    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(id: i64, previous: i64, amount: i64, balance: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            account_id: 1,
            amount: Pesewas::from(amount),
            balance: Pesewas::from(balance),
            previous_balance: Pesewas::from(previous),
            entry_type: LedgerEntryType::TopupApproved,
            description: "test".into(),
            reference: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn page_info() {
        let info = PageInfo::new(1, 50, 120);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(!info.has_prev);
        let info = PageInfo::new(3, 50, 120);
        assert!(!info.has_next);
        assert!(info.has_prev);
        let info = PageInfo::new(1, 50, 0);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next);
    }

    #[test]
    fn audit_filter_paging() {
        let filter = AuditLogFilter::default();
        assert_eq!((filter.page(), filter.limit(), filter.offset()), (1, DEFAULT_PAGE_SIZE, 0));
        let filter = filter.with_page(3, 20);
        assert_eq!(filter.offset(), 40);
        let filter = AuditLogFilter::default().with_page(0, 10_000);
        assert_eq!((filter.page(), filter.limit()), (1, MAX_PAGE_SIZE));
        assert_eq!(AuditLogFilter::default().with_page(2, 5).without_paging(), AuditLogFilter::default());
    }

    #[test]
    fn huge_page_numbers_saturate() {
        let filter = AuditLogFilter { page: Some(i64::MAX), ..AuditLogFilter::default() };
        assert_eq!(filter.offset(), i64::MAX);
        let filter = AuditLogFilter::default().with_page(i64::MAX, MAX_PAGE_SIZE);
        assert_eq!(filter.offset(), i64::MAX);
    }

    #[test]
    fn consistent_chain() {
        let entries = vec![entry(1, 0, 20_000, 20_000), entry(2, 20_000, -6_000, 14_000), entry(3, 14_000, 0, 14_000)];
        let report = LedgerChainReport::verify(1, Pesewas::from(14_000), &entries);
        assert!(report.is_consistent(), "{:?}", report.breaks);
        assert_eq!(report.entries_checked, 3);
        assert_eq!(report.last_balance, Some(Pesewas::from(14_000)));
    }

    #[test]
    fn broken_chain() {
        let entries = vec![entry(1, 0, 20_000, 20_000), entry(2, 19_000, -6_000, 13_000)];
        let report = LedgerChainReport::verify(1, Pesewas::from(14_000), &entries);
        assert_eq!(report.breaks.len(), 2);
        assert_eq!(report.breaks[0].entry_id, 2);
        assert!(report.breaks[1].reason.starts_with("ledger ends at"));
    }

    #[test]
    fn empty_chain_matches_zero_balance() {
        assert!(LedgerChainReport::verify(1, Pesewas::from(0), &[]).is_consistent());
        assert!(!LedgerChainReport::verify(1, Pesewas::from(5), &[]).is_consistent());
    }

    #[test]
    fn summary_totals() {
        let by_type = vec![
            TypeTotal { entry_type: LedgerEntryType::TopupApproved, total: Pesewas::from(20_000), count: 1 },
            TypeTotal { entry_type: LedgerEntryType::Order, total: Pesewas::from(-6_000), count: 1 },
            TypeTotal { entry_type: LedgerEntryType::OrderItemRefund, total: Pesewas::from(3_000), count: 1 },
            TypeTotal { entry_type: LedgerEntryType::LoanDeduction, total: Pesewas::from(-1_000), count: 2 },
            TypeTotal { entry_type: LedgerEntryType::LoanRepayment, total: Pesewas::from(-400), count: 1 },
            TypeTotal { entry_type: LedgerEntryType::OrderItemStatus, total: Pesewas::from(0), count: 3 },
        ];
        let summary = BalanceSummary::from_totals(1, Pesewas::from(15_600), false, Pesewas::from(0), by_type);
        assert_eq!(summary.total_topups, Pesewas::from(20_000));
        assert_eq!(summary.total_orders, Pesewas::from(6_000));
        assert_eq!(summary.total_refunds, Pesewas::from(3_000));
        assert_eq!(summary.total_loan_deductions, Pesewas::from(1_000));
        assert_eq!(summary.total_loan_repayments, Pesewas::from(400));
        assert_eq!(summary.outstanding_loan_balance, Pesewas::from(600));
        assert_eq!(summary.transaction_count, 9);
    }
}
