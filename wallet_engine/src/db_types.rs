use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use wallet_common::Pesewas;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------       Account        ---------------------------------------------------------
/// A wallet account. `loan_balance` is the spendable credit balance and is only ever changed by the balance mutator.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub loan_balance: Pesewas,
    pub has_loan: bool,
    /// The loan principal advanced by an administrator that is still outstanding.
    pub admin_loan_balance: Pesewas,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
}

impl NewAccount {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

//--------------------------------------   LedgerEntryType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Debit for a settled order
    Order,
    /// Credit compensating a single cancelled order item
    OrderItemRefund,
    /// Credit compensating a bulk cancellation of an order's items
    OrderItemsRefund,
    /// Credit for a top-up approved by the payment gateway
    TopupApproved,
    LoanAssignment,
    LoanRepayment,
    LoanDeduction,
    Refund,
    /// Zero-amount audit record of an order status change
    OrderStatus,
    /// Zero-amount audit record of an order item status change
    OrderItemStatus,
    /// Zero-amount audit record of a bulk item status change
    OrderItemsStatus,
    LoanStatus,
}

impl LedgerEntryType {
    pub const ALL: [LedgerEntryType; 12] = [
        Self::Order,
        Self::OrderItemRefund,
        Self::OrderItemsRefund,
        Self::TopupApproved,
        Self::LoanAssignment,
        Self::LoanRepayment,
        Self::LoanDeduction,
        Self::Refund,
        Self::OrderStatus,
        Self::OrderItemStatus,
        Self::OrderItemsStatus,
        Self::LoanStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::OrderItemRefund => "ORDER_ITEM_REFUND",
            Self::OrderItemsRefund => "ORDER_ITEMS_REFUND",
            Self::TopupApproved => "TOPUP_APPROVED",
            Self::LoanAssignment => "LOAN_ASSIGNMENT",
            Self::LoanRepayment => "LOAN_REPAYMENT",
            Self::LoanDeduction => "LOAN_DEDUCTION",
            Self::Refund => "REFUND",
            Self::OrderStatus => "ORDER_STATUS",
            Self::OrderItemStatus => "ORDER_ITEM_STATUS",
            Self::OrderItemsStatus => "ORDER_ITEMS_STATUS",
            Self::LoanStatus => "LOAN_STATUS",
        }
    }
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerEntryType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ConversionError(format!("Invalid ledger entry type: {s}")))
    }
}

//--------------------------------------     LedgerEntry      ---------------------------------------------------------
/// An immutable ledger record. `previous_balance + amount == balance` always holds.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub amount: Pesewas,
    pub balance: Pesewas,
    pub previous_balance: Pesewas,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub amount: Pesewas,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub reference: Option<String>,
}

impl NewLedgerEntry {
    pub fn new<S: Into<String>>(account_id: i64, amount: Pesewas, entry_type: LedgerEntryType, description: S) -> Self {
        Self { account_id, amount, entry_type, description: description.into(), reference: None }
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

//--------------------------------------   Reference keys     ---------------------------------------------------------
/// Builders for the reference strings that tie ledger entries back to the domain objects that caused them.
pub mod references {
    use super::FulfillmentStatus;

    pub fn order(order_id: i64) -> String {
        format!("order:{order_id}")
    }

    pub fn order_item(item_id: i64) -> String {
        format!("orderItem:{item_id}")
    }

    pub fn order_item_status(item_id: i64, status: FulfillmentStatus) -> String {
        format!("orderItem:{item_id}:{status}")
    }

    pub fn order_items_refund(order_id: i64) -> String {
        format!("order_items_refund:{order_id}")
    }

    pub fn order_status(order_id: i64, status: FulfillmentStatus) -> String {
        format!("order_status:{order_id}:{status}")
    }

    pub fn top_up(top_up_id: i64) -> String {
        format!("topup:{top_up_id}")
    }

    pub fn account(account_id: i64) -> String {
        format!("user:{account_id}")
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Unit price
    pub price: Pesewas,
    /// Number of units available. Zero means out of stock.
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Pesewas,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Pesewas, stock: i64) -> Self {
        Self { name: name.into(), description: None, price, stock }
    }
}

//--------------------------------------         Cart         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub account_id: i64,
    pub dest_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Line price (unit price × quantity) as it was when the item was added. Display only.
    pub price: Pesewas,
    pub dest_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A cart item together with the current catalog record for its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// The line price at today's catalog price, or `None` if it does not fit in a [`Pesewas`].
    pub fn current_price(&self) -> Option<Pesewas> {
        self.product.price.checked_mul(self.item.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartContents {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
}

impl CartContents {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of the line prices captured when the items were added. `None` on overflow.
    pub fn snapshot_total(&self) -> Option<Pesewas> {
        Pesewas::checked_sum(self.lines.iter().map(|l| l.item.price))
    }

    /// Sum of the line prices at current catalog prices. This is what settlement charges. `None` on overflow.
    pub fn current_total(&self) -> Option<Pesewas> {
        self.lines.iter().map(CartLine::current_price).collect::<Option<Vec<_>>>().and_then(Pesewas::checked_sum)
    }
}

//--------------------------------------  FulfillmentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    Pending,
    Processing,
    /// Terminal
    Completed,
    /// Terminal. Entering this state triggers a compensating refund.
    Cancelled,
}

/// The outcome of asking whether an item may move from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The item is already in the requested status.
    Unchanged,
    Allowed,
    Illegal,
}

impl FulfillmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn transition_to(&self, to: FulfillmentStatus) -> Transition {
        use FulfillmentStatus::*;
        match (self, to) {
            (a, b) if *a == b => Transition::Unchanged,
            (Pending, Processing) | (Processing, Completed) | (Pending | Processing, Cancelled) => Transition::Allowed,
            _ => Transition::Illegal,
        }
    }

    /// Derives an order-level status from the statuses of its items.
    ///
    /// All cancelled → Cancelled; all terminal with at least one completion → Completed; any item in progress →
    /// Processing; otherwise Pending.
    pub fn aggregate<I: IntoIterator<Item = FulfillmentStatus>>(statuses: I) -> FulfillmentStatus {
        let statuses = statuses.into_iter().collect::<Vec<_>>();
        if statuses.is_empty() {
            return Self::Pending;
        }
        if statuses.iter().all(|s| *s == Self::Cancelled) {
            Self::Cancelled
        } else if statuses.iter().all(FulfillmentStatus::is_terminal) {
            Self::Completed
        } else if statuses.iter().any(|s| *s == Self::Processing || *s == Self::Completed) {
            Self::Processing
        } else {
            Self::Pending
        }
    }
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Processing => write!(f, "Processing"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Cancelled" | "Canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid status: {s}"))),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub dest_number: Option<String>,
    /// Best-effort aggregate of the item statuses. Bulk status changes overwrite it directly.
    pub status: FulfillmentStatus,
    /// The amount debited when the order was settled
    pub total_price: Pesewas,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub dest_number: Option<String>,
    pub status: FulfillmentStatus,
    /// The line price charged for this item, when known
    pub price: Option<Pesewas>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account_id: i64,
    pub dest_number: Option<String>,
    pub total_price: Pesewas,
}

/// An order line supplied by an external system (bulk uploads, partner integrations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub dest_number: Option<String>,
    /// Line price as quoted by the caller
    #[serde(default)]
    pub price: Option<Pesewas>,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity, dest_number: None, price: None }
    }

    pub fn with_dest_number<S: Into<String>>(mut self, dest_number: S) -> Self {
        self.dest_number = Some(dest_number.into());
        self
    }

    pub fn with_price(mut self, price: Pesewas) -> Self {
        self.price = Some(price);
        self
    }
}

//--------------------------------------        TopUp         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TopUpStatus {
    Pending,
    Approved,
    Failed,
}

impl Display for TopUpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Approved => write!(f, "Approved"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TopUp {
    pub id: i64,
    pub account_id: i64,
    pub amount: Pesewas,
    pub gateway_reference: String,
    pub status: TopUpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopUp {
    pub account_id: i64,
    pub amount: Pesewas,
    pub gateway_reference: String,
}

impl NewTopUp {
    pub fn new<S: Into<String>>(account_id: i64, amount: Pesewas, gateway_reference: S) -> Self {
        Self { account_id, amount, gateway_reference: gateway_reference.into() }
    }
}

/// The verdict of the payment gateway for a top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementOutcome {
    Success,
    Pending,
    Failed,
}

impl FromStr for SettlementOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" | "successful" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "failed" | "failure" => Ok(Self::Failed),
            _ => Err(ConversionError(format!("Invalid settlement outcome: {s}"))),
        }
    }
}
