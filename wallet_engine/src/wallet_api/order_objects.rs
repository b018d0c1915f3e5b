use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FulfillmentStatus, LedgerEntry, Order, OrderItem},
    traits::WalletError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub account_id: Option<i64>,
    /// Matches the order's destination number or that of any of its items, in any of the local spellings.
    pub dest_number: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<FulfillmentStatus>>,
}

impl OrderQueryFilter {
    pub fn since<T>(mut self, since: T) -> Result<Self, WalletError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| WalletError::validation(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, WalletError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| WalletError::validation(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_dest_number<S: Into<String>>(mut self, dest_number: S) -> Self {
        self.dest_number = Some(dest_number.into());
        self
    }

    pub fn with_status(mut self, status: FulfillmentStatus) -> Self {
        let mut statuses = self.status.take().unwrap_or_default();
        statuses.push(status);
        self.status = Some(statuses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() &&
            self.dest_number.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters");
        }
        let mut parts = vec![];
        if let Some(account_id) = self.account_id {
            parts.push(format!("account_id: {account_id}"));
        }
        if let Some(dest_number) = &self.dest_number {
            parts.push(format!("dest_number: {dest_number}"));
        }
        if let Some(since) = self.since {
            parts.push(format!("since: {since}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("until: {until}"));
        }
        if let Some(status) = &self.status {
            let s = status.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            parts.push(format!("status: [{s}]"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// What a fulfillment status change did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// The order after the change
    pub order: Order,
    /// The items whose status actually changed. Items that were already in the requested status are not included.
    pub changed: Vec<OrderItem>,
    /// The compensating credit, if this change issued one
    pub refund: Option<LedgerEntry>,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}
