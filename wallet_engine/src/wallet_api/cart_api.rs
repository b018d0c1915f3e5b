use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartContents, CartItem, NewOrderItem},
    traits::{CartManagement, ErrorKind, WalletError},
};

/// The outcome of adding a batch of pre-resolved rows (from a spreadsheet upload, say) to a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAddResult {
    pub added: Vec<CartItem>,
    /// Rows that could not be added, by their position in the input, with the reason.
    pub rejected: Vec<(usize, String)>,
}

pub struct CartApi<B> {
    db: B,
}

impl<B: Debug> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi ({:?})", self.db)
    }
}

impl<B> CartApi<B>
where B: CartManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_item(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
        dest_number: Option<String>,
    ) -> Result<CartItem, WalletError> {
        let item = self.db.add_item(account_id, product_id, quantity, dest_number).await?;
        debug!("🛒️ Account #{account_id} added cart item #{}", item.id);
        Ok(item)
    }

    /// Adds each row independently. A row that fails is reported and does not stop the others.
    pub async fn add_items(&self, account_id: i64, rows: Vec<NewOrderItem>) -> Result<BulkAddResult, WalletError> {
        let mut result = BulkAddResult::default();
        for (i, row) in rows.into_iter().enumerate() {
            match self.db.add_item(account_id, row.product_id, row.quantity, row.dest_number).await {
                Ok(item) => result.added.push(item),
                Err(e) if matches!(e.kind(), ErrorKind::Internal | ErrorKind::Transient) => return Err(e),
                Err(e) => {
                    debug!("🛒️ Row {i} for account #{account_id} was rejected: {e}");
                    result.rejected.push((i, e.to_string()));
                },
            }
        }
        info!(
            "🛒️ Bulk add for account #{account_id}: {} added, {} rejected",
            result.added.len(),
            result.rejected.len()
        );
        Ok(result)
    }

    pub async fn cart(&self, account_id: i64) -> Result<Option<CartContents>, WalletError> {
        self.db.fetch_cart(account_id).await
    }

    pub async fn remove_item(&self, cart_item_id: i64) -> Result<bool, WalletError> {
        let removed = self.db.remove_item(cart_item_id).await?;
        if !removed {
            debug!("🛒️ Cart item #{cart_item_id} was already gone");
        }
        Ok(removed)
    }

    pub async fn clear_cart(&self, account_id: i64) -> Result<u64, WalletError> {
        self.db.clear_cart(account_id).await
    }
}
