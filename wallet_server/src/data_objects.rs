use serde::{Deserialize, Serialize};
use wallet_common::Pesewas;
use wallet_engine::db_types::{NewOrderItem, NewTopUp, SettlementOutcome};

/// The body of every successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub dest_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitCartRequest {
    #[serde(default)]
    pub dest_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectOrderRequest {
    pub account_id: i64,
    pub items: Vec<NewOrderItem>,
    pub total: Pesewas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdateRequest {
    pub price: Pesewas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdateRequest {
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: Pesewas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanStatusRequest {
    pub has_loan: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: Pesewas,
    pub reference: String,
}

/// A payment gateway notification, from a webhook or a status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpNotification {
    pub account_id: i64,
    pub amount: Pesewas,
    pub gateway_reference: String,
    pub outcome: SettlementOutcome,
}

impl TopUpNotification {
    pub fn into_parts(self) -> (NewTopUp, SettlementOutcome) {
        (NewTopUp::new(self.account_id, self.amount, self.gateway_reference), self.outcome)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: u64,
}
