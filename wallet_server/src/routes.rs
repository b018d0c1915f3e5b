//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which does its store work
//! asynchronously, so handlers never block a worker.
//!
//! Every successful response is wrapped in a [`JsonResponse`] envelope. Failures are rendered by
//! [`ServerError`](crate::errors::ServerError).
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use wallet_engine::{
    db_types::{NewAccount, NewOrderItem, NewProduct},
    order_objects::OrderQueryFilter,
    traits::{
        AccountManagement,
        CartManagement,
        FulfillmentManagement,
        LedgerManagement,
        LoanManagement,
        ProductCatalog,
        ReconciliationQueries,
        SettlementManagement,
        TopUpManagement,
    },
    wallet_api::{AuditLogFilter, LedgerQueryFilter},
    AccountApi,
    CartApi,
    CatalogApi,
    LedgerApi,
    OrderFlowApi,
    ReconciliationApi,
    TopUpApi,
};

use crate::{
    data_objects::{
        AddCartItemRequest,
        AmountRequest,
        DirectOrderRequest,
        JsonResponse,
        LoanStatusRequest,
        PriceUpdateRequest,
        RefundRequest,
        RemovedResponse,
        StatusUpdateRequest,
        StockUpdateRequest,
        SubmitCartRequest,
        TopUpNotification,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn ok<T: serde::Serialize>(data: T) -> Result<HttpResponse, ServerError> {
    Ok(HttpResponse::Ok().json(JsonResponse::success(data)))
}

fn found<T: serde::Serialize>(data: Option<T>, what: String) -> Result<HttpResponse, ServerError> {
    match data {
        Some(data) => ok(data),
        None => Err(ServerError::NoRecordFound(what)),
    }
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Accounts  ----------------------------------------------------
route!(create_account => Post "/accounts" impl AccountManagement);
pub async fn create_account<B: AccountManagement>(
    body: web::Json<NewAccount>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account = body.into_inner();
    debug!("💻️ POST create_account({})", account.name);
    ok(api.create_account(account).await?)
}

route!(account_by_id => Get "/accounts/{account_id}" impl AccountManagement);
pub async fn account_by_id<B: AccountManagement>(
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET account_by_id({account_id})");
    found(api.account_by_id(account_id).await?, format!("Account #{account_id}"))
}

route!(orders_for_account => Get "/accounts/{account_id}/orders" impl SettlementManagement, FulfillmentManagement);
pub async fn orders_for_account<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET orders_for_account({account_id})");
    ok(api.orders_for_account(account_id).await?)
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(add_product => Post "/products" impl ProductCatalog);
pub async fn add_product<B: ProductCatalog>(
    body: web::Json<NewProduct>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    debug!("💻️ POST add_product({})", product.name);
    ok(api.add_product(product).await?)
}

route!(product_by_id => Get "/products/{product_id}" impl ProductCatalog);
pub async fn product_by_id<B: ProductCatalog>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET product_by_id({product_id})");
    found(api.product_by_id(product_id).await?, format!("Product #{product_id}"))
}

route!(update_price => Put "/products/{product_id}/price" impl ProductCatalog);
pub async fn update_price<B: ProductCatalog>(
    path: web::Path<i64>,
    body: web::Json<PriceUpdateRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ PUT update_price({product_id}, {})", body.price);
    ok(api.update_price(product_id, body.price).await?)
}

route!(set_stock => Put "/products/{product_id}/stock" impl ProductCatalog);
pub async fn set_stock<B: ProductCatalog>(
    path: web::Path<i64>,
    body: web::Json<StockUpdateRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ PUT set_stock({product_id}, {})", body.stock);
    ok(api.set_stock(product_id, body.stock).await?)
}

//----------------------------------------------   Cart  ----------------------------------------------------
route!(add_cart_item => Post "/cart/{account_id}/items" impl CartManagement);
pub async fn add_cart_item<B: CartManagement>(
    path: web::Path<i64>,
    body: web::Json<AddCartItemRequest>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let AddCartItemRequest { product_id, quantity, dest_number } = body.into_inner();
    debug!("💻️ POST add_cart_item({account_id}, product #{product_id} × {quantity})");
    ok(api.add_item(account_id, product_id, quantity, dest_number).await?)
}

route!(add_cart_items => Post "/cart/{account_id}/items/bulk" impl CartManagement);
/// Adds rows that a bulk input adapter (spreadsheet upload, partner feed) has already resolved into products.
///
/// Rows are added independently. The response lists the rows that were rejected alongside the reason.
pub async fn add_cart_items<B: CartManagement>(
    path: web::Path<i64>,
    body: web::Json<Vec<NewOrderItem>>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let rows = body.into_inner();
    debug!("💻️ POST add_cart_items({account_id}, {} rows)", rows.len());
    ok(api.add_items(account_id, rows).await?)
}

route!(cart => Get "/cart/{account_id}" impl CartManagement);
pub async fn cart<B: CartManagement>(
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET cart({account_id})");
    found(api.cart(account_id).await?, format!("Cart for account #{account_id}"))
}

route!(remove_cart_item => Delete "/cart/items/{cart_item_id}" impl CartManagement);
pub async fn remove_cart_item<B: CartManagement>(
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart_item_id = path.into_inner();
    debug!("💻️ DELETE remove_cart_item({cart_item_id})");
    let removed = api.remove_item(cart_item_id).await?;
    ok(RemovedResponse { removed: u64::from(removed) })
}

route!(clear_cart => Delete "/cart/{account_id}" impl CartManagement);
pub async fn clear_cart<B: CartManagement>(
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ DELETE clear_cart({account_id})");
    ok(RemovedResponse { removed: api.clear_cart(account_id).await? })
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(submit_cart => Post "/orders/{account_id}/submit" impl SettlementManagement, FulfillmentManagement);
/// Settles the account's cart. The body is optional; it may carry a destination number for the order.
pub async fn submit_cart<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    body: Option<web::Json<SubmitCartRequest>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let dest_number = body.and_then(|b| b.into_inner().dest_number);
    debug!("💻️ POST submit_cart({account_id})");
    ok(api.submit_cart(account_id, dest_number).await?)
}

route!(direct_order => Post "/orders/direct" impl SettlementManagement, FulfillmentManagement);
pub async fn direct_order<B: SettlementManagement + FulfillmentManagement>(
    body: web::Json<DirectOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let DirectOrderRequest { account_id, items, total } = body.into_inner();
    debug!("💻️ POST direct_order({account_id}, {} items, {total})", items.len());
    ok(api.create_direct_order(account_id, items, total).await?)
}

route!(order_by_id => Get "/orders/{order_id}" impl SettlementManagement, FulfillmentManagement);
pub async fn order_by_id<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    found(api.fetch_order(order_id).await?, format!("Order #{order_id}"))
}

route!(search_orders => Post "/orders/search" impl SettlementManagement, FulfillmentManagement);
pub async fn search_orders<B: SettlementManagement + FulfillmentManagement>(
    body: web::Json<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = body.into_inner();
    debug!("💻️ POST search_orders({query})");
    ok(api.search_orders(query).await?)
}

route!(set_item_status => Put "/order_items/{item_id}/status" impl SettlementManagement, FulfillmentManagement);
pub async fn set_item_status<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item_id = path.into_inner();
    debug!("💻️ PUT set_item_status({item_id}, {})", body.status);
    ok(api.set_item_status(item_id, &body.status).await?)
}

route!(set_order_items_status => Put "/orders/{order_id}/items/status" impl SettlementManagement, FulfillmentManagement);
pub async fn set_order_items_status<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT set_order_items_status({order_id}, {})", body.status);
    ok(api.set_order_items_status(order_id, &body.status).await?)
}

route!(set_order_status => Put "/orders/{order_id}/status" impl SettlementManagement, FulfillmentManagement);
pub async fn set_order_status<B: SettlementManagement + FulfillmentManagement>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PUT set_order_status({order_id}, {})", body.status);
    ok(api.set_order_status(order_id, &body.status).await?)
}

route!(complete_processing_items => Post "/order_items/complete_processing" impl SettlementManagement, FulfillmentManagement);
pub async fn complete_processing_items<B: SettlementManagement + FulfillmentManagement>(
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST complete_processing_items");
    ok(api.complete_processing_items().await?)
}

//----------------------------------------------   Reconciliation  ----------------------------------------------
route!(transactions => Get "/transactions/{account_id}" impl ReconciliationQueries);
pub async fn transactions<B: ReconciliationQueries>(
    path: web::Path<i64>,
    query: web::Query<LedgerQueryFilter>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET transactions({account_id})");
    ok(api.user_transactions(account_id, query.into_inner()).await?)
}

route!(balance_summary => Get "/balance/{account_id}" impl ReconciliationQueries);
pub async fn balance_summary<B: ReconciliationQueries>(
    path: web::Path<i64>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET balance_summary({account_id})");
    ok(api.balance_summary(account_id).await?)
}

route!(audit_log => Get "/audit_log" impl ReconciliationQueries);
pub async fn audit_log<B: ReconciliationQueries>(
    query: web::Query<AuditLogFilter>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET audit_log");
    ok(api.audit_log(query.into_inner()).await?)
}

route!(statistics => Get "/statistics" impl ReconciliationQueries);
pub async fn statistics<B: ReconciliationQueries>(
    query: web::Query<AuditLogFilter>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET statistics");
    ok(api.transaction_statistics(query.into_inner()).await?)
}

route!(verify_ledger => Get "/ledger/{account_id}/verify" impl ReconciliationQueries);
pub async fn verify_ledger<B: ReconciliationQueries>(
    path: web::Path<i64>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET verify_ledger({account_id})");
    ok(api.verify_ledger_chain(account_id).await?)
}

route!(status_counts => Get "/order_items/status_counts" impl ReconciliationQueries);
pub async fn status_counts<B: ReconciliationQueries>(
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET status_counts");
    ok(api.order_item_status_counts().await?)
}

//----------------------------------------------   Top-ups  ----------------------------------------------------
route!(process_top_up => Post "/topups" impl TopUpManagement);
pub async fn process_top_up<B: TopUpManagement>(
    body: web::Json<TopUpNotification>,
    api: web::Data<TopUpApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (top_up, outcome) = body.into_inner().into_parts();
    debug!("💻️ POST process_top_up({}, {outcome:?})", top_up.gateway_reference);
    ok(api.process_top_up(top_up, outcome).await?)
}

//----------------------------------------------   Loans  ----------------------------------------------------
route!(assign_loan => Post "/loans/{account_id}/assign" impl LedgerManagement, LoanManagement);
pub async fn assign_loan<B: LedgerManagement + LoanManagement>(
    path: web::Path<i64>,
    body: web::Json<AmountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ POST assign_loan({account_id}, {})", body.amount);
    ok(api.assign_loan(account_id, body.amount).await?)
}

route!(repay_loan => Post "/loans/{account_id}/repay" impl LedgerManagement, LoanManagement);
pub async fn repay_loan<B: LedgerManagement + LoanManagement>(
    path: web::Path<i64>,
    body: web::Json<AmountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ POST repay_loan({account_id}, {})", body.amount);
    ok(api.repay_loan(account_id, body.amount).await?)
}

route!(deduct_loan => Post "/loans/{account_id}/deduct" impl LedgerManagement, LoanManagement);
pub async fn deduct_loan<B: LedgerManagement + LoanManagement>(
    path: web::Path<i64>,
    body: web::Json<AmountRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ POST deduct_loan({account_id}, {})", body.amount);
    ok(api.deduct_admin_loan(account_id, body.amount).await?)
}

route!(loan_status => Put "/loans/{account_id}/status" impl LedgerManagement, LoanManagement);
pub async fn loan_status<B: LedgerManagement + LoanManagement>(
    path: web::Path<i64>,
    body: web::Json<LoanStatusRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ PUT loan_status({account_id}, {})", body.has_loan);
    ok(api.set_loan_status(account_id, body.has_loan).await?)
}

route!(refund => Post "/refunds/{account_id}" impl LedgerManagement, LoanManagement);
pub async fn refund<B: LedgerManagement + LoanManagement>(
    path: web::Path<i64>,
    body: web::Json<RefundRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let RefundRequest { amount, reference } = body.into_inner();
    debug!("💻️ POST refund({account_id}, {amount}, {reference})");
    ok(api.refund(account_id, amount, &reference).await?)
}
