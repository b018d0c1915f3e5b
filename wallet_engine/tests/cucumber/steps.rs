use std::str::FromStr;

use cucumber::{given, then, when};
use wallet_common::Pesewas;
use wallet_engine::{
    db_types::{FulfillmentStatus, LedgerEntryType, NewAccount, NewLedgerEntry, NewProduct, NewTopUp, SettlementOutcome},
    wallet_api::LedgerQueryFilter,
    AccountManagement,
    ProductCatalog,
    ReconciliationQueries,
};

use crate::cucumber::{world::WalletSystem, WalletWorld};

fn cedis(v: i64) -> Pesewas {
    Pesewas::from_cedis(v)
}

#[given("a fresh install")]
async fn fresh_database(world: &mut WalletWorld) {
    let system = WalletSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "an account '{word}' with a balance of {int} cedis")]
async fn funded_account(world: &mut WalletWorld, name: String, amount: i64) {
    let sys = world.system_mut();
    let account = sys.db.create_account(NewAccount::new(name.as_str())).await.expect("Error creating account");
    if amount != 0 {
        let seed = NewLedgerEntry::new(account.id, cedis(amount), LedgerEntryType::TopupApproved, "Opening balance");
        sys.ledger.apply_ledger_entry(seed).await.expect("Error seeding balance");
    }
    sys.accounts.insert(name, account);
}

#[given(expr = "a product '{word}' priced at {int} cedis")]
async fn add_product(world: &mut WalletWorld, name: String, price: i64) {
    let sys = world.system_mut();
    let product = sys.db.insert_product(NewProduct::new(name.as_str(), cedis(price), 50)).await.unwrap();
    sys.products.insert(name, product);
}

#[given(expr = "'{word}' is out of stock")]
async fn out_of_stock(world: &mut WalletWorld, name: String) {
    let id = world.product(&name).id;
    world.system().db.set_stock(id, 0).await.unwrap();
}

#[when(expr = "the price of '{word}' changes to {int} cedis")]
async fn change_price(world: &mut WalletWorld, name: String, price: i64) {
    let id = world.product(&name).id;
    world.system().db.update_price(id, cedis(price)).await.unwrap();
}

#[when(expr = "'{word}' adds {int} '{word}' to the cart")]
async fn add_to_cart(world: &mut WalletWorld, account: String, quantity: i64, product: String) {
    let account_id = world.account(&account).id;
    let product_id = world.product(&product).id;
    let result = world.system().carts.add_item(account_id, product_id, quantity, None).await;
    world.record(result);
}

#[when(expr = "'{word}' submits the cart")]
async fn submit_cart(world: &mut WalletWorld, account: String) {
    let account_id = world.account(&account).id;
    let result = world.system().orders.submit_cart(account_id, None).await;
    if let Some(order) = world.record(result) {
        world.system_mut().last_order = Some(order);
    }
}

#[when(expr = "item {int} of the last order is set to {word}")]
async fn set_item_status(world: &mut WalletWorld, index: usize, status: String) {
    let item_id = world.last_order().items[index - 1].id;
    let result = world.system().orders.set_item_status(item_id, &status).await;
    world.record(result);
}

#[when(expr = "all items of the last order are set to {word}")]
async fn set_order_items_status(world: &mut WalletWorld, status: String) {
    let order_id = world.last_order().order.id;
    let result = world.system().orders.set_order_items_status(order_id, &status).await;
    world.record(result);
}

#[when("processing items are completed")]
async fn complete_processing(world: &mut WalletWorld) {
    let result = world.system().orders.complete_processing_items().await;
    world.record(result);
}

#[when(expr = "'{word}' is assigned a loan of {int} cedis")]
async fn assign_loan(world: &mut WalletWorld, account: String, amount: i64) {
    let account_id = world.account(&account).id;
    let result = world.system().ledger.assign_loan(account_id, cedis(amount)).await;
    world.record(result);
}

#[when(expr = "'{word}' repays {int} cedis of the loan")]
async fn repay_loan(world: &mut WalletWorld, account: String, amount: i64) {
    let account_id = world.account(&account).id;
    let result = world.system().ledger.repay_loan(account_id, cedis(amount)).await;
    world.record(result);
}

#[when(expr = "{int} cedis of the loan to '{word}' is deducted")]
async fn deduct_loan(world: &mut WalletWorld, amount: i64, account: String) {
    let account_id = world.account(&account).id;
    let result = world.system().ledger.deduct_admin_loan(account_id, cedis(amount)).await;
    world.record(result);
}

#[when(expr = "the loan for '{word}' is closed")]
async fn close_loan(world: &mut WalletWorld, account: String) {
    let account_id = world.account(&account).id;
    let result = world.system().ledger.set_loan_status(account_id, false).await;
    world.record(result);
}

#[when(expr = "the gateway reports top-up [{word}] of {int} cedis for '{word}' as {word}")]
async fn top_up(world: &mut WalletWorld, reference: String, amount: i64, account: String, outcome: String) {
    let account_id = world.account(&account).id;
    let outcome = SettlementOutcome::from_str(&outcome).expect("Not a settlement outcome");
    let top_up = NewTopUp::new(account_id, cedis(amount), reference);
    let result = world.system().top_ups.process_top_up(top_up, outcome).await;
    world.record(result);
}

#[then(expr = "'{word}' has a balance of {int} cedis")]
async fn check_balance(world: &mut WalletWorld, account: String, amount: i64) {
    let account_id = world.account(&account).id;
    let account = world.system().db.fetch_account(account_id).await.unwrap().expect("Account missing");
    assert_eq!(account.loan_balance, cedis(amount));
}

#[then(expr = "'{word}' has an outstanding loan of {int} cedis")]
async fn check_loan(world: &mut WalletWorld, account: String, amount: i64) {
    let account_id = world.account(&account).id;
    let account = world.system().db.fetch_account(account_id).await.unwrap().expect("Account missing");
    assert_eq!(account.admin_loan_balance, cedis(amount));
    assert_eq!(account.has_loan, amount > 0);
}

#[then(expr = "'{word}' has {int} {word} entries")]
async fn check_entries(world: &mut WalletWorld, account: String, count: usize, entry_type: String) {
    let account_id = world.account(&account).id;
    let entry_type = LedgerEntryType::from_str(&entry_type).expect("Not a ledger entry type");
    let filter = LedgerQueryFilter::default().with_entry_type(entry_type);
    let entries = world.system().db.user_transactions(account_id, filter).await.unwrap();
    assert_eq!(entries.len(), count);
}

#[then(expr = "'{word}' has {int} items in the cart")]
async fn check_cart(world: &mut WalletWorld, account: String, count: usize) {
    let account_id = world.account(&account).id;
    let cart = world.system().carts.cart(account_id).await.unwrap();
    assert_eq!(cart.map(|c| c.lines.len()).unwrap_or_default(), count);
}

#[then(expr = "the last order has {int} {word} items")]
async fn check_order_items(world: &mut WalletWorld, count: usize, status: String) {
    let status = FulfillmentStatus::from_str(&status).expect("Not a status");
    let order_id = world.last_order().order.id;
    let order = world.system().orders.fetch_order(order_id).await.unwrap().expect("Order missing");
    assert_eq!(order.items.iter().filter(|i| i.status == status).count(), count);
}

#[then(expr = "the last order is {word}")]
async fn check_order_status(world: &mut WalletWorld, status: String) {
    let status = FulfillmentStatus::from_str(&status).expect("Not a status");
    let order_id = world.last_order().order.id;
    let order = world.system().orders.fetch_order(order_id).await.unwrap().expect("Order missing");
    assert_eq!(order.order.status, status);
}

#[then(expr = "the last order cost {int} cedis")]
async fn check_order_total(world: &mut WalletWorld, amount: i64) {
    assert_eq!(world.last_order().order.total_price, cedis(amount));
}

#[then(expr = "the request fails with {string}")]
async fn check_failure(world: &mut WalletWorld, message: String) {
    let err = world.system().last_error.as_ref().expect("The last request succeeded");
    assert!(err.to_string().contains(&message), "'{err}' does not contain '{message}'");
}

#[then("the request succeeds")]
async fn check_success(world: &mut WalletWorld) {
    assert_eq!(world.system().last_error, None);
}

#[then(expr = "the ledger for '{word}' is consistent")]
async fn check_chain(world: &mut WalletWorld, account: String) {
    let account_id = world.account(&account).id;
    let report = world.system().db.ledger_chain(account_id).await.unwrap();
    assert!(report.is_consistent(), "{:?}", report.breaks);
}
