use actix_web::{http::StatusCode, web, web::ServiceConfig};
use serde_json::json;
use wallet_common::Pesewas;
use wallet_engine::{
    db_types::{Account, Product},
    AccountApi,
    CatalogApi,
    WalletError,
};

use super::{
    helpers::{get_request, post_raw, post_request, put_request},
    mocks::{MockAccountManager, MockCatalog},
};
use crate::{
    routes::{AccountByIdRoute, AddProductRoute, CreateAccountRoute, UpdatePriceRoute},
    server::configure_extractors,
};

#[actix_web::test]
async fn fetch_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/accounts/1", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["name"], "alice");
    assert_eq!(body["data"]["loan_balance"], 2500);
}

#[actix_web::test]
async fn fetch_missing_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/accounts/99", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "not_found");
}

#[actix_web::test]
async fn account_ids_must_be_numeric() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/accounts/alice", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[actix_web::test]
async fn create_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/accounts", &json!({"name": "bob"}), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 2);
    assert_eq!(body["data"]["name"], "bob");
}

#[actix_web::test]
async fn malformed_bodies_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_raw("/accounts", "{\"name\": ", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["message"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn add_product() {
    let _ = env_logger::try_init().ok();
    let product = json!({"name": "airtime-10", "price": 1000, "stock": 50});
    let (status, body) = post_request("/products", &product, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 7);
    assert_eq!(body["data"]["price"], 1000);
    assert_eq!(body["data"]["description"], serde_json::Value::Null);
}

#[actix_web::test]
async fn negative_prices_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = put_request("/products/7/price", &json!({"price": -100}), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid input. Prices cannot be negative");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut account_manager = MockAccountManager::new();
    account_manager.expect_fetch_account().returning(|id| match id {
        1 => Ok(Some(Account {
            id: 1,
            name: "alice".into(),
            loan_balance: Pesewas::from(2500),
            ..Account::default()
        })),
        _ => Ok(None),
    });
    account_manager
        .expect_create_account()
        .returning(|account| Ok(Account { id: 2, name: account.name, ..Account::default() }));
    let mut catalog = MockCatalog::new();
    catalog.expect_insert_product().returning(|p| {
        Ok(Product { id: 7, name: p.name, description: p.description, price: p.price, stock: p.stock, ..Product::default() })
    });
    catalog.expect_update_price().returning(|_, _| Err(WalletError::validation("Prices cannot be negative")));
    configure_extractors(cfg);
    cfg.service(CreateAccountRoute::<MockAccountManager>::new())
        .service(AccountByIdRoute::<MockAccountManager>::new())
        .service(AddProductRoute::<MockCatalog>::new())
        .service(UpdatePriceRoute::<MockCatalog>::new())
        .app_data(web::Data::new(AccountApi::new(account_manager)))
        .app_data(web::Data::new(CatalogApi::new(catalog)));
}
