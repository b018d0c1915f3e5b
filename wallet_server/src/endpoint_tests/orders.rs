use std::time::Duration;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wallet_common::Pesewas;
use wallet_engine::{
    db_types::{FulfillmentStatus, Order, OrderItem, OrderWithItems},
    events::EventProducers,
    OrderFlowApi,
    WalletError,
};

use super::{
    helpers::{get_request, post_request, put_request},
    mocks::MockOrderStore,
};
use crate::{
    routes::{OrderByIdRoute, SearchOrdersRoute, SetItemStatusRoute, SetOrderStatusRoute, SubmitCartRoute},
    server::configure_extractors,
};

#[actix_web::test]
async fn fetch_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/10", configure).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["id"], 10);
    assert_eq!(data["status"], "Processing");
    assert_eq!(data["total_price"], 4500);
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"][0]["price"], 4500);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/11", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[actix_web::test]
async fn search_and_fetch_share_a_prefix() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders/search", &json!({"account_id": 1}), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn unknown_statuses_never_reach_the_store() {
    let _ = env_logger::try_init().ok();
    // The mock has no expectation for item 12, so reaching the store would panic
    let (status, body) = put_request("/order_items/12/status", &json!({"status": "Shipped"}), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["message"], "Invalid status: Shipped");
}

#[actix_web::test]
async fn order_status_override() {
    let _ = env_logger::try_init().ok();
    let (status, body) = put_request("/orders/10/status", &json!({"status": "Completed"}), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 10);
    assert_eq!(body["data"]["status"], "Completed");

    let (status, body) = put_request("/orders/11/status", &json!({"status": "Completed"}), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = put_request("/orders/10/status", &json!({"status": "Shipped"}), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status: Shipped");
}

#[actix_web::test]
async fn illegal_transitions_conflict() {
    let _ = env_logger::try_init().ok();
    let (status, body) = put_request("/order_items/5/status", &json!({"status": "Pending"}), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Order item #5 cannot move from Completed to Pending");
}

#[actix_web::test]
async fn insufficient_balance_conflicts() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders/2/submit", &json!({}), configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
    assert_eq!(body["message"], "Insufficient balance. Account #2 has ₵10.00 available, but ₵45.00 is required");
}

#[actix_web::test]
async fn store_failures_are_hidden() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders/3/submit", &json!({}), configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "internal");
    assert!(!body["message"].as_str().unwrap().contains("15s"));
}

fn order(id: i64) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Order {
        id,
        account_id: 1,
        dest_number: Some("0244123456".into()),
        status: FulfillmentStatus::Processing,
        total_price: Pesewas::from_cedis(45),
        created_at: ts,
        updated_at: ts,
    }
}

fn order_with_items(id: i64) -> OrderWithItems {
    let order = order(id);
    let item = OrderItem {
        id: 1,
        order_id: id,
        product_id: 3,
        quantity: 3,
        dest_number: order.dest_number.clone(),
        status: FulfillmentStatus::Processing,
        price: Some(Pesewas::from_cedis(45)),
        created_at: order.created_at,
        updated_at: order.updated_at,
    };
    OrderWithItems { order, items: vec![item] }
}

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order().returning(|id| Ok((id == 10).then(|| order_with_items(10))));
    store.expect_search_orders().returning(|_| Ok(vec![order(10)]));
    store.expect_set_item_status().withf(|id, _| *id == 5).returning(|item_id, to| {
        Err(WalletError::IllegalStatusTransition { item_id, from: FulfillmentStatus::Completed, to })
    });
    store.expect_set_order_status().returning(|id, status| match id {
        10 => Ok(Order { status, ..order(10) }),
        _ => Err(WalletError::OrderNotFound(id)),
    });
    store.expect_submit_cart().returning(|account_id, _| match account_id {
        2 => Err(WalletError::InsufficientBalance {
            account_id,
            balance: Pesewas::from_cedis(10),
            required: Pesewas::from_cedis(45),
        }),
        _ => Err(WalletError::StoreTimeout(Duration::from_secs(15))),
    });
    let api = OrderFlowApi::new(store, EventProducers::default());
    configure_extractors(cfg);
    cfg.service(SearchOrdersRoute::<MockOrderStore>::new())
        .service(SubmitCartRoute::<MockOrderStore>::new())
        .service(OrderByIdRoute::<MockOrderStore>::new())
        .service(SetItemStatusRoute::<MockOrderStore>::new())
        .service(SetOrderStatusRoute::<MockOrderStore>::new())
        .app_data(web::Data::new(api));
}
