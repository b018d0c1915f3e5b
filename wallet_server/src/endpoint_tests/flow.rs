//! End-to-end request flows against a real, freshly migrated store.
use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use serde_json::{json, Value};
use wallet_engine::{events::EventProducers, test_utils::prepare_env::fresh_database, ReconciliationCache};

use crate::server::configure_app;

macro_rules! call {
    ($service:expr, $req:expr) => {{
        let res = test::call_service(&$service, $req.to_request()).await;
        let status = res.status();
        let bytes = res.into_body().try_into_bytes().unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }};
}

#[actix_web::test]
async fn top_up_settle_and_cancel() {
    let db = fresh_database().await;
    let app = App::new().configure({
        let db = db.clone();
        move |cfg| configure_app(cfg, db, EventProducers::default(), ReconciliationCache::default())
    });
    let service = test::init_service(app).await;

    let (status, body) = call!(service, TestRequest::post().uri("/api/accounts").set_json(json!({"name": "ama"})));
    assert_eq!(status, StatusCode::OK);
    let account_id = body["data"]["id"].as_i64().unwrap();

    let product = json!({"name": "data-1gb", "price": 1500, "stock": 10});
    let (status, body) = call!(service, TestRequest::post().uri("/api/products").set_json(product));
    assert_eq!(status, StatusCode::OK);
    let product_id = body["data"]["id"].as_i64().unwrap();

    // The gateway reports the same top-up twice. Only the first notification credits the account.
    let notification =
        json!({"account_id": account_id, "amount": 10_000, "gateway_reference": "gw-771", "outcome": "success"});
    let (status, body) = call!(service, TestRequest::post().uri("/api/topups").set_json(&notification));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["credit"]["amount"], 10_000);
    let (status, body) = call!(service, TestRequest::post().uri("/api/topups").set_json(&notification));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["credit"], Value::Null);

    let item = json!({"product_id": product_id, "quantity": 2, "dest_number": "0244123456"});
    let uri = format!("/api/cart/{account_id}/items");
    let (status, _) = call!(service, TestRequest::post().uri(&uri).set_json(item));
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/orders/{account_id}/submit");
    let (status, body) = call!(service, TestRequest::post().uri(&uri).set_json(json!({})));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_price"], 3000);
    let order_id = body["data"]["id"].as_i64().unwrap();
    let item_id = body["data"]["items"][0]["id"].as_i64().unwrap();

    // The cart is empty after settlement
    let (status, body) = call!(service, TestRequest::post().uri(&uri).set_json(json!({})));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let uri = format!("/api/accounts/{account_id}");
    let (_, body) = call!(service, TestRequest::get().uri(&uri));
    assert_eq!(body["data"]["loan_balance"], 7000);

    let uri = format!("/api/order_items/{item_id}/status");
    let (status, body) = call!(service, TestRequest::put().uri(&uri).set_json(json!({"status": "Cancelled"})));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["refund"]["amount"], 3000);
    assert_eq!(body["data"]["order"]["id"], order_id);

    // Cancelling again is a no-op and does not refund twice
    let (status, body) = call!(service, TestRequest::put().uri(&uri).set_json(json!({"status": "Cancelled"})));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["refund"], Value::Null);

    let uri = format!("/api/balance/{account_id}");
    let (status, body) = call!(service, TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_balance"], 10_000);
    assert_eq!(body["data"]["total_topups"], 10_000);
    assert_eq!(body["data"]["total_orders"], 3000);
    assert_eq!(body["data"]["total_refunds"], 3000);

    let uri = format!("/api/transactions/{account_id}?entry_type=ORDER");
    let (status, body) = call!(service, TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["amount"], -3000);

    let uri = format!("/api/ledger/{account_id}/verify");
    let (status, body) = call!(service, TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::OK);
    // Status changes leave zero-amount audit entries in the chain as well
    assert!(body["data"]["entries_checked"].as_u64().unwrap() >= 3);
    assert_eq!(body["data"]["breaks"].as_array().unwrap().len(), 0);

    let mut db = db;
    db.close().await.unwrap();
}

#[actix_web::test]
async fn bad_query_strings_are_rejected() {
    let db = fresh_database().await;
    let app = App::new().configure({
        let db = db.clone();
        move |cfg| configure_app(cfg, db, EventProducers::default(), ReconciliationCache::default())
    });
    let service = test::init_service(app).await;
    let (status, body) = call!(service, TestRequest::get().uri("/api/transactions/1?entry_type=BOGUS"));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call!(service, TestRequest::get().uri("/api/orders/123"));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = call!(service, TestRequest::get().uri("/health"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
    let mut db = db;
    db.close().await.unwrap();
}
