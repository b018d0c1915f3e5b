use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use serde::Serialize;
use serde_json::Value;

pub async fn get_request(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, Value) {
    send(TestRequest::get().uri(path), configure).await
}

pub async fn post_request<T: Serialize>(path: &str, body: &T, configure: fn(&mut ServiceConfig)) -> (StatusCode, Value) {
    send(TestRequest::post().uri(path).set_json(body), configure).await
}

pub async fn put_request<T: Serialize>(path: &str, body: &T, configure: fn(&mut ServiceConfig)) -> (StatusCode, Value) {
    send(TestRequest::put().uri(path).set_json(body), configure).await
}

/// Sends a raw body, for checking how malformed payloads are reported.
pub async fn post_raw(path: &str, body: &'static str, configure: fn(&mut ServiceConfig)) -> (StatusCode, Value) {
    let req = TestRequest::post().uri(path).insert_header(("content-type", "application/json")).set_payload(body);
    send(req, configure).await
}

async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> (StatusCode, Value) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let bytes = res.into_body().try_into_bytes().unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
