//! End-to-end HTTP flow against the in-memory backends

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use mall_server::cache::MemoryKv;
use mall_server::db::{MemoryStore, Store};
use mall_server::tasks::{Task, TaskQueue};
use mall_server::{AppState, Config};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

const MOBILE: &str = "13800138000";

struct TestApp {
    router: Router,
    store: MemoryStore,
    tasks: mpsc::Receiver<Task>,
    /// Province, city and district ids of a seeded region
    region: [i64; 3],
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let province = store.insert_area("Guangdong", None);
    let city = store.insert_area("Shenzhen", Some(province));
    let district = store.insert_area("Nanshan", Some(city));
    let (queue, tasks) = TaskQueue::new(16);
    let state = AppState::build(
        Config::development(),
        Arc::new(store.clone()),
        Arc::new(MemoryKv::new()),
        queue,
    );
    TestApp {
        router: mall_server::app(state),
        store,
        tasks,
        region: [province, city, district],
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Request a code and read it off the task queue
    async fn sms_code(&mut self, mobile: &str) -> String {
        let response = self.send(get(&format!("/verification-codes/{mobile}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        match self.tasks.try_recv().unwrap() {
            Task::SendSmsCode { code, .. } => code,
        }
    }

    /// Register `username` on `MOBILE` and return the access token
    async fn register(&mut self, username: &str) -> String {
        let code = self.sms_code(MOBILE).await;
        let response = self
            .send(send_json(
                "POST",
                "/users",
                json!({
                    "username": username,
                    "password": "password123",
                    "password2": "password123",
                    "mobile": MOBILE,
                    "sms_code": code,
                    "allow": true,
                }),
                None,
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["token"].as_str().unwrap().to_string()
    }

    fn address(&self, title: &str) -> Value {
        let [province, city, district] = self.region;
        json!({
            "title": title,
            "receiver": "Alice",
            "province_id": province,
            "city_id": city,
            "district_id": district,
            "place": "1 Main Street",
            "mobile": MOBILE,
        })
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(
    method: &str,
    uri: &str,
    body: Value,
    token: Option<&str>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_register_cart_merge_and_checkout() {
    let mut app = test_app();
    let goods = app.store.insert_goods("Snacks");
    let chips = app.store.insert_sku(goods, "Chips", Decimal::new(650, 2), 10);
    let nuts = app.store.insert_sku(goods, "Nuts", Decimal::new(1200, 2), 10);

    // Register
    let code = app.sms_code(MOBILE).await;
    let response = app
        .send(send_json(
            "POST",
            "/users",
            json!({
                "username": "alice_01",
                "password": "password123",
                "password2": "password123",
                "mobile": MOBILE,
                "sms_code": code,
                "allow": true,
            }),
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = json_body(response).await;
    assert_eq!(registered["username"], "alice_01");

    // Logged-in cart already holds nuts, unselected
    let token = registered["token"].as_str().unwrap().to_string();
    let response = app
        .send(send_json(
            "POST",
            "/cart",
            json!({"sku_id": nuts.id, "count": 1, "selected": false}),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Visitor puts chips in the cookie cart
    let response = app
        .send(send_json(
            "POST",
            "/cart",
            json!({"sku_id": chips.id, "count": 2}),
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cart_cookie = set_cookie(&response);
    let cart_cookie = cart_cookie.split(';').next().unwrap().to_string();
    assert!(cart_cookie.starts_with("cart="));

    // Login merges the cookie cart and clears the cookie
    let response = app
        .send(send_json(
            "POST",
            "/authorizations",
            json!({"username": MOBILE, "password": "password123"}),
            None,
            Some(&cart_cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).contains("Max-Age=0"));
    let login = json_body(response).await;
    let token = login["token"].as_str().unwrap().to_string();

    let response = app.send(get("/cart", Some(&token))).await;
    let items = json_body(response).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], chips.id);
    assert_eq!(items[0]["count"], 2);
    assert_eq!(items[0]["selected"], true);
    assert_eq!(items[1]["id"], nuts.id);
    assert_eq!(items[1]["selected"], false);

    // Address, settlement, checkout
    let response = app
        .send(send_json(
            "POST",
            "/addresses",
            app.address("Home"),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let address_id = json_body(response).await["id"].as_i64().unwrap();

    let settlement = json_body(app.send(get("/orders/settlement", Some(&token))).await).await;
    assert_eq!(settlement["freight"], "10.00");
    assert_eq!(settlement["skus"].as_array().unwrap().len(), 1);

    let response = app
        .send(send_json(
            "POST",
            "/orders",
            json!({"address": address_id, "pay_method": 1}),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = json_body(response).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    let order = app.store.find_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.total_count, 2);
    assert_eq!(order.total_amount, Decimal::new(2300, 2));
    let chips_row = app.store.find_sku(chips.id).await.unwrap().unwrap();
    assert_eq!((chips_row.stock, chips_row.sales), (8, 2));

    // Only the unselected entry is left
    let items = json_body(app.send(get("/cart", Some(&token))).await).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], nuts.id);
}

#[tokio::test]
async fn test_sms_codes_are_rate_limited() {
    let mut app = test_app();
    app.sms_code(MOBILE).await;

    let response = app.send(get(&format!("/verification-codes/{MOBILE}"), None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["code"], 2003);
    assert!(app.tasks.try_recv().is_err());
}

#[tokio::test]
async fn test_checkout_beyond_stock_is_rejected() {
    let mut app = test_app();
    let goods = app.store.insert_goods("Limited");
    let sku = app.store.insert_sku(goods, "Signed copy", Decimal::new(9900, 2), 1);

    let code = app.sms_code(MOBILE).await;
    let registered = json_body(
        app.send(send_json(
            "POST",
            "/users",
            json!({
                "username": "bob_the_buyer",
                "password": "password123",
                "password2": "password123",
                "mobile": MOBILE,
                "sms_code": code,
                "allow": true,
            }),
            None,
            None,
        ))
        .await,
    )
    .await;
    let token = registered["token"].as_str().unwrap().to_string();

    app.send(send_json(
        "POST",
        "/cart",
        json!({"sku_id": sku.id, "count": 2}),
        Some(&token),
        None,
    ))
    .await;
    let address = json_body(
        app.send(send_json(
            "POST",
            "/addresses",
            app.address("Work"),
            Some(&token),
            None,
        ))
        .await,
    )
    .await;

    let response = app
        .send(send_json(
            "POST",
            "/orders",
            json!({"address": address["id"], "pay_method": 2}),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 6003);
    assert_eq!(app.store.order_count(), 0);
    let row = app.store.find_sku(sku.id).await.unwrap().unwrap();
    assert_eq!(row.stock, 1);
}

#[tokio::test]
async fn test_visitor_cart_and_auth_boundaries() {
    let app = test_app();
    let goods = app.store.insert_goods("Tea");
    let sku = app.store.insert_sku(goods, "Green tea", Decimal::new(1250, 2), 5);

    let response = app.send(get("/user", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A garbage cookie reads as an empty cart
    let response = app
        .send(
            Request::get("/cart")
                .header(COOKIE, "cart=%%%not-base64")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));

    // Removing the last visitor entry clears the cookie
    let response = app
        .send(send_json("POST", "/cart", json!({"sku_id": sku.id, "count": 1}), None, None))
        .await;
    let cookie = set_cookie(&response);
    let cookie = cookie.split(';').next().unwrap().to_string();
    let response = app
        .send(send_json("DELETE", "/cart", json!({"sku_id": sku.id}), None, Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&response).contains("Max-Age=0"));
}

#[tokio::test]
async fn test_address_book_with_default_and_rename() {
    let mut app = test_app();
    let token = app.register("alice_01").await;
    let [province, city, district] = app.region;

    // Area lookup feeding the form
    let provinces = json_body(app.send(get("/areas", None)).await).await;
    assert_eq!(provinces, json!([{"id": province, "name": "Guangdong", "parent_id": null}]));
    let detail = json_body(app.send(get(&format!("/areas/{city}"), None)).await).await;
    assert_eq!(detail["subs"][0]["id"], district);
    let response = app.send(get("/areas/999999", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // District must sit under the city
    let mut broken = app.address("Home");
    broken["district_id"] = json!(city);
    let response = app
        .send(send_json("POST", "/addresses", broken, Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["details"]["field"], "district_id");

    let response = app
        .send(send_json("POST", "/addresses", app.address("Home"), Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["id"].as_i64().unwrap();

    let response = app
        .send(send_json("PUT", &format!("/addresses/{id}/status"), json!({}), Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(send_json(
            "PUT",
            &format!("/addresses/{id}/title"),
            json!({"title": "Office"}),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(json_body(response).await["title"], "Office");

    let mut replaced = app.address("Office");
    replaced["receiver"] = json!("Bob");
    let response = app
        .send(send_json("PUT", &format!("/addresses/{id}"), replaced, Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let book = json_body(app.send(get("/addresses", Some(&token))).await).await;
    assert_eq!(book["default_address_id"], id);
    assert_eq!(book["limit"], 20);
    assert_eq!(book["addresses"][0]["receiver"], "Bob");
    assert_eq!(book["addresses"][0]["title"], "Office");

    // Deleting the default clears it; the row is gone for every operation
    let request = Request::delete(format!("/addresses/{id}"))
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::NO_CONTENT);
    let book = json_body(app.send(get("/addresses", Some(&token))).await).await;
    assert_eq!(book["default_address_id"], Value::Null);
    assert_eq!(book["addresses"], json!([]));

    let response = app
        .send(send_json("PUT", &format!("/addresses/{id}/status"), json!({}), Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], 1011);
}

#[tokio::test]
async fn test_address_limit_is_enforced() {
    let mut app = test_app();
    let token = app.register("alice_01").await;

    for n in 0..20 {
        let response = app
            .send(send_json(
                "POST",
                "/addresses",
                app.address(&format!("Place {n}")),
                Some(&token),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .send(send_json("POST", "/addresses", app.address("One more"), Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 1010);
}

#[tokio::test]
async fn test_unknown_pay_method_is_rejected() {
    let mut app = test_app();
    let goods = app.store.insert_goods("Tea");
    let sku = app.store.insert_sku(goods, "Green tea", Decimal::new(1250, 2), 5);
    let token = app.register("alice_01").await;

    app.send(send_json(
        "POST",
        "/cart",
        json!({"sku_id": sku.id, "count": 1}),
        Some(&token),
        None,
    ))
    .await;
    let address = json_body(
        app.send(send_json("POST", "/addresses", app.address("Home"), Some(&token), None))
            .await,
    )
    .await;

    let response = app
        .send(send_json(
            "POST",
            "/orders",
            json!({"address": address["id"], "pay_method": 9}),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 4003);
    assert_eq!(app.store.order_count(), 0);
}
