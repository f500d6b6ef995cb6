//! HTTP surface tests
//!
//! Drives the router end to end over the in-memory store: status codes,
//! bilingual error bodies and bearer-token handling.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use product_tracker_backend::config::{
    Config, DatabaseConfig, JwtConfig, LedgerConfig, ServerConfig,
};
use product_tracker_backend::middleware::Claims;
use product_tracker_backend::{create_app, AppState, InMemoryStockStore};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";
const SUPPLIER_ID: Uuid = Uuid::from_u128(0x5eed_0000_0000_4000_8000_0000_0000_0002);

fn app() -> Router {
    let config = Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        ledger: LedgerConfig::default(),
    };
    create_app(AppState::new(
        Arc::new(config),
        Arc::new(InMemoryStockStore::with_suppliers([SUPPLIER_ID])),
    ))
}

fn token(user_id: Uuid, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn open_product(app: &Router, sku: &str, initial_stock: i32) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": sku, "sku": sku, "initial_stock": initial_stock })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_sale_over_stock_is_a_conflict() {
    let app = app();
    let product_id = open_product(&app, "HTTP-1", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sales",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 5, "unit_price": "1.00" }],
            "payment_method": "cash"
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert!(body["error"]["message_es"]
        .as_str()
        .unwrap()
        .contains("Disponible: 2"));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/products/{}/stock", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 2);
}

#[tokio::test]
async fn test_movement_requires_authentication() {
    let app = app();
    let product_id = open_product(&app, "HTTP-2", 5).await;
    let input = json!({ "product_id": product_id, "type": "exit", "quantity": 2 });

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock-movements",
        Some(input.clone()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let forged = token(Uuid::new_v4(), "some-other-secret");
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock-movements",
        Some(input.clone()),
        Some(&forged),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let user_id = Uuid::new_v4();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock-movements",
        Some(input),
        Some(&token(user_id, SECRET)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "EXIT");
    assert_eq!(body["direction"], "out");
    assert_eq!(body["user_id"], user_id.to_string());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stock-movements/{}?per_page=1", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["quantity"], 2);
}

#[tokio::test]
async fn test_receiving_twice_is_a_conflict() {
    let app = app();
    let product_id = open_product(&app, "HTTP-3", 0).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase-orders",
        Some(json!({
            "supplier_id": SUPPLIER_ID,
            "items": [{ "product_id": product_id, "quantity": 20, "unit_cost": "2.00" }]
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    let order_id = body["id"].as_str().unwrap().to_string();

    let receive = format!("/api/v1/purchase-orders/{}/receive", order_id);
    let (status, body) = send(&app, Method::PATCH, &receive, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, body) = send(&app, Method::PATCH, &receive, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_RECEIVED");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/products/{}/reconciliation", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 20);
    assert_eq!(body["consistent"], true);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/products/{}/reconciliation", Uuid::new_v4()),
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_product_input_is_validated() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": "", "sku": "HTTP-4" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_sale_without_lines_is_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/sales",
        Some(json!({ "items": [], "payment_method": "cash" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unstorable_amounts_are_bad_requests() {
    let app = app();
    let product_id = open_product(&app, "HTTP-5", 10).await;

    for price in ["0.001", "79228162514264337593543950335"] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 2, "unit_price": price }],
                "payment_method": "cash"
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {}", price);
        assert_eq!(body["error"]["field"], "unit_price");
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase-orders",
        Some(json!({
            "supplier_id": SUPPLIER_ID,
            "items": [{ "product_id": product_id, "quantity": 2, "unit_cost": "0.001" }]
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "unit_cost");
}

#[tokio::test]
async fn test_unknown_supplier_is_not_found() {
    let app = app();
    let product_id = open_product(&app, "HTTP-6", 0).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/purchase-orders",
        Some(json!({
            "supplier_id": Uuid::new_v4(),
            "items": [{ "product_id": product_id, "quantity": 1, "unit_cost": "1.00" }]
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
