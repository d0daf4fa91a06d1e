//! Router tests driven through `tower::ServiceExt::oneshot`

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wenwen_shared::{Approval, Store, StoreFeatures};
use wenwend::config::Config;
use wenwend::db::Database;
use wenwend::server::{router, AppState};

fn store(name: &str, category: &str, tags: &[&str], approval: Approval) -> Store {
    Store {
        id: 0,
        name: name.to_string(),
        category: category.to_string(),
        subcategory: None,
        address: Some("台北市文山區".to_string()),
        phone: None,
        business_hours: None,
        features: StoreFeatures {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        },
        is_trusted: false,
        has_discount: false,
        is_partner: false,
        rating: 4.2,
        approval,
    }
}

fn app_with(db: Database) -> Router {
    let state = AppState::new(Config::default(), db).unwrap();
    router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn chat_body(text: &str) -> Value {
    json!({"message": {"role": "user", "content": text}})
}

#[tokio::test]
async fn test_health() {
    let app = app_with(Database::open_in_memory().unwrap());
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["rules_version"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_chat_pharmacy_not_found() {
    let db = Database::open_in_memory().unwrap();
    db.insert_store(&store("景美火鍋", "餐飲美食", &["火鍋"], Approval::Approved)).unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "POST", "/chat", Some(chat_body("我想找藥局")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "MEDICAL");
    assert_eq!(body["recommended_stores"].as_array().unwrap().len(), 0);
    assert_eq!(body["recommendation_logic"]["source"], "not_found");
    let text = body["response"].as_str().unwrap();
    assert!(text.contains("抱歉"));
    assert!(!text.contains("景美火鍋"));
    assert!(!body["session_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_coverage_stats() {
    let db = Database::open_in_memory().unwrap();
    db.insert_store(&store("木柵牙醫", "醫療保健", &["牙醫"], Approval::Approved)).unwrap();
    db.insert_store(&store("審核中小吃", "餐飲美食", &[], Approval::Pending)).unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "POST", "/chat", Some(chat_body("你的商家資料有多少資料?")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "COVERAGE_STATS");
    assert!(body["response"].as_str().unwrap().contains("共收錄 1 家商家"));
    assert!(body["recommended_stores"].as_array().unwrap().is_empty());

    let (status, stats) = send(&app, "GET", "/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_stores"], 1);
    assert_eq!(stats["category_count"], 1);
}

#[tokio::test]
async fn test_chat_error_shapes() {
    let app = app_with(Database::open_in_memory().unwrap());

    let (status, body) = send(&app, "POST", "/chat", Some(json!({"session_id": "s"})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MINIMAL_FUNCTION_ERROR");

    let (status, body) = send(&app, "POST", "/chat", Some(chat_body("   ")), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_upserts_profile() {
    let app = app_with(Database::open_in_memory().unwrap());

    let (status, body) = send(&app, "POST", "/register", Some(json!({})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MINIMAL_FUNCTION_ERROR");

    let req = json!({"line_uid": "U123", "line_display_name": "小明"});
    let (status, first) = send(&app, "POST", "/register", Some(req), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["user"]["display_name"], "小明");

    let req = json!({"line_uid": "U123", "line_display_name": "小明明"});
    let (_, second) = send(&app, "POST", "/register", Some(req), None).await;
    assert_eq!(second["user"]["id"], first["user"]["id"]);
    assert_eq!(second["user"]["display_name"], "小明明");
}

async fn admin_token(app: &Router) -> String {
    let login = json!({"username": "editor", "password": "s3cret"});
    let (status, body) = send(app, "POST", "/admin/login", Some(login), None).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_daily_reset_endpoint_needs_admin() {
    let db = Database::open_in_memory().unwrap();
    db.create_admin("editor", "s3cret").unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "POST", "/jobs/daily-reset", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "POST", "/jobs/daily-reset", None, Some("forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = admin_token(&app).await;
    let (status, body) = send(&app, "POST", "/jobs/daily-reset", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalUsers"], 0);
    assert_eq!(body["blockedUsers"], 0);
    assert!(body["date"].is_string());
}

#[tokio::test]
async fn test_chat_greeting_with_partner_phrase() {
    let db = Database::open_in_memory().unwrap();
    let mut partner = store("文山合作茶館", "餐飲美食", &[], Approval::Approved);
    partner.is_partner = true;
    db.insert_store(&partner).unwrap();
    db.insert_store(&store("一般茶館", "餐飲美食", &[], Approval::Approved)).unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "POST", "/chat", Some(chat_body("你好，合作商家有哪些")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "VAGUE_CHAT");
    assert_eq!(body["recommendation_logic"]["all_partners"], true);
    let names: Vec<&str> = body["recommended_stores"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["文山合作茶館"]);
}

#[tokio::test]
async fn test_chat_boosts_one_partner_across_secondary_category() {
    let db = Database::open_in_memory().unwrap();
    let mut restaurant = store("合作火鍋店", "餐飲美食", &["火鍋"], Approval::Approved);
    restaurant.is_partner = true;
    let mut market = store("合作火鍋超市", "購物", &["火鍋"], Approval::Approved);
    market.is_partner = true;
    market.features.secondary_category = Some("餐飲美食".to_string());
    db.insert_store(&restaurant).unwrap();
    db.insert_store(&market).unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "POST", "/chat", Some(chat_body("晚餐想吃火鍋")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "FOOD");
    let evidence = body["recommendation_logic"]["evidence"].as_array().unwrap();
    assert_eq!(evidence.len(), 2);
    let boosted = evidence.iter().filter(|e| e["boosted"] == true).count();
    assert_eq!(boosted, 1);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let db = Database::open_in_memory().unwrap();
    db.create_admin("editor", "s3cret").unwrap();
    let app = app_with(db);

    let (status, body) = send(&app, "GET", "/admin/stores", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "GET", "/admin/stores", None, Some("forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let login = json!({"username": "editor", "password": "wrong"});
    let (status, _) = send(&app, "POST", "/admin/login", Some(login), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_store_review_updates_chat() {
    let db = Database::open_in_memory().unwrap();
    db.create_admin("editor", "s3cret").unwrap();
    let app = app_with(db);

    let login = json!({"username": "editor", "password": "s3cret"});
    let (status, body) = send(&app, "POST", "/admin/login", Some(login), None).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    // Warm the catalogue before the write
    let (_, stats) = send(&app, "GET", "/stats", None, None).await;
    assert_eq!(stats["total_stores"], 0);

    let new_store = json!({
        "name": "興隆藥局",
        "category": "醫療保健",
        "features": {"tags": ["藥局"]},
        "rating": 4.6
    });
    let (status, saved) = send(&app, "POST", "/admin/stores", Some(new_store), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let id = saved["id"].as_i64().unwrap();

    // Pending stores are never recommended
    let (_, body) = send(&app, "POST", "/chat", Some(chat_body("我想找藥局")), None).await;
    assert_eq!(body["recommended_stores"].as_array().unwrap().len(), 0);

    let uri = format!("/admin/stores/{}/approval", id);
    let (status, approved) = send(&app, "POST", &uri, Some(json!({"approval": "approved"})), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["approval"], "approved");

    let (_, body) = send(&app, "POST", "/chat", Some(chat_body("我想找藥局")), None).await;
    assert_eq!(body["recommended_stores"][0]["name"], "興隆藥局");

    let (_, stats) = send(&app, "GET", "/stats", None, None).await;
    assert_eq!(stats["total_stores"], 1);

    let (status, _) = send(&app, "DELETE", "/admin/stores/999", None, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_content_and_training() {
    let db = Database::open_in_memory().unwrap();
    db.create_admin("editor", "s3cret").unwrap();
    let app = app_with(db);

    let login = json!({"username": "editor", "password": "s3cret"});
    let (_, body) = send(&app, "POST", "/admin/login", Some(login), None).await;
    let token = body["token"].as_str().unwrap().to_string();

    let question = json!({"text": "附近有什麼好吃的？", "display_order": 1});
    let (status, _) = send(&app, "POST", "/admin/quick-questions", Some(question), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, public) = send(&app, "GET", "/quick-questions", None, None).await;
    assert_eq!(public[0]["text"], "附近有什麼好吃的？");

    let faq = json!({
        "question": "特區營業時間",
        "answer": "多數商家營業到晚上十點。",
        "keywords": ["營業時間"]
    });
    let (status, _) = send(&app, "POST", "/admin/faqs", Some(faq), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "POST", "/chat", Some(chat_body("請問營業時間？")), None).await;
    assert_eq!(body["recommendation_logic"]["source"], "faq");

    for (query, intent) in [("我想找藥局", "MEDICAL"), ("你是誰", "FOOD")] {
        let example = json!({"query": query, "expected_intent": intent});
        let (status, _) = send(&app, "POST", "/admin/training", Some(example), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, report) = send(&app, "POST", "/admin/training/evaluate", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 2);
    assert_eq!(report["correct"], 1);
    assert_eq!(report["mismatches"][0]["actual"], "SELF_INTRO");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app_with(Database::open_in_memory().unwrap());
    send(&app, "POST", "/chat", Some(chat_body("你好")), None).await;

    let (status, body) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("wenwen_chat_requests_total"));
}
