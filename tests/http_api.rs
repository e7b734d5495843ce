mod support;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use deptnav_backend::db::InMemoryAssignmentStore;
use deptnav_backend::engine::{EngineRegistry, EngineSettings, InMemoryFallbackCache};
use deptnav_backend::handlers::{self, AppState};
use deptnav_backend::models::user::Role;
use deptnav_backend::utils::jwt::{generate_token, Claims};

const SECRET: &str = "test-secret";

fn state() -> web::Data<AppState> {
    let registry = EngineRegistry::new(
        support::definitions(&["hr", "finance", "sales"]),
        Arc::new(InMemoryAssignmentStore::new()),
        Arc::new(InMemoryFallbackCache::new()),
        EngineSettings::default(),
    );
    web::Data::new(AppState {
        registry: Arc::new(registry),
        jwt_secret: SECRET.to_string(),
    })
}

fn bearer(user_id: &str, role: Role) -> (&'static str, String) {
    let claims = Claims::new(user_id, role, &support::scope());
    let token = generate_token(&claims, SECRET).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn navigation_requires_a_token() {
    let app = test::init_service(App::new().app_data(state()).configure(handlers::configure)).await;

    let req = test::TestRequest::get().uri("/v1/navigation").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/v1/navigation")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn members_get_forbidden_on_moves() {
    let app = test::init_service(App::new().app_data(state()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/v1/navigation/drag/end")
        .insert_header(bearer("member-1", Role::Member))
        .set_json(json!({ "department_id": "finance", "section_id": "operations", "position": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn super_admin_moves_and_undoes() {
    let app = test::init_service(App::new().app_data(state()).configure(handlers::configure)).await;
    let auth = bearer("admin-1", Role::SuperAdmin);

    let req = test::TestRequest::post()
        .uri("/v1/navigation/drag/end")
        .insert_header(auth.clone())
        .set_json(json!({ "department_id": "finance", "section_id": "operations", "position": 0 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "moved");
    assert_eq!(body["receipt"]["affected_rows"], 1);

    let req = test::TestRequest::get()
        .uri("/v1/navigation")
        .insert_header(auth.clone())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["fallback"], false);
    assert_eq!(body["sections"]["operations"][0]["definition"]["id"], "finance");
    assert_eq!(body["sections"]["departments"].as_array().map(Vec::len), Some(2));

    let req = test::TestRequest::post()
        .uri("/v1/navigation/undo")
        .insert_header(auth.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/v1/navigation/undo")
        .insert_header(auth)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn invalid_payloads_are_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(handlers::configure)).await;

    let req = test::TestRequest::post()
        .uri("/v1/navigation/drag/end")
        .insert_header(bearer("admin-1", Role::SuperAdmin))
        .set_json(json!({ "department_id": "finance", "section_id": "operations", "position": -1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
