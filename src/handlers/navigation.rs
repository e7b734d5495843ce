use actix_web::{web, HttpResponse, HttpRequest};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::department::SectionId;
use crate::utils;
use crate::utils::jwt::Claims;

#[derive(Deserialize, Validate)]
pub struct DragStartRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: String,
}

#[derive(Deserialize, Validate)]
pub struct DragOverRequest {
    #[validate(length(min = 1, max = 64))]
    over_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct DragEndRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: String,
    section_id: SectionId,
    #[validate(range(min = 0))]
    position: i32,
}

#[derive(Deserialize, Validate)]
pub struct MoveToSectionRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: String,
    section_id: SectionId,
}

#[derive(Deserialize, Validate)]
pub struct ReorderRequest {
    section_id: SectionId,
    #[validate(length(min = 1))]
    department_ids: Vec<String>,
}

#[derive(Deserialize, Validate)]
pub struct DepartmentRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: String,
}

#[derive(Deserialize, Validate)]
pub struct RenameRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: String,
    #[validate(length(max = 80))]
    custom_name: Option<String>,
    #[validate(length(max = 280))]
    custom_description: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(length(min = 1, max = 64))]
    department_id: Option<String>,
}

fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Claims, AppError> {
    let token = req.headers().get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.split_whitespace().nth(1))
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    utils::jwt::validate_token(token, &state.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

pub async fn get_navigation(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    Ok(HttpResponse::Ok().json(json!({
        "fallback": engine.is_fallback(),
        "sections": engine.sections_for(&claims.principal()),
    })))
}

pub async fn get_status(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    Ok(HttpResponse::Ok().json(json!({
        "fallback": engine.is_fallback(),
        "undo_depth": engine.undo_depth(),
        "drag": engine.drag_state(&claims.principal()),
    })))
}

pub async fn drag_start(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<DragStartRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let principal = claims.principal();
    let engine = state.registry.engine(&claims.scope());

    engine.drag_start(&principal, &body.department_id)?;
    Ok(HttpResponse::Ok().json(engine.drag_state(&principal)))
}

pub async fn drag_over(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<DragOverRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let principal = claims.principal();
    let engine = state.registry.engine(&claims.scope());

    engine.drag_over(&principal, body.over_id.as_deref())?;
    Ok(HttpResponse::Ok().json(engine.drag_state(&principal)))
}

pub async fn drag_cancel(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = authenticate(&req, &state)?;
    let principal = claims.principal();
    let engine = state.registry.engine(&claims.scope());

    engine.drag_cancel(&principal);
    Ok(HttpResponse::Ok().json(engine.drag_state(&principal)))
}

pub async fn drag_end(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<DragEndRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let outcome = engine
        .drag_end(&claims.principal(), &body.department_id, body.section_id, body.position)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn move_to_section(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<MoveToSectionRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let outcome = engine
        .move_to_section(&claims.principal(), &body.department_id, body.section_id)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn reorder_section(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ReorderRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let receipt = engine
        .reorder_section(&claims.principal(), body.section_id, &body.department_ids)
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn toggle_visibility(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<DepartmentRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let receipt = engine
        .toggle_visibility(&claims.principal(), &body.department_id)
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn rename_department(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RenameRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let body = body.into_inner();
    let receipt = engine
        .rename(&claims.principal(), &body.department_id, body.custom_name, body.custom_description)
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn reset(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ResetRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    utils::validation::validate_payload(&body.0)?;
    let claims = authenticate(&req, &state)?;
    let principal = claims.principal();
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let receipt = match &body.department_id {
        Some(department_id) => engine.reset_department(&principal, department_id).await?,
        None => engine.reset_all(&principal).await?,
    };
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn undo(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());
    engine.ensure_loaded().await?;

    let receipt = engine.undo_last_move(&claims.principal()).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn retry(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = authenticate(&req, &state)?;
    let engine = state.registry.engine(&claims.scope());

    let sections = engine.retry().await?;
    Ok(HttpResponse::Ok().json(json!({
        "fallback": engine.is_fallback(),
        "sections": sections,
    })))
}
