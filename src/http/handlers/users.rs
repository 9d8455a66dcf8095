use crate::domain::bulk::BulkActionRequest;
use crate::domain::user::{CreateUserRequest, UpdateUserRequest, UserFilter};
use crate::error::{AppError, AppResult};
use crate::http::actor::{actor_context, parse_body};
use crate::http::extract::{ApiJson, ApiQuery};
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let (users, pagination) = state.user_service.list_users(filter, &ctx).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "users": users, "pagination": pagination },
    }))
    .into_response())
}

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let req: CreateUserRequest = parse_body(body)?;
    let user = state.user_service.create_user(req, &ctx).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": user, "message": "User created successfully" })),
    )
        .into_response())
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let req: UpdateUserRequest = parse_body(body)?;
    let user = state.user_service.update_profile(req, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": user, "message": "User profile updated successfully" })).into_response())
}

pub async fn bulk_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let req: BulkActionRequest = parse_body(body)?;
    let report = state.bulk_actions.process(req, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": report })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateParams {
    pub user_id: Option<String>,
    pub reason: Option<String>,
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<DeactivateParams>,
) -> AppResult<Response> {
    let ctx = actor_context(&headers)?;
    let raw = params
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::validation("User ID is required"))?;
    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation("Invalid user ID"))?;

    let user = state.user_service.deactivate_user(user_id, params.reason, &ctx).await?;
    Ok(Json(json!({ "success": true, "data": user, "message": "User deactivated successfully" })).into_response())
}
