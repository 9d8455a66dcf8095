use crate::domain::audit::{ENTITY_PAYMENT, ENTITY_USER};
use crate::error::{AppError, AppResult};
use crate::http::extract::ApiPath;
use crate::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// Internal read of one entity's audit trail, oldest first.
pub async fn entity_trail(
    State(state): State<AppState>,
    ApiPath((entity_type, entity_id)): ApiPath<(String, Uuid)>,
) -> AppResult<Response> {
    let entity_type = entity_type.to_ascii_uppercase();
    if entity_type != ENTITY_USER && entity_type != ENTITY_PAYMENT {
        return Err(AppError::validation(format!("Unknown entity type: {entity_type}")));
    }
    let mut entries = state.audit_log.for_entity(&entity_type, entity_id).await?;
    entries.sort_by_key(|e| e.timestamp);
    Ok(Json(json!({ "success": true, "data": entries })).into_response())
}
