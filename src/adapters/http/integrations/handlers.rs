use axum::extract::{Json, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::domain::foundation::{ErrorCode, IntegrationId};
use crate::domain::integration::Integration;

use super::dto::{IntegrationResponse, RotateKeyResponse, UpdatePolicyRequest};
use super::API_KEY_HEADER;

fn parse_id(raw: &str) -> Result<IntegrationId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(ErrorCode::InvalidFormat, "Integration id must be a UUID"))
}

/// Loads the integration and checks the caller holds its API key.
async fn authorize(
    state: &AppState,
    raw_id: &str,
    headers: &HeaderMap,
) -> Result<Integration, ApiError> {
    let id = parse_id(raw_id)?;
    let integration = state
        .integrations
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::IntegrationNotFound, "Integration not found"))?;

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let matches: bool = provided
        .as_bytes()
        .ct_eq(integration.api_key().as_str().as_bytes())
        .into();
    if !matches {
        tracing::warn!(integration_id = %id, "Integration call with a bad API key");
        return Err(ApiError::new(ErrorCode::InvalidCredentials, "Invalid API key"));
    }
    Ok(integration)
}

/// GET /api/integrations/:id
pub async fn get_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    Ok(Json(IntegrationResponse::from(&integration)))
}

/// POST /api/integrations/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    let updated = state.admin.activate(integration.id()).await?;
    Ok(Json(IntegrationResponse::from(&updated)))
}

/// POST /api/integrations/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    let updated = state.admin.deactivate(integration.id()).await?;
    Ok(Json(IntegrationResponse::from(&updated)))
}

/// POST /api/integrations/:id/rotate-key
pub async fn rotate_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    let key = state.admin.rotate_api_key(integration.id()).await?;
    Ok(Json(RotateKeyResponse {
        api_key: key.as_str().to_string(),
    }))
}

/// PUT /api/integrations/:id/policy
pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    let updated = state
        .admin
        .update_policy(integration.id(), request.tier_id.as_deref())
        .await?;
    Ok(Json(IntegrationResponse::from(&updated)))
}

/// DELETE /api/integrations/:id
pub async fn delete_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let integration = authorize(&state, &id, &headers).await?;
    let deleted = state.admin.delete(integration.id()).await?;
    Ok(Json(IntegrationResponse::from(&deleted)))
}
