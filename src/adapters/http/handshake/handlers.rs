//! Handshake route handlers. Each one drives a single
//! `AuthorizationSessionManager` operation.

use std::collections::BTreeMap;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use secrecy::SecretString;

use crate::domain::authorization::{IdentityProof, SessionError, SessionToken};
use crate::domain::foundation::ChatId;

use super::dto::{
    CompleteResponse, EligibleGroupResponse, InitiateRequest, IntegrationSummary,
    SelectGroupRequest, SelectTierRequest, SessionResponse,
};
use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;

/// POST /api/handshake
pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<InitiateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .handshake
        .initiate(
            &request.campaign_slug,
            &request.api_key,
            SecretString::new(request.bearer_token),
            &request.redirect_uri,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(&session))))
}

/// GET /api/handshake/:token
pub async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.handshake.get(&SessionToken::from_string(token)).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/handshake/:token/identity
///
/// The body is the login widget's callback object, posted as-is.
pub async fn confirm_identity(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(fields): Json<BTreeMap<String, serde_json::Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let proof = IdentityProof::try_from(fields).map_err(SessionError::from)?;
    let session = state
        .handshake
        .confirm_identity(&SessionToken::from_string(token), &proof)
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/handshake/:token/group
pub async fn select_group(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<SelectGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .handshake
        .select_group(
            &SessionToken::from_string(token),
            ChatId::new(request.chat_id),
            &request.title,
        )
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/handshake/:token/tier
pub async fn select_tier(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<SelectTierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .handshake
        .select_tier(&SessionToken::from_string(token), request.tier_id.as_deref())
        .await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/handshake/:token/complete
pub async fn complete(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, integration) = state
        .handshake
        .complete(&SessionToken::from_string(token))
        .await?;
    let response = CompleteResponse {
        session: SessionResponse::from(&session),
        integration: IntegrationSummary::from(&integration),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/handshake/:token/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.handshake.cancel(&SessionToken::from_string(token)).await?;
    Ok(Json(SessionResponse::from(&session)))
}

/// GET /api/groups/eligible
pub async fn list_eligible_groups(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let groups: Vec<EligibleGroupResponse> = state
        .registry
        .list_eligible()
        .await?
        .into_iter()
        .map(EligibleGroupResponse::from)
        .collect();
    Ok(Json(groups))
}
