//! User registration and push-token handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use salespulse_core::User;

use crate::db::{NewUser, UserRepository};
use crate::error::{AppError, require};
use crate::state::AppState;

/// Request body for `POST /api/v1/create-user`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub user_token: Option<String>,
}

/// Response for user creation.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub success: bool,
    pub message: String,
    pub data: User,
}

/// Register a new user with their push token.
#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, AppError> {
    const MISSING: &str = "Missing userId, email, or userToken";
    let user_id = require(body.user_id, MISSING)?;
    let email = require(body.email, MISSING)?;
    let user_token = require(body.user_token, MISSING)?;

    let new_user = NewUser {
        user_id,
        email,
        user_token,
        created_at: Utc::now(),
    };
    let user = UserRepository::new(state.pool()).create(&new_user).await?;

    Ok(Json(CreateUserResponse {
        success: true,
        message: "User created".to_string(),
        data: user,
    }))
}

/// Request body for `PUT /api/v1/update-token`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokenRequest {
    pub user_id: Option<String>,
    pub user_token: Option<String>,
}

/// Response for token replacement.
#[derive(Debug, Serialize)]
pub struct UpdateTokenResponse {
    pub success: bool,
    pub message: String,
}

/// Replace a user's push token.
#[instrument(skip(state, body))]
pub async fn update_token(
    State(state): State<AppState>,
    Json(body): Json<UpdateTokenRequest>,
) -> Result<Json<UpdateTokenResponse>, AppError> {
    const MISSING: &str = "Missing userId or userToken";
    let user_id = require(body.user_id, MISSING)?;
    let user_token = require(body.user_token, MISSING)?;

    let updated = UserRepository::new(state.pool())
        .update_token(&user_id, &user_token)
        .await?;
    if updated == 0 {
        tracing::debug!(user_id = %user_id, "Token update matched no user");
    }

    Ok(Json(UpdateTokenResponse {
        success: true,
        message: "Token updated".to_string(),
    }))
}
