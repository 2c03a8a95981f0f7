//! Auth Routes
//!
//! - POST /api/v1/auth/sign-up - Create an account and its profile
//! - POST /api/v1/auth/sign-in - Sign in (`remember_me` keeps the session)
//! - POST /api/v1/auth/sign-out - Sign out and mark the user offline
//! - GET /api/v1/auth/session - Current session

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{SessionResponse, SignInRequest, SignUpRequest, SignUpResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::session::SignUpStatus;

/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    validate_credentials(&req.email, &req.password)?;

    let response = match state
        .sessions
        .sign_up(req.email.trim(), &req.password, req.username.trim())
        .await?
    {
        SignUpStatus::SignedIn(session) => {
            state.reset_session_state().await;
            state.record_activity(session.user_id(), "sign_up").await;
            SignUpResponse {
                user_id: session.user.id.clone(),
                confirmation_required: false,
                session: Some(SessionResponse::from(&session)),
            }
        }
        SignUpStatus::ConfirmationRequired(user) => SignUpResponse {
            user_id: user.id,
            confirmation_required: true,
            session: None,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/sign-in
///
/// Refreshes the login streak and marks the user online.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SessionResponse>> {
    validate_credentials(&req.email, &req.password)?;

    let session = state
        .sessions
        .sign_in(req.email.trim(), &req.password, req.remember_me)
        .await?;
    state.reset_session_state().await;
    state.record_activity(session.user_id(), "login").await;

    Ok(Json(SessionResponse::from(&session)))
}

/// POST /api/v1/auth/sign-out
pub async fn sign_out(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    let result = state.sessions.sign_out().await;
    state.reset_session_state().await;
    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
pub async fn current_session(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.sessions.require().await?;
    Ok(Json(SessionResponse::from(&session)))
}

fn validate_credentials(email: &str, password: &str) -> ApiResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("A valid e-mail address is required".into()));
    }
    if password.is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    Ok(())
}
