use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, MessageResponse, PublicUser, RegisterRequest, ResetTokenRequest,
            ResetTokenResponse, SessionResponse, UpdatePasswordRequest,
        },
        error::AuthError,
    },
    state::AppState,
    store::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/sessions", post(login).delete(logout))
        .route("/profile", get(profile))
        .route(
            "/reset_password",
            post(reset_password_token).put(update_password),
        )
}

/// The caller's identity, resolved from a bearer session token.
pub struct SessionUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match state.auth.user_by_session_id(token).await {
            Ok(Some(user)) => Ok(SessionUser(user)),
            Ok(None) => {
                warn!("no valid session for request");
                Err((StatusCode::FORBIDDEN, "No valid session".to_string()))
            }
            Err(e) => {
                error!(error = %e, "session lookup failed");
                Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        }
    }
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    if !is_valid_email(payload.email.trim()) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match state.auth.register_user(&payload.email, &payload.password).await {
        Ok(u) => u,
        Err(AuthError::AlreadyRegistered(email)) => {
            warn!(email = %email, "email already registered");
            return Err((StatusCode::BAD_REQUEST, "Email already registered".into()));
        }
        Err(e) => {
            error!(error = %e, "register_user failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            email: user.email,
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    let ok = match state.auth.valid_login(&payload.email, &payload.password).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "valid_login failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(email = %payload.email, "login with invalid credentials");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let session_id = match state.auth.create_session(&payload.email).await {
        Ok(Some(sid)) => sid,
        Ok(None) => {
            // Credentials just verified; the user must exist.
            warn!(email = %payload.email, "user vanished between login and session");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "create_session failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let user = match state.auth.user_by_session_id(Some(session_id.as_str())).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            error!("fresh session not resolvable");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Session lookup failed".into()));
        }
        Err(e) => {
            error!(error = %e, "session lookup failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(SessionResponse {
        session_id,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, user))]
async fn logout(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<StatusCode, (StatusCode, String)> {
    if let Err(e) = state.auth.destroy_session(user.id).await {
        error!(error = %e, user_id = %user.id, "destroy_session failed");
        return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    info!(user_id = %user.id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(user))]
async fn profile(SessionUser(user): SessionUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.id,
        email: user.email,
    })
}

#[instrument(skip(state, payload))]
async fn reset_password_token(
    State(state): State<AppState>,
    Json(payload): Json<ResetTokenRequest>,
) -> Result<Json<ResetTokenResponse>, (StatusCode, String)> {
    match state.auth.reset_password_token(&payload.email).await {
        Ok(reset_token) => Ok(Json(ResetTokenResponse {
            email: payload.email,
            reset_token,
        })),
        Err(AuthError::UserNotFound) => {
            warn!(email = %payload.email, "reset token requested for unknown email");
            Err((StatusCode::FORBIDDEN, "Access denied".into()))
        }
        Err(e) => {
            error!(error = %e, "reset_password_token failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[instrument(skip(state, payload))]
async fn update_password(
    State(state): State<AppState>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    match state
        .auth
        .update_password(&payload.reset_token, &payload.new_password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password updated".into(),
        })),
        Err(AuthError::InvalidResetToken) => {
            warn!("password update with invalid reset token");
            Err((StatusCode::FORBIDDEN, "Access denied".into()))
        }
        Err(e) => {
            error!(error = %e, "update_password failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }
}
