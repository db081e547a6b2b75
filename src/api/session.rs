//! Sign-in and the caller's own profile.

use crate::{
    api::{
        AppState,
        auth::{AuthUser, create_token},
        extract::Json,
    },
    core::user as user_core,
    entities::user,
    errors::{Error, Result},
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: user::Model,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: String,
}

/// `POST /auth/google-signin`
pub async fn google_signin(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>> {
    if request.token.trim().is_empty() {
        return Err(Error::validation("token is required"));
    }

    let identity = state.identity.verify(&request.token).await?;
    let auth = &state.config.auth;

    if !identity.email_verified {
        warn!(email = %identity.email, "Sign-in with unverified email");
        return Err(Error::Forbidden {
            message: "Email is not verified".to_string(),
        });
    }
    if !user_core::is_allowed_email(&identity.email, auth) {
        warn!(email = %identity.email, "Sign-in from outside the allowed domain");
        return Err(Error::Forbidden {
            message: format!("Only @{} accounts may sign in", auth.allowed_email_domain),
        });
    }

    let user =
        user_core::find_or_create_user(&state.database, &identity.email, &identity.full_name, auth)
            .await?;
    let token = create_token(&user, auth)?;

    info!(user_id = user.id, "Signed in");
    Ok(Json(SignInResponse { token, user }))
}

/// `GET /auth/user`
pub async fn current_user(AuthUser(user): AuthUser) -> Json<user::Model> {
    Json(user)
}

/// `PUT /auth/grade`
pub async fn set_grade(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GradeRequest>,
) -> Result<Json<user::Model>> {
    let updated = user_core::set_grade(&state.database, user.id, &request.grade).await?;
    Ok(Json(updated))
}
