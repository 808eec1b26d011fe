use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, MessageResponse, RegisterRequest, TokenResponse},
        errors::AuthError,
        extractors::CurrentUser,
        repo_types::User,
        services::RegisterUser,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/register", post(register))
        .route("/token", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "malformed register body");
        AuthError::Validation(rejection.body_text())
    })?;
    state
        .auth
        .register(RegisterUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    Ok(Json(MessageResponse {
        msg: "User created successfully",
    }))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Form(form) = form.map_err(|rejection| {
        warn!(error = %rejection, "malformed token form");
        AuthError::Validation(rejection.body_text())
    })?;
    if let Some(grant) = form.grant_type.as_deref() {
        if grant != "password" {
            warn!(grant_type = %grant, "unsupported grant type");
            return Err(AuthError::Validation("Unsupported grant_type".into()));
        }
    }
    let token = state.auth.login(&form.username, &form.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
