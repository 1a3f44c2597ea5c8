use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, issue_token},
    json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use linkedout_common::{
    model::{
        ModelValidationError,
        auth::{IssuedToken, SignIn, SignUp},
        user::{DisplayName, Email, UserProfile},
    },
    util::PositiveDuration,
};
use linkedout_db::{batch::Write, postgres::PgStore, store::Store};
use linkedout_sync::services::Services;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(sign_up)
        .typed_post(sign_in)
        .typed_post(sign_out)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/sign-up", rejection(ServerError))]
struct SignUpPath();

async fn sign_up(
    SignUpPath(): SignUpPath,
    State(services): State<Services<PgStore>>,
    State(store): State<Arc<PgStore>>,
    State(token_ttl): State<Option<PositiveDuration>>,
    Json(sign_up): Json<SignUp>,
) -> Result<Json<IssuedToken>> {
    let name = DisplayName::from_parts(&sign_up.first_name, &sign_up.last_name)
        .map_err(ModelValidationError::from)?;
    let email = Email::new(&sign_up.email).map_err(ModelValidationError::from)?;
    let profile = UserProfile::new(
        name,
        email,
        sign_up.title,
        sign_up.company,
        sign_up.location,
    );

    let user = services.users.register(profile, &sign_up.password).await?;

    Ok(Json(issue_token(&store, user.id, token_ttl).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/sign-in", rejection(ServerError))]
struct SignInPath();

async fn sign_in(
    SignInPath(): SignInPath,
    State(store): State<Arc<PgStore>>,
    State(token_ttl): State<Option<PositiveDuration>>,
    Json(sign_in): Json<SignIn>,
) -> Result<Json<IssuedToken>> {
    let email = Email::new(&sign_in.email).map_err(|_| ServerError::InvalidCredentials)?;
    let credentials = store
        .fetch_credentials(&email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    if !credentials.verify(&sign_in.password)? {
        debug!(user = %credentials.user, "Rejected sign-in with a wrong password");
        return Err(ServerError::InvalidCredentials);
    }

    Ok(Json(issue_token(&store, credentials.user, token_ttl).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/sign-out", rejection(ServerError))]
struct SignOutPath();

async fn sign_out(
    SignOutPath(): SignOutPath,
    State(store): State<Arc<PgStore>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    store
        .commit(&Write::DeleteAuthentication(user.token_hash().clone()).into())
        .await?;
    debug!(user = %user.user_id(), "Signed out");

    Ok(StatusCode::NO_CONTENT)
}
