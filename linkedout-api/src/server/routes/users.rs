use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use linkedout_common::model::{
    Id,
    post::Post,
    user::{User, UserMarker},
};
use linkedout_db::postgres::PgStore;
use linkedout_sync::services::Services;
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_users)
        .typed_get(get_user)
        .typed_get(get_user_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

async fn get_users(
    UsersPath(): UsersPath,
    State(services): State<Services<PgStore>>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(services.users.get_all_users().await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(services): State<Services<PgStore>>,
) -> Result<Json<User>> {
    let user = services
        .users
        .get_user_by_id(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(services): State<Services<PgStore>>,
) -> Result<Json<Vec<Post>>> {
    if services.users.get_user_by_id(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    Ok(Json(services.posts.get_posts_by_user(id).await?))
}
