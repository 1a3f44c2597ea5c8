use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json, routes::posts::Liked,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use linkedout_common::model::{Id, comment::CommentMarker, like::LikeOutcome};
use linkedout_db::postgres::PgStore;
use linkedout_sync::services::Services;
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(toggle_comment_like)
        .typed_get(check_if_comment_liked)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}/like", rejection(ServerError))]
struct CommentLikePath {
    id: Id<CommentMarker>,
}

async fn toggle_comment_like(
    CommentLikePath { id }: CommentLikePath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeOutcome>> {
    let outcome = services
        .likes
        .toggle_comment_like(id, user.user_id())
        .await?;

    Ok(Json(outcome))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}/liked", rejection(ServerError))]
struct CommentLikedPath {
    id: Id<CommentMarker>,
}

async fn check_if_comment_liked(
    CommentLikedPath { id }: CommentLikedPath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
) -> Result<Json<Liked>> {
    let is_liked = services
        .likes
        .check_if_comment_liked(id, user.user_id())
        .await?;

    Ok(Json(Liked { is_liked }))
}
