use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json, query::Query,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use linkedout_common::model::{
    Id,
    comment::{Comment, CommentContent},
    like::LikeOutcome,
    post::{Post, PostContent, PostMarker},
};
use linkedout_db::postgres::PgStore;
use linkedout_sync::services::{
    FEED_PAGE_SIZE, MOST_LIKED_DEFAULT, RECENT_POSTS_DEFAULT, Services,
};
use serde::{Deserialize, Serialize};

/// Upper bound on client-chosen page and list sizes.
const MAX_LIMIT: usize = 100;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_posts_page)
        .typed_get(get_recent_posts)
        .typed_get(get_most_liked)
        .typed_get(search_posts)
        .typed_get(get_post)
        .typed_post(create_post)
        .typed_post(toggle_like)
        .typed_get(check_if_liked)
        .typed_get(get_comments)
        .typed_post(add_comment)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageQuery {
    page_size: Option<usize>,
    cursor: Option<Id<PostMarker>>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn get_or(self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_LIMIT)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct SearchQuery {
    term: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Liked {
    pub is_liked: bool,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn get_posts_page(
    PostsPath(): PostsPath,
    State(services): State<Services<PgStore>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Post>>> {
    let page_size = query.page_size.unwrap_or(FEED_PAGE_SIZE).min(MAX_LIMIT);
    let posts = services.posts.get_posts_page(page_size, query.cursor).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/recent", rejection(ServerError))]
struct RecentPostsPath();

async fn get_recent_posts(
    RecentPostsPath(): RecentPostsPath,
    State(services): State<Services<PgStore>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = services
        .posts
        .get_recent_posts(query.get_or(RECENT_POSTS_DEFAULT))
        .await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/most-liked", rejection(ServerError))]
struct MostLikedPath();

async fn get_most_liked(
    MostLikedPath(): MostLikedPath,
    State(services): State<Services<PgStore>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = services
        .posts
        .get_most_liked(query.get_or(MOST_LIKED_DEFAULT))
        .await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/search", rejection(ServerError))]
struct SearchPath();

async fn search_posts(
    SearchPath(): SearchPath,
    State(services): State<Services<PgStore>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = services.posts.search_posts(&query.term).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(services): State<Services<PgStore>>,
) -> Result<Json<Post>> {
    let post = services
        .posts
        .get_post_by_id(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = services
        .posts
        .create_post(&post.content, user.user_id())
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    PostLikePath { id }: PostLikePath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeOutcome>> {
    let outcome = services.likes.toggle_like(id, user.user_id()).await?;

    Ok(Json(outcome))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/liked", rejection(ServerError))]
struct PostLikedPath {
    id: Id<PostMarker>,
}

async fn check_if_liked(
    PostLikedPath { id }: PostLikedPath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
) -> Result<Json<Liked>> {
    let is_liked = services.likes.check_if_liked(id, user.user_id()).await?;

    Ok(Json(Liked { is_liked }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(services): State<Services<PgStore>>,
) -> Result<Json<Vec<Comment>>> {
    let comments = services.comments.get_comments_by_post(id).await?;

    Ok(Json(comments))
}

async fn add_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(services): State<Services<PgStore>>,
    user: AuthenticatedUser,
    Json(comment): Json<CommentContent>,
) -> Result<Json<Comment>> {
    let comment = services
        .comments
        .add_comment(id, user.user_id(), &comment.content)
        .await?;

    Ok(Json(comment))
}

#[cfg(test)]
mod tests {
    use crate::server::routes::posts::{LimitQuery, MAX_LIMIT};

    #[test]
    fn limits_default_and_clamp() {
        assert_eq!(LimitQuery { limit: None }.get_or(5), 5);
        assert_eq!(LimitQuery { limit: Some(3) }.get_or(5), 3);
        assert_eq!(LimitQuery { limit: Some(10_000) }.get_or(5), MAX_LIMIT);
    }
}
