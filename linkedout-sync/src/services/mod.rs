//! Entity access over a [`Store`]. Reads that return posts or comments join
//! each item's author with one extra point read.

mod comments;
mod likes;
mod posts;
mod users;

pub use comments::CommentService;
pub use likes::LikeService;
pub use posts::{
    FEED_PAGE_SIZE, MOST_LIKED_DEFAULT, PostService, RECENT_POSTS_DEFAULT, SEARCH_WINDOW,
    USER_POSTS_SOFT_CAP,
};
pub use users::UserService;

use crate::error::Result;
use futures::future::try_join_all;
use linkedout_common::model::{
    Id,
    comment::{Comment, PartialComment},
    post::{PartialPost, Post},
    user::{Author, UserMarker},
};
use linkedout_db::store::Store;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::warn;

/// All entity services, sharing one store.
pub struct Services<S> {
    pub users: UserService<S>,
    pub posts: PostService<S>,
    pub likes: LikeService<S>,
    pub comments: CommentService<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            posts: PostService::new(store.clone()),
            likes: LikeService::new(store.clone()),
            comments: CommentService::new(store),
        }
    }
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            posts: self.posts.clone(),
            likes: self.likes.clone(),
            comments: self.comments.clone(),
        }
    }
}

/// A missing author is logged and joined as absent rather than failing the read.
async fn fetch_author<S: Store>(store: &S, id: Id<UserMarker>) -> Result<Option<Author>> {
    let author = store.fetch_user(id).await?.map(|user| user.author());
    if author.is_none() {
        warn!(author = %id, "Author of a document does not exist");
    }
    Ok(author)
}

pub(crate) async fn join_post<S: Store>(store: &S, post: PartialPost) -> Result<Post> {
    let author = fetch_author(store, post.author_id).await?;
    Ok(post.join(author, UtcDateTime::now()))
}

pub(crate) async fn join_posts<S: Store>(store: &S, posts: Vec<PartialPost>) -> Result<Vec<Post>> {
    try_join_all(posts.into_iter().map(|post| join_post(store, post))).await
}

pub(crate) async fn join_comment<S: Store>(store: &S, comment: PartialComment) -> Result<Comment> {
    let author = fetch_author(store, comment.author_id).await?;
    Ok(comment.join(author, UtcDateTime::now()))
}

pub(crate) async fn join_comments<S: Store>(
    store: &S,
    comments: Vec<PartialComment>,
) -> Result<Vec<Comment>> {
    try_join_all(comments.into_iter().map(|comment| join_comment(store, comment))).await
}
