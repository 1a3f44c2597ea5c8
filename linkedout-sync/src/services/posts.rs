use crate::{
    error::{Result, SyncError},
    services::{join_post, join_posts},
};
use linkedout_common::model::{
    Id,
    content::Content,
    post::{PartialPost, Post, PostMarker},
    user::UserMarker,
};
use linkedout_db::{
    batch::Write,
    store::{DocumentRef, PostQuery, Store},
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Size of every page of the unfiltered feed.
pub const FEED_PAGE_SIZE: usize = 7;
pub const USER_POSTS_SOFT_CAP: usize = 50;
/// How many of the newest posts a search looks at.
pub const SEARCH_WINDOW: usize = 100;
pub const RECENT_POSTS_DEFAULT: usize = 5;
pub const MOST_LIKED_DEFAULT: usize = 5;

pub struct PostService<S> {
    store: Arc<S>,
}

impl<S> Clone for PostService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> PostService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Up to `page_size` posts, newest first, strictly older than `cursor`.
    ///
    /// Fails with [`SyncError::NotFound`] when `cursor` names no post.
    #[instrument(skip(self))]
    pub async fn get_posts_page(
        &self,
        page_size: usize,
        cursor: Option<Id<PostMarker>>,
    ) -> Result<Vec<Post>> {
        let mut query = PostQuery::newest(page_size);
        if let Some(cursor) = cursor {
            if self.store.fetch_post(cursor).await?.is_none() {
                return Err(SyncError::NotFound(DocumentRef::Post(cursor)));
            }
            query = query.after(cursor);
        }

        self.query(query).await
    }

    pub async fn get_recent_posts(&self, n: usize) -> Result<Vec<Post>> {
        self.query(PostQuery::newest(n)).await
    }

    pub async fn get_posts_by_user(&self, user: Id<UserMarker>) -> Result<Vec<Post>> {
        self.query(PostQuery::newest(USER_POSTS_SOFT_CAP).by_author(user))
            .await
    }

    pub async fn get_most_liked(&self, n: usize) -> Result<Vec<Post>> {
        self.query(PostQuery::most_liked(n)).await
    }

    /// Case-insensitive substring search over the [`SEARCH_WINDOW`] newest posts.
    /// A blank term matches nothing.
    #[instrument(skip(self))]
    pub async fn search_posts(&self, term: &str) -> Result<Vec<Post>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let matching = self
            .store
            .query_posts(PostQuery::newest(SEARCH_WINDOW))
            .await?
            .into_iter()
            .filter(|post| post.content.matches(term))
            .collect();

        join_posts(&*self.store, matching).await
    }

    pub async fn get_post_by_id(&self, id: Id<PostMarker>) -> Result<Option<Post>> {
        match self.store.fetch_post(id).await? {
            Some(post) => Ok(Some(join_post(&*self.store, post).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, content))]
    pub async fn create_post(&self, content: &str, author: Id<UserMarker>) -> Result<Post> {
        let content = Content::new(content)?;
        let post = PartialPost::new(self.store.next_id()?, author, content);

        self.store
            .commit(&Write::InsertPost(post.clone()).into())
            .await?;
        debug!(post = %post.id, "Created post");

        join_post(&*self.store, post).await
    }

    async fn query(&self, query: PostQuery) -> Result<Vec<Post>> {
        let posts = self.store.query_posts(query).await?;
        debug!(count = posts.len(), "Fetched posts");

        join_posts(&*self.store, posts).await
    }
}
