use crate::{
    error::Result,
    services::{join_comment, join_comments},
};
use linkedout_common::model::{
    Id,
    comment::{Comment, PartialComment},
    content::Content,
    post::PostMarker,
    user::UserMarker,
};
use linkedout_db::{
    batch::{Write, WriteBatch},
    store::Store,
};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct CommentService<S> {
    store: Arc<S>,
}

impl<S> Clone for CommentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> CommentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Comments on `post`, newest first.
    pub async fn get_comments_by_post(&self, post: Id<PostMarker>) -> Result<Vec<Comment>> {
        let comments = self.store.query_comments(post).await?;
        debug!(%post, count = comments.len(), "Fetched comments");

        join_comments(&*self.store, comments).await
    }

    /// Inserts the comment and bumps the post's comment count together.
    #[instrument(skip(self, content))]
    pub async fn add_comment(
        &self,
        post: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &str,
    ) -> Result<Comment> {
        let content = Content::new(content)?;
        let comment = PartialComment::new(self.store.next_id()?, post, author, content);

        let batch = WriteBatch::new()
            .with(Write::IncrementPostComments(post))
            .with(Write::InsertComment(comment.clone()));
        self.store.commit(&batch).await?;
        debug!(comment = %comment.id, "Added comment");

        join_comment(&*self.store, comment).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::SyncError,
        testing::{Fixture, fixture},
    };
    use linkedout_common::model::Id;
    use linkedout_db::store::DocumentRef;

    #[tokio::test]
    async fn comments_list_newest_first() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let cid = services.users.create_user(Fixture::profile("Cid")).await.unwrap();
        let dee = services.users.create_user(Fixture::profile("Dee")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();

        services.comments.add_comment(post.id, cid.id, "nice").await.unwrap();
        let comments = services.comments.get_comments_by_post(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content.get(), "nice");
        assert_eq!(comments[0].author.as_ref().unwrap().id, cid.id);

        services.comments.add_comment(post.id, dee.id, "agreed").await.unwrap();
        let comments = services.comments.get_comments_by_post(post.id).await.unwrap();
        assert_eq!(
            comments
                .iter()
                .map(|comment| comment.content.get())
                .collect::<Vec<_>>(),
            ["agreed", "nice"]
        );

        let post = services.posts.get_post_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.comments, 2);
    }

    #[tokio::test]
    async fn comment_on_missing_post_writes_nothing() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let missing = Id::from(11_u64 << 22);

        let result = services.comments.add_comment(missing, ada.id, "hello?").await;

        assert!(matches!(
            result,
            Err(SyncError::NotFound(DocumentRef::Post(id))) if id == missing
        ));
        assert!(services.comments.get_comments_by_post(missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();

        let result = services.comments.add_comment(post.id, ada.id, "").await;

        assert!(matches!(result, Err(SyncError::Validation(_))));
    }
}
