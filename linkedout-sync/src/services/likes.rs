use crate::{
    error::{Result, SyncError},
    toggle::ToggleEngine,
};
use linkedout_common::model::{
    Id,
    comment::CommentMarker,
    like::{LikeOutcome, LikeTarget},
    post::PostMarker,
    user::UserMarker,
};
use linkedout_db::store::{DocumentRef, Store};
use std::sync::Arc;

pub struct LikeService<S> {
    store: Arc<S>,
    engine: ToggleEngine<S>,
}

impl<S> Clone for LikeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<S: Store> LikeService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            engine: ToggleEngine::new(store.clone()),
            store,
        }
    }

    pub async fn toggle_like(
        &self,
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    ) -> Result<LikeOutcome> {
        self.engine.toggle(LikeTarget::Post(post), user).await
    }

    pub async fn toggle_comment_like(
        &self,
        comment: Id<CommentMarker>,
        user: Id<UserMarker>,
    ) -> Result<LikeOutcome> {
        self.engine.toggle(LikeTarget::Comment(comment), user).await
    }

    /// Whether `post` is in the user's liked set.
    pub async fn check_if_liked(&self, post: Id<PostMarker>, user: Id<UserMarker>) -> Result<bool> {
        let user = self
            .store
            .fetch_user(user)
            .await?
            .ok_or(SyncError::NotFound(DocumentRef::User(user)))?;

        Ok(user.has_liked(post))
    }

    /// Whether the user is in the comment's liker set.
    pub async fn check_if_comment_liked(
        &self,
        comment: Id<CommentMarker>,
        user: Id<UserMarker>,
    ) -> Result<bool> {
        let comment = self
            .store
            .fetch_comment(comment)
            .await?
            .ok_or(SyncError::NotFound(DocumentRef::Comment(comment)))?;

        Ok(comment.liked_by.contains(&user))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::SyncError,
        testing::{Fixture, fixture},
    };
    use linkedout_common::model::Id;

    #[tokio::test]
    async fn liked_checks_follow_toggles() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let comment = services
            .comments
            .add_comment(post.id, ada.id, "hi")
            .await
            .unwrap();

        assert!(!services.likes.check_if_liked(post.id, bob.id).await.unwrap());
        services.likes.toggle_like(post.id, bob.id).await.unwrap();
        assert!(services.likes.check_if_liked(post.id, bob.id).await.unwrap());
        assert!(!services.likes.check_if_liked(post.id, ada.id).await.unwrap());

        services
            .likes
            .toggle_comment_like(comment.id, bob.id)
            .await
            .unwrap();
        assert!(
            services
                .likes
                .check_if_comment_liked(comment.id, bob.id)
                .await
                .unwrap()
        );
        assert!(
            !services
                .likes
                .check_if_comment_liked(comment.id, ada.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn liked_checks_need_existing_documents() {
        let Fixture { services, .. } = fixture();

        assert!(matches!(
            services.likes.check_if_liked(Id::from(1_u64), Id::from(2_u64)).await,
            Err(SyncError::NotFound(_))
        ));
        assert!(matches!(
            services
                .likes
                .check_if_comment_liked(Id::from(1_u64), Id::from(2_u64))
                .await,
            Err(SyncError::NotFound(_))
        ));
    }
}
