//! The like toggle. A post like lives on both the post (its liker set) and
//! the user (their liked-post set); both sides are written in one batch.
//! A comment like lives only in the comment's liker set.

use crate::error::{Result, SyncError};
use futures::try_join;
use linkedout_common::model::{
    Id,
    comment::CommentMarker,
    like::{LikeOutcome, LikeTarget},
    post::PostMarker,
    user::UserMarker,
};
use linkedout_db::{
    batch::{Write, WriteBatch},
    store::{DbError, DocumentRef, Store},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

pub struct ToggleEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ToggleEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> ToggleEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Flips whether `actor` likes `target` and returns the new state.
    #[instrument(skip(self))]
    pub async fn toggle(&self, target: LikeTarget, actor: Id<UserMarker>) -> Result<LikeOutcome> {
        let (batch, outcome) = match target {
            LikeTarget::Post(post) => self.plan_post(post, actor).await?,
            LikeTarget::Comment(comment) => self.plan_comment(comment, actor).await?,
        };

        match self.store.commit(&batch).await {
            Ok(()) => {
                debug!(?outcome, "Toggled like");
                Ok(outcome)
            }
            Err(DbError::PartialCommit { applied, total }) => {
                error!(applied, total, "Like was only partially written");
                Err(SyncError::InconsistentState {
                    target,
                    actor,
                    applied,
                    total,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn plan_post(
        &self,
        post_id: Id<PostMarker>,
        actor: Id<UserMarker>,
    ) -> Result<(WriteBatch, LikeOutcome)> {
        let (user, post) = try_join!(self.store.fetch_user(actor), self.store.fetch_post(post_id))?;
        let user = user.ok_or(SyncError::NotFound(DocumentRef::User(actor)))?;
        let mut post = post.ok_or(SyncError::NotFound(DocumentRef::Post(post_id)))?;

        // The actor's liked set decides, the liker set follows.
        let is_liked = user.has_liked(post_id);
        let batch = if is_liked {
            post.liked_by.remove(&actor);
            WriteBatch::new()
                .with(Write::RemovePostLiker {
                    post: post_id,
                    user: actor,
                })
                .with(Write::RemoveLikedPost {
                    user: actor,
                    post: post_id,
                })
        } else {
            post.liked_by.insert(actor);
            WriteBatch::new()
                .with(Write::AddPostLiker {
                    post: post_id,
                    user: actor,
                })
                .with(Write::AddLikedPost {
                    user: actor,
                    post: post_id,
                })
        };

        Ok((
            batch,
            LikeOutcome {
                is_liked: !is_liked,
                likes_count: post.likes(),
            },
        ))
    }

    async fn plan_comment(
        &self,
        comment_id: Id<CommentMarker>,
        actor: Id<UserMarker>,
    ) -> Result<(WriteBatch, LikeOutcome)> {
        let (user, comment) = try_join!(
            self.store.fetch_user(actor),
            self.store.fetch_comment(comment_id)
        )?;
        if user.is_none() {
            return Err(SyncError::NotFound(DocumentRef::User(actor)));
        }
        let mut comment = comment.ok_or(SyncError::NotFound(DocumentRef::Comment(comment_id)))?;

        let is_liked = !comment.liked_by.insert(actor);
        let write = if is_liked {
            comment.liked_by.remove(&actor);
            Write::RemoveCommentLiker {
                comment: comment_id,
                user: actor,
            }
        } else {
            Write::AddCommentLiker {
                comment: comment_id,
                user: actor,
            }
        };

        Ok((
            write.into(),
            LikeOutcome {
                is_liked: !is_liked,
                likes_count: comment.likes(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::SyncError,
        testing::{Fixture, fixture},
        toggle::ToggleEngine,
    };
    use linkedout_common::model::{
        Id,
        like::{LikeOutcome, LikeTarget},
        post::PostMarker,
        user::UserMarker,
    };
    use linkedout_db::{
        memory::{Fault, MemoryStore},
        store::{DocumentRef, Store},
    };

    async fn assert_bidirectional(
        store: &MemoryStore,
        post: Id<PostMarker>,
        users: &[Id<UserMarker>],
    ) {
        let stored = store.fetch_post(post).await.unwrap().unwrap();
        for user in users {
            let stored_user = store.fetch_user(*user).await.unwrap().unwrap();
            assert_eq!(
                stored_user.has_liked(post),
                stored.liked_by.contains(user),
                "like sides disagree for user {user}"
            );
        }
        assert_eq!(stored.likes(), stored.liked_by.len() as u64);
    }

    #[tokio::test]
    async fn like_then_unlike() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let engine = ToggleEngine::new(store.clone());

        let liked = engine.toggle(LikeTarget::Post(post.id), bob.id).await.unwrap();
        assert_eq!(
            liked,
            LikeOutcome {
                is_liked: true,
                likes_count: 1
            }
        );
        let bob_now = services.users.get_user_by_id(bob.id).await.unwrap().unwrap();
        assert!(bob_now.has_liked(post.id));
        assert_bidirectional(&store, post.id, &[ada.id, bob.id]).await;

        let unliked = engine.toggle(LikeTarget::Post(post.id), bob.id).await.unwrap();
        assert_eq!(
            unliked,
            LikeOutcome {
                is_liked: false,
                likes_count: 0
            }
        );
        let bob_now = services.users.get_user_by_id(bob.id).await.unwrap().unwrap();
        assert!(!bob_now.has_liked(post.id));
        assert_bidirectional(&store, post.id, &[ada.id, bob.id]).await;
    }

    #[tokio::test]
    async fn double_toggle_restores_state_among_other_likers() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let cid = services.users.create_user(Fixture::profile("Cid")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let engine = ToggleEngine::new(store.clone());
        let target = LikeTarget::Post(post.id);
        engine.toggle(target, ada.id).await.unwrap();

        let first = engine.toggle(target, cid.id).await.unwrap();
        let second = engine.toggle(target, cid.id).await.unwrap();
        let bob_first = engine.toggle(target, bob.id).await.unwrap();
        let bob_second = engine.toggle(target, bob.id).await.unwrap();

        assert_eq!(first.likes_count, 2);
        assert_eq!(second, LikeOutcome { is_liked: false, likes_count: 1 });
        assert_eq!(bob_first.likes_count, 2);
        assert_eq!(bob_second.likes_count, 1);
        assert_bidirectional(&store, post.id, &[ada.id, bob.id, cid.id]).await;
    }

    #[tokio::test]
    async fn comment_likes_are_not_mirrored_on_the_user() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let comment = services
            .comments
            .add_comment(post.id, ada.id, "first")
            .await
            .unwrap();
        let engine = ToggleEngine::new(store.clone());

        let outcome = engine
            .toggle(LikeTarget::Comment(comment.id), ada.id)
            .await
            .unwrap();

        assert_eq!(outcome, LikeOutcome { is_liked: true, likes_count: 1 });
        let ada_now = services.users.get_user_by_id(ada.id).await.unwrap().unwrap();
        assert!(ada_now.liked_posts.is_empty());

        let outcome = engine
            .toggle(LikeTarget::Comment(comment.id), ada.id)
            .await
            .unwrap();
        assert_eq!(outcome, LikeOutcome { is_liked: false, likes_count: 0 });
    }

    #[tokio::test]
    async fn missing_actor_or_target_is_not_found() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let engine = ToggleEngine::new(store);
        let ghost = Id::from(3_u64);
        let missing_post = Id::from(9_u64 << 22);

        assert!(matches!(
            engine.toggle(LikeTarget::Post(post.id), ghost).await,
            Err(SyncError::NotFound(DocumentRef::User(id))) if id == ghost
        ));
        assert!(matches!(
            engine.toggle(LikeTarget::Post(missing_post), ada.id).await,
            Err(SyncError::NotFound(DocumentRef::Post(id))) if id == missing_post
        ));
        assert!(matches!(
            engine.toggle(LikeTarget::Comment(Id::from(4_u64)), ada.id).await,
            Err(SyncError::NotFound(DocumentRef::Comment(_)))
        ));
    }

    #[tokio::test]
    async fn partial_write_is_inconsistent_state() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let engine = ToggleEngine::new(store.clone());
        store.fail_next_commit(Fault::AfterWrites(1));

        let result = engine.toggle(LikeTarget::Post(post.id), ada.id).await;

        assert!(matches!(
            result,
            Err(SyncError::InconsistentState {
                target: LikeTarget::Post(id),
                applied: 1,
                total: 2,
                ..
            }) if id == post.id
        ));
    }

    #[tokio::test]
    async fn failed_commit_leaves_both_sides_untouched() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        let engine = ToggleEngine::new(store.clone());
        store.fail_next_commit(Fault::Unavailable);

        let result = engine.toggle(LikeTarget::Post(post.id), ada.id).await;

        assert!(matches!(result, Err(SyncError::TransientStore(_))));
        assert_bidirectional(&store, post.id, &[ada.id]).await;
        let ada_now = services.users.get_user_by_id(ada.id).await.unwrap().unwrap();
        assert!(!ada_now.has_liked(post.id));
    }
}
