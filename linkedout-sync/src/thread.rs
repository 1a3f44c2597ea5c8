//! The comment list under one post, as shown to one actor.

use crate::{
    error::{Result, SyncError},
    services::Services,
};
use futures::future::try_join_all;
use linkedout_common::model::{
    Id,
    comment::{Comment, CommentMarker},
    like::LikeOutcome,
    post::PostMarker,
    user::UserMarker,
};
use linkedout_db::store::Store;
use std::collections::BTreeSet;
use tracing::debug;

pub struct CommentThread<S> {
    services: Services<S>,
    post: Id<PostMarker>,
    actor: Option<Id<UserMarker>>,
    comments: Vec<Comment>,
    liked: BTreeSet<Id<CommentMarker>>,
}

impl<S: Store> CommentThread<S> {
    pub fn new(services: Services<S>, post: Id<PostMarker>, actor: Option<Id<UserMarker>>) -> Self {
        Self {
            services,
            post,
            actor,
            comments: Vec::new(),
            liked: BTreeSet::new(),
        }
    }

    pub fn post(&self) -> Id<PostMarker> {
        self.post
    }

    /// Newest first.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn is_liked(&self, comment: Id<CommentMarker>) -> bool {
        self.liked.contains(&comment)
    }

    /// Replaces the shown comments. On error nothing changes.
    pub async fn load(&mut self) -> Result<()> {
        let comments = self.services.comments.get_comments_by_post(self.post).await?;
        let liked = match self.actor {
            Some(actor) => {
                let checks = try_join_all(comments.iter().map(|comment| {
                    self.services
                        .likes
                        .check_if_comment_liked(comment.id, actor)
                }))
                .await?;
                comments
                    .iter()
                    .zip(checks)
                    .filter_map(|(comment, liked)| liked.then_some(comment.id))
                    .collect()
            }
            None => BTreeSet::new(),
        };

        debug!(post = %self.post, count = comments.len(), "Loaded comment thread");
        self.comments = comments;
        self.liked = liked;
        Ok(())
    }

    pub async fn add_comment(&mut self, content: &str) -> Result<Comment> {
        let actor = self.actor.ok_or(SyncError::SignedOut)?;
        let comment = self
            .services
            .comments
            .add_comment(self.post, actor, content)
            .await?;
        self.comments.insert(0, comment.clone());

        Ok(comment)
    }

    pub async fn toggle_like(&mut self, comment: Id<CommentMarker>) -> Result<LikeOutcome> {
        let actor = self.actor.ok_or(SyncError::SignedOut)?;
        let outcome = self
            .services
            .likes
            .toggle_comment_like(comment, actor)
            .await?;

        if outcome.is_liked {
            self.liked.insert(comment);
        } else {
            self.liked.remove(&comment);
        }
        if let Some(shown) = self.comments.iter_mut().find(|shown| shown.id == comment) {
            shown.likes = outcome.likes_count;
            if outcome.is_liked {
                shown.liked_by.insert(actor);
            } else {
                shown.liked_by.remove(&actor);
            }
        }

        Ok(outcome)
    }
}
