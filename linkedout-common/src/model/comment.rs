use crate::{
    model::{
        Id,
        content::Content,
        post::PostMarker,
        user::{Author, UserMarker},
    },
    util::format_time_ago,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// A comment as stored. `liked_by` is the only record of who liked it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PartialComment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub content: Content,
    pub liked_by: BTreeSet<Id<UserMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub author: Option<Author>,
    pub content: Content,
    pub created_at: UtcDateTime,
    pub time_ago: String,
    pub likes: u64,
    pub liked_by: BTreeSet<Id<UserMarker>>,
}

/// Body of a comment creation request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CommentContent {
    pub content: String,
}

impl PartialComment {
    #[must_use]
    pub fn new(
        id: Id<CommentMarker>,
        post_id: Id<PostMarker>,
        author_id: Id<UserMarker>,
        content: Content,
    ) -> Self {
        Self {
            id,
            post_id,
            author_id,
            content,
            liked_by: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn likes(&self) -> u64 {
        self.liked_by.len() as u64
    }

    #[must_use]
    pub fn created_at(&self) -> UtcDateTime {
        self.id.created_at()
    }

    #[must_use]
    pub fn join(self, author: Option<Author>, now: UtcDateTime) -> Comment {
        Comment {
            created_at: self.created_at(),
            time_ago: format_time_ago(self.created_at(), now),
            likes: self.likes(),
            id: self.id,
            post_id: self.post_id,
            author_id: self.author_id,
            author,
            content: self.content,
            liked_by: self.liked_by,
        }
    }
}
