use crate::{
    model::{
        Id,
        content::Content,
        user::{Author, UserMarker},
    },
    util::format_time_ago,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post as stored, without joined author data.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub content: Content,
    pub comments: u64,
    pub shares: u64,
    pub liked_by: BTreeSet<Id<UserMarker>>,
}

/// A post as shown in a feed: the stored document plus its author and age.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub author: Option<Author>,
    pub content: Content,
    pub created_at: UtcDateTime,
    pub time_ago: String,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub liked_by: BTreeSet<Id<UserMarker>>,
}

/// Body of a post creation request.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub content: String,
}

impl PartialPost {
    #[must_use]
    pub fn new(id: Id<PostMarker>, author_id: Id<UserMarker>, content: Content) -> Self {
        Self {
            id,
            author_id,
            content,
            comments: 0,
            shares: 0,
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
    pub fn join(self, author: Option<Author>, now: UtcDateTime) -> Post {
        Post {
            created_at: self.created_at(),
            time_ago: format_time_ago(self.created_at(), now),
            likes: self.likes(),
            id: self.id,
            author_id: self.author_id,
            author,
            content: self.content,
            comments: self.comments,
            shares: self.shares,
            liked_by: self.liked_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, content::Content, post::PartialPost};
    use time::Duration;

    #[test]
    fn join_derives_likes_and_age() {
        let id = Id::from(5_u64 << 22);
        let mut post = PartialPost::new(id, Id::from(1_u64), Content::new("hello").unwrap());
        post.liked_by.insert(Id::from(2_u64));
        post.liked_by.insert(Id::from(3_u64));

        let joined = post.join(None, id.created_at() + Duration::minutes(3));

        assert_eq!(joined.likes, 2);
        assert_eq!(joined.time_ago, "3m");
        assert_eq!(joined.comments, 0);
        assert!(joined.author.is_none());
    }
}
