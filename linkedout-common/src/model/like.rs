use crate::model::{Id, comment::CommentMarker, post::PostMarker};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Something a user can like.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LikeTarget {
    Post(Id<PostMarker>),
    Comment(Id<CommentMarker>),
}

/// State of a like after a toggle, as confirmed by the store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct LikeOutcome {
    pub is_liked: bool,
    pub likes_count: u64,
}

impl Display for LikeTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LikeTarget::Post(id) => write!(f, "post {id}"),
            LikeTarget::Comment(id) => write!(f, "comment {id}"),
        }
    }
}
