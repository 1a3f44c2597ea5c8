//! Displayed-feed state for one signed-in session.
//!
//! Every load is a [`FeedRequest`] stamped with the session generation at
//! issue time. Switching modes or identities bumps the generation, so a
//! response that arrives after a newer intent is dropped by
//! [`FeedSession::commit`] instead of overwriting what is shown.

use crate::{
    error::{Result, SyncError},
    services::{FEED_PAGE_SIZE, Services},
};
use futures::future::try_join_all;
use linkedout_common::model::{
    Id,
    like::LikeOutcome,
    post::{Post, PostMarker},
    user::UserMarker,
};
use linkedout_db::store::{DocumentRef, Store};
use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

/// Which posts a feed shows. Only [`FeedMode::All`] loads more pages.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum FeedMode {
    #[default]
    All,
    ByUser(Id<UserMarker>),
    Search(String),
    SinglePost(Id<PostMarker>),
}

impl FeedMode {
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        matches!(self, FeedMode::All)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FeedState {
    mode: FeedMode,
    posts: Vec<Post>,
    liked: BTreeSet<Id<PostMarker>>,
    has_more: bool,
}

impl FeedState {
    #[must_use]
    pub fn mode(&self) -> &FeedMode {
        &self.mode
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn is_liked(&self, post: Id<PostMarker>) -> bool {
        self.liked.contains(&post)
    }

    /// The oldest shown post, which the next page must be older than.
    #[must_use]
    pub fn cursor(&self) -> Option<Id<PostMarker>> {
        if self.mode.is_paginated() {
            self.posts.last().map(|post| post.id)
        } else {
            None
        }
    }

    fn post_mut(&mut self, id: Id<PostMarker>) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| post.id == id)
    }
}

/// A pending load. `cursor` is set when the page is to be appended.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedRequest {
    generation: u64,
    mode: FeedMode,
    cursor: Option<Id<PostMarker>>,
    actor: Option<Id<UserMarker>>,
}

/// Posts and their liked state, fetched for one [`FeedRequest`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedPage {
    request: FeedRequest,
    posts: Vec<Post>,
    liked: BTreeSet<Id<PostMarker>>,
}

impl FeedRequest {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn mode(&self) -> &FeedMode {
        &self.mode
    }

    /// Loads the posts, then checks every post's liked state concurrently.
    /// Nothing is returned unless all of it succeeded.
    #[instrument(skip_all, fields(generation = self.generation, mode = ?self.mode))]
    pub async fn fetch<S: Store>(self, services: &Services<S>) -> Result<FeedPage> {
        let posts = match &self.mode {
            FeedMode::All => {
                match services.posts.get_posts_page(FEED_PAGE_SIZE, self.cursor).await {
                    Err(SyncError::NotFound(DocumentRef::Post(cursor)))
                        if Some(cursor) == self.cursor =>
                    {
                        debug!(%cursor, "Feed cursor no longer exists, ending the feed");
                        Vec::new()
                    }
                    result => result?,
                }
            }
            FeedMode::ByUser(user) => services.posts.get_posts_by_user(*user).await?,
            FeedMode::Search(term) => services.posts.search_posts(term).await?,
            FeedMode::SinglePost(post) => services
                .posts
                .get_post_by_id(*post)
                .await?
                .into_iter()
                .collect(),
        };

        let liked = match self.actor {
            Some(actor) => {
                let checks = try_join_all(
                    posts
                        .iter()
                        .map(|post| services.likes.check_if_liked(post.id, actor)),
                )
                .await?;
                posts
                    .iter()
                    .zip(checks)
                    .filter_map(|(post, liked)| liked.then_some(post.id))
                    .collect()
            }
            None => BTreeSet::new(),
        };

        Ok(FeedPage {
            request: self,
            posts,
            liked,
        })
    }
}

pub struct FeedSession<S> {
    services: Services<S>,
    actor: Option<Id<UserMarker>>,
    generation: u64,
    state: FeedState,
}

impl<S: Store> FeedSession<S> {
    pub fn new(services: Services<S>, actor: Option<Id<UserMarker>>) -> Self {
        Self {
            services,
            actor,
            generation: 0,
            state: FeedState::default(),
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn actor(&self) -> Option<Id<UserMarker>> {
        self.actor
    }

    /// Starts replacing the feed with `mode`, superseding every earlier request.
    pub fn switch_request(&mut self, mode: FeedMode) -> FeedRequest {
        self.generation += 1;
        FeedRequest {
            generation: self.generation,
            mode,
            cursor: None,
            actor: self.actor,
        }
    }

    /// The next page of the current feed, if it has one.
    pub fn load_more_request(&self) -> Option<FeedRequest> {
        if !self.state.has_more {
            return None;
        }

        Some(FeedRequest {
            generation: self.generation,
            mode: self.state.mode.clone(),
            cursor: Some(self.state.cursor()?),
            actor: self.actor,
        })
    }

    /// Shows `page` unless a newer intent superseded its request.
    pub fn commit(&mut self, page: FeedPage) -> bool {
        let FeedPage {
            request,
            posts,
            liked,
        } = page;

        if request.generation != self.generation || request.actor != self.actor {
            warn!(
                generation = request.generation,
                current = self.generation,
                "Discarding stale feed response"
            );
            return false;
        }

        let has_more = request.mode.is_paginated() && posts.len() == FEED_PAGE_SIZE;
        match request.cursor {
            None => {
                self.state = FeedState {
                    mode: request.mode,
                    posts,
                    liked,
                    has_more,
                };
            }
            Some(cursor) => {
                if self.state.mode != request.mode || self.state.cursor() != Some(cursor) {
                    warn!(%cursor, "Discarding page for an outdated cursor");
                    return false;
                }

                let shown = self
                    .state
                    .posts
                    .iter()
                    .map(|post| post.id)
                    .collect::<BTreeSet<_>>();
                self.state
                    .posts
                    .extend(posts.into_iter().filter(|post| !shown.contains(&post.id)));
                self.state.liked.extend(liked);
                self.state.has_more = has_more;
            }
        }

        debug!(
            generation = self.generation,
            posts = self.state.posts.len(),
            has_more = self.state.has_more,
            "Committed feed"
        );
        true
    }

    /// Switches to `mode` and shows its first results.
    ///
    /// Returns whether the result was shown. On error the previous feed stays.
    pub async fn switch_mode(&mut self, mode: FeedMode) -> Result<bool> {
        let request = self.switch_request(mode);
        let page = request.fetch(&self.services).await?;
        Ok(self.commit(page))
    }

    pub async fn refresh(&mut self) -> Result<bool> {
        self.switch_mode(self.state.mode.clone()).await
    }

    /// Appends the next page. A no-op outside [`FeedMode::All`] or at the end.
    pub async fn load_more(&mut self) -> Result<bool> {
        let Some(request) = self.load_more_request() else {
            return Ok(false);
        };

        let page = request.fetch(&self.services).await?;
        Ok(self.commit(page))
    }

    /// Toggles the actor's like on `post`; shown state follows the stored outcome.
    pub async fn toggle_like(&mut self, post: Id<PostMarker>) -> Result<LikeOutcome> {
        let actor = self.actor.ok_or(SyncError::SignedOut)?;
        let outcome = self.services.likes.toggle_like(post, actor).await?;

        if outcome.is_liked {
            self.state.liked.insert(post);
        } else {
            self.state.liked.remove(&post);
        }
        if let Some(shown) = self.state.post_mut(post) {
            shown.likes = outcome.likes_count;
            if outcome.is_liked {
                shown.liked_by.insert(actor);
            } else {
                shown.liked_by.remove(&actor);
            }
        }

        Ok(outcome)
    }

    /// Publishes a post as the actor and shows it if the feed would list it.
    pub async fn create_post(&mut self, content: &str) -> Result<Post> {
        let actor = self.actor.ok_or(SyncError::SignedOut)?;
        let post = self.services.posts.create_post(content, actor).await?;
        self.post_added(post.clone());

        Ok(post)
    }

    pub fn post_added(&mut self, post: Post) {
        let listed = match &self.state.mode {
            FeedMode::All => true,
            FeedMode::ByUser(author) => *author == post.author_id,
            FeedMode::Search(_) | FeedMode::SinglePost(_) => false,
        };

        if listed && self.state.post_mut(post.id).is_none() {
            self.state.posts.insert(0, post);
        }
    }

    pub fn comment_added(&mut self, post: Id<PostMarker>) {
        if let Some(shown) = self.state.post_mut(post) {
            shown.comments += 1;
        }
    }

    /// Follows a sign-in, sign-out or account switch.
    ///
    /// Liked state belonged to the previous actor and is dropped, as is any
    /// response still in flight for them. Call [`FeedSession::refresh`] after.
    pub fn set_actor(&mut self, actor: Option<Id<UserMarker>>) {
        if actor == self.actor {
            return;
        }

        self.actor = actor;
        self.generation += 1;
        self.state.liked.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::SyncError,
        feed::{FeedMode, FeedSession},
        services::FEED_PAGE_SIZE,
        testing::{Fixture, fixture},
    };
    use linkedout_common::model::Id;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn created_post_shows_in_the_feed() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));
        assert!(feed.refresh().await.unwrap());

        let post = feed.create_post("hello").await.unwrap();

        assert_eq!(feed.state().posts().len(), 1);
        assert_eq!(feed.state().posts()[0].content.get(), "hello");
        assert_eq!(feed.state().posts()[0].likes, 0);

        feed.set_actor(Some(bob.id));
        let liked = feed.toggle_like(post.id).await.unwrap();
        assert!(liked.is_liked);
        assert_eq!(liked.likes_count, 1);
        assert!(feed.state().is_liked(post.id));
        assert_eq!(feed.state().posts()[0].likes, 1);
        let bob_now = services.users.get_user_by_id(bob.id).await.unwrap().unwrap();
        assert!(bob_now.has_liked(post.id));

        let unliked = feed.toggle_like(post.id).await.unwrap();
        assert!(!unliked.is_liked);
        assert_eq!(unliked.likes_count, 0);
        assert!(!feed.state().is_liked(post.id));
        assert_eq!(feed.state().posts()[0].likes, 0);
        let bob_now = services.users.get_user_by_id(bob.id).await.unwrap().unwrap();
        assert!(!bob_now.has_liked(post.id));
    }

    #[tokio::test]
    async fn load_more_walks_the_whole_feed() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        for i in 0..(FEED_PAGE_SIZE * 2 + 3) {
            services
                .posts
                .create_post(&format!("post {i}"), ada.id)
                .await
                .unwrap();
        }
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));

        feed.refresh().await.unwrap();
        assert_eq!(feed.state().posts().len(), FEED_PAGE_SIZE);
        assert!(feed.state().has_more());
        while feed.load_more().await.unwrap() {}

        let shown = feed
            .state()
            .posts()
            .iter()
            .map(|post| post.id)
            .collect::<Vec<_>>();
        let stored = services
            .posts
            .get_recent_posts(100)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect::<Vec<_>>();
        assert_eq!(shown, stored);
        assert_eq!(shown.iter().collect::<BTreeSet<_>>().len(), shown.len());
        assert!(!feed.state().has_more());
        assert!(!feed.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn deleted_cursor_post_ends_the_feed() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        for i in 0..(FEED_PAGE_SIZE + 3) {
            services
                .posts
                .create_post(&format!("post {i}"), ada.id)
                .await
                .unwrap();
        }
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));
        feed.refresh().await.unwrap();
        let shown = feed.state().posts().to_vec();
        let cursor = feed.state().cursor().unwrap();

        store.remove_post(cursor);

        assert!(feed.load_more().await.unwrap());
        assert_eq!(feed.state().posts(), shown.as_slice());
        assert!(!feed.state().has_more());
        assert!(!feed.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn switching_modes_replaces_results() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        services.posts.create_post("x marks the spot", bob.id).await.unwrap();
        let own = services.posts.create_post("mine", ada.id).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));

        feed.switch_mode(FeedMode::Search("x".to_owned())).await.unwrap();
        assert_eq!(feed.state().posts().len(), 1);
        assert!(!feed.state().has_more());

        feed.switch_mode(FeedMode::ByUser(ada.id)).await.unwrap();
        assert_eq!(feed.state().mode(), &FeedMode::ByUser(ada.id));
        assert_eq!(
            feed.state().posts().iter().map(|post| post.id).collect::<Vec<_>>(),
            [own.id]
        );

        let before = feed.state().clone();
        assert!(!feed.load_more().await.unwrap());
        assert_eq!(feed.state(), &before);
    }

    #[tokio::test]
    async fn single_post_mode_shows_zero_or_one() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let post = services.posts.create_post("only", ada.id).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), None);

        feed.switch_mode(FeedMode::SinglePost(post.id)).await.unwrap();
        assert_eq!(feed.state().posts().len(), 1);

        feed.switch_mode(FeedMode::SinglePost(Id::from(1_u64))).await.unwrap();
        assert!(feed.state().posts().is_empty());
    }

    #[tokio::test]
    async fn stale_responses_are_discarded() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        services.posts.create_post("searchable", ada.id).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));

        let search = feed.switch_request(FeedMode::Search("search".to_owned()));
        let by_user = feed.switch_request(FeedMode::ByUser(ada.id));
        let search = search.fetch(&services).await.unwrap();
        let by_user = by_user.fetch(&services).await.unwrap();

        assert!(!feed.commit(search.clone()));
        assert_eq!(feed.state().mode(), &FeedMode::All);
        assert!(feed.commit(by_user));
        assert!(!feed.commit(search));
        assert_eq!(feed.state().mode(), &FeedMode::ByUser(ada.id));
    }

    #[tokio::test]
    async fn actor_change_drops_liked_state_and_pending_loads() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let post = services.posts.create_post("hello", ada.id).await.unwrap();
        services.likes.toggle_like(post.id, ada.id).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));
        feed.refresh().await.unwrap();
        assert!(feed.state().is_liked(post.id));

        let pending = feed.switch_request(FeedMode::All);
        let page = pending.fetch(&services).await.unwrap();
        feed.set_actor(Some(bob.id));

        assert!(!feed.state().is_liked(post.id));
        assert!(!feed.commit(page));
        feed.refresh().await.unwrap();
        assert!(!feed.state().is_liked(post.id));
    }

    #[tokio::test]
    async fn failed_load_keeps_the_shown_feed() {
        let Fixture { services, store } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        services.posts.create_post("hello", ada.id).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));
        feed.refresh().await.unwrap();
        let before = feed.state().clone();

        store.fail_reads(true);
        let result = feed
            .switch_mode(FeedMode::Search("hello".to_owned()))
            .await;

        assert!(matches!(result, Err(SyncError::TransientStore(_))));
        assert_eq!(feed.state(), &before);
    }

    #[tokio::test]
    async fn added_posts_only_show_where_listed() {
        let Fixture { services, .. } = fixture();
        let ada = services.users.create_user(Fixture::profile("Ada")).await.unwrap();
        let bob = services.users.create_user(Fixture::profile("Bob")).await.unwrap();
        let mut feed = FeedSession::new(services.clone(), Some(ada.id));
        feed.switch_mode(FeedMode::ByUser(bob.id)).await.unwrap();

        feed.create_post("not bob's").await.unwrap();
        assert!(feed.state().posts().is_empty());

        let bobs = services.posts.create_post("bob's", bob.id).await.unwrap();
        feed.post_added(bobs.clone());
        feed.post_added(bobs.clone());
        assert_eq!(feed.state().posts().len(), 1);

        feed.comment_added(bobs.id);
        assert_eq!(feed.state().posts()[0].comments, 1);
    }

    #[tokio::test]
    async fn signed_out_sessions_cannot_like() {
        let Fixture { services, .. } = fixture();
        let mut feed = FeedSession::new(services, None);

        assert!(matches!(
            feed.toggle_like(Id::from(1_u64)).await,
            Err(SyncError::SignedOut)
        ));
    }
}
