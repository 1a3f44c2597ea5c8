use crate::server::ServerRouter;

mod auth;
mod comments;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(auth::routes())
        .merge(comments::routes())
        .merge(posts::routes())
        .merge(users::routes())
}
