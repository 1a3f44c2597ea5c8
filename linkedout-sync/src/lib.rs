//! Client-side synchronization between displayed feeds and the document
//! store: entity services, the like toggle, and feed/comment session state.

pub mod error;
pub mod feed;
pub mod services;
pub mod thread;
pub mod toggle;

#[cfg(test)]
mod testing;
