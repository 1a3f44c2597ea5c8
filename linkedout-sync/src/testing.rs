use crate::services::Services;
use linkedout_common::model::user::{DisplayName, Email, UserProfile};
use linkedout_db::memory::MemoryStore;
use std::sync::Arc;

pub(crate) struct Fixture {
    pub store: Arc<MemoryStore>,
    pub services: Services<MemoryStore>,
}

pub(crate) fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::default());
    Fixture {
        services: Services::new(store.clone()),
        store,
    }
}

impl Fixture {
    pub fn profile(name: &str) -> UserProfile {
        UserProfile::new(
            DisplayName::new(name).unwrap(),
            Email::new(&format!("{name}@example.com")).unwrap(),
            None,
            None,
            None,
        )
    }
}
