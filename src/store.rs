// Profile Store
// Mock data store backing the page handlers. Reads that miss recover to
// empty results so a missing profile never takes down a page.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub introduce: Option<String>,
    pub avatar_url: Option<String>,
}

/// In-memory profile store shared by all requests.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Arc<RwLock<HashMap<Uuid, Profile>>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with a few members, for the demo deployment
    /// and for tests.
    pub fn seeded() -> Self {
        let store = Self::new();
        for (n, email, name) in [
            (1, "ada@example.com", "Ada"),
            (2, "grace@example.com", "Grace"),
            (3, "linus@example.com", "Linus"),
        ] {
            store.upsert(Profile {
                id: Uuid::from_u128(n),
                email: email.to_string(),
                name: name.to_string(),
                introduce: None,
                avatar_url: None,
            });
        }
        store
    }

    pub fn upsert(&self, profile: Profile) {
        self.profiles
            .write()
            .expect("profile store lock poisoned")
            .insert(profile.id, profile);
    }

    /// First `limit` profile names, name-ordered. Empty when the store is.
    pub fn list_names(&self, limit: usize) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .read()
            .expect("profile store lock poisoned")
            .values()
            .map(|profile| profile.name.clone())
            .collect();
        names.sort();
        names.truncate(limit);
        names
    }

    /// Profile for a user id; absent is a normal outcome, not an error.
    pub fn get(&self, user_id: &Uuid) -> Option<Profile> {
        self.profiles
            .read()
            .expect("profile store lock poisoned")
            .get(user_id)
            .cloned()
    }
}
