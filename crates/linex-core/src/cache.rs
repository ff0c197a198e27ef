//! In-memory cache of users, groups and message contexts.
//!
//! The cache belongs to one client instance and is shared by cloning the
//! handle. Entries are whole-value overwrites keyed by platform ID; nothing
//! expires on its own and nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::foundation::{LookupError, LookupResult};
use crate::model::{Group, User};

#[derive(Default)]
struct CacheInner {
    users: RwLock<HashMap<String, Arc<User>>>,
    groups: RwLock<HashMap<String, Arc<Group>>>,
    messages: RwLock<HashMap<String, Context>>,
}

/// Entity counts, for logs and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached users.
    pub users: usize,
    /// Cached groups.
    pub groups: usize,
    /// Cached message contexts.
    pub messages: usize,
}

/// Shared handle to the entity cache.
#[derive(Clone, Default)]
pub struct EntityCache {
    inner: Arc<CacheInner>,
}

impl EntityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a user, replacing any previous entry.
    pub fn insert_user(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.inner
            .users
            .write()
            .insert(user.user_id.clone(), Arc::clone(&user));
        user
    }

    /// Looks up a user.
    pub fn user(&self, user_id: &str) -> LookupResult<Arc<User>> {
        self.inner
            .users
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| LookupError::unknown("user", user_id))
    }

    /// Stores a group, replacing any previous entry.
    pub fn insert_group(&self, group: Group) -> Arc<Group> {
        let group = Arc::new(group);
        self.inner
            .groups
            .write()
            .insert(group.group_id.clone(), Arc::clone(&group));
        group
    }

    /// Looks up a group.
    pub fn group(&self, group_id: &str) -> LookupResult<Arc<Group>> {
        self.inner
            .groups
            .read()
            .get(group_id)
            .cloned()
            .ok_or_else(|| LookupError::unknown("group", group_id))
    }

    /// Stores a message context under its message ID.
    pub fn insert_message(&self, message_id: impl Into<String>, context: Context) {
        self.inner
            .messages
            .write()
            .insert(message_id.into(), context);
    }

    /// Looks up a message context.
    pub fn message(&self, message_id: &str) -> LookupResult<Context> {
        self.inner
            .messages
            .read()
            .get(message_id)
            .cloned()
            .ok_or_else(|| LookupError::unknown("message", message_id))
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.inner.users.write().clear();
        self.inner.groups.write().clear();
        self.inner.messages.write().clear();
    }

    /// Returns entity counts.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            users: self.inner.users.read().len(),
            groups: self.inner.groups.read().len(),
            messages: self.inner.messages.read().len(),
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str) -> User {
        User {
            user_id: id.to_string(),
            display_name: name.to_string(),
            language: "en".to_string(),
            picture_url: None,
            status_message: None,
        }
    }

    #[test]
    fn test_user_roundtrip_and_overwrite() {
        let cache = EntityCache::new();
        cache.insert_user(user("U1", "Brown"));
        cache.insert_user(user("U1", "Cony"));

        assert_eq!(cache.user("U1").unwrap().display_name, "Cony");
        assert_eq!(cache.stats().users, 1);
    }

    #[test]
    fn test_miss_is_unknown() {
        let cache = EntityCache::new();
        match cache.group("C404") {
            Err(LookupError::Unknown { kind, id }) => {
                assert_eq!(kind, "group");
                assert_eq!(id, "C404");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_clear_is_shared_between_handles() {
        let cache = EntityCache::new();
        let other = cache.clone();
        cache.insert_group(Group {
            group_id: "C1".to_string(),
            group_name: "Friends".to_string(),
            picture_url: None,
        });

        other.clear();
        assert!(cache.group("C1").is_err());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
