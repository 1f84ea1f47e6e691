//! In-process user store.
//!
//! Used when no `DATABASE_URL` is configured and throughout the test suite.
//! Accounts live only as long as the process.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::models::{NewUser, User, UserUpdate};
use super::{StoreError, StoreResult, UserStore};

/// `DashMap`-backed user store.
///
/// `emails` is the uniqueness index; claiming an entry in it happens under the
/// shard lock, so two concurrent inserts of the same email cannot both win.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    emails: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let Some(id) = self.emails.get(email).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.emails.contains_key(email))
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        match self.emails.entry(new_user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    id: new_user.id,
                    email: new_user.email,
                    name: new_user.name,
                    password_hash: new_user.password_hash,
                    household_id: new_user.household_id,
                    role: new_user.role,
                    created_at: now,
                    updated_at: now,
                };
                // Insert the row before releasing the email slot so a lookup
                // by email never sees a dangling id.
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(household_id) = update.household_id {
            user.household_id = household_id;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
