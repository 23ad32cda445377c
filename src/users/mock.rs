//! Programmable in-memory stand-in for the real store, used by handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{NewUser, User};

pub(crate) struct MockUserStore {
    pub user: Option<User>,
    pub lookup_error: Option<String>,
    pub lookups: AtomicUsize,
}

impl MockUserStore {
    pub fn with_user(user: Option<User>) -> Arc<Self> {
        Arc::new(Self {
            user,
            lookup_error: None,
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            user: None,
            lookup_error: Some(message.to_string()),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn user_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.lookup_error {
            return Err(StoreError::Unavailable(message.clone()));
        }
        Ok(self.user.clone())
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.user.clone().filter(|u| u.id == id))
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        let now = OffsetDateTime::now_utc();
        Ok(User {
            id: 2,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password_hash: new.password_hash,
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.user.clone().into_iter().collect())
    }
}

pub(crate) fn test_user(id: i64, email: &str, password_hash: &str, is_admin: bool) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id,
        first_name: "Admin".into(),
        last_name: "User".into(),
        email: email.into(),
        password_hash: password_hash.into(),
        is_admin,
        created_at: now,
        updated_at: now,
    }
}
