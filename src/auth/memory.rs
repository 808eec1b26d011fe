use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    errors::RepoError,
    repo::{UserStore, UserTx},
    repo_types::{NewUser, User},
};

/// In-process [`UserStore`] keyed by email. Inserts become visible on commit.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users.lock().ok()?.get(email).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn begin(&self) -> Result<Box<dyn UserTx>, RepoError> {
        Ok(Box::new(MemoryUserTx {
            users: self.users.clone(),
            pending: Vec::new(),
        }))
    }
}

struct MemoryUserTx {
    users: Arc<Mutex<HashMap<String, User>>>,
    pending: Vec<User>,
}

fn poisoned<T>(_: T) -> RepoError {
    RepoError::Database("memory store lock poisoned".into())
}

#[async_trait]
impl UserTx for MemoryUserTx {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, RepoError> {
        if let Some(u) = self.pending.iter().find(|u| u.email == email) {
            return Ok(Some(u.clone()));
        }
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users.get(email).cloned())
    }

    async fn insert(&mut self, user: NewUser) -> Result<User, RepoError> {
        let taken = self.pending.iter().any(|u| u.email == user.email)
            || self.users.lock().map_err(poisoned)?.contains_key(&user.email);
        if taken {
            return Err(RepoError::Duplicate(format!("users.email = {}", user.email)));
        }
        let row = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        self.pending.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let mut users = self.users.lock().map_err(poisoned)?;
        for u in &self.pending {
            if users.contains_key(&u.email) {
                return Err(RepoError::Duplicate(format!("users.email = {}", u.email)));
            }
        }
        for u in self.pending {
            users.insert(u.email.clone(), u);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "someone".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_is_invisible_until_commit() {
        let store = MemoryUserStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert(new_user("a@b.co")).await.unwrap();
        assert!(tx.find_by_email("a@b.co").await.unwrap().is_some());
        assert_eq!(store.count(), 0);
        tx.commit().await.unwrap();
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn dropped_tx_rolls_back() {
        let store = MemoryUserStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(new_user("a@b.co")).await.unwrap();
        }
        assert!(store.get("a@b.co").is_none());
    }

    #[tokio::test]
    async fn racing_commits_keep_one_row() {
        let store = MemoryUserStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert(new_user("a@b.co")).await.unwrap();
        second.insert(new_user("a@b.co")).await.unwrap();
        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(RepoError::Duplicate(_))
        ));
        assert_eq!(store.count(), 1);
    }
}
