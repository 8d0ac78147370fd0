use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{StoreError, UserStore, parse_id};
use crate::model::{Fields, NewUser, User};

/// Process-local store. Records live until the process exits.
///
/// Identifiers are generated the same way the document store generates
/// them, so clients cannot tell the two apart. Native order is insertion
/// order.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user(ObjectId::new().to_hex());
        self.users.write().await.push(user.clone());
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn find(&self, id: &str) -> Result<Option<User>, StoreError> {
        parse_id(id)?;
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        parse_id(id)?;
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.apply(patch, now);
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        parse_id(id)?;
        let mut users = self.users.write().await;
        match users.iter().position(|u| u.id == id) {
            Some(index) => {
                users.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
