//! Persistence for user records.
//!
//! Route handlers only see [`UserStore`]. The binary wires in [`MongoStore`];
//! tests and local development use [`MemoryStore`].
//!
//! Every operation is a single round trip. An identifier token that is not a
//! well-formed ObjectId is a [`StoreError::InvalidId`], the same as any other
//! store failure; only a well-formed identifier can come back as "no such
//! record".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::model::{Fields, NewUser, User};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("encoding field value: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("malformed identifier {0:?}")]
    InvalidId(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Checks that `id` is a well-formed ObjectId token.
pub(crate) fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_owned()))
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a record and returns it with its assigned identifier.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Every record, in the store's native order.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Merges `patch` into the record and refreshes `updatedAt`.
    ///
    /// Returns the record as it is after the update, or `None` if nothing
    /// matched `id`.
    async fn update(
        &self,
        id: &str,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Returns `false` if nothing matched `id`.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
