//! Persistence for users and posts
//!
//! Two backends implement the repository traits:
//! - [`RedbStore`]: embedded `redb` database, bincode-encoded rows
//! - [`MemoryStore`]: in-process maps, used by tests and ephemeral runs
//!
//! All listings are ordered newest first.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::models::{PaginationParams, Post, User};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} already exists: {detail}")]
    Conflict { entity: &'static str, detail: String },

    #[error("storage operation '{operation}' failed: {source}")]
    Backend {
        operation: String,
        #[source]
        source: redb::Error,
    },

    #[error("failed to encode or decode {entity}: {source}")]
    Codec {
        entity: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("blocking storage task for '{operation}' failed: {source}")]
    Task {
        operation: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Attach the failing operation to backend errors
pub trait StorageContext<T> {
    fn storage_context(self, operation: &str) -> StorageResult<T>;
}

impl<T, E> StorageContext<T> for Result<T, E>
where
    E: Into<redb::Error>,
{
    fn storage_context(self, operation: &str) -> StorageResult<T> {
        self.map_err(|e| StorageError::Backend {
            operation: operation.to_string(),
            source: e.into(),
        })
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. A taken username is a `Conflict`.
    async fn create(&self, user: &User) -> StorageResult<()>;
    async fn get_by_id(&self, id: Uuid) -> StorageResult<User>;
    async fn get_by_username(&self, username: &str) -> StorageResult<User>;
    async fn list(&self) -> StorageResult<Vec<User>>;
    /// One page plus the total number of users
    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<User>, u64)>;
    async fn update(&self, user: &User) -> StorageResult<()>;
    async fn delete(&self, id: Uuid) -> StorageResult<()>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> StorageResult<()>;
    async fn get_by_id(&self, id: Uuid) -> StorageResult<Post>;
    async fn list(&self) -> StorageResult<Vec<Post>>;
    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<Post>, u64)>;
    async fn get_by_user_id(&self, user_id: Uuid) -> StorageResult<Vec<Post>>;
    async fn get_by_user_id_paginated(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> StorageResult<(Vec<Post>, u64)>;
    async fn update(&self, post: &Post) -> StorageResult<()>;
    async fn delete(&self, id: Uuid) -> StorageResult<()>;
}

/// Slice one page out of an already ordered listing
pub(crate) fn paginate<T>(items: Vec<T>, params: &PaginationParams) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(params.offset).unwrap_or(usize::MAX);
    let page = items.into_iter().skip(offset).take(params.limit()).collect();
    (page, total)
}
