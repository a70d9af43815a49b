//! Embedded `redb` backend
//!
//! Layout:
//! - `users`: user id -> bincode [`UserRow`]
//! - `usernames`: username -> user id (uniqueness index)
//! - `posts`: post id -> bincode [`Post`]

use super::{
    paginate, PostRepository, StorageContext, StorageError, StorageResult, UserRepository,
};
use crate::models::{PaginationParams, Post, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const USERNAMES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("usernames");
const POSTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");

/// Persisted form of a user. Unlike [`User`] it keeps the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database file and make sure every table exists
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let db = Database::create(path).storage_context("open database")?;

        let txn = db.begin_write().storage_context("begin init transaction")?;
        {
            txn.open_table(USERS_TABLE).storage_context("create users table")?;
            txn.open_table(USERNAMES_TABLE).storage_context("create usernames table")?;
            txn.open_table(POSTS_TABLE).storage_context("create posts table")?;
        }
        txn.commit().storage_context("commit init transaction")?;

        debug!("Opened redb store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    /// Run a synchronous redb transaction on the blocking pool
    async fn blocking<T, F>(&self, operation: &'static str, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RedbStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|source| StorageError::Task { operation, source })?
    }

    fn read_all_users(&self) -> StorageResult<Vec<User>> {
        let txn = self.db.begin_read().storage_context("begin read")?;
        let table = txn.open_table(USERS_TABLE).storage_context("open users table")?;

        let mut users = Vec::new();
        for entry in table.iter().storage_context("iterate users")? {
            let (_, value) = entry.storage_context("read user row")?;
            let row: UserRow = decode("user", value.value())?;
            users.push(User::from(row));
        }
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    fn read_posts(&self, filter: impl Fn(&Post) -> bool) -> StorageResult<Vec<Post>> {
        let txn = self.db.begin_read().storage_context("begin read")?;
        let table = txn.open_table(POSTS_TABLE).storage_context("open posts table")?;

        let mut posts = Vec::new();
        for entry in table.iter().storage_context("iterate posts")? {
            let (_, value) = entry.storage_context("read post row")?;
            let post: Post = decode("post", value.value())?;
            if filter(&post) {
                posts.push(post);
            }
        }
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    fn write_user(&self, user: &User, is_new: bool) -> StorageResult<()> {
        let id = user.id.to_string();
        let bytes = encode("user", &UserRow::from(user))?;

        let txn = self.db.begin_write().storage_context("begin write")?;
        {
            let mut users = txn.open_table(USERS_TABLE).storage_context("open users table")?;
            let mut names = txn
                .open_table(USERNAMES_TABLE)
                .storage_context("open usernames table")?;

            let previous: Option<UserRow> = match users.get(id.as_str()).storage_context("read user")? {
                Some(existing) => Some(decode("user", existing.value())?),
                None => None,
            };
            match (&previous, is_new) {
                (Some(_), true) => {
                    return Err(StorageError::Conflict {
                        entity: "user",
                        detail: format!("id {} is taken", id),
                    })
                }
                (None, false) => return Err(StorageError::NotFound { entity: "user" }),
                _ => {}
            }

            let owner = names
                .get(user.username.as_str())
                .storage_context("read username index")?
                .map(|guard| guard.value().to_string());
            if matches!(owner, Some(ref owner) if *owner != id) {
                return Err(StorageError::Conflict {
                    entity: "user",
                    detail: format!("username '{}' is taken", user.username),
                });
            }

            if let Some(old) = previous.filter(|old| old.username != user.username) {
                names
                    .remove(old.username.as_str())
                    .storage_context("remove old username")?;
            }
            names
                .insert(user.username.as_str(), id.as_str())
                .storage_context("index username")?;
            users
                .insert(id.as_str(), bytes.as_slice())
                .storage_context("insert user")?;
        }
        txn.commit().storage_context("commit user")?;
        Ok(())
    }

    fn write_post(&self, post: &Post, is_new: bool) -> StorageResult<()> {
        let id = post.id.to_string();
        let bytes = encode("post", post)?;

        let txn = self.db.begin_write().storage_context("begin write")?;
        {
            let mut posts = txn.open_table(POSTS_TABLE).storage_context("open posts table")?;
            let exists = posts
                .get(id.as_str())
                .storage_context("read post")?
                .is_some();
            if !is_new && !exists {
                return Err(StorageError::NotFound { entity: "post" });
            }
            posts
                .insert(id.as_str(), bytes.as_slice())
                .storage_context("insert post")?;
        }
        txn.commit().storage_context("commit post")?;
        Ok(())
    }

    fn read_user(&self, id: Uuid) -> StorageResult<User> {
        let txn = self.db.begin_read().storage_context("begin read")?;
        let table = txn.open_table(USERS_TABLE).storage_context("open users table")?;
        let key = id.to_string();
        match table.get(key.as_str()).storage_context("get user")? {
            Some(value) => Ok(decode::<UserRow>("user", value.value())?.into()),
            None => Err(StorageError::NotFound { entity: "user" }),
        }
    }

    fn read_user_by_name(&self, username: &str) -> StorageResult<User> {
        let id = {
            let txn = self.db.begin_read().storage_context("begin read")?;
            let names = txn
                .open_table(USERNAMES_TABLE)
                .storage_context("open usernames table")?;
            let found = names
                .get(username)
                .storage_context("lookup username")?
                .map(|guard| guard.value().to_string());
            found.ok_or(StorageError::NotFound { entity: "user" })?
        };
        let id = Uuid::parse_str(&id).map_err(|_| StorageError::NotFound { entity: "user" })?;
        self.read_user(id)
    }

    fn remove_user(&self, id: Uuid) -> StorageResult<()> {
        let key = id.to_string();
        let txn = self.db.begin_write().storage_context("begin write")?;
        {
            let mut users = txn.open_table(USERS_TABLE).storage_context("open users table")?;
            let removed: Option<UserRow> = match users.remove(key.as_str()).storage_context("delete user")? {
                Some(value) => Some(decode("user", value.value())?),
                None => None,
            };
            let row = removed.ok_or(StorageError::NotFound { entity: "user" })?;

            let mut names = txn
                .open_table(USERNAMES_TABLE)
                .storage_context("open usernames table")?;
            names
                .remove(row.username.as_str())
                .storage_context("remove username")?;
        }
        txn.commit().storage_context("commit delete")?;
        Ok(())
    }

    fn read_post(&self, id: Uuid) -> StorageResult<Post> {
        let txn = self.db.begin_read().storage_context("begin read")?;
        let table = txn.open_table(POSTS_TABLE).storage_context("open posts table")?;
        let key = id.to_string();
        match table.get(key.as_str()).storage_context("get post")? {
            Some(value) => decode("post", value.value()),
            None => Err(StorageError::NotFound { entity: "post" }),
        }
    }

    fn remove_post(&self, id: Uuid) -> StorageResult<()> {
        let key = id.to_string();
        let txn = self.db.begin_write().storage_context("begin write")?;
        {
            let mut posts = txn.open_table(POSTS_TABLE).storage_context("open posts table")?;
            let removed = posts
                .remove(key.as_str())
                .storage_context("delete post")?
                .is_some();
            if !removed {
                return Err(StorageError::NotFound { entity: "post" });
            }
        }
        txn.commit().storage_context("commit delete")?;
        Ok(())
    }
}

fn encode<T: Serialize>(entity: &'static str, value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|source| StorageError::Codec { entity, source })
}

fn decode<T: DeserializeOwned>(entity: &'static str, bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|source| StorageError::Codec { entity, source })
}

#[async_trait]
impl UserRepository for RedbStore {
    async fn create(&self, user: &User) -> StorageResult<()> {
        let user = user.clone();
        self.blocking("create user", move |store| store.write_user(&user, true))
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<User> {
        self.blocking("get user", move |store| store.read_user(id)).await
    }

    async fn get_by_username(&self, username: &str) -> StorageResult<User> {
        let username = username.to_string();
        self.blocking("get user by username", move |store| {
            store.read_user_by_name(&username)
        })
        .await
    }

    async fn list(&self) -> StorageResult<Vec<User>> {
        self.blocking("list users", |store| store.read_all_users()).await
    }

    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<User>, u64)> {
        let params = *params;
        self.blocking("list users", move |store| {
            Ok(paginate(store.read_all_users()?, &params))
        })
        .await
    }

    async fn update(&self, user: &User) -> StorageResult<()> {
        let user = user.clone();
        self.blocking("update user", move |store| store.write_user(&user, false))
            .await
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.blocking("delete user", move |store| store.remove_user(id)).await
    }
}

#[async_trait]
impl PostRepository for RedbStore {
    async fn create(&self, post: &Post) -> StorageResult<()> {
        let post = post.clone();
        self.blocking("create post", move |store| store.write_post(&post, true))
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Post> {
        self.blocking("get post", move |store| store.read_post(id)).await
    }

    async fn list(&self) -> StorageResult<Vec<Post>> {
        self.blocking("list posts", |store| store.read_posts(|_| true)).await
    }

    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<Post>, u64)> {
        let params = *params;
        self.blocking("list posts", move |store| {
            Ok(paginate(store.read_posts(|_| true)?, &params))
        })
        .await
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> StorageResult<Vec<Post>> {
        self.blocking("list posts by user", move |store| {
            store.read_posts(|p| p.user_id == user_id)
        })
        .await
    }

    async fn get_by_user_id_paginated(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> StorageResult<(Vec<Post>, u64)> {
        let params = *params;
        self.blocking("list posts by user", move |store| {
            Ok(paginate(store.read_posts(|p| p.user_id == user_id)?, &params))
        })
        .await
    }

    async fn update(&self, post: &Post) -> StorageResult<()> {
        let post = post.clone();
        self.blocking("update post", move |store| store.write_post(&post, false))
            .await
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.blocking("delete post", move |store| store.remove_post(id)).await
    }
}
