use super::{paginate, PostRepository, StorageError, StorageResult, UserRepository};
use crate::models::{PaginationParams, Post, User};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_posts(&self, filter: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .read()
            .values()
            .filter(|p| filter(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &User) -> StorageResult<()> {
        let mut users = self.users.write();
        if users.values().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict {
                entity: "user",
                detail: format!("username '{}' is taken", user.username),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { entity: "user" })
    }

    async fn get_by_username(&self, username: &str) -> StorageResult<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StorageError::NotFound { entity: "user" })
    }

    async fn list(&self) -> StorageResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<User>, u64)> {
        let users = UserRepository::list(self).await?;
        Ok(paginate(users, params))
    }

    async fn update(&self, user: &User) -> StorageResult<()> {
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Err(StorageError::NotFound { entity: "user" });
        }
        if users
            .values()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(StorageError::Conflict {
                entity: "user",
                detail: format!("username '{}' is taken", user.username),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound { entity: "user" })
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: &Post) -> StorageResult<()> {
        self.posts.write().insert(post.id, post.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Post> {
        self.posts
            .read()
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound { entity: "post" })
    }

    async fn list(&self) -> StorageResult<Vec<Post>> {
        Ok(self.sorted_posts(|_| true))
    }

    async fn list_paginated(&self, params: &PaginationParams) -> StorageResult<(Vec<Post>, u64)> {
        Ok(paginate(self.sorted_posts(|_| true), params))
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> StorageResult<Vec<Post>> {
        Ok(self.sorted_posts(|p| p.user_id == user_id))
    }

    async fn get_by_user_id_paginated(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> StorageResult<(Vec<Post>, u64)> {
        Ok(paginate(self.sorted_posts(|p| p.user_id == user_id), params))
    }

    async fn update(&self, post: &Post) -> StorageResult<()> {
        let mut posts = self.posts.write();
        match posts.get_mut(&post.id) {
            Some(existing) => {
                *existing = post.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound { entity: "post" }),
        }
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.posts
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound { entity: "post" })
    }
}
