use super::timed;
use crate::context::RequestContext;
use crate::error::{AppError, AppResult};
use crate::logger::Logger;
use crate::models::{
    validate_request, CreatePostRequest, PaginatedResponse, PaginationMeta, PaginationParams, Post,
    UpdatePostRequest,
};
use crate::storage::{PostRepository, UserRepository};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    logger: Logger,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, users: Arc<dyn UserRepository>, logger: Logger) -> Self {
        Self {
            posts,
            users,
            logger,
        }
    }

    /// Create a post authored by `author`, who must exist
    pub async fn create_post(
        &self,
        ctx: &RequestContext,
        author: Uuid,
        req: CreatePostRequest,
    ) -> AppResult<Post> {
        validate_request(&req)?;
        self.ensure_user(ctx, author).await?;

        let post = Post::new(author, req.title, req.content);
        timed(&self.logger, ctx, "insert", "posts", self.posts.create(&post)).await?;

        self.logger.with_context(ctx).info(
            "Post created",
            &[
                ("post_id", Value::from(post.id.to_string())),
                ("author_id", Value::from(author.to_string())),
            ],
        );
        Ok(post)
    }

    pub async fn get_post(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Post> {
        timed(&self.logger, ctx, "select", "posts", self.posts.get_by_id(id)).await
    }

    pub async fn list_posts(&self, ctx: &RequestContext) -> AppResult<Vec<Post>> {
        timed(&self.logger, ctx, "list", "posts", self.posts.list()).await
    }

    pub async fn list_posts_paginated(
        &self,
        ctx: &RequestContext,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<Post>> {
        let (data, total) =
            timed(&self.logger, ctx, "list", "posts", self.posts.list_paginated(params)).await?;
        Ok(paginated(data, total, params))
    }

    pub async fn posts_by_user(&self, ctx: &RequestContext, user_id: Uuid) -> AppResult<Vec<Post>> {
        self.ensure_user(ctx, user_id).await?;
        timed(&self.logger, ctx, "select", "posts", self.posts.get_by_user_id(user_id)).await
    }

    pub async fn posts_by_user_paginated(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<Post>> {
        self.ensure_user(ctx, user_id).await?;
        let (data, total) = timed(
            &self.logger,
            ctx,
            "select",
            "posts",
            self.posts.get_by_user_id_paginated(user_id, params),
        )
        .await?;
        Ok(paginated(data, total, params))
    }

    /// Apply a partial update. An update with no fields is rejected.
    pub async fn update_post(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        req: UpdatePostRequest,
    ) -> AppResult<Post> {
        if req.is_empty() {
            return Err(AppError::bad_request("No fields to update"));
        }
        validate_request(&req)?;

        let mut post = self.get_post(ctx, id).await?;
        req.apply(&mut post);
        timed(&self.logger, ctx, "update", "posts", self.posts.update(&post)).await?;
        Ok(post)
    }

    pub async fn delete_post(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        timed(&self.logger, ctx, "delete", "posts", self.posts.delete(id)).await
    }

    async fn ensure_user(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        timed(&self.logger, ctx, "select", "users", self.users.get_by_id(id))
            .await
            .map(|_| ())
    }
}

fn paginated(data: Vec<Post>, total: u64, params: &PaginationParams) -> PaginatedResponse<Post> {
    PaginatedResponse {
        data,
        pagination: PaginationMeta::new(params.page, params.page_size, total),
    }
}
