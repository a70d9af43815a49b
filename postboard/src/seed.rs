//! Demo data

use anyhow::Result;
use postboard_core::api::AppState;
use postboard_core::models::{CreatePostRequest, CreateUserRequest, User};
use postboard_core::{ErrorCode, RequestContext};
use rand::seq::SliceRandom;
use rand::Rng;

const SAMPLE_USERS: &[(&str, &str)] = &[
    ("john_doe", "password123"),
    ("alice_smith", "alice2023"),
    ("bob_wilson", "bob456"),
    ("sarah_jones", "sarah789"),
    ("mike_brown", "mike321"),
];

const TOPICS: &[(&str, &str)] = &[
    ("Welcome to Postboard", "A first post created by the seeder."),
    ("Building REST APIs in Rust", "axum and tower make composing middleware straightforward."),
    ("Embedded storage with redb", "A single file, ACID transactions and no server to run."),
    ("Error handling patterns", "Typed errors, context and a single place to render them."),
    ("Structured logging", "Every record carries the request id it belongs to."),
    ("Testing HTTP services", "Drive the router with oneshot requests, no sockets needed."),
    ("Async Rust", "Tasks, futures and where the await points are."),
    ("Pagination", "Offsets are simple; total counts tell clients when to stop."),
];

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub users: usize,
    pub posts: usize,
}

/// Create `user_count` users (reusing any that already exist) and
/// `posts_per_user` posts for each
pub async fn run(state: &AppState, user_count: usize, posts_per_user: usize) -> Result<SeedSummary> {
    let ctx = RequestContext::new();
    let mut summary = SeedSummary::default();
    let mut users = Vec::with_capacity(user_count);

    for i in 0..user_count {
        let (username, password) = match SAMPLE_USERS.get(i) {
            Some((name, password)) => (name.to_string(), password.to_string()),
            None => (format!("user_{:03}", i + 1), format!("password{:03}", i + 1)),
        };
        if let Some(user) = ensure_user(state, &ctx, username, password).await? {
            summary.users += 1;
            users.push(user);
        }
    }

    if users.is_empty() {
        tracing::warn!("No users available, skipping post creation");
        return Ok(summary);
    }

    let mut rng = rand::thread_rng();
    for user in &users {
        for _ in 0..posts_per_user {
            let Some((title, content)) = TOPICS.choose(&mut rng) else {
                break;
            };
            let req = CreatePostRequest {
                title: format!("{} #{}", title, rng.gen_range(1..1000)),
                content: content.to_string(),
                user_id: None,
            };
            let post = state.posts.create_post(&ctx, user.id, req).await?;
            tracing::info!(post_id = %post.id, author = %user.username, "Created post");
            summary.posts += 1;
        }
    }

    Ok(summary)
}

async fn ensure_user(
    state: &AppState,
    ctx: &RequestContext,
    username: String,
    password: String,
) -> Result<Option<User>> {
    let req = CreateUserRequest {
        username: username.clone(),
        password,
    };
    match state.users.create_user(ctx, req).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "Created user");
            Ok(Some(user))
        }
        Err(err) if err.code() == &ErrorCode::Conflict => {
            let user = state.users.get_user_by_username(ctx, &username).await?;
            tracing::info!(username = %user.username, "Using existing user");
            Ok(Some(user))
        }
        Err(err) => {
            tracing::warn!(username = %username, error = %err, "Failed to create user");
            Ok(None)
        }
    }
}
