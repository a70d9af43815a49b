//! Per-request correlation data
//!
//! A [`RequestContext`] is created by the error-handling middleware for every
//! request and stored in the request extensions. It is a shared handle:
//! clones observe each other's writes, so the user id recorded by the auth
//! layer is visible to the outer layers when they render errors.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// Keys understood by [`RequestContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    RequestId,
    UserId,
    TraceId,
    Username,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::RequestId => "request_id",
            ContextKey::UserId => "user_id",
            ContextKey::TraceId => "trace_id",
            ContextKey::Username => "username",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Default)]
pub struct RequestContext {
    values: Arc<RwLock<HashMap<ContextKey, String>>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        let ctx = Self::new();
        ctx.set(ContextKey::RequestId, request_id);
        ctx
    }

    pub fn get(&self, key: ContextKey) -> Option<String> {
        self.values.read().get(&key).cloned()
    }

    /// Store a value; empty strings are treated as absent
    pub fn set(&self, key: ContextKey, value: impl Into<String>) {
        let value = value.into();
        let mut values = self.values.write();
        if value.is_empty() {
            values.remove(&key);
        } else {
            values.insert(key, value);
        }
    }

    pub fn request_id(&self) -> Option<String> {
        self.get(ContextKey::RequestId)
    }

    pub fn user_id(&self) -> Option<String> {
        self.get(ContextKey::UserId)
    }

    pub fn trace_id(&self) -> Option<String> {
        self.get(ContextKey::TraceId)
    }

    pub fn username(&self) -> Option<String> {
        self.get(ContextKey::Username)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.read();
        let mut map = f.debug_map();
        for (key, value) in values.iter() {
            map.entry(&key.as_str(), value);
        }
        map.finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
