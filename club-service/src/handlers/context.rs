//! Caller identity forwarded by the gateway.
//!
//! The gateway authenticates users and forwards `X-User-ID` and
//! `X-User-Email`. Requests without them are anonymous; mutating
//! operations reject anonymous callers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::services::Actor;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Extractor for the optional acting user.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Actor>);

impl Caller {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = header(parts, USER_ID_HEADER).map(|user_id| {
            let display = header(parts, USER_EMAIL_HEADER).unwrap_or_else(|| user_id.clone());
            Actor::new(user_id, display)
        });
        Ok(Caller(actor))
    }
}
