// SPDX-License-Identifier: MIT

//! Session authentication. "How a session cookie becomes a user id" is
//! scoped out as an external oracle — this module is the seam: a
//! [`SessionOracle`] trait the daemon wires to whatever auth provider it
//! runs, plus the [`AuthedUser`] extractor every protected handler takes.

use ao_core::UserId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const SESSION_COOKIE_NAME: &str = "ao_session";

/// Resolves an opaque session token to the user it belongs to. Sessions
/// themselves (issuance, expiry, revocation) are out of scope for this
/// workspace; the daemon supplies an implementation backed by whatever
/// session store it runs.
#[async_trait::async_trait]
pub trait SessionOracle: Send + Sync + 'static {
    async fn resolve(&self, token: &str) -> Option<AuthedUser>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Extractor requiring a valid session cookie. Rejects with 401 if the
/// cookie is missing or doesn't resolve, the `Unauthenticated` error kind.
#[async_trait::async_trait]
impl<C> FromRequestParts<crate::state::AppState<C>> for AuthedUser
where
    C: ao_core::Clock,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &crate::state::AppState<C>) -> Result<Self, Self::Rejection> {
        let token = extract_cookie(parts, SESSION_COOKIE_NAME).ok_or_else(|| ApiError::unauthenticated("missing session cookie"))?;
        state.sessions.resolve(&token).await.ok_or_else(|| ApiError::unauthenticated("invalid or expired session"))
    }
}

/// Same as [`AuthedUser`] but additionally requires `is_admin`, used by the
/// admin-only routes (`dns_admin`, team/user management).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthedUser);

#[async_trait::async_trait]
impl<C> FromRequestParts<crate::state::AppState<C>> for AdminUser
where
    C: ao_core::Clock,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &crate::state::AppState<C>) -> Result<Self, Self::Rejection> {
        let user = AuthedUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::unauthorized("admin role required"));
        }
        Ok(AdminUser(user))
    }
}

fn extract_cookie(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
