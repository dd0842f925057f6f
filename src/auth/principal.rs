use std::collections::HashSet;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::jwt;
use crate::config::Config;
use crate::permissions::{PermissionsError, Principal, PrincipalProvider};

/// Caller identified by a Bearer JWT.
///
/// Use this extractor in handlers that require authentication; requests
/// without a valid token are rejected with 401.
///
/// # Example
/// ```rust,ignore
/// pub async fn show(principal: AuthenticatedPrincipal, State(state): State<AppState>) -> ... {
///     let permissions = RoleRelationPermissionsManager::new(state.orders, Arc::new(principal));
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    user_id: Uuid,
    roles: HashSet<String>,
}

impl AuthenticatedPrincipal {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    #[must_use]
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }
}

impl Principal for AuthenticatedPrincipal {
    fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[async_trait]
impl PrincipalProvider<Uuid> for AuthenticatedPrincipal {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn principal(&self) -> Option<&dyn Principal> {
        Some(self)
    }

    async fn current_user_id(&self) -> Result<Uuid, PermissionsError> {
        Ok(self.user_id)
    }
}

/// Caller that may or may not carry a token.
///
/// A missing `Authorization` header yields an anonymous provider; a present
/// but invalid token is still rejected.
#[derive(Debug, Clone, Default)]
pub struct MaybeAuthenticated(pub Option<AuthenticatedPrincipal>);

#[async_trait]
impl PrincipalProvider<Uuid> for MaybeAuthenticated {
    fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    fn principal(&self) -> Option<&dyn Principal> {
        self.0.as_ref().map(|principal| principal as &dyn Principal)
    }

    async fn current_user_id(&self) -> Result<Uuid, PermissionsError> {
        self.0
            .as_ref()
            .map(AuthenticatedPrincipal::user_id)
            .ok_or_else(|| PermissionsError::UserId("anonymous request".to_string()))
    }
}

/// Rejection of the principal extractors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid bearer token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
    Config: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthError::MissingToken)?;
        authenticate(&Config::from_ref(state), token)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
    Config: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(Self(Some(authenticate(&Config::from_ref(state), token)?))),
            None => Ok(Self(None)),
        }
    }
}

/// The token of an `Authorization: Bearer <token>` header, if the header is
/// present.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(Some)
        .ok_or(AuthError::InvalidToken)
}

fn authenticate(config: &Config, token: &str) -> Result<AuthenticatedPrincipal, AuthError> {
    let claims = jwt::verify_token(config, token).map_err(|error| {
        debug!("Rejected bearer token: {}", error);
        AuthError::InvalidToken
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthenticatedPrincipal::new(user_id, claims.roles))
}
