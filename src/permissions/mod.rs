//! Permission definitions and the authorization evaluators.

pub mod macros;
pub mod prelude;

mod bypass;
mod configuration;
mod namespace;
mod principal;
mod relation;
mod role_relation;
mod user_list;

pub use bypass::{BypassPermissions, FilterBypass};
pub use configuration::{ConfigurationEntry, PermissionsConfiguration};
pub use namespace::{Permission, PermissionsNamespace};
pub use principal::{Principal, PrincipalProvider, StaticPrincipal};
pub use relation::{combine, UserRelation};
pub use role_relation::RoleRelationPermissionsManager;
pub use user_list::{UserListConfiguration, UserListPermissionsManager};

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::predicate::PredicateError;
use crate::query::Filterable;
use crate::reflect::Record;

/// Outcome of a single-object permission check.
///
/// `Undefined` means no rule granted the permission. It is not an error;
/// [`PermissionsManager::demand`] turns it into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionsResult {
    Allow,
    Undefined,
}

impl PermissionsResult {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

#[derive(Debug, Error)]
pub enum PermissionsError {
    #[error("Insufficient permissions: {permission}")]
    InsufficientPermissions {
        permission: Permission,
        authenticated: bool,
    },

    #[error("Unknown permission '{0}'")]
    UnknownPermission(String),

    #[error("Could not resolve the current user: {0}")]
    UserId(String),

    #[error(transparent)]
    Predicate(#[from] PredicateError),
}

impl IntoResponse for PermissionsError {
    fn into_response(self) -> Response {
        match self {
            Self::InsufficientPermissions {
                authenticated: false,
                ..
            } => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Self::InsufficientPermissions { .. } => {
                (StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
            other => {
                error!("Permission evaluation failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Evaluates permissions on entities of type `E` for the current request.
///
/// A manager is built per request around the caller's principal. Handlers
/// check single objects with [`check_permission`](Self::check_permission)
/// or [`demand`](Self::demand) and narrow list queries with
/// [`apply_filter`](Self::apply_filter).
///
/// # Type Parameters
/// * `E` - The entity type whose permissions are evaluated
///
/// # Example
/// ```rust,ignore
/// let permissions = RoleRelationPermissionsManager::new(state.orders, Arc::new(principal));
///
/// let orders = permissions
///     .apply_filter(order::Entity::find(), &Permission::new("Orders", "Read"))
///     .await?
///     .all(&state.db)
///     .await?;
/// ```
#[async_trait]
pub trait PermissionsManager<E>: Send + Sync
where
    E: Record + Sync,
{
    /// Check if the request carries an authenticated principal.
    ///
    /// # Returns
    /// `true` for authenticated callers, `false` for anonymous ones
    fn is_authenticated(&self) -> bool;

    /// Check if the current principal holds `permission` on `object`.
    ///
    /// # Arguments
    /// * `object` - The entity to check the permission on
    /// * `permission` - The permission being checked
    ///
    /// # Returns
    /// `Allow` if a rule grants the permission, `Undefined` otherwise
    ///
    /// # Errors
    /// Fails when the user id cannot be resolved or a relation does not fit
    /// the entity.
    async fn check_permission(
        &self,
        object: &E,
        permission: &Permission,
    ) -> Result<PermissionsResult, PermissionsError>;

    /// Restrict `query` to the entities the current principal holds
    /// `permission` on.
    ///
    /// # Arguments
    /// * `query` - The base query to filter
    /// * `permission` - The permission the returned rows must carry
    ///
    /// # Returns
    /// The query unchanged, filtered by the caller's relations, or matching
    /// no rows at all
    ///
    /// # Errors
    /// Fails when the user id cannot be resolved or the filter cannot be
    /// expressed for the query source.
    async fn apply_filter<Q>(&self, query: Q, permission: &Permission) -> Result<Q, PermissionsError>
    where
        Q: Filterable + Send;

    /// Like [`check_permission`](Self::check_permission), but a missing
    /// grant is an `InsufficientPermissions` error.
    ///
    /// # Arguments
    /// * `object` - The entity to check the permission on
    /// * `permission` - The permission being demanded
    ///
    /// # Errors
    /// `InsufficientPermissions` when the permission is not granted, plus
    /// any error of `check_permission`.
    async fn demand(&self, object: &E, permission: &Permission) -> Result<(), PermissionsError> {
        match self.check_permission(object, permission).await? {
            PermissionsResult::Allow => Ok(()),
            PermissionsResult::Undefined => Err(PermissionsError::InsufficientPermissions {
                permission: permission.clone(),
                authenticated: self.is_authenticated(),
            }),
        }
    }
}
