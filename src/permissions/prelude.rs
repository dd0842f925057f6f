//! Prelude for permission checks in handlers.
//!
//! # Example
//! ```rust,ignore
//! use crudkit::permissions::prelude::*;
//!
//! pub async fn index(
//!     principal: AuthenticatedPrincipal,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Vec<OrderSummary>>, PermissionsError> {
//!     let permissions = RoleRelationPermissionsManager::new(state.orders, Arc::new(principal));
//!     let query = permissions.apply_filter(order::Entity::find(), &ORDER_READ).await?;
//!     ...
//! }
//! ```

pub use crate::auth::{AuthenticatedPrincipal, MaybeAuthenticated};

pub use crate::permissions::{
    Permission, PermissionsError, PermissionsManager, PermissionsNamespace, PermissionsResult,
    RoleRelationPermissionsManager, UserListPermissionsManager, UserRelation,
};

pub use crate::query::Filterable;

pub use crate::demand;
