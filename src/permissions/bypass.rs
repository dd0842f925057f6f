use std::collections::HashSet;

use super::Permission;

/// Skips query filtering for selected permissions.
///
/// Consulted by [`RoleRelationPermissionsManager::apply_filter`](super::RoleRelationPermissionsManager)
/// before any rule is evaluated; a bypassed permission returns the query
/// unchanged.
pub trait FilterBypass: Send + Sync {
    fn bypasses(&self, permission: &Permission) -> bool;
}

/// Bypasses a fixed set of permissions.
#[derive(Debug, Clone, Default)]
pub struct BypassPermissions {
    permissions: HashSet<Permission>,
}

impl FromIterator<Permission> for BypassPermissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl FilterBypass for BypassPermissions {
    fn bypasses(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}
