use std::collections::HashSet;

use async_trait::async_trait;

use super::PermissionsError;

/// The authenticated actor of a request.
pub trait Principal: Send + Sync {
    fn is_in_role(&self, role: &str) -> bool;
}

/// Per-request access to the current principal and user identifier.
///
/// `K` is the user key type compared by user relations.
#[async_trait]
pub trait PrincipalProvider<K>: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn principal(&self) -> Option<&dyn Principal>;

    /// Identifier of the current user. May hit a database or an identity
    /// service; permission managers call it at most once per evaluation.
    async fn current_user_id(&self) -> Result<K, PermissionsError>;
}

/// A principal with a fixed identity and role set.
///
/// Useful for service accounts, background jobs and tests.
#[derive(Debug, Clone)]
pub struct StaticPrincipal<K> {
    user_id: Option<K>,
    roles: HashSet<String>,
}

impl<K> StaticPrincipal<K> {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            roles: HashSet::new(),
        }
    }

    pub fn user(user_id: K) -> Self {
        Self {
            user_id: Some(user_id),
            roles: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }
}

impl<K: Send + Sync> Principal for StaticPrincipal<K> {
    fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[async_trait]
impl<K> PrincipalProvider<K> for StaticPrincipal<K>
where
    K: Clone + Send + Sync,
{
    fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    fn principal(&self) -> Option<&dyn Principal> {
        if self.is_authenticated() {
            Some(self)
        } else {
            None
        }
    }

    async fn current_user_id(&self) -> Result<K, PermissionsError> {
        self.user_id
            .clone()
            .ok_or_else(|| PermissionsError::UserId("anonymous principal".to_string()))
    }
}
