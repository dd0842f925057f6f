use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::query::Filterable;
use crate::reflect::Record;

use super::{
    Permission, PermissionsError, PermissionsManager, PermissionsNamespace, PermissionsResult,
    PrincipalProvider,
};

/// Explicit allow-lists of user ids, keyed by permission.
#[derive(Debug, Clone)]
pub struct UserListConfiguration<K> {
    grants: HashMap<Permission, HashSet<K>>,
}

impl<K> Default for UserListConfiguration<K> {
    fn default() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> UserListConfiguration<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, permission: &Permission, users: impl IntoIterator<Item = K>) -> &mut Self {
        self.grants
            .entry(permission.clone())
            .or_default()
            .extend(users);
        self
    }

    pub fn grant_namespace(
        &mut self,
        namespace: &PermissionsNamespace,
        users: impl IntoIterator<Item = K>,
    ) -> &mut Self {
        let users: Vec<K> = users.into_iter().collect();
        for permission in namespace.permissions() {
            self.grant(permission, users.iter().cloned());
        }
        self
    }

    fn has_grants(&self, permission: &Permission) -> bool {
        self.grants
            .get(permission)
            .is_some_and(|users| !users.is_empty())
    }

    #[must_use]
    pub fn is_granted(&self, permission: &Permission, user_id: &K) -> bool {
        self.grants
            .get(permission)
            .is_some_and(|users| users.contains(user_id))
    }
}

/// Grants permissions to listed users only.
///
/// The decision depends on the caller alone, so filtering is all or
/// nothing: a listed user sees every row, anyone else sees none.
pub struct UserListPermissionsManager<K> {
    configuration: Arc<UserListConfiguration<K>>,
    principal: Arc<dyn PrincipalProvider<K>>,
}

impl<K> UserListPermissionsManager<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(
        configuration: Arc<UserListConfiguration<K>>,
        principal: Arc<dyn PrincipalProvider<K>>,
    ) -> Self {
        Self {
            configuration,
            principal,
        }
    }

    async fn is_listed(&self, permission: &Permission) -> Result<bool, PermissionsError> {
        if !self.principal.is_authenticated() || !self.configuration.has_grants(permission) {
            return Ok(false);
        }

        let user_id = self.principal.current_user_id().await?;
        Ok(self.configuration.is_granted(permission, &user_id))
    }
}

impl<K> Clone for UserListPermissionsManager<K> {
    fn clone(&self) -> Self {
        Self {
            configuration: Arc::clone(&self.configuration),
            principal: Arc::clone(&self.principal),
        }
    }
}

#[async_trait]
impl<E, K> PermissionsManager<E> for UserListPermissionsManager<K>
where
    E: Record + Sync,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn is_authenticated(&self) -> bool {
        self.principal.is_authenticated()
    }

    async fn check_permission(
        &self,
        _object: &E,
        permission: &Permission,
    ) -> Result<PermissionsResult, PermissionsError> {
        if self.is_listed(permission).await? {
            Ok(PermissionsResult::Allow)
        } else {
            debug!("Current user is not listed for {}", permission);
            Ok(PermissionsResult::Undefined)
        }
    }

    async fn apply_filter<Q>(&self, query: Q, permission: &Permission) -> Result<Q, PermissionsError>
    where
        Q: Filterable + Send,
    {
        if self.is_listed(permission).await? {
            Ok(query)
        } else {
            Ok(query.none())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::StaticPrincipal;
    use crate::predicate::tests::{project, Project};
    use crate::query::MemoryQuery;

    fn manager(
        configuration: &Arc<UserListConfiguration<i64>>,
        principal: StaticPrincipal<i64>,
    ) -> UserListPermissionsManager<i64> {
        UserListPermissionsManager::new(Arc::clone(configuration), Arc::new(principal))
    }

    #[tokio::test]
    async fn test_listed_users_are_allowed() {
        let projects = PermissionsNamespace::root("Projects", &["Read", "Archive"]);
        let read = projects.permission("Read").unwrap();
        let archive = projects.permission("Archive").unwrap();

        let mut configuration = UserListConfiguration::new();
        configuration.grant_namespace(&projects, [1]).grant(archive, [2]);
        let configuration = Arc::new(configuration);

        let first = manager(&configuration, StaticPrincipal::user(1));
        let second = manager(&configuration, StaticPrincipal::user(2));
        let subject = project(1, &[]);

        assert!(PermissionsManager::<Project>::check_permission(&first, &subject, archive)
            .await
            .unwrap()
            .is_allowed());
        assert!(PermissionsManager::<Project>::check_permission(&second, &subject, archive)
            .await
            .unwrap()
            .is_allowed());
        assert_eq!(
            PermissionsManager::<Project>::check_permission(&second, &subject, read)
                .await
                .unwrap(),
            PermissionsResult::Undefined
        );
    }

    #[tokio::test]
    async fn test_filter_is_all_or_nothing() {
        let read = Permission::new("Projects", "Read");
        let mut configuration = UserListConfiguration::new();
        configuration.grant(&read, [1]);
        let configuration = Arc::new(configuration);

        let rows = || MemoryQuery::new([project(1, &[]), project(2, &[])]);

        let listed = manager(&configuration, StaticPrincipal::user(1));
        let unlisted = manager(&configuration, StaticPrincipal::user(3));
        let anonymous = manager(&configuration, StaticPrincipal::anonymous());

        let all = PermissionsManager::<Project>::apply_filter(&listed, rows(), &read)
            .await
            .unwrap();
        assert_eq!(all.into_vec().unwrap().len(), 2);

        for manager in [unlisted, anonymous] {
            let none = PermissionsManager::<Project>::apply_filter(&manager, rows(), &read)
                .await
                .unwrap();
            assert!(none.into_vec().unwrap().is_empty());
        }
    }
}
