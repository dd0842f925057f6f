use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::query::Filterable;
use crate::reflect::Record;
use crate::value::Value;

use super::{
    combine, ConfigurationEntry, FilterBypass, Permission, PermissionsConfiguration,
    PermissionsError, PermissionsManager, PermissionsResult, Principal, PrincipalProvider,
};

/// Evaluates role and user-relation rules for entities of type `E`.
///
/// The configuration is static and shared; the principal provider is bound
/// to the current request.
///
/// Bulk and single-object evaluation differ on purpose: for
/// [`apply_filter`](PermissionsManager::apply_filter) a satisfied role-only
/// rule opens every row, while
/// [`check_permission`](PermissionsManager::check_permission) walks the rules
/// in priority order and a role+relation rule needs both parts to pass.
pub struct RoleRelationPermissionsManager<E, K> {
    configuration: Arc<PermissionsConfiguration<E>>,
    principal: Arc<dyn PrincipalProvider<K>>,
    bypass: Option<Arc<dyn FilterBypass>>,
}

impl<E, K> RoleRelationPermissionsManager<E, K>
where
    K: Into<Value> + Send + Sync + 'static,
{
    pub fn new(
        configuration: Arc<PermissionsConfiguration<E>>,
        principal: Arc<dyn PrincipalProvider<K>>,
    ) -> Self {
        Self {
            configuration,
            principal,
            bypass: None,
        }
    }

    #[must_use]
    pub fn with_bypass(mut self, bypass: Arc<dyn FilterBypass>) -> Self {
        self.bypass = Some(bypass);
        self
    }

    fn authenticated_principal(&self) -> Option<&dyn Principal> {
        if self.principal.is_authenticated() {
            self.principal.principal()
        } else {
            None
        }
    }

    async fn current_user_value(&self) -> Result<Value, PermissionsError> {
        Ok(self.principal.current_user_id().await?.into())
    }
}

impl<E, K> Clone for RoleRelationPermissionsManager<E, K> {
    fn clone(&self) -> Self {
        Self {
            configuration: Arc::clone(&self.configuration),
            principal: Arc::clone(&self.principal),
            bypass: self.bypass.clone(),
        }
    }
}

#[async_trait]
impl<E, K> PermissionsManager<E> for RoleRelationPermissionsManager<E, K>
where
    E: Record + Sync,
    K: Into<Value> + Send + Sync + 'static,
{
    fn is_authenticated(&self) -> bool {
        self.principal.is_authenticated()
    }

    async fn check_permission(
        &self,
        object: &E,
        permission: &Permission,
    ) -> Result<PermissionsResult, PermissionsError> {
        let entries = self.configuration.entries(permission);

        if entries.iter().any(ConfigurationEntry::is_open) {
            trace!("{} is open", permission);
            return Ok(PermissionsResult::Allow);
        }

        let Some(principal) = self.authenticated_principal() else {
            debug!("{} is undefined for an anonymous caller", permission);
            return Ok(PermissionsResult::Undefined);
        };

        let user_id = OnceCell::new();
        for entry in entries {
            if !entry.roles_pass(principal) {
                continue;
            }

            let related = match entry.relation() {
                None => true,
                Some(relation) => {
                    let user_id = user_id
                        .get_or_try_init(|| self.current_user_value())
                        .await?;
                    relation.test_user(object, user_id)?
                }
            };

            if related {
                debug!(priority = entry.priority(), "{} allowed", permission);
                return Ok(PermissionsResult::Allow);
            }
        }

        debug!("{} is undefined for {}", permission, object.type_name());
        Ok(PermissionsResult::Undefined)
    }

    async fn apply_filter<Q>(&self, query: Q, permission: &Permission) -> Result<Q, PermissionsError>
    where
        Q: Filterable + Send,
    {
        if self
            .bypass
            .as_ref()
            .is_some_and(|bypass| bypass.bypasses(permission))
        {
            debug!("Filter for {} bypassed", permission);
            return Ok(query);
        }

        let entries = self.configuration.entries(permission);

        if entries.iter().any(ConfigurationEntry::is_open) {
            trace!("{} is open, query left unfiltered", permission);
            return Ok(query);
        }

        let Some(principal) = self.authenticated_principal() else {
            debug!("Anonymous caller, {} yields no rows", permission);
            return Ok(query.none());
        };

        if entries
            .iter()
            .any(|entry| entry.is_role_only() && entry.roles_pass(principal))
        {
            trace!("Role grants unfiltered {}", permission);
            return Ok(query);
        }

        let relations: Vec<_> = entries
            .iter()
            .filter(|entry| entry.roles_pass(principal))
            .filter_map(ConfigurationEntry::relation)
            .collect();

        if relations.is_empty() {
            debug!("No rule grants {}, query yields no rows", permission);
            return Ok(query.none());
        }

        let user_id = self.current_user_value().await?;
        let Some(predicate) = combine(
            relations
                .iter()
                .map(|relation| relation.build_predicate(&user_id)),
        ) else {
            return Ok(query.none());
        };

        trace!("Filtering {} with {:?}", permission, predicate);
        Ok(query.filter_by(&predicate)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::permissions::{BypassPermissions, StaticPrincipal, UserRelation};
    use crate::predicate::tests::{project, Project};
    use crate::query::MemoryQuery;

    #[derive(Debug, Clone, Default)]
    struct Order {
        id: i64,
        owner_id: i64,
    }

    crate::impl_record!(Order { id, owner_id });

    fn order(id: i64, owner_id: i64) -> Order {
        Order { id, owner_id }
    }

    fn read() -> Permission {
        Permission::new("Order", "Read")
    }

    fn update() -> Permission {
        Permission::new("Order", "Update")
    }

    fn owner() -> UserRelation<Order> {
        UserRelation::reference("owner_id")
    }

    fn manager(
        configuration: PermissionsConfiguration<Order>,
        principal: StaticPrincipal<i64>,
    ) -> RoleRelationPermissionsManager<Order, i64> {
        RoleRelationPermissionsManager::new(Arc::new(configuration), Arc::new(principal))
    }

    fn orders() -> MemoryQuery<Order> {
        MemoryQuery::new([order(5, 42), order(6, 7)])
    }

    fn ids(query: MemoryQuery<Order>) -> Vec<i64> {
        query.into_vec().unwrap().iter().map(|o| o.id).collect()
    }

    struct CountingPrincipal {
        inner: StaticPrincipal<i64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PrincipalProvider<i64> for CountingPrincipal {
        fn is_authenticated(&self) -> bool {
            self.inner.is_authenticated()
        }

        fn principal(&self) -> Option<&dyn Principal> {
            self.inner.principal()
        }

        async fn current_user_id(&self) -> Result<i64, PermissionsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.current_user_id().await
        }
    }

    #[tokio::test]
    async fn test_relation_rule_on_single_object() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_relation(&read(), owner());
        let configuration = Arc::new(configuration);

        let owning = RoleRelationPermissionsManager::new(
            Arc::clone(&configuration),
            Arc::new(StaticPrincipal::user(42_i64)),
        );
        let stranger =
            RoleRelationPermissionsManager::new(configuration, Arc::new(StaticPrincipal::user(7_i64)));

        assert_eq!(
            owning.check_permission(&order(5, 42), &read()).await.unwrap(),
            PermissionsResult::Allow
        );
        assert_eq!(
            stranger
                .check_permission(&order(5, 42), &read())
                .await
                .unwrap(),
            PermissionsResult::Undefined
        );
    }

    #[tokio::test]
    async fn test_role_rule_allows_when_relation_fails() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_relation(&read(), owner())
            .require_roles(&read(), ["Admin"]);

        let admin = manager(configuration, StaticPrincipal::user(7_i64).with_role("Admin"));

        assert_eq!(
            admin.check_permission(&order(5, 42), &read()).await.unwrap(),
            PermissionsResult::Allow
        );
    }

    #[tokio::test]
    async fn test_relation_filter_keeps_related_rows() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_relation(&read(), owner());

        let manager = manager(configuration, StaticPrincipal::user(42_i64));
        let filtered = manager.apply_filter(orders(), &read()).await.unwrap();

        assert_eq!(ids(filtered), vec![5]);
    }

    #[tokio::test]
    async fn test_open_rule_wins_for_everyone() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_roles_and_relation(&read(), ["Manager"], owner())
            .require_roles(&read(), ["Admin"])
            .require_relation(&read(), owner())
            .allow(&read());
        let configuration = Arc::new(configuration);

        for principal in [StaticPrincipal::anonymous(), StaticPrincipal::user(1_i64)] {
            let manager =
                RoleRelationPermissionsManager::new(Arc::clone(&configuration), Arc::new(principal));

            assert_eq!(
                manager.check_permission(&order(5, 42), &read()).await.unwrap(),
                PermissionsResult::Allow
            );
            assert_eq!(
                ids(manager.apply_filter(orders(), &read()).await.unwrap()),
                vec![5, 6]
            );
        }
    }

    #[tokio::test]
    async fn test_satisfied_role_rule_skips_filtering() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_relation(&read(), owner())
            .require_roles(&read(), ["Admin"]);

        let admin = manager(configuration, StaticPrincipal::user(7_i64).with_role("Admin"));

        assert_eq!(
            ids(admin.apply_filter(orders(), &read()).await.unwrap()),
            vec![5, 6]
        );
    }

    #[tokio::test]
    async fn test_no_matching_rule_yields_no_rows() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_roles(&read(), ["Admin"]);

        let user = manager(configuration, StaticPrincipal::user(42_i64));

        assert!(ids(user.apply_filter(orders(), &read()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_permission_denies() {
        let user = manager(PermissionsConfiguration::new(), StaticPrincipal::user(42_i64));

        assert_eq!(
            user.check_permission(&order(5, 42), &read()).await.unwrap(),
            PermissionsResult::Undefined
        );
        assert!(ids(user.apply_filter(orders(), &read()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_callers_get_nothing() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_relation(&read(), owner());

        let anonymous = manager(configuration, StaticPrincipal::anonymous());

        assert_eq!(
            anonymous
                .check_permission(&order(5, 42), &read())
                .await
                .unwrap(),
            PermissionsResult::Undefined
        );
        assert!(ids(anonymous.apply_filter(orders(), &read()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_role_and_relation_differs_between_bulk_and_single() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_roles(&read(), ["Auditor"])
            .require_roles_and_relation(&read(), ["Manager"], owner());
        let configuration = Arc::new(configuration);

        // Role-only grant: every row in bulk, and the single object too.
        let auditor = RoleRelationPermissionsManager::new(
            Arc::clone(&configuration),
            Arc::new(StaticPrincipal::user(7_i64).with_role("Auditor")),
        );
        assert_eq!(
            ids(auditor.apply_filter(orders(), &read()).await.unwrap()),
            vec![5, 6]
        );
        assert!(auditor
            .check_permission(&order(5, 42), &read())
            .await
            .unwrap()
            .is_allowed());

        // Role+relation grant: both parts are needed in either path.
        let manager = RoleRelationPermissionsManager::new(
            configuration,
            Arc::new(StaticPrincipal::user(7_i64).with_role("Manager")),
        );
        assert_eq!(
            ids(manager.apply_filter(orders(), &read()).await.unwrap()),
            vec![6]
        );
        assert_eq!(
            manager.check_permission(&order(5, 42), &read()).await.unwrap(),
            PermissionsResult::Undefined
        );
        assert!(manager
            .check_permission(&order(6, 7), &read())
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn test_role_and_relation_needs_roles_for_filtering() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_roles_and_relation(&read(), ["Manager"], owner());

        let user = manager(configuration, StaticPrincipal::user(7_i64));

        assert!(ids(user.apply_filter(orders(), &read()).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_several_relations_are_or_combined() {
        let mut configuration = PermissionsConfiguration::<Project>::new();
        configuration
            .require_relation(&read(), UserRelation::reference("owner_id"))
            .require_relation(&read(), UserRelation::collection("members", "user_id"));

        let manager: RoleRelationPermissionsManager<Project, i64> =
            RoleRelationPermissionsManager::new(
                Arc::new(configuration),
                Arc::new(StaticPrincipal::user(3_i64)),
            );

        let mut owned = project(3, &[]);
        owned.id = 1;
        let mut staffed = project(9, &[3]);
        staffed.id = 2;
        let mut foreign = project(9, &[4]);
        foreign.id = 3;

        let rows = manager
            .apply_filter(MemoryQuery::new([owned, staffed, foreign]), &read())
            .await
            .unwrap()
            .into_vec()
            .unwrap();

        assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_filters_for_several_permissions_intersect() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_relation(&read(), owner())
            .require_relation(&update(), UserRelation::reference("id"));

        let manager = manager(configuration, StaticPrincipal::user(6_i64));
        let query = MemoryQuery::new([order(5, 6), order(6, 6), order(6, 1)]);

        let query = manager.apply_filter(query, &read()).await.unwrap();
        let query = manager.apply_filter(query, &update()).await.unwrap();

        let rows = query.into_vec().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].id, rows[0].owner_id), (6, 6));
    }

    #[tokio::test]
    async fn test_user_id_is_fetched_once_per_check() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_relation(&read(), owner())
            .require_relation(&read(), UserRelation::reference("id"))
            .require_roles(&read(), ["Admin"]);

        let principal = Arc::new(CountingPrincipal {
            inner: StaticPrincipal::user(1_i64),
            calls: AtomicUsize::new(0),
        });
        let manager = RoleRelationPermissionsManager::new(
            Arc::new(configuration),
            Arc::clone(&principal) as Arc<dyn PrincipalProvider<i64>>,
        );

        let result = manager.check_permission(&order(5, 42), &read()).await.unwrap();

        assert_eq!(result, PermissionsResult::Undefined);
        assert_eq!(principal.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_user_id_is_not_fetched_without_relations() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_roles(&read(), ["Admin"]);

        let principal = Arc::new(CountingPrincipal {
            inner: StaticPrincipal::user(1_i64).with_role("Admin"),
            calls: AtomicUsize::new(0),
        });
        let manager = RoleRelationPermissionsManager::new(
            Arc::new(configuration),
            Arc::clone(&principal) as Arc<dyn PrincipalProvider<i64>>,
        );

        assert!(manager
            .check_permission(&order(5, 42), &read())
            .await
            .unwrap()
            .is_allowed());
        assert_eq!(principal.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bypass_leaves_query_unfiltered() {
        let mut configuration = PermissionsConfiguration::new();
        configuration
            .require_relation(&read(), owner())
            .require_relation(&update(), owner());

        let bypass: BypassPermissions = [read()].into_iter().collect();
        let manager = manager(configuration, StaticPrincipal::anonymous())
            .with_bypass(Arc::new(bypass));

        assert_eq!(
            ids(manager.apply_filter(orders(), &read()).await.unwrap()),
            vec![5, 6]
        );
        assert!(ids(manager.apply_filter(orders(), &update()).await.unwrap()).is_empty());
        // single-object checks ignore the bypass
        assert_eq!(
            manager.check_permission(&order(5, 42), &read()).await.unwrap(),
            PermissionsResult::Undefined
        );
    }

    #[tokio::test]
    async fn test_demand_reports_authentication_state() {
        let mut configuration = PermissionsConfiguration::new();
        configuration.require_relation(&read(), owner());
        let configuration = Arc::new(configuration);

        let anonymous = RoleRelationPermissionsManager::new(
            Arc::clone(&configuration),
            Arc::new(StaticPrincipal::<i64>::anonymous()),
        );
        let stranger =
            RoleRelationPermissionsManager::new(configuration, Arc::new(StaticPrincipal::user(7_i64)));

        assert!(matches!(
            anonymous.demand(&order(5, 42), &read()).await,
            Err(PermissionsError::InsufficientPermissions {
                authenticated: false,
                ..
            })
        ));
        assert!(matches!(
            stranger.demand(&order(5, 42), &read()).await,
            Err(PermissionsError::InsufficientPermissions {
                authenticated: true,
                ..
            })
        ));
        assert!(stranger.demand(&order(6, 7), &read()).await.is_ok());
    }
}
