use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::debug;

use crate::config::PermissionsConfig;

use super::{Permission, PermissionsError, PermissionsNamespace, Principal, UserRelation};

/// A single rule granting a permission.
///
/// No roles and no relation: always allowed. Roles only: every role is
/// required. Relation only: the user must be related to the object. Both:
/// roles and relation are required.
pub struct ConfigurationEntry<E> {
    permission: Permission,
    required_roles: Option<BTreeSet<String>>,
    relation: Option<UserRelation<E>>,
}

impl<E> ConfigurationEntry<E> {
    #[must_use]
    pub fn new(
        permission: Permission,
        required_roles: Option<BTreeSet<String>>,
        relation: Option<UserRelation<E>>,
    ) -> Self {
        Self {
            permission,
            required_roles,
            relation,
        }
    }

    #[must_use]
    pub fn permission(&self) -> &Permission {
        &self.permission
    }

    #[must_use]
    pub fn required_roles(&self) -> Option<&BTreeSet<String>> {
        self.required_roles.as_ref()
    }

    #[must_use]
    pub fn relation(&self) -> Option<&UserRelation<E>> {
        self.relation.as_ref()
    }

    /// 0 open, 1 relation only, 2 roles only, 3 roles and relation.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match (self.required_roles.is_some(), self.relation.is_some()) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.priority() == 0
    }

    #[must_use]
    pub fn is_role_only(&self) -> bool {
        self.priority() == 2
    }

    /// Whether the principal holds every required role. Vacuously true when
    /// the entry requires no roles.
    #[must_use]
    pub fn roles_pass(&self, principal: &dyn Principal) -> bool {
        self.required_roles
            .as_ref()
            .is_none_or(|roles| roles.iter().all(|role| principal.is_in_role(role)))
    }
}

impl<E> Clone for ConfigurationEntry<E> {
    fn clone(&self) -> Self {
        Self {
            permission: self.permission.clone(),
            required_roles: self.required_roles.clone(),
            relation: self.relation.clone(),
        }
    }
}

impl<E> fmt::Debug for ConfigurationEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationEntry")
            .field("permission", &self.permission)
            .field("required_roles", &self.required_roles)
            .field("relation", &self.relation)
            .finish()
    }
}

/// Static permission rules for entity type `E`, keyed by permission.
///
/// Entries of one permission are kept in ascending priority order.
///
/// # Example
/// ```rust,ignore
/// let orders = PermissionsNamespace::root("Orders", &["Read", "Update"]);
/// let read = orders.permission("Read").unwrap().clone();
///
/// let mut configuration = PermissionsConfiguration::<Order>::new();
/// configuration
///     .require_relation(&read, UserRelation::reference("owner_id"))
///     .require_roles(&read, ["Admin"]);
/// ```
pub struct PermissionsConfiguration<E> {
    entries: HashMap<Permission, Vec<ConfigurationEntry<E>>>,
}

impl<E> Default for PermissionsConfiguration<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E> PermissionsConfiguration<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everyone, including anonymous callers, holds the permission.
    pub fn allow(&mut self, permission: &Permission) -> &mut Self {
        self.add(ConfigurationEntry::new(permission.clone(), None, None))
    }

    pub fn require_roles<I, S>(&mut self, permission: &Permission, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(ConfigurationEntry::new(
            permission.clone(),
            Some(role_set(roles)),
            None,
        ))
    }

    pub fn require_relation(
        &mut self,
        permission: &Permission,
        relation: UserRelation<E>,
    ) -> &mut Self {
        self.add(ConfigurationEntry::new(
            permission.clone(),
            None,
            Some(relation),
        ))
    }

    pub fn require_roles_and_relation<I, S>(
        &mut self,
        permission: &Permission,
        roles: I,
        relation: UserRelation<E>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(ConfigurationEntry::new(
            permission.clone(),
            Some(role_set(roles)),
            Some(relation),
        ))
    }

    pub fn allow_namespace(&mut self, namespace: &PermissionsNamespace) -> &mut Self {
        for permission in namespace.permissions() {
            self.allow(permission);
        }
        self
    }

    pub fn require_roles_for_namespace<I, S>(
        &mut self,
        namespace: &PermissionsNamespace,
        roles: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles = role_set(roles);
        for permission in namespace.permissions() {
            self.add(ConfigurationEntry::new(
                permission.clone(),
                Some(roles.clone()),
                None,
            ));
        }
        self
    }

    pub fn require_relation_for_namespace(
        &mut self,
        namespace: &PermissionsNamespace,
        relation: &UserRelation<E>,
    ) -> &mut Self {
        for permission in namespace.permissions() {
            self.require_relation(permission, relation.clone());
        }
        self
    }

    /// Register role-only rules read from configuration.
    ///
    /// Permission names are full dotted names, compared ignoring ASCII case.
    /// Each must be declared by one of `namespaces`.
    ///
    /// # Errors
    /// Returns `UnknownPermission` for a name no namespace declares.
    pub fn apply_role_rules(
        &mut self,
        namespaces: &[PermissionsNamespace],
        config: &PermissionsConfig,
    ) -> Result<&mut Self, PermissionsError> {
        for (name, roles) in &config.roles {
            let permission = namespaces
                .iter()
                .flat_map(PermissionsNamespace::permissions)
                .find(|permission| permission.full_name().eq_ignore_ascii_case(name))
                .ok_or_else(|| PermissionsError::UnknownPermission(name.clone()))?
                .clone();

            debug!("Configured roles {:?} for {}", roles, permission);
            self.require_roles(&permission, roles.iter().cloned());
        }
        Ok(self)
    }

    /// Rules for `permission`, in ascending priority order.
    #[must_use]
    pub fn entries(&self, permission: &Permission) -> &[ConfigurationEntry<E>] {
        self.entries.get(permission).map_or(&[], Vec::as_slice)
    }

    pub fn add(&mut self, entry: ConfigurationEntry<E>) -> &mut Self {
        let entries = self.entries.entry(entry.permission.clone()).or_default();
        let position = entries.partition_point(|existing| existing.priority() <= entry.priority());
        entries.insert(position, entry);
        self
    }
}

fn role_set<I, S>(roles: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    roles.into_iter().map(Into::into).collect()
}
