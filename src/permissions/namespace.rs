use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// An action right, identified by the path of its namespace and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    namespace: String,
    name: String,
}

impl Permission {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Path of the owning namespace, e.g. `Projects.Tasks`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name including the namespace path, e.g. `Projects.Tasks.Read`.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// A named group of permissions.
///
/// Namespaces form a tree: each one keeps a reference to its parent and
/// computes its full path once, when it is created.
#[derive(Debug, Clone)]
pub struct PermissionsNamespace(Arc<NamespaceInner>);

#[derive(Debug)]
struct NamespaceInner {
    name: String,
    path: String,
    parent: Option<PermissionsNamespace>,
    permissions: Vec<Permission>,
}

impl PermissionsNamespace {
    pub fn root(name: impl Into<String>, permissions: &[&str]) -> Self {
        let name = name.into();
        Self::build(name.clone(), name, None, permissions)
    }

    #[must_use]
    pub fn child(&self, name: impl Into<String>, permissions: &[&str]) -> Self {
        let name = name.into();
        let path = format!("{}.{}", self.path(), name);
        Self::build(name, path, Some(self.clone()), permissions)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.0.path
    }

    #[must_use]
    pub fn parent(&self) -> Option<&PermissionsNamespace> {
        self.0.parent.as_ref()
    }

    /// Permissions declared directly in this namespace.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.0.permissions
    }

    /// A permission declared in this namespace, by name.
    #[must_use]
    pub fn permission(&self, name: &str) -> Option<&Permission> {
        self.0.permissions.iter().find(|p| p.name() == name)
    }

    /// This namespace followed by its ancestors up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &PermissionsNamespace> {
        std::iter::successors(Some(self), |&namespace| namespace.parent())
    }

    fn build(
        name: String,
        path: String,
        parent: Option<PermissionsNamespace>,
        permissions: &[&str],
    ) -> Self {
        let permissions = permissions
            .iter()
            .map(|permission| Permission::new(path.clone(), *permission))
            .collect();
        Self(Arc::new(NamespaceInner {
            name,
            path,
            parent,
            permissions,
        }))
    }
}

impl PartialEq for PermissionsNamespace {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for PermissionsNamespace {}
