use std::fmt;

use super::role::{RoleKey, RoleKind};
use super::subject::{Identity, Subject};
use super::Verify;
use super::Result;

/// Whether a binding is namespaced or cluster wide
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingKind {
    RoleBinding,
    ClusterRoleBinding,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Index key of a binding in a snapshot
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub kind: BindingKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Reference from a binding to the role it grants
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoleRef {
    pub kind: RoleKind,
    pub name: String,
}

impl RoleRef {
    pub fn cluster_role(name: &str) -> Self {
        RoleRef { kind: RoleKind::ClusterRole, name: name.into() }
    }

    pub fn role(name: &str) -> Self {
        RoleRef { kind: RoleKind::Role, name: name.into() }
    }
}

/// Association of subjects to a role
///
/// A RoleBinding when namespaced, a ClusterRoleBinding otherwise.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub roleRef: RoleRef,
    pub subjects: Vec<Subject>,
}

impl Binding {
    pub fn cluster(name: &str, roleRef: RoleRef, subjects: Vec<Subject>) -> Self {
        Binding { name: name.into(), namespace: None, roleRef, subjects }
    }

    pub fn namespaced(namespace: &str, name: &str, roleRef: RoleRef, subjects: Vec<Subject>) -> Self {
        Binding {
            name: name.into(),
            namespace: Some(namespace.into()),
            roleRef,
            subjects,
        }
    }

    pub fn kind(&self) -> BindingKind {
        if self.namespace.is_some() {
            BindingKind::RoleBinding
        } else {
            BindingKind::ClusterRoleBinding
        }
    }

    pub fn key(&self) -> BindingKey {
        BindingKey {
            kind: self.kind(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// The key of the role this binding grants
    ///
    /// A `Role` reference resolves in the binding's own namespace,
    /// a `ClusterRole` reference is cluster wide.
    pub fn role_key(&self) -> RoleKey {
        match self.roleRef.kind {
            RoleKind::ClusterRole => RoleKey::cluster(&self.roleRef.name),
            RoleKind::Role => RoleKey {
                kind: RoleKind::Role,
                namespace: self.namespace.clone(),
                name: self.roleRef.name.clone(),
            },
        }
    }

    /// Whether the binding has effect for a request in a namespace
    ///
    /// An empty namespace is a cluster scoped request, only seen by cluster bindings.
    pub fn visible_in(&self, namespace: &str) -> bool {
        match &self.namespace {
            None => true,
            Some(ns) => !namespace.is_empty() && ns == namespace,
        }
    }

    /// Whether any listed subject applies to the identity
    pub fn applies_to(&self, identity: &Identity) -> bool {
        self.subjects.iter().any(|s| s.applies_to(identity))
    }

    /// Whether the subject is listed verbatim
    pub fn lists(&self, subject: &Subject) -> bool {
        self.subjects.iter().any(|s| s.same_as(subject))
    }
}

impl Verify for Binding {
    fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("{} needs a name", self.kind());
        }
        if self.roleRef.name.is_empty() {
            bail!("roleRef needs a name");
        }
        if self.kind() == BindingKind::ClusterRoleBinding && self.roleRef.kind == RoleKind::Role {
            bail!("a ClusterRoleBinding can only reference a ClusterRole");
        }
        for s in &self.subjects {
            s.verify()?;
        }
        Ok(())
    }
}
