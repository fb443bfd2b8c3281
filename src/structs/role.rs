use std::collections::BTreeMap;
use std::fmt;

use super::rule::Rule;
use super::Verify;
use super::Result;

/// Whether a role is namespaced or cluster wide
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleKind {
    Role,
    ClusterRole,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Index key of a role in a snapshot
///
/// ClusterRoles have no namespace; Roles always have one.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleKey {
    pub kind: RoleKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl RoleKey {
    pub fn cluster(name: &str) -> Self {
        RoleKey { kind: RoleKind::ClusterRole, namespace: None, name: name.into() }
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        RoleKey {
            kind: RoleKind::Role,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Label selector used by aggregated ClusterRoles
///
/// Only `matchLabels` is supported.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    #[serde(default)]
    pub matchLabels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// All selector labels must be present with equal values
    ///
    /// An empty selector selects nothing.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.matchLabels.is_empty() {
            return false;
        }
        self.matchLabels.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// ClusterRole aggregation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregationRule {
    #[serde(default)]
    pub clusterRoleSelectors: Vec<LabelSelector>,
}

impl AggregationRule {
    pub fn selects(&self, labels: &BTreeMap<String, String>) -> bool {
        self.clusterRoleSelectors.iter().any(|s| s.matches(labels))
    }
}

/// A named collection of rules
///
/// A Role when namespaced, a ClusterRole otherwise.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregationRule: Option<AggregationRule>,
}

impl Role {
    pub fn cluster(name: &str, rules: Vec<Rule>) -> Self {
        Role {
            name: name.into(),
            namespace: None,
            labels: BTreeMap::new(),
            rules,
            aggregationRule: None,
        }
    }

    pub fn namespaced(namespace: &str, name: &str, rules: Vec<Rule>) -> Self {
        Role {
            namespace: Some(namespace.into()),
            ..Role::cluster(name, rules)
        }
    }

    pub fn kind(&self) -> RoleKind {
        if self.namespace.is_some() {
            RoleKind::Role
        } else {
            RoleKind::ClusterRole
        }
    }

    pub fn key(&self) -> RoleKey {
        RoleKey {
            kind: self.kind(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

impl Verify for Role {
    fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("{} needs a name", self.kind());
        }
        for r in &self.rules {
            r.verify()?;
            if self.kind() == RoleKind::Role && r.covers_non_resources() {
                bail!("nonResourceURLs are only valid on a ClusterRole");
            }
        }
        if self.aggregationRule.is_some() && self.kind() == RoleKind::Role {
            bail!("aggregationRule is only valid on a ClusterRole");
        }
        Ok(())
    }
}
