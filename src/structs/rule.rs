use std::collections::BTreeSet;
use std::fmt;

use super::Verify;
use super::Result;

/// Matches anything in the dimension it is listed in
pub const WILDCARD: &str = "*";

/// A single permission rule of a Role or ClusterRole
///
/// Mirrors the kubernetes `PolicyRule`. Sets are ordered so that printing
/// and serialization are deterministic.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    /// API groups containing the resources ("" is the core group)
    #[serde(default)]
    pub apiGroups: BTreeSet<String>,
    /// Resources on which to apply verbs, optionally with a `/subresource`
    #[serde(default)]
    pub resources: BTreeSet<String>,
    /// Actions allowed
    pub verbs: BTreeSet<String>,
    /// Restrict the rule to these named objects when non-empty
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub resourceNames: BTreeSet<String>,
    /// Non-resource paths like `/healthz` (ClusterRoles only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub nonResourceURLs: BTreeSet<String>,
}

fn to_set(xs: &[&str]) -> BTreeSet<String> {
    xs.iter().map(|x| x.to_string()).collect()
}

impl Rule {
    pub fn new(apiGroups: &[&str], resources: &[&str], verbs: &[&str]) -> Self {
        Rule {
            apiGroups: to_set(apiGroups),
            resources: to_set(resources),
            verbs: to_set(verbs),
            ..Default::default()
        }
    }

    /// A rule granting verbs on non-resource paths
    pub fn non_resource(urls: &[&str], verbs: &[&str]) -> Self {
        Rule {
            nonResourceURLs: to_set(urls),
            verbs: to_set(verbs),
            ..Default::default()
        }
    }

    /// Restrict this rule to a set of object names
    pub fn with_resource_names(mut self, names: &[&str]) -> Self {
        self.resourceNames = to_set(names);
        self
    }

    /// Whether the rule can ever match a resource request
    pub fn covers_resources(&self) -> bool {
        !self.apiGroups.is_empty() && !self.resources.is_empty()
    }

    /// Whether the rule grants anything on non-resource paths
    pub fn covers_non_resources(&self) -> bool {
        !self.nonResourceURLs.is_empty()
    }
}

impl Verify for Rule {
    fn verify(&self) -> Result<()> {
        if self.verbs.is_empty() {
            bail!("rule needs to have at least one item in verbs");
        }
        if self.verbs.iter().any(|v| v.is_empty()) {
            bail!("rule verbs cannot be empty strings");
        }
        if !self.covers_resources() && !self.covers_non_resources() {
            // kubernetes accepts these, but they can never match anything
            warn!("rule {} grants nothing without apiGroups and resources", self);
        }
        if self.covers_non_resources() && !self.resourceNames.is_empty() {
            bail!("rule cannot combine nonResourceURLs with resourceNames");
        }
        for url in &self.nonResourceURLs {
            if url != WILDCARD && !url.starts_with('/') {
                bail!("nonResourceURL {} must start with a slash", url);
            }
        }
        Ok(())
    }
}

fn join(xs: &BTreeSet<String>) -> String {
    xs.iter()
        .map(|x| if x.is_empty() { "\"\"".to_string() } else { x.clone() })
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.covers_non_resources() {
            write!(f, "nonResourceURLs=[{}] ", join(&self.nonResourceURLs))?;
        }
        if self.covers_resources() || !self.covers_non_resources() {
            write!(f, "apiGroups=[{}] resources=[{}] ", join(&self.apiGroups), join(&self.resources))?;
        }
        if !self.resourceNames.is_empty() {
            write!(f, "resourceNames=[{}] ", join(&self.resourceNames))?;
        }
        write!(f, "verbs=[{}]", join(&self.verbs))
    }
}
