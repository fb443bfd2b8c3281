use std::collections::BTreeSet;
use std::fmt;

use super::Verify;
use super::Result;

/// Prefix kubernetes uses for service account user names
const SA_PREFIX: &str = "system:serviceaccount:";

/// The kinds of identity a binding can name
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An identity that can be granted permissions
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    /// Only meaningful (and required) for service accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Subject {
    pub fn user(name: &str) -> Self {
        Subject { kind: SubjectKind::User, name: name.into(), namespace: None }
    }

    pub fn group(name: &str) -> Self {
        Subject { kind: SubjectKind::Group, name: name.into(), namespace: None }
    }

    pub fn service_account(namespace: &str, name: &str) -> Self {
        Subject {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Interpret a user string the way the api server does
    ///
    /// `system:serviceaccount:<ns>:<name>` becomes a ServiceAccount, anything else a User.
    pub fn parse(user: &str) -> Self {
        if user.starts_with(SA_PREFIX) {
            let rest = &user[SA_PREFIX.len()..];
            let parts: Vec<&str> = rest.splitn(2, ':').collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                return Subject::service_account(parts[0], parts[1]);
            }
        }
        Subject::user(user)
    }

    /// Whether this subject (as listed in a binding) names the same identity
    ///
    /// Users and groups compare by name only, service accounts also by namespace.
    pub fn same_as(&self, other: &Subject) -> bool {
        if self.kind != other.kind || self.name != other.name {
            return false;
        }
        match self.kind {
            SubjectKind::ServiceAccount => self.namespace == other.namespace,
            _ => true,
        }
    }

    /// Whether this binding subject applies to a requesting identity
    pub fn applies_to(&self, identity: &Identity) -> bool {
        if self.same_as(&identity.subject) {
            return true;
        }
        self.kind == SubjectKind::Group && identity.groups.contains(&self.name)
    }
}

impl Verify for Subject {
    fn verify(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("{} subject needs a name", self.kind);
        }
        match (self.kind, &self.namespace) {
            (SubjectKind::ServiceAccount, None) => {
                bail!("ServiceAccount subject {} needs a namespace", self.name)
            }
            (SubjectKind::ServiceAccount, Some(ns)) if ns.is_empty() => {
                bail!("ServiceAccount subject {} needs a namespace", self.name)
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) if self.kind == SubjectKind::ServiceAccount => {
                write!(f, "{}:{}/{}", self.kind, ns, self.name)
            }
            _ => write!(f, "{}:{}", self.kind, self.name),
        }
    }
}

/// The requester of an authorization query
///
/// A subject plus the groups it is known to be a member of.
/// Group membership is explicit; no implicit system groups are added.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
}

impl Identity {
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }
}

impl From<Subject> for Identity {
    fn from(subject: Subject) -> Self {
        Identity { subject, groups: BTreeSet::new() }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.subject)?;
        if !self.groups.is_empty() {
            let gs = self.groups.iter().cloned().collect::<Vec<_>>();
            write!(f, " (groups: {})", gs.join(","))?;
        }
        Ok(())
    }
}
