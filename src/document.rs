use std::collections::BTreeMap;
use std::fmt::Display;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use super::structs::{AggregationRule, Binding, Role, RoleKind, RoleRef, Rule, Subject, SubjectKind, Verify};
use super::{Error, ErrorKind, Result};

/// API group every rbac document must belong to
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// A successfully interpreted rbac document
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Role(Role),
    Binding(Binding),
}

/// Generic fields present on every document
#[derive(Deserialize, Default)]
#[serde(default)]
struct TypeMeta {
    apiVersion: Option<String>,
    kind: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ObjectMeta {
    name: Option<String>,
    namespace: Option<String>,
    labels: BTreeMap<String, String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RuleSource {
    apiGroups: Vec<String>,
    resources: Vec<String>,
    verbs: Option<Vec<String>>,
    resourceNames: Vec<String>,
    nonResourceURLs: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RoleSource {
    metadata: Option<ObjectMeta>,
    rules: Option<Vec<RuleSource>>,
    aggregationRule: Option<AggregationRule>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RefSource {
    apiGroup: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    namespace: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BindingSource {
    metadata: Option<ObjectMeta>,
    roleRef: Option<RefSource>,
    subjects: Option<Vec<RefSource>>,
}

fn malformed<D: Display>(doc: &str, reason: D) -> Error {
    ErrorKind::MalformedDocument(doc.to_string(), reason.to_string()).into()
}

/// Interprets generic document trees as rbac objects
///
/// Holds the compiled namespace validation so a whole load shares it.
pub struct Interpreter {
    namespace_re: Regex,
}

impl Interpreter {
    pub fn new() -> Result<Self> {
        // DNS-1123 label
        let namespace_re = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$")?;
        Ok(Interpreter { namespace_re })
    }

    /// Interpret the `idx`th document of a load
    pub fn interpret(&self, idx: usize, doc: &Value) -> Result<Object> {
        let label = format!("document #{}", idx);
        if !doc.is_mapping() {
            return Err(malformed(&label, "expected a mapping at the top level"));
        }
        let tm: TypeMeta = convert(&label, doc)?;
        let kind = match tm.kind {
            Some(k) => k,
            None => return Err(malformed(&label, "missing kind")),
        };
        match tm.apiVersion {
            None => return Err(malformed(&label, "missing apiVersion")),
            Some(ref v) if !v.starts_with(&format!("{}/", RBAC_GROUP)) => {
                return Err(malformed(&label, format!("apiVersion {} is not in {}", v, RBAC_GROUP)));
            }
            Some(_) => {}
        }
        match kind.as_ref() {
            "ClusterRole" => self.role(&label, doc, RoleKind::ClusterRole).map(Object::Role),
            "Role" => self.role(&label, doc, RoleKind::Role).map(Object::Role),
            "ClusterRoleBinding" => self.binding(&label, doc, false).map(Object::Binding),
            "RoleBinding" => self.binding(&label, doc, true).map(Object::Binding),
            other => Err(malformed(&label, format!("unsupported kind {}", other))),
        }
    }

    /// Name and scope from metadata
    ///
    /// Namespaced kinds must carry a valid namespace, cluster kinds ignore it.
    fn metadata(&self, label: &str, meta: Option<ObjectMeta>, namespaced: bool) -> Result<ObjectMeta> {
        let mut meta = meta.unwrap_or_default();
        match &meta.name {
            Some(n) if !n.is_empty() => {}
            _ => return Err(malformed(label, "missing metadata.name")),
        }
        if namespaced {
            match &meta.namespace {
                Some(ns) if !ns.is_empty() => self.verify_namespace(label, ns)?,
                _ => return Err(malformed(label, "namespaced kind is missing metadata.namespace")),
            }
        } else if let Some(ns) = meta.namespace.take() {
            debug!("{}: ignoring namespace {} on a cluster scoped kind", label, ns);
        }
        Ok(meta)
    }

    fn verify_namespace(&self, label: &str, ns: &str) -> Result<()> {
        if ns.len() > 63 || !self.namespace_re.is_match(ns) {
            return Err(malformed(label, format!("namespace '{}' is not a valid DNS-1123 label", ns)));
        }
        Ok(())
    }

    fn role(&self, label: &str, doc: &Value, kind: RoleKind) -> Result<Role> {
        let src: RoleSource = convert(label, doc)?;
        let meta = self.metadata(label, src.metadata, kind == RoleKind::Role)?;
        let name = meta.name.unwrap_or_default();
        let label = format!("{} ({} {})", label, kind, name);

        let mut rules = vec![];
        for (i, rs) in src.rules.unwrap_or_default().into_iter().enumerate() {
            let verbs = match rs.verbs {
                Some(vs) => vs,
                None => return Err(malformed(&label, format!("rule {} is missing verbs", i))),
            };
            rules.push(Rule {
                apiGroups: rs.apiGroups.into_iter().collect(),
                resources: rs.resources.into_iter().collect(),
                verbs: verbs.into_iter().collect(),
                resourceNames: rs.resourceNames.into_iter().collect(),
                nonResourceURLs: rs.nonResourceURLs.into_iter().collect(),
            });
        }
        let role = Role {
            name,
            namespace: meta.namespace,
            labels: meta.labels,
            rules,
            aggregationRule: src.aggregationRule,
        };
        role.verify().map_err(|e| malformed(&label, e))?;
        trace!("interpreted {} with {} rules", role.key(), role.rules.len());
        Ok(role)
    }

    fn binding(&self, label: &str, doc: &Value, namespaced: bool) -> Result<Binding> {
        let src: BindingSource = convert(label, doc)?;
        let meta = self.metadata(label, src.metadata, namespaced)?;
        let name = meta.name.unwrap_or_default();
        let kind = if namespaced { "RoleBinding" } else { "ClusterRoleBinding" };
        let label = format!("{} ({} {})", label, kind, name);

        let roleRef = match src.roleRef {
            Some(r) => role_ref(&label, r)?,
            None => return Err(malformed(&label, "missing roleRef")),
        };
        let mut subjects = vec![];
        for (i, s) in src.subjects.unwrap_or_default().into_iter().enumerate() {
            subjects.push(self.subject(&label, i, s)?);
        }
        let binding = Binding {
            name,
            namespace: meta.namespace,
            roleRef,
            subjects,
        };
        binding.verify().map_err(|e| malformed(&label, e))?;
        trace!("interpreted {} for {} subjects", binding.key(), binding.subjects.len());
        Ok(binding)
    }

    fn subject(&self, label: &str, i: usize, src: RefSource) -> Result<Subject> {
        let kind = match src.kind.as_ref().map(String::as_str) {
            Some("User") => SubjectKind::User,
            Some("Group") => SubjectKind::Group,
            Some("ServiceAccount") => SubjectKind::ServiceAccount,
            Some(other) => return Err(malformed(label, format!("subject {} has unknown kind {}", i, other))),
            None => return Err(malformed(label, format!("subject {} is missing kind", i))),
        };
        let name = match src.name {
            Some(n) => n,
            None => return Err(malformed(label, format!("subject {} is missing name", i))),
        };
        let namespace = match kind {
            SubjectKind::ServiceAccount => {
                if let Some(ns) = &src.namespace {
                    self.verify_namespace(label, ns)?;
                }
                src.namespace
            }
            _ => None,
        };
        Ok(Subject { kind, name, namespace })
    }
}

fn role_ref(label: &str, src: RefSource) -> Result<RoleRef> {
    if let Some(g) = &src.apiGroup {
        if g != RBAC_GROUP {
            return Err(malformed(label, format!("roleRef apiGroup {} is not {}", g, RBAC_GROUP)));
        }
    }
    let kind = match src.kind.as_ref().map(String::as_str) {
        Some("ClusterRole") => RoleKind::ClusterRole,
        Some("Role") => RoleKind::Role,
        Some(other) => return Err(malformed(label, format!("roleRef has unknown kind {}", other))),
        None => return Err(malformed(label, "roleRef is missing kind")),
    };
    match src.name {
        Some(name) => Ok(RoleRef { kind, name }),
        None => Err(malformed(label, "roleRef is missing name")),
    }
}

/// Deserialize a typed view of a generic document
///
/// Type mismatches (eg. a string where a list is expected) are malformed documents.
fn convert<T: DeserializeOwned>(label: &str, doc: &Value) -> Result<T> {
    serde_yaml::from_value(doc.clone()).map_err(|e| malformed(label, e))
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;

    use super::{Interpreter, Object};
    use crate::structs::{RoleKey, RoleKind, Subject};
    use crate::ErrorKind;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn is_malformed(yaml: &str) -> bool {
        let interp = Interpreter::new().unwrap();
        match interp.interpret(0, &parse(yaml)) {
            Err(e) => match e.kind() {
                ErrorKind::MalformedDocument(..) => true,
                _ => false,
            },
            Ok(_) => false,
        }
    }

    const SECRET_READER: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: secret-reader
rules:
- apiGroups: [""]
  resources: ["secrets"]
  verbs: ["get", "watch", "list"]
"#;

    #[test]
    fn interprets_cluster_role() {
        let interp = Interpreter::new().unwrap();
        match interp.interpret(0, &parse(SECRET_READER)).unwrap() {
            Object::Role(r) => {
                assert_eq!(r.key(), RoleKey::cluster("secret-reader"));
                assert_eq!(r.rules.len(), 1);
                assert!(r.rules[0].apiGroups.contains(""));
                assert!(r.rules[0].verbs.contains("watch"));
            }
            o => panic!("expected a role, got {:?}", o),
        }
    }

    #[test]
    fn interprets_role_binding() {
        let interp = Interpreter::new().unwrap();
        let doc = parse(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: read-secrets
  namespace: default
subjects:
- kind: ServiceAccount
  name: default
  namespace: default
- kind: User
  name: jane
  apiGroup: rbac.authorization.k8s.io
roleRef:
  kind: ClusterRole
  name: secret-reader
  apiGroup: rbac.authorization.k8s.io
"#);
        match interp.interpret(1, &doc).unwrap() {
            Object::Binding(b) => {
                assert_eq!(b.namespace, Some("default".into()));
                assert_eq!(b.roleRef.kind, RoleKind::ClusterRole);
                assert_eq!(b.subjects[0], Subject::service_account("default", "default"));
                assert_eq!(b.subjects[1], Subject::user("jane"));
            }
            o => panic!("expected a binding, got {:?}", o),
        }
    }

    #[test]
    fn cluster_kinds_drop_namespace() {
        let interp = Interpreter::new().unwrap();
        let doc = parse(&SECRET_READER.replace("name: secret-reader", "name: secret-reader\n  namespace: default"));
        match interp.interpret(0, &doc).unwrap() {
            Object::Role(r) => assert_eq!(r.namespace, None),
            o => panic!("expected a role, got {:?}", o),
        }
    }

    #[test]
    fn rejects_missing_required_fields() {
        // no name
        assert!(is_malformed(&SECRET_READER.replace("  name: secret-reader\n", "  labels: {}\n")));
        // no verbs
        assert!(is_malformed(&SECRET_READER.replace("  verbs: [\"get\", \"watch\", \"list\"]\n", "")));
        // no roleRef
        assert!(is_malformed(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata: {name: read-secrets, namespace: default}
subjects: [{kind: User, name: jane}]
"#));
        // namespaced role without namespace
        assert!(is_malformed(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata: {name: pod-reader}
rules: [{apiGroups: [""], resources: [pods], verbs: [get]}]
"#));
        // service account without namespace
        assert!(is_malformed(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata: {name: sa}
subjects: [{kind: ServiceAccount, name: default}]
roleRef: {kind: ClusterRole, name: view}
"#));
    }

    #[test]
    fn rejects_foreign_and_ill_typed_documents() {
        assert!(is_malformed("apiVersion: v1\nkind: ConfigMap\nmetadata: {name: x}\n"));
        assert!(is_malformed("apiVersion: rbac.authorization.k8s.io/v1\nkind: Deployment\n"));
        assert!(is_malformed("kind: ClusterRole\nmetadata: {name: x}\n"));
        assert!(is_malformed("- just\n- a list\n"));
        assert!(is_malformed(&SECRET_READER.replace("[\"secrets\"]", "secrets")));
        assert!(is_malformed(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata: {name: pod-reader, namespace: Not_A_Namespace}
rules: []
"#));
        assert!(is_malformed(r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata: {name: bad}
subjects: []
roleRef: {kind: Role, name: pod-reader}
"#));
    }
}
