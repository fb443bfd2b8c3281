use std::fmt;
use std::sync::Arc;

use super::matcher;
use super::resolver;
use super::store::{PolicyStore, Snapshot};
use super::structs::{Binding, BindingKey, Identity, Request, RoleKey, Rule, Subject};
use super::{Error, ErrorKind};

/// Inconsistencies met while evaluating
///
/// These never fail an evaluation; they only explain a deny.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A binding names a role that is not loaded
    DanglingReference { binding: BindingKey, role: RoleKey },
}

impl Diagnostic {
    /// The error this diagnostic would be if raised
    pub fn to_error(&self) -> Error {
        match self {
            Diagnostic::DanglingReference { binding, role } => {
                ErrorKind::DanglingReference(binding.to_string(), role.to_string()).into()
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::DanglingReference { binding, role } => {
                write!(f, "DanglingReference: {} references missing {}", binding, role)
            }
        }
    }
}

/// The binding, role and rule granting something
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Reason {
    pub binding: BindingKey,
    pub role: RoleKey,
    /// Index of the rule within the role
    pub ruleIndex: usize,
    pub rule: Rule,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} grants {} rule #{} ({})", self.binding, self.role, self.ruleIndex, self.rule)
    }
}

/// Outcome of an authorization
///
/// Always definite; `reason` is set exactly when allowed.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    /// Generation of the snapshot this was evaluated against
    pub generation: u64,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.reason {
            Some(r) if self.allowed => write!(f, "allowed: {}", r),
            _ => write!(f, "denied: no rule matched"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Start,
    BindingsResolved,
    RuleScan,
    Allow,
    Deny,
}

/// Scan the rules of each binding's role until one matches
///
/// Unresolvable role references are recorded and skipped; they can only lead to a deny.
fn scan(snap: &Snapshot, bindings: &[&Binding], req: &Request, diagnostics: &mut Vec<Diagnostic>) -> Option<Reason> {
    for b in bindings {
        let key = b.role_key();
        let role = match snap.role(&key) {
            Some(r) => r,
            None => {
                let diag = Diagnostic::DanglingReference { binding: b.key(), role: key };
                warn!("{}", diag);
                diagnostics.push(diag);
                continue;
            }
        };
        for (i, rule) in role.rules.iter().enumerate() {
            if matcher::matches_request(rule, req) {
                return Some(Reason {
                    binding: b.key(),
                    role: role.key(),
                    ruleIndex: i,
                    rule: rule.clone(),
                });
            }
        }
    }
    None
}

/// Evaluate a request against one snapshot
///
/// Default deny: only a matching rule in a resolvable role allows.
/// Non-resource requests are only granted through ClusterRoleBindings.
pub fn evaluate(snap: &Snapshot, identity: &Identity, req: &Request) -> Decision {
    let namespace = if req.is_resource_request() { req.namespace.as_str() } else { "" };
    let mut state = State::Start;
    let mut bindings = vec![];
    let mut diagnostics = vec![];
    let mut reason = None;
    loop {
        let next = match state {
            State::Start => {
                bindings = resolver::bindings_for_identity(snap, identity, namespace);
                State::BindingsResolved
            }
            State::BindingsResolved if bindings.is_empty() => State::Deny,
            State::BindingsResolved => State::RuleScan,
            State::RuleScan => {
                reason = scan(snap, &bindings, req, &mut diagnostics);
                if reason.is_some() { State::Allow } else { State::Deny }
            }
            State::Allow | State::Deny => break,
        };
        trace!("{:?} -> {:?}", state, next);
        state = next;
    }
    let decision = Decision {
        allowed: state == State::Allow && reason.is_some(),
        reason,
        diagnostics,
        generation: snap.generation(),
    };
    debug!("{} {}: {}", identity, req, decision);
    decision
}

/// Every rule an identity holds in a namespace, with where it comes from
///
/// Dangling role references contribute nothing.
pub fn rules_for(snap: &Snapshot, identity: &Identity, namespace: &str) -> Vec<Reason> {
    let mut res = vec![];
    for b in resolver::bindings_for_identity(snap, identity, namespace) {
        let key = b.role_key();
        match snap.role(&key) {
            Some(role) => {
                for (i, rule) in role.rules.iter().enumerate() {
                    res.push(Reason {
                        binding: b.key(),
                        role: key.clone(),
                        ruleIndex: i,
                        rule: rule.clone(),
                    });
                }
            }
            None => warn!("{}", Diagnostic::DanglingReference { binding: b.key(), role: key }),
        }
    }
    res
}

/// Authorization entrypoint over a published store
///
/// Every call evaluates entirely against the snapshot published when it started.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<PolicyStore>,
}

impl Authorizer {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Authorizer { store }
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// May `subject` perform `verb` on `resource` in `apiGroup` within `namespace`?
    ///
    /// An empty namespace asks about the cluster scope.
    pub fn authorize(&self, subject: &Subject, verb: &str, apiGroup: &str, resource: &str, namespace: &str) -> Decision {
        let identity = Identity::from(subject.clone());
        self.authorize_request(&identity, &Request::resource(verb, apiGroup, resource, namespace))
    }

    pub fn authorize_request(&self, identity: &Identity, req: &Request) -> Decision {
        let snap = self.store.snapshot();
        evaluate(&snap, identity, req)
    }

    pub fn rules_for(&self, identity: &Identity, namespace: &str) -> Vec<Reason> {
        let snap = self.store.snapshot();
        rules_for(&snap, identity, namespace)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{evaluate, rules_for, Authorizer, Diagnostic};
    use crate::document::Object;
    use crate::store::{PolicyStore, Snapshot};
    use crate::structs::{Binding, Identity, Request, Role, RoleKey, RoleRef, Rule, Subject};
    use crate::ErrorKind;

    fn sa() -> Subject {
        Subject::service_account("default", "default")
    }

    fn objects() -> Vec<Object> {
        vec![
            Object::Role(Role::cluster("secret-reader",
                vec![Rule::new(&[""], &["secrets"], &["get", "watch", "list"])])),
            Object::Binding(Binding::namespaced("default", "read-secrets",
                RoleRef::cluster_role("secret-reader"), vec![sa()])),
        ]
    }

    fn authorizer(objs: Vec<Object>) -> Authorizer {
        let snap = Snapshot::from_objects(objs).unwrap();
        Authorizer::new(Arc::new(PolicyStore::new(snap)))
    }

    #[test]
    fn secret_reader_scenario() {
        let authz = authorizer(objects());
        let get = authz.authorize(&sa(), "get", "", "secrets", "default");
        assert!(get.allowed);
        let reason = get.reason.unwrap();
        assert_eq!(reason.binding.name, "read-secrets");
        assert_eq!(reason.role, RoleKey::cluster("secret-reader"));
        assert_eq!(reason.ruleIndex, 0);

        assert!(!authz.authorize(&sa(), "delete", "", "secrets", "default").allowed);
        assert!(!authz.authorize(&sa(), "get", "", "secrets", "other-namespace").allowed);
        assert!(!authz.authorize(&sa(), "get", "", "secrets", "").allowed);
    }

    #[test]
    fn dangling_reference_denies_with_diagnostic() {
        let authz = authorizer(vec![
            Object::Binding(Binding::namespaced("default", "read-secrets",
                RoleRef::cluster_role("secret-reader"), vec![sa()])),
        ]);
        let d = authz.authorize(&sa(), "get", "", "secrets", "default");
        assert!(!d.allowed);
        assert!(d.reason.is_none());
        assert_eq!(d.diagnostics.len(), 1);
        match &d.diagnostics[0] {
            Diagnostic::DanglingReference { binding, role } => {
                assert_eq!(binding.name, "read-secrets");
                assert_eq!(role, &RoleKey::cluster("secret-reader"));
            }
        }
        match d.diagnostics[0].to_error().kind() {
            ErrorKind::DanglingReference(..) => {}
            k => panic!("unexpected {:?}", k),
        }
    }

    #[test]
    fn dangling_reference_does_not_hide_other_grants() {
        let mut objs = objects();
        objs.push(Object::Binding(Binding::namespaced("default", "a-broken",
            RoleRef::role("missing"), vec![sa()])));
        let authz = authorizer(objs);
        let d = authz.authorize(&sa(), "get", "", "secrets", "default");
        assert!(d.allowed);
        assert_eq!(d.diagnostics.len(), 1); // a-broken is scanned first
    }

    #[test]
    fn role_refs_resolve_in_binding_namespace() {
        let authz = authorizer(vec![
            Object::Role(Role::namespaced("kube-system", "pod-reader",
                vec![Rule::new(&[""], &["pods"], &["get"])])),
            Object::Binding(Binding::namespaced("default", "pods",
                RoleRef::role("pod-reader"), vec![Subject::user("jane")])),
        ]);
        // the Role lives in kube-system, the binding in default
        let d = authz.authorize(&Subject::user("jane"), "get", "", "pods", "default");
        assert!(!d.allowed);
        assert_eq!(d.diagnostics.len(), 1);
    }

    #[test]
    fn cluster_role_bindings_cover_every_namespace() {
        let authz = authorizer(vec![
            Object::Role(Role::cluster("admin", vec![Rule::new(&["*"], &["*"], &["*"])])),
            Object::Binding(Binding::cluster("admins",
                RoleRef::cluster_role("admin"), vec![Subject::group("system:masters")])),
        ]);
        let root = Identity::from(Subject::user("root")).with_groups(vec!["system:masters"]);
        for ns in &["default", "kube-system", ""] {
            let req = Request::resource("delete", "apps", "deployments", ns);
            assert!(authz.authorize_request(&root, &req).allowed);
        }
        assert!(!authz.authorize(&Subject::user("root"), "get", "", "pods", "default").allowed);
    }

    #[test]
    fn non_resource_urls_need_cluster_bindings() {
        let objs = vec![
            Object::Role(Role::cluster("health", vec![Rule::non_resource(&["/healthz"], &["get"])])),
            Object::Binding(Binding::namespaced("default", "health-local",
                RoleRef::cluster_role("health"), vec![Subject::user("jane")])),
            Object::Binding(Binding::cluster("health-global",
                RoleRef::cluster_role("health"), vec![Subject::user("bob")])),
        ];
        let snap = Snapshot::from_objects(objs).unwrap();
        let req = Request::non_resource("get", "/healthz");
        assert!(!evaluate(&snap, &Subject::user("jane").into(), &req).allowed);
        assert!(evaluate(&snap, &Subject::user("bob").into(), &req).allowed);
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let snap = Snapshot::from_objects(objects()).unwrap();
        let id: Identity = sa().into();
        let req = Request::resource("list", "", "secrets", "default");
        let first = evaluate(&snap, &id, &req);
        for _ in 0..10 {
            assert_eq!(evaluate(&snap, &id, &req), first);
        }
    }

    #[test]
    fn lists_effective_rules() {
        let snap = Snapshot::from_objects(objects()).unwrap();
        let rules = rules_for(&snap, &sa().into(), "default");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule.verbs.len(), 3);
        assert!(rules_for(&snap, &sa().into(), "other-namespace").is_empty());
    }
}
