mod common;
use common::{fixture, setup};

use std::sync::Arc;

use rbaccat::evaluator::Diagnostic;
use rbaccat::structs::{BindingKind, RoleKey};
use rbaccat::{filebacked, Authorizer, Identity, PolicyStore, Request, Subject};

fn authorizer(dir: &str) -> Authorizer {
    setup();
    let snap = filebacked::load(&fixture(dir)).unwrap();
    Authorizer::new(Arc::new(PolicyStore::new(snap)))
}

#[test]
fn service_account_reads_secrets_in_its_namespace() {
    let authz = authorizer("policies");
    let sa = Subject::service_account("default", "default");
    for verb in &["get", "list", "watch"] {
        let d = authz.authorize(&sa, verb, "", "secrets", "default");
        assert!(d.allowed, "{} secrets", verb);
        let reason = d.reason.unwrap();
        assert_eq!(reason.binding.name, "read-secrets");
        assert_eq!(reason.binding.kind, BindingKind::RoleBinding);
        assert_eq!(reason.role, RoleKey::cluster("secret-reader"));
        assert_eq!(reason.ruleIndex, 0);
    }
    let d = authz.authorize(&sa, "delete", "", "secrets", "default");
    assert!(!d.allowed);
    assert!(d.reason.is_none());
    // the RoleBinding only grants within default
    assert!(!authz.authorize(&sa, "get", "", "secrets", "kube-system").allowed);
    assert!(!authz.authorize(&sa, "get", "", "secrets", "").allowed);
    // same name in another namespace is another service account
    let other = Subject::service_account("kube-system", "default");
    assert!(!authz.authorize(&other, "get", "", "secrets", "default").allowed);
}

#[test]
fn unknown_subjects_are_denied() {
    let authz = authorizer("policies");
    let d = authz.authorize(&Subject::user("mallory"), "get", "", "secrets", "default");
    assert!(!d.allowed);
    assert!(d.diagnostics.is_empty());
    // a user sharing the service account name is not the service account
    assert!(!authz.authorize(&Subject::user("default"), "get", "", "secrets", "default").allowed);
}

#[test]
fn group_bindings_and_wildcard_verbs() {
    let authz = authorizer("policies");
    let alice = Identity::from(Subject::user("alice")).with_groups(vec!["ops"]);
    let scale = Request::resource("update", "apps", "deployments", "prod").with_subresource("scale");
    assert!(authz.authorize_request(&alice, &scale).allowed);
    let delete = Request::resource("delete", "apps", "deployments", "prod");
    assert!(authz.authorize_request(&alice, &delete).allowed);
    // cluster bindings also cover the cluster scope
    assert!(authz.authorize_request(&alice, &Request::resource("list", "apps", "deployments", "")).allowed);

    let logs = Request::resource("get", "", "pods", "prod").with_subresource("log");
    assert!(authz.authorize_request(&alice, &logs).allowed);
    let exec = Request::resource("create", "", "pods", "prod").with_subresource("exec");
    assert!(!authz.authorize_request(&alice, &exec).allowed);
    // wrong api group
    assert!(!authz.authorize_request(&alice, &Request::resource("delete", "", "deployments", "prod")).allowed);

    // without the group there is nothing
    let bare = Identity::from(Subject::user("alice"));
    assert!(!authz.authorize_request(&bare, &scale).allowed);
}

#[test]
fn resource_names_restrict_objects() {
    let authz = authorizer("policies");
    let jane = Identity::from(Subject::user("jane"));
    let named = |n: &str| Request::resource("update", "", "configmaps", "dev").named(n);
    assert!(authz.authorize_request(&jane, &named("app-config")).allowed);
    assert!(!authz.authorize_request(&jane, &named("other-config")).allowed);
    assert!(!authz.authorize_request(&jane, &Request::resource("update", "", "configmaps", "dev")).allowed);
    let elsewhere = Request::resource("update", "", "configmaps", "prod").named("app-config");
    assert!(!authz.authorize_request(&jane, &elsewhere).allowed);
}

#[test]
fn non_resource_urls() {
    let authz = authorizer("policies");
    let prom = Identity::from(Subject::user("prometheus"));
    assert!(authz.authorize_request(&prom, &Request::non_resource("get", "/healthz")).allowed);
    assert!(authz.authorize_request(&prom, &Request::non_resource("get", "/metrics/cadvisor")).allowed);
    assert!(!authz.authorize_request(&prom, &Request::non_resource("post", "/healthz")).allowed);
    assert!(!authz.authorize_request(&prom, &Request::non_resource("get", "/healthzz")).allowed);
    assert!(!authz.authorize_request(&prom, &Request::non_resource("get", "/metrics")).allowed);
    // a path grant says nothing about resources
    assert!(!authz.authorize_request(&prom, &Request::resource("get", "", "pods", "default")).allowed);
}

#[test]
fn aggregated_cluster_roles() {
    let authz = authorizer("policies");
    let sa = Subject::service_account("monitoring", "prometheus");
    let d = authz.authorize(&sa, "watch", "", "endpoints", "monitoring");
    assert!(d.allowed);
    assert_eq!(d.reason.unwrap().role, RoleKey::cluster("monitoring"));
    assert!(!authz.authorize(&sa, "watch", "", "endpoints", "default").allowed);
    assert!(!authz.authorize(&sa, "delete", "", "pods", "monitoring").allowed);
}

#[test]
fn dangling_references_deny_with_diagnostics() {
    let authz = authorizer("dangling");
    let sa = Subject::service_account("default", "default");
    let d = authz.authorize(&sa, "get", "", "secrets", "default");
    assert!(!d.allowed);
    assert_eq!(d.diagnostics.len(), 1);
    match &d.diagnostics[0] {
        Diagnostic::DanglingReference { binding, role } => {
            assert_eq!(binding.name, "read-secrets");
            assert_eq!(role, &RoleKey::cluster("secret-reader"));
        }
    }
    // evaluation carries on past the dangling binding
    let d = authz.authorize(&sa, "get", "", "pods", "default");
    assert!(d.allowed);
    assert_eq!(d.reason.unwrap().role, RoleKey::namespaced("default", "pod-viewer"));
    assert_eq!(d.diagnostics.len(), 1);
}

#[test]
fn decisions_are_repeatable() {
    let authz = authorizer("policies");
    let sa = Subject::service_account("default", "default");
    let first = authz.authorize(&sa, "get", "", "secrets", "default");
    for _ in 0..10 {
        assert_eq!(authz.authorize(&sa, "get", "", "secrets", "default"), first);
    }
}

#[test]
fn rules_for_lists_grants() {
    let authz = authorizer("policies");
    let alice = Identity::from(Subject::user("alice")).with_groups(vec!["ops"]);
    let grants = authz.rules_for(&alice, "prod");
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().all(|g| g.role == RoleKey::cluster("deployer")));
    assert!(authz.rules_for(&Identity::from(Subject::user("nobody")), "prod").is_empty());
}
