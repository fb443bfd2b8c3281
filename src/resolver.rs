use super::store::Snapshot;
use super::structs::{Binding, Identity, Subject};

/// Bindings visible in a namespace, cluster scoped ones first
///
/// Within each group the order is by name. The order only makes
/// diagnostics deterministic; authorization ORs over all of them.
fn visible<'a>(snap: &'a Snapshot, namespace: &str) -> Vec<&'a Binding> {
    let mut res = snap.cluster_bindings();
    if !namespace.is_empty() {
        res.extend(snap.namespace_bindings(namespace));
    }
    res
}

/// Bindings listing exactly this subject, visible in a namespace
///
/// An empty namespace only considers ClusterRoleBindings.
pub fn bindings_for<'a>(snap: &'a Snapshot, subject: &Subject, namespace: &str) -> Vec<&'a Binding> {
    visible(snap, namespace).into_iter().filter(|b| b.lists(subject)).collect()
}

/// Bindings applying to an identity, including through its groups
pub fn bindings_for_identity<'a>(snap: &'a Snapshot, identity: &Identity, namespace: &str) -> Vec<&'a Binding> {
    let res: Vec<&Binding> = visible(snap, namespace).into_iter().filter(|b| b.applies_to(identity)).collect();
    trace!("{} has {} bindings in '{}'", identity, res.len(), namespace);
    res
}
