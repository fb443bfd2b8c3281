use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde_yaml::Value;

use super::document::{Interpreter, Object};
use super::structs::{Binding, BindingKey, Role, RoleKey, RoleKind, Rule};
use super::{ErrorKind, Result};

/// An immutable, indexed view of a set of loaded rbac objects
///
/// Roles and bindings are indexed by (kind, namespace-or-cluster, name).
/// Orderings kept alongside the indexes make iteration deterministic.
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    roles: HashMap<RoleKey, Role>,
    bindings: HashMap<BindingKey, Binding>,
    /// ClusterRoleBindings ordered by name
    cluster_order: Vec<BindingKey>,
    /// RoleBindings per namespace ordered by name
    namespace_order: HashMap<String, Vec<BindingKey>>,
    /// Back-references from a role key to the bindings naming it
    referencing: HashMap<RoleKey, Vec<BindingKey>>,
}

fn scope_of(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!("namespace {}", ns),
        None => "the cluster scope".into(),
    }
}

impl Snapshot {
    /// Interpret a sequence of generic documents into a snapshot
    ///
    /// Null documents (eg. an empty document between two `---`) are skipped.
    pub fn load(documents: &[Value]) -> Result<Snapshot> {
        let interp = Interpreter::new()?;
        let mut objects = vec![];
        for (i, doc) in documents.iter().enumerate() {
            if doc.is_null() {
                debug!("skipping empty document #{}", i);
                continue;
            }
            objects.push(interp.interpret(i, doc)?);
        }
        Snapshot::from_objects(objects)
    }

    /// Index interpreted objects
    ///
    /// Fails on name conflicts within a scope. Aggregated ClusterRoles are resolved here.
    pub fn from_objects(objects: Vec<Object>) -> Result<Snapshot> {
        let mut snap = Snapshot::default();
        for o in objects {
            match o {
                Object::Role(r) => {
                    let key = r.key();
                    if snap.roles.contains_key(&key) {
                        return Err(ErrorKind::DuplicateName(
                            key.kind.to_string(), scope_of(&key.namespace), key.name,
                        ).into());
                    }
                    snap.roles.insert(key, r);
                }
                Object::Binding(b) => {
                    let key = b.key();
                    if snap.bindings.contains_key(&key) {
                        return Err(ErrorKind::DuplicateName(
                            key.kind.to_string(), scope_of(&key.namespace), key.name,
                        ).into());
                    }
                    snap.referencing.entry(b.role_key()).or_insert_with(Vec::new).push(key.clone());
                    match &b.namespace {
                        Some(ns) => snap.namespace_order.entry(ns.clone()).or_insert_with(Vec::new).push(key.clone()),
                        None => snap.cluster_order.push(key.clone()),
                    }
                    snap.bindings.insert(key, b);
                }
            }
        }
        snap.cluster_order.sort();
        for keys in snap.namespace_order.values_mut() {
            keys.sort();
        }
        for keys in snap.referencing.values_mut() {
            keys.sort();
        }
        snap.aggregate();
        info!("loaded {} roles and {} bindings", snap.roles.len(), snap.bindings.len());
        Ok(snap)
    }

    /// Replace the rules of aggregated ClusterRoles
    ///
    /// An aggregated ClusterRole holds the union of the rules of every other
    /// ClusterRole its selectors match, without duplicates, sources taken in
    /// name order. Sources may be aggregated themselves, so rules are pulled in
    /// until nothing changes. The rule sets only grow, which bounds the loop.
    fn aggregate(&mut self) {
        let mut cluster_roles: Vec<&RoleKey> = self.roles.keys()
            .filter(|k| k.kind == RoleKind::ClusterRole)
            .collect();
        cluster_roles.sort();

        let mut sources: Vec<(RoleKey, Vec<RoleKey>)> = vec![];
        for key in &cluster_roles {
            let agg = match self.roles.get(*key).and_then(|r| r.aggregationRule.as_ref()) {
                Some(a) => a,
                None => continue,
            };
            let selected = cluster_roles.iter()
                .filter(|other| *other != key)
                .filter(|other| self.roles.get(**other).map_or(false, |r| agg.selects(&r.labels)))
                .map(|other| (*other).clone())
                .collect::<Vec<_>>();
            for other in &selected {
                debug!("aggregating {} into {}", other, key);
            }
            sources.push(((*key).clone(), selected));
        }
        // declared rules of aggregated roles are overwritten
        for (key, _) in &sources {
            if let Some(role) = self.roles.get_mut(key) {
                role.rules.clear();
            }
        }

        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for (key, selected) in &sources {
                let mut rules: Vec<Rule> = self.roles.get(key).map(|r| r.rules.clone()).unwrap_or_default();
                for other in selected {
                    for r in self.roles.get(other).map(|r| r.rules.as_slice()).unwrap_or(&[]) {
                        if !rules.contains(r) {
                            rules.push(r.clone());
                            changed = true;
                        }
                    }
                }
                if let Some(role) = self.roles.get_mut(key) {
                    role.rules = rules;
                }
            }
            if !changed {
                break;
            }
        }
        trace!("aggregation of {} roles settled after {} rounds", sources.len(), rounds);
    }

    /// Publication counter of this snapshot (0 when never published)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn role(&self, key: &RoleKey) -> Option<&Role> {
        self.roles.get(key)
    }

    pub fn binding(&self, key: &BindingKey) -> Option<&Binding> {
        self.bindings.get(key)
    }

    /// All roles ordered by key
    pub fn roles(&self) -> Vec<&Role> {
        let mut keys: Vec<&RoleKey> = self.roles.keys().collect();
        keys.sort();
        keys.into_iter().filter_map(|k| self.roles.get(k)).collect()
    }

    /// ClusterRoleBindings ordered by name
    pub fn cluster_bindings(&self) -> Vec<&Binding> {
        self.cluster_order.iter().filter_map(|k| self.bindings.get(k)).collect()
    }

    /// RoleBindings of one namespace ordered by name
    pub fn namespace_bindings(&self, namespace: &str) -> Vec<&Binding> {
        match self.namespace_order.get(namespace) {
            Some(keys) => keys.iter().filter_map(|k| self.bindings.get(k)).collect(),
            None => vec![],
        }
    }

    /// All bindings, cluster scoped first, then by namespace and name
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut res = self.cluster_bindings();
        let mut namespaces: Vec<&String> = self.namespace_order.keys().collect();
        namespaces.sort();
        for ns in namespaces {
            res.extend(self.namespace_bindings(ns));
        }
        res
    }

    /// Bindings whose roleRef resolves to the given role key
    pub fn bindings_referencing(&self, key: &RoleKey) -> Vec<&Binding> {
        match self.referencing.get(key) {
            Some(keys) => keys.iter().filter_map(|k| self.bindings.get(k)).collect(),
            None => vec![],
        }
    }

    /// Bindings whose roleRef does not resolve
    pub fn dangling(&self) -> Vec<&Binding> {
        self.bindings()
            .into_iter()
            .filter(|b| !self.roles.contains_key(&b.role_key()))
            .collect()
    }
}

/// The published snapshot
///
/// Readers load an `Arc` to the current snapshot without taking any lock and
/// evaluate against it. Publishing is a single atomic pointer store, so in-flight
/// evaluations keep the snapshot they started with. Writers are serialized so
/// generations stay strictly increasing.
pub struct PolicyStore {
    current: ArcSwap<Snapshot>,
    publishing: Mutex<()>,
}

impl PolicyStore {
    pub fn new(snapshot: Snapshot) -> Self {
        let store = PolicyStore {
            current: ArcSwap::from_pointee(Snapshot::default()),
            publishing: Mutex::new(()),
        };
        store.publish(snapshot);
        store
    }

    /// Load documents into a freshly published store
    pub fn load(documents: &[Value]) -> Result<Self> {
        Ok(PolicyStore::new(Snapshot::load(documents)?))
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Atomically replace the published snapshot
    pub fn publish(&self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        // guards no data, so a poisoned lock is still usable
        let _writer = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.generation = self.current.load().generation + 1;
        let next = Arc::new(snapshot);
        self.current.store(Arc::clone(&next));
        debug!("published policy snapshot generation {}", next.generation);
        next
    }

    /// Re-parse documents and publish them wholesale
    ///
    /// On failure the previously published snapshot stays active.
    pub fn reload(&self, documents: &[Value]) -> Result<Arc<Snapshot>> {
        let snapshot = Snapshot::load(documents).map_err(|e| {
            warn!("reload rejected, keeping generation {}: {}", self.snapshot().generation, e);
            e
        })?;
        Ok(self.publish(snapshot))
    }
}
