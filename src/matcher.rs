use std::collections::BTreeSet;

use super::structs::{Request, Rule, WILDCARD};

/// Set membership with the wildcard special case
///
/// Exact, case sensitive comparison; no patterns.
fn has(set: &BTreeSet<String>, value: &str) -> bool {
    set.contains(WILDCARD) || set.contains(value)
}

/// Whether a rule authorizes a verb on a resource in an api group
pub fn matches(rule: &Rule, apiGroup: &str, resource: &str, verb: &str) -> bool {
    has(&rule.apiGroups, apiGroup) && has(&rule.resources, resource) && has(&rule.verbs, verb)
}

/// Resource matching with subresources
///
/// A rule resource matches when it is the wildcard, the exact `resource/subresource`
/// string, or `*/subresource`.
fn resource_matches(rule: &Rule, req: &Request) -> bool {
    if rule.resources.contains(WILDCARD) {
        return true;
    }
    if rule.resources.contains(&req.qualified_resource()) {
        return true;
    }
    match &req.subresource {
        Some(sub) if !sub.is_empty() => rule.resources.contains(&format!("*/{}", sub)),
        _ => false,
    }
}

/// An empty resourceNames list allows any object, otherwise the request must name one
fn name_matches(rule: &Rule, req: &Request) -> bool {
    if rule.resourceNames.is_empty() {
        return true;
    }
    match &req.name {
        Some(n) => rule.resourceNames.contains(n),
        None => false,
    }
}

/// Non-resource paths match exactly, or by prefix for entries ending in `*`
fn path_matches(rule: &Rule, path: &str) -> bool {
    rule.nonResourceURLs.iter().any(|url| {
        if url == WILDCARD || url == path {
            return true;
        }
        url.ends_with('*') && path.starts_with(&url[..url.len() - 1])
    })
}

/// Whether a rule authorizes a full request
pub fn matches_request(rule: &Rule, req: &Request) -> bool {
    if !has(&rule.verbs, &req.verb) {
        return false;
    }
    match &req.path {
        Some(path) => path_matches(rule, path),
        None => {
            has(&rule.apiGroups, &req.apiGroup) && resource_matches(rule, req) && name_matches(rule, req)
        }
    }
}
