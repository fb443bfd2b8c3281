use std::path::PathBuf;

use super::evaluator::Diagnostic;
use super::filebacked;
use super::store::Snapshot;
use super::structs::RoleKind;
use super::Result;

/// Validate policy files and directories
///
/// Load errors (malformed documents, duplicate names) always fail.
/// Dangling role references are only warned about unless `strict`.
pub fn policies(paths: &[PathBuf], strict: bool) -> Result<Snapshot> {
    for p in paths {
        info!("validating {}", p.display());
    }
    let snap = filebacked::load(paths)?;
    references(&snap, strict)?;
    for role in snap.roles() {
        let key = role.key();
        let aggregation_source = role.kind() == RoleKind::ClusterRole && !role.labels.is_empty();
        if snap.bindings_referencing(&key).is_empty() && !aggregation_source {
            debug!("{} is not bound by anything", key);
        }
    }
    info!("validated {} roles and {} bindings", snap.roles().len(), snap.bindings().len());
    Ok(snap)
}

/// Report bindings whose role is not loaded
pub fn references(snap: &Snapshot, strict: bool) -> Result<()> {
    let mut first = None;
    for b in snap.dangling() {
        let diag = Diagnostic::DanglingReference { binding: b.key(), role: b.role_key() };
        warn!("{}", diag);
        if first.is_none() {
            first = Some(diag);
        }
    }
    match first {
        Some(diag) if strict => Err(diag.to_error()),
        _ => Ok(()),
    }
}
