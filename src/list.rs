/// This file contains all the `rbaccat list*` subcommands
use super::evaluator::Reason;
use super::store::Snapshot;
use super::Result;

/// One line per role with its rule and binding counts
pub fn role_lines(snap: &Snapshot) -> Vec<String> {
    snap.roles().iter().map(|r| {
        let key = r.key();
        let bound = snap.bindings_referencing(&key).len();
        format!("{} ({} rules, {} bindings)", key, r.rules.len(), bound)
    }).collect()
}

/// One line per binding with its role and subjects
pub fn binding_lines(snap: &Snapshot) -> Vec<String> {
    snap.bindings().iter().map(|b| {
        let subjects = b.subjects.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let missing = if snap.role(&b.role_key()).is_none() { " (missing)" } else { "" };
        format!("{} -> {}{}: {}", b.key(), b.role_key(), missing, subjects.join(", "))
    }).collect()
}

/// Print the loaded roles
pub fn roles(snap: &Snapshot) -> Result<()> {
    for l in role_lines(snap) {
        println!("{}", l);
    }
    Ok(())
}

/// Print the loaded bindings
pub fn bindings(snap: &Snapshot) -> Result<()> {
    for l in binding_lines(snap) {
        println!("{}", l);
    }
    Ok(())
}

/// Print effective rules
pub fn rules(grants: &[Reason]) -> Result<()> {
    if grants.is_empty() {
        println!("no rules");
    }
    for g in grants {
        println!("{}", g);
    }
    Ok(())
}
