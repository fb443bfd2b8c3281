#![recursion_limit = "1024"]
#![allow(renamed_and_removed_lints)]
#![allow(non_snake_case)]

#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_json;
extern crate serde_yaml;

extern crate arc_swap;
extern crate chrono;
extern crate regex;
extern crate threadpool;
extern crate walkdir;

#[macro_use]
extern crate log;

#[macro_use]
extern crate error_chain;
error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    links {}
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error) #[cfg(unix)];
        SerdeY(serde_yaml::Error);
        SerdeJ(serde_json::Error);
        Walk(walkdir::Error);
        Regex(::regex::Error);
    }
    errors {
        MalformedDocument(doc: String, reason: String) {
            description("policy document is malformed")
            display("{} is malformed: {}", &doc, &reason)
        }
        DuplicateName(kind: String, scope: String, name: String) {
            description("policy object name is not unique in its scope")
            display("{} '{}' is defined more than once in {}", &kind, &name, &scope)
        }
        DanglingReference(binding: String, role: String) {
            description("binding references a role that does not exist")
            display("{} references missing {}", &binding, &role)
        }
        PolicyFileMissing(path: String) {
            description("policy file or directory does not exist")
            display("policy path '{}' does not exist", &path)
        }
    }
}

/// Structs for the rbac objects
pub mod structs;
pub use crate::structs::{Binding, Identity, Request, Role, RoleRef, Rule, Subject, SubjectKind};

/// Interpretation of generic documents into rbac objects
pub mod document;

/// Immutable indexed snapshots and the swappable store publishing them
pub mod store;
pub use crate::store::{PolicyStore, Snapshot};

/// Rule matching
pub mod matcher;

/// Subject to binding resolution
pub mod resolver;

/// Allow / deny evaluation
pub mod evaluator;
pub use crate::evaluator::{Authorizer, Decision, Diagnostic, Reason};

/// Json audit records of decisions
pub mod audit;

/// Reading policy documents from yaml files
pub mod filebacked;

/// Master config for rbaccat
pub mod config;
pub use crate::config::Config;

/// Threaded batch evaluation using `threadpool`
pub mod parallel;

/// Validation of policy files
pub mod validate;

/// Convenience listers
pub mod list;

/// Smart initialiser
///
/// Tricks the library into reading from your policy location.
pub fn init() -> Result<()> {
    use std::env;
    use std::path::Path;

    // Allow rbaccat calls to work from anywhere if we know where policies are
    if let Ok(pdir) = env::var("RBACCAT_POLICY_DIR") {
        let pth = Path::new(&pdir);
        if !pth.is_dir() {
            bail!("RBACCAT_POLICY_DIR must exist");
        }
        env::set_current_dir(pth)?;
    }

    Ok(())
}
