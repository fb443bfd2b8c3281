#![allow(non_snake_case)]

/// Allow normal error handling from structs
pub use super::{ErrorKind, Result, ResultExt};

/// Sanity checks on interpreted objects
///
/// Run once per object as it is built from its document; failures become malformed document errors.
pub trait Verify {
    fn verify(&self) -> Result<()>;
}

/// Policy rules and the wildcard
pub mod rule;
pub use self::rule::{Rule, WILDCARD};

/// Identities that can be granted permissions
pub mod subject;
pub use self::subject::{Identity, Subject, SubjectKind};

/// Roles and ClusterRoles
pub mod role;
pub use self::role::{AggregationRule, LabelSelector, Role, RoleKey, RoleKind};

/// RoleBindings and ClusterRoleBindings
pub mod binding;
pub use self::binding::{Binding, BindingKey, BindingKind, RoleRef};

/// Authorization request attributes
mod request;
pub use self::request::Request;
