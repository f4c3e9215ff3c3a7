//! Declarative descriptions of the groups and folders to provision.
//!
//! A [`DefinitionTemplate`] is what configuration describes: a path template,
//! the kind of resource, the rights privileged groups need on it, the groups
//! it must belong to and the people it receives. Evaluating a template
//! against a subject's attribute values gives an immutable [`Definition`].
//!
//! The [`DefinitionsManager`] trait is what the engine consumes;
//! [`TemplateDefinitions`] is the in-memory implementation and
//! [`DefinitionLoader`] builds one from YAML.

pub mod definition;
pub mod error;
pub mod loader;
pub mod manager;
pub mod person_type;
pub mod right;

pub use definition::{
    ContainingGroup, Definition, DefinitionTemplate, MatchCondition, MemberRule,
    PrivilegeRequirement,
};
pub use error::{DefinitionError, Result};
pub use loader::{DefinitionLoader, DefinitionSpec, DefinitionsDocument};
pub use manager::{DefinitionsManager, TemplateDefinitions};
pub use person_type::PersonType;
pub use right::{ResourceKind, Right};

// Re-export template types used in definitions
pub use templates::{Template, TemplateElement, TemplateError};
