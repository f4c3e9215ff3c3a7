use backend::BackendError;
use definitions::{DefinitionError, TemplateError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisioningError>;

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Configuration error: {0}")]
    Config(#[from] DefinitionError),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Preexisting resource {path} (defined as {template}) does not exist")]
    PreexistingMissing { path: String, template: String },

    #[error("Could not resolve the containing folder {path}: {cause}")]
    AncestorUnresolved {
        path: String,
        cause: Box<ProvisioningError>,
    },

    #[error("Cycle detected while resolving {path} (chain: {chain})")]
    CycleDetected { path: String, chain: String },

    #[error("Resolving {path} exceeds the maximum depth of {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("{subject} is not a member of {group}")]
    NotAMember { subject: String, group: String },

    #[error("Startup error: {0}")]
    Startup(String),
}

impl From<TemplateError> for ProvisioningError {
    fn from(err: TemplateError) -> Self {
        ProvisioningError::Config(DefinitionError::Template(err))
    }
}

impl ProvisioningError {
    /// Fatal errors stop a batch; the others only fail the current subject
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProvisioningError::Backend(_)
                | ProvisioningError::PreexistingMissing { .. }
                | ProvisioningError::NotAMember { .. }
                // a subject's value that cannot be part of a path
                | ProvisioningError::Config(DefinitionError::Template(
                    TemplateError::SeparatorInValue { .. }
                ))
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ProvisioningError::Config(DefinitionError::Validation(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProvisioningError::AncestorUnresolved {
            path: "org:root".to_string(),
            cause: Box::new(ProvisioningError::Backend(BackendError::Connection(
                "refused".to_string(),
            ))),
        };
        assert_eq!(
            err.to_string(),
            "Could not resolve the containing folder org:root: Backend error: Connection error: refused"
        );

        let err = ProvisioningError::NotAMember {
            subject: "person:jdoe".to_string(),
            group: "org:staff".to_string(),
        };
        assert_eq!(err.to_string(), "person:jdoe is not a member of org:staff");

        let err = ProvisioningError::PreexistingMissing {
            path: "org:ETB01:staff".to_string(),
            template: "org:%ETAB%:staff".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Preexisting resource org:ETB01:staff (defined as org:%ETAB%:staff) does not exist"
        );
    }

    #[test]
    fn test_fatality() {
        assert!(!ProvisioningError::Backend(BackendError::NotFound("g".to_string())).is_fatal());
        assert!(!ProvisioningError::PreexistingMissing {
            path: "org:g".to_string(),
            template: "org:g".to_string(),
        }
        .is_fatal());
        assert!(!ProvisioningError::from(TemplateError::SeparatorInValue {
            element: definitions::TemplateElement::Etab,
            value: "a:b".to_string(),
            template: "org:%ETAB%".to_string(),
        })
        .is_fatal());
        assert!(ProvisioningError::Startup("missing".to_string()).is_fatal());
        assert!(ProvisioningError::DepthExceeded {
            path: "a:b".to_string(),
            max_depth: 1
        }
        .is_fatal());
        assert!(ProvisioningError::invalid("bad").is_fatal());
    }
}
