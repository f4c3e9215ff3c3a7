use crate::right::{ResourceKind, Right};
use templates::TemplateError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DefinitionError>;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Unknown right: {0}")]
    UnknownRight(String),

    #[error("Unknown person type: {0}")]
    UnknownPersonType(String),

    #[error("Right {right} cannot be granted on the {kind} {path}")]
    RightScope {
        right: Right,
        kind: ResourceKind,
        path: String,
    },

    #[error("Invalid match condition '{pattern}': {reason}")]
    InvalidCondition { pattern: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Definition not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlParsing(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DefinitionError::RightScope {
            right: Right::Update,
            kind: ResourceKind::Folder,
            path: "org:root".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Right UPDATE cannot be granted on the folder org:root"
        );

        let err = DefinitionError::NotFound("org:missing".to_string());
        assert_eq!(err.to_string(), "Definition not found: org:missing");
    }
}
