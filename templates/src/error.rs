use crate::element::{known_placeholders, TemplateElement};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error(
        "Unknown template element %{element}% in the string: {template} - known template elements are: {}",
        known_placeholders()
    )]
    UnknownTemplateElement { element: String, template: String },

    #[error("No value for {element} (position {position}) while evaluating: {template}")]
    MissingValue {
        element: TemplateElement,
        position: usize,
        template: String,
    },

    #[error("Value {value:?} for {element} contains the path separator while evaluating: {template}")]
    SeparatorInValue {
        element: TemplateElement,
        value: String,
        template: String,
    },

    #[error("Malformed template: {0}")]
    Malformed(String),
}
