//! Path and string templates with `%NAME%` placeholders.
//!
//! A template is validated once, when it is parsed, against the closed set
//! of [`TemplateElement`]s. Evaluation then only needs the value tuple:
//!
//! ```
//! use templates::Template;
//!
//! let template = Template::parse("org:root:%ETAB%:%CLASSE%").unwrap();
//! assert_eq!(template.evaluate(&["ETB01", "6A"]).unwrap(), "org:root:ETB01:6A");
//! ```

pub mod element;
pub mod error;
pub mod path;
pub mod template;

pub use element::TemplateElement;
pub use error::{Result, TemplateError};
pub use path::SEPARATOR;
pub use template::Template;

/// Validate a template string without keeping the parsed form
pub fn validate(source: &str) -> Result<()> {
    Template::parse(source).map(|_| ())
}

/// Parse then evaluate `source`.
///
/// An unknown placeholder fails before anything is substituted.
pub fn evaluate<S: AsRef<str>>(source: &str, values: &[S]) -> Result<String> {
    Template::parse(source)?.evaluate(values)
}
