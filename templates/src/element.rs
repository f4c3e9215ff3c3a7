use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delimiter wrapped around an element name inside a template string.
pub const DELIMITER: char = '%';

/// The closed set of placeholders a template may reference.
///
/// Each element owns a fixed position in the value tuple handed to
/// [`Template::evaluate`](crate::Template::evaluate): the value for
/// `%CLASSE%` is always `values[1]`, whatever the order of the placeholders
/// in the template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateElement {
    /// Establishment identifier
    Etab,
    /// Class or category identifier
    Classe,
    /// Establishment display name
    NomEtab,
    /// Class or category display name
    NomClasse,
    /// Person type code of the subject
    Affiliation,
}

impl TemplateElement {
    pub const ALL: [TemplateElement; 5] = [
        TemplateElement::Etab,
        TemplateElement::Classe,
        TemplateElement::NomEtab,
        TemplateElement::NomClasse,
        TemplateElement::Affiliation,
    ];

    /// Position of the element's value in an evaluation tuple
    pub fn position(self) -> usize {
        match self {
            TemplateElement::Etab => 0,
            TemplateElement::Classe => 1,
            TemplateElement::NomEtab => 2,
            TemplateElement::NomClasse => 3,
            TemplateElement::Affiliation => 4,
        }
    }

    /// Name as written between the delimiters
    pub fn name(self) -> &'static str {
        match self {
            TemplateElement::Etab => "ETAB",
            TemplateElement::Classe => "CLASSE",
            TemplateElement::NomEtab => "NOM_ETAB",
            TemplateElement::NomClasse => "NOM_CLASSE",
            TemplateElement::Affiliation => "AFFILIATION",
        }
    }

    pub fn placeholder(self) -> String {
        format!("{DELIMITER}{}{DELIMITER}", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|element| element.name() == name)
    }

    /// Number of slots an evaluation tuple needs to cover every element
    pub fn tuple_len() -> usize {
        Self::ALL.len()
    }
}

impl fmt::Display for TemplateElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DELIMITER}{}{DELIMITER}", self.name())
    }
}

impl FromStr for TemplateElement {
    type Err = String;

    /// Accepts both `CLASSE` and `%CLASSE%`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches(DELIMITER);
        Self::from_name(trimmed).ok_or_else(|| format!("Unknown template element: {}", s))
    }
}

/// Comma separated list of every known placeholder, for error messages
pub fn known_placeholders() -> String {
    TemplateElement::ALL
        .iter()
        .map(|element| element.placeholder())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether `c` may appear in an element name
pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
