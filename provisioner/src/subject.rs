use crate::error::{ProvisioningError, Result};
use definitions::{PersonType, TemplateElement};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Values of one element that vary for the same subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedValues {
    pub element: TemplateElement,
    pub values: Vec<String>,
}

/// A person to provision, with the attribute values templates use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescription {
    pub id: String,
    pub person_type: PersonType,
    /// Values by element position
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_values: Option<GroupedValues>,
}

impl SubjectDescription {
    pub fn new(id: impl Into<String>, person_type: PersonType, values: Vec<String>) -> Self {
        Self {
            id: id.into(),
            person_type,
            values,
            grouped_values: None,
        }
    }

    /// Vary `element` over `values`, one tuple per value
    pub fn grouped_by(mut self, element: TemplateElement, values: Vec<String>) -> Self {
        self.grouped_values = Some(GroupedValues { element, values });
        self
    }

    /// The value tuples to provision the subject with.
    ///
    /// Without grouped values, or with an empty group, this is the single
    /// tuple of `values`.
    pub fn values_sets(&self) -> Vec<Vec<String>> {
        let grouped = match &self.grouped_values {
            Some(grouped) if !grouped.values.is_empty() => grouped,
            _ => return vec![self.values.clone()],
        };
        let position = grouped.element.position();
        grouped
            .values
            .iter()
            .map(|value| {
                let mut tuple = self.values.clone();
                if tuple.len() <= position {
                    tuple.resize(position + 1, String::new());
                }
                tuple[position] = value.clone();
                tuple
            })
            .collect()
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ProvisioningError::Settings(format!("Invalid subject description: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisioningError::Settings(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_tuple() {
        let subject = SubjectDescription::new("jdoe", PersonType::Student, values(&["ETB01", "6A"]));
        assert_eq!(subject.values_sets(), vec![values(&["ETB01", "6A"])]);
    }

    #[test]
    fn test_grouped_values_replace_their_position() {
        let subject = SubjectDescription::new("msmith", PersonType::Teacher, values(&["ETB01"]))
            .grouped_by(TemplateElement::Classe, values(&["6A", "5B"]));
        assert_eq!(
            subject.values_sets(),
            vec![values(&["ETB01", "6A"]), values(&["ETB01", "5B"])]
        );
    }

    #[test]
    fn test_empty_group_keeps_base_values() {
        let subject = SubjectDescription::new("msmith", PersonType::Teacher, values(&["ETB01"]))
            .grouped_by(TemplateElement::Classe, Vec::new());
        assert_eq!(subject.values_sets(), vec![values(&["ETB01"])]);
    }

    #[test]
    fn test_from_yaml() {
        let subject = SubjectDescription::from_yaml(
            r#"
id: msmith
person_type: TEACHER
values: [ETB01, "", Lycee Nord]
grouped_values:
  element: CLASSE
  values: [6A, 5B]
"#,
        )
        .unwrap();
        assert_eq!(subject.person_type, PersonType::Teacher);
        assert_eq!(subject.values_sets()[1], values(&["ETB01", "5B", "Lycee Nord"]));

        assert!(SubjectDescription::from_yaml("id: x\nperson_type: ROBOT").is_err());
    }
}
