use crate::definition::{Definition, DefinitionTemplate};
use crate::error::{DefinitionError, Result};
use crate::person_type::PersonType;
use std::collections::HashMap;
use std::sync::Arc;
use templates::{path, Template, TemplateError};
use tracing::{debug, info};

/// Source of definitions consumed by the provisioning engine
pub trait DefinitionsManager: Send + Sync {
    /// Resolve `key` into a definition evaluated against `values`.
    ///
    /// `key` is either the path template a definition is configured under
    /// or a concrete path one of them produces.
    fn get_definition(&self, key: &str, values: &[String]) -> Result<Definition>;

    /// Whether the concrete `path` belongs to an externally managed resource
    fn is_preexisting(&self, path: &str) -> bool;

    fn preexisting_definitions(&self) -> Vec<Arc<DefinitionTemplate>>;

    /// Groups whose member rules select `person_type` for these values
    fn membership_definitions_for(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Result<Vec<Definition>>;

    /// Definitions to create even when no subject needs them
    fn definitions_to_create(&self) -> Vec<Arc<DefinitionTemplate>>;
}

/// In-memory definitions built from validated templates
#[derive(Debug, Default)]
pub struct TemplateDefinitions {
    templates: Vec<Arc<DefinitionTemplate>>,
    by_key: HashMap<String, usize>,
}

impl TemplateDefinitions {
    pub fn new(templates: Vec<DefinitionTemplate>) -> Result<Self> {
        let mut definitions = Self::default();
        for template in templates {
            definitions.insert(template)?;
        }
        info!("Loaded {} definitions", definitions.len());
        Ok(definitions)
    }

    fn insert(&mut self, template: DefinitionTemplate) -> Result<()> {
        template.validate()?;
        let key = template.path().to_string();
        if self.by_key.contains_key(&key) {
            return Err(DefinitionError::Validation(format!(
                "Duplicate definition for path: {}",
                key
            )));
        }
        self.by_key.insert(key, self.templates.len());
        self.templates.push(Arc::new(template));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DefinitionTemplate>> {
        self.templates.iter()
    }

    fn is_configured_ancestor(&self, key: &str) -> bool {
        self.templates
            .iter()
            .any(|template| path::is_ancestor(key, template.path().as_str()))
    }
}

impl DefinitionsManager for TemplateDefinitions {
    fn get_definition(&self, key: &str, values: &[String]) -> Result<Definition> {
        if key.is_empty() {
            return Arc::new(DefinitionTemplate::root()).evaluate(values);
        }

        if let Some(index) = self.by_key.get(key) {
            return self.templates[*index].evaluate(values);
        }

        if self.is_configured_ancestor(key) {
            debug!("Using an implicit folder definition for {}", key);
            let template = Template::parse(key)?;
            return Arc::new(DefinitionTemplate::implicit_folder(template)).evaluate(values);
        }

        if let Some(template) = self.templates.iter().find(|t| t.path().matches(key)) {
            let definition = template.evaluate(values)?;
            if definition.path() == key {
                return Ok(definition);
            }
            return Err(DefinitionError::NotFound(format!(
                "{} (matches {} but the values give {})",
                key,
                template.path(),
                definition.path()
            )));
        }

        Err(DefinitionError::NotFound(key.to_string()))
    }

    fn is_preexisting(&self, path: &str) -> bool {
        path.is_empty()
            || self
                .templates
                .iter()
                .any(|template| template.is_preexisting() && template.path().matches(path))
    }

    fn preexisting_definitions(&self) -> Vec<Arc<DefinitionTemplate>> {
        self.templates
            .iter()
            .filter(|template| template.is_preexisting())
            .cloned()
            .collect()
    }

    fn membership_definitions_for(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Result<Vec<Definition>> {
        let mut definitions = Vec::new();
        for template in &self.templates {
            let selected = template
                .members()
                .iter()
                .any(|rule| rule.applies_to(person_type, values));
            if !selected {
                continue;
            }
            match template.evaluate(values) {
                Ok(definition) => definitions.push(definition),
                Err(DefinitionError::Template(TemplateError::MissingValue { element, .. })) => {
                    debug!(
                        "Skipping {} for a {} subject without {}",
                        template.path(),
                        person_type,
                        element
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(definitions)
    }

    fn definitions_to_create(&self) -> Vec<Arc<DefinitionTemplate>> {
        self.templates
            .iter()
            .filter(|template| template.is_create_if_empty())
            .cloned()
            .collect()
    }
}
