use crate::definition::DefinitionTemplate;
use crate::error::{DefinitionError, Result};
use crate::manager::TemplateDefinitions;
use crate::person_type::PersonType;
use crate::right::{ResourceKind, Right};
use serde::{Deserialize, Serialize};
use std::path::Path;
use templates::TemplateElement;
use tracing::{debug, error, info};

/// Top level of a definitions YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionsDocument {
    #[serde(default)]
    pub definitions: Vec<DefinitionSpec>,
}

/// One definition as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionSpec {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub preexisting: bool,
    /// Create the resource even when no subject is placed in it
    #[serde(default)]
    pub create: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<PrivilegeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containing_groups: Vec<ContainingGroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeSpec {
    pub right: String,
    /// Path of the group receiving the right
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainingGroupSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    #[serde(rename = "type")]
    pub person_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_by: Option<String>,
}

impl DefinitionSpec {
    /// Validate the raw entry and build the template it describes
    pub fn into_template(self) -> Result<DefinitionTemplate> {
        let mut template = DefinitionTemplate::new(&self.path, self.kind)?;

        if let Some(extension) = &self.extension {
            template = template.with_extension(extension)?;
        }
        if let Some(display_extension) = &self.display_extension {
            template = template.with_display_extension(display_extension)?;
        }
        if let Some(description) = &self.description {
            template = template.with_description(description)?;
        }
        if self.preexisting {
            template = template.preexisting();
        }
        if self.create {
            template = template.create_if_empty();
        }

        for privilege in &self.privileges {
            let right: Right = privilege.right.parse()?;
            template = template.with_privilege(right, &privilege.path)?;
        }

        for containing in &self.containing_groups {
            template = template.with_containing_group(&containing.path, containing.condition.as_deref())?;
        }

        for member in &self.members {
            let person_type: PersonType = member.person_type.parse()?;
            let distribution_by = member
                .distribution_by
                .as_deref()
                .map(|name| {
                    name.parse::<TemplateElement>()
                        .map_err(DefinitionError::Validation)
                })
                .transpose()?;
            template = template.with_members(person_type, distribution_by)?;
        }

        template.validate()?;
        Ok(template)
    }
}

/// Loads definitions from YAML
pub struct DefinitionLoader;

impl DefinitionLoader {
    pub fn from_yaml(content: &str) -> Result<TemplateDefinitions> {
        let document: DefinitionsDocument = serde_yaml::from_str(content)?;
        Self::from_document(document)
    }

    pub fn from_document(document: DefinitionsDocument) -> Result<TemplateDefinitions> {
        let templates = document
            .definitions
            .into_iter()
            .map(|spec| {
                let path = spec.path.clone();
                spec.into_template().map_err(|e| {
                    error!("Invalid definition {}: {}", path, e);
                    e
                })
            })
            .collect::<Result<Vec<_>>>()?;
        TemplateDefinitions::new(templates)
    }

    pub fn from_file(path: &Path) -> Result<TemplateDefinitions> {
        debug!("Loading definitions from: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let definitions = Self::from_yaml(&content)?;
        info!("Loaded {} definitions from {:?}", definitions.len(), path);
        Ok(definitions)
    }

    /// Merge every `.yaml`/`.yml` file of `dir` into one set.
    ///
    /// Unreadable files are logged and skipped; an invalid definition in a
    /// readable file still fails the whole load.
    pub fn load_directory(dir: &Path) -> Result<TemplateDefinitions> {
        info!("Loading definitions from directory: {:?}", dir);

        if !dir.is_dir() {
            return Err(DefinitionError::Validation(format!(
                "Definitions directory does not exist: {:?}",
                dir
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        paths.sort();

        let mut merged = DefinitionsDocument::default();
        for path in paths {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to read definitions from {:?}: {}", path, e);
                    continue;
                }
            };
            let document: DefinitionsDocument = serde_yaml::from_str(&content)?;
            debug!("{} definitions in {:?}", document.definitions.len(), path);
            merged.definitions.extend(document.definitions);
        }

        Self::from_document(merged)
    }

    /// Load from a file or a directory of files
    pub fn load(path: &Path) -> Result<TemplateDefinitions> {
        if path.is_dir() {
            Self::load_directory(path)
        } else {
            Self::from_file(path)
        }
    }
}
