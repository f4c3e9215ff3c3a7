use crate::error::{DefinitionError, Result};
use crate::person_type::PersonType;
use crate::right::{ResourceKind, Right};
use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use templates::{path, Template, TemplateElement};

/// A right the privileged group must hold on the defined resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeRequirement {
    pub right: Right,
    /// Key of the definition of the group receiving the right
    pub granted_to: Template,
}

/// Full-match regular expression applied to a group's own extension
#[derive(Debug, Clone)]
pub struct MatchCondition {
    pattern: String,
    regex: Regex,
}

impl MatchCondition {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            DefinitionError::InvalidCondition {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for MatchCondition {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for MatchCondition {}

/// A group the defined group must become a member of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainingGroup {
    pub path: Template,
    pub condition: Option<MatchCondition>,
}

impl ContainingGroup {
    /// No condition means the membership always applies
    pub fn accepts(&self, extension: &str) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.is_match(extension))
    }
}

/// Which subjects are placed in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRule {
    pub person_type: PersonType,
    /// When set, only subjects with a value for this element match
    pub distribution_by: Option<TemplateElement>,
}

impl MemberRule {
    pub fn applies_to<S: AsRef<str>>(&self, person_type: PersonType, values: &[S]) -> bool {
        if self.person_type != person_type {
            return false;
        }
        match self.distribution_by {
            Some(element) => values
                .get(element.position())
                .is_some_and(|value| !value.as_ref().is_empty()),
            None => true,
        }
    }
}

/// Configured, not yet evaluated, description of a resource
#[derive(Debug, Clone)]
pub struct DefinitionTemplate {
    path: Template,
    kind: ResourceKind,
    extension: Option<Template>,
    display_extension: Option<Template>,
    description: Option<Template>,
    preexisting: bool,
    create_if_empty: bool,
    privileges: Vec<PrivilegeRequirement>,
    containing_groups: Vec<ContainingGroup>,
    members: Vec<MemberRule>,
}

impl DefinitionTemplate {
    pub fn new(path: &str, kind: ResourceKind) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(DefinitionError::Validation(
                "Definition path cannot be empty".to_string(),
            ));
        }
        Ok(Self::with_path(Template::parse(path)?, kind))
    }

    pub fn group(path: &str) -> Result<Self> {
        Self::new(path, ResourceKind::Group)
    }

    pub fn folder(path: &str) -> Result<Self> {
        Self::new(path, ResourceKind::Folder)
    }

    /// The tree root, which always exists and is never managed
    pub fn root() -> Self {
        Self::with_path(Template::root(), ResourceKind::Folder).preexisting()
    }

    /// Folder standing for an ancestor path nobody configured explicitly
    pub(crate) fn implicit_folder(path: Template) -> Self {
        Self::with_path(path, ResourceKind::Folder)
    }

    fn with_path(path: Template, kind: ResourceKind) -> Self {
        Self {
            path,
            kind,
            extension: None,
            display_extension: None,
            description: None,
            preexisting: false,
            create_if_empty: false,
            privileges: Vec::new(),
            containing_groups: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn preexisting(mut self) -> Self {
        self.preexisting = true;
        self
    }

    pub fn create_if_empty(mut self) -> Self {
        self.create_if_empty = true;
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Result<Self> {
        self.extension = Some(Template::parse(extension)?);
        Ok(self)
    }

    pub fn with_display_extension(mut self, display_extension: &str) -> Result<Self> {
        self.display_extension = Some(Template::parse(display_extension)?);
        Ok(self)
    }

    pub fn with_description(mut self, description: &str) -> Result<Self> {
        self.description = Some(Template::parse(description)?);
        Ok(self)
    }

    /// Require `right` for the group defined at `granted_to`.
    ///
    /// Rejects rights that do not apply to this definition's kind.
    pub fn with_privilege(mut self, right: Right, granted_to: &str) -> Result<Self> {
        if !right.applies_to(self.kind) {
            return Err(DefinitionError::RightScope {
                right,
                kind: self.kind,
                path: self.path.to_string(),
            });
        }
        self.privileges.push(PrivilegeRequirement {
            right,
            granted_to: Template::parse(granted_to)?,
        });
        Ok(self)
    }

    pub fn with_containing_group(mut self, path: &str, condition: Option<&str>) -> Result<Self> {
        if !self.kind.is_group() {
            return Err(DefinitionError::Validation(format!(
                "Only groups can have containing groups: {}",
                self.path
            )));
        }
        self.containing_groups.push(ContainingGroup {
            path: Template::parse(path)?,
            condition: condition.map(MatchCondition::new).transpose()?,
        });
        Ok(self)
    }

    pub fn with_members(
        mut self,
        person_type: PersonType,
        distribution_by: Option<TemplateElement>,
    ) -> Result<Self> {
        if !self.kind.is_group() {
            return Err(DefinitionError::Validation(format!(
                "Only groups can have members: {}",
                self.path
            )));
        }
        self.members.push(MemberRule {
            person_type,
            distribution_by,
        });
        Ok(self)
    }

    /// Checks that span several attributes
    pub fn validate(&self) -> Result<()> {
        if self.preexisting && self.create_if_empty {
            return Err(DefinitionError::Validation(format!(
                "A definition cannot be both preexisting and created: {}",
                self.path
            )));
        }
        if let Some(privilege) = self.privileges.iter().find(|p| !p.right.applies_to(self.kind)) {
            return Err(DefinitionError::RightScope {
                right: privilege.right,
                kind: self.kind,
                path: self.path.to_string(),
            });
        }
        Ok(())
    }

    pub fn path(&self) -> &Template {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_preexisting(&self) -> bool {
        self.preexisting
    }

    pub fn is_create_if_empty(&self) -> bool {
        self.create_if_empty
    }

    pub fn privileges(&self) -> &[PrivilegeRequirement] {
        &self.privileges
    }

    pub fn containing_groups(&self) -> &[ContainingGroup] {
        &self.containing_groups
    }

    pub fn members(&self) -> &[MemberRule] {
        &self.members
    }

    /// Evaluate every template of the definition against `values`
    pub fn evaluate<S: AsRef<str>>(self: &Arc<Self>, values: &[S]) -> Result<Definition> {
        let path = self.path.evaluate_path(values)?;
        let extension = match &self.extension {
            Some(template) => template.evaluate_path(values)?,
            None => path::last_segment(&path).to_string(),
        };
        // The store names a child parent:extension; anything else could never be found again
        if extension != path::last_segment(&path) {
            return Err(DefinitionError::Validation(format!(
                "Extension {} of {} does not match its last path segment",
                extension, path
            )));
        }
        let display_extension = match &self.display_extension {
            Some(template) => template.evaluate(values)?,
            None => extension.clone(),
        };
        let description = match &self.description {
            Some(template) => template.evaluate(values)?,
            None => display_extension.clone(),
        };

        Ok(Definition {
            template: Arc::clone(self),
            path,
            extension,
            display_extension,
            description,
        })
    }
}

/// A definition evaluated for one set of attribute values.
///
/// Two definitions are equal when they denote the same path.
#[derive(Debug, Clone)]
pub struct Definition {
    template: Arc<DefinitionTemplate>,
    path: String,
    extension: String,
    display_extension: String,
    description: String,
}

impl Definition {
    /// Key under which the definition is configured
    pub fn template(&self) -> &Template {
        &self.template.path
    }

    pub fn source(&self) -> &Arc<DefinitionTemplate> {
        &self.template
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.template.kind
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn display_extension(&self) -> &str {
        &self.display_extension
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_preexisting(&self) -> bool {
        self.template.preexisting
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn privileges(&self) -> &[PrivilegeRequirement] {
        &self.template.privileges
    }

    pub fn containing_groups(&self) -> &[ContainingGroup] {
        &self.template.containing_groups
    }

    /// Template key of the containing folder's definition
    pub fn containing_template(&self) -> Option<Template> {
        self.template.path.parent()
    }
}

impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Definition {}

impl Hash for Definition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path)
    }
}
