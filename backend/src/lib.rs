//! Capability provider for the group and folder store.
//!
//! The provisioning engine never talks to a store directly; it goes through
//! the [`Backend`] trait. Two stores are provided: [`MemoryBackend`], which
//! also counts every call it receives, and [`SqliteBackend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{BackendError, Result};
pub use memory::{CallStats, MemoryBackend};
pub use sqlite::SqliteBackend;

/// Separator between the segments of a resource name
pub const SEPARATOR: char = ':';

/// Full name of the child `extension` of the folder named `parent`
pub fn child_name(parent: &str, extension: &str) -> String {
    if parent.is_empty() {
        extension.to_string()
    } else {
        format!("{parent}{SEPARATOR}{extension}")
    }
}

/// Name of the containing folder, `None` for the root
pub fn parent_name(name: &str) -> Option<&str> {
    if name.is_empty() {
        return None;
    }
    Some(name.rsplit_once(SEPARATOR).map_or("", |(head, _)| head))
}

/// A container of groups and folders. The root folder is named `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    pub extension: String,
    pub display_extension: String,
    pub description: String,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn root() -> Self {
        Self {
            name: String::new(),
            extension: String::new(),
            display_extension: String::new(),
            description: "Root".to_string(),
        }
    }
}

/// A leaf resource holding members
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub extension: String,
    pub display_extension: String,
    pub description: String,
}

impl Group {
    /// The group seen as a member of other groups or a privilege holder
    pub fn to_subject(&self) -> Subject {
        Subject::group(&self.name)
    }

    pub fn parent_name(&self) -> Option<&str> {
        parent_name(&self.name)
    }
}

/// Handle to a resource of either kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Group(Group),
    Folder(Folder),
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::Group(group) => &group.name,
            Resource::Folder(folder) => &folder.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Resource::Group(_) => "group",
            Resource::Folder(_) => "folder",
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Resource::Group(group) => Some(group),
            Resource::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Resource::Folder(folder) => Some(folder),
            Resource::Group(_) => None,
        }
    }
}

impl From<Group> for Resource {
    fn from(group: Group) -> Self {
        Resource::Group(group)
    }
}

impl From<Folder> for Resource {
    fn from(folder: Folder) -> Self {
        Resource::Folder(folder)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind_name(), self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Person,
    Group,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Person => "person",
            SubjectKind::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "person" => Some(SubjectKind::Person),
            "group" => Some(SubjectKind::Group),
            _ => None,
        }
    }
}

/// Anything that can be a member or hold a privilege
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: String,
}

impl Subject {
    pub fn person(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Person,
            id: id.into(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            id: name.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Privileges as the store names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privilege {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "view")]
    View,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "stem")]
    Stem,
    #[serde(rename = "stemAdmin")]
    StemAdmin,
    #[serde(rename = "stemAttrRead")]
    StemAttrRead,
    #[serde(rename = "stemAttrUpdate")]
    StemAttrUpdate,
}

impl Privilege {
    pub const ALL: [Privilege; 9] = [
        Privilege::Admin,
        Privilege::Update,
        Privilege::Read,
        Privilege::View,
        Privilege::Create,
        Privilege::Stem,
        Privilege::StemAdmin,
        Privilege::StemAttrRead,
        Privilege::StemAttrUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Privilege::Admin => "admin",
            Privilege::Update => "update",
            Privilege::Read => "read",
            Privilege::View => "view",
            Privilege::Create => "create",
            Privilege::Stem => "stem",
            Privilege::StemAdmin => "stemAdmin",
            Privilege::StemAttrRead => "stemAttrRead",
            Privilege::StemAttrUpdate => "stemAttrUpdate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|privilege| privilege.name() == name)
    }

    /// Folder privileges can only be held on folders, the others on groups
    pub fn is_folder_privilege(&self) -> bool {
        matches!(
            self,
            Privilege::Create
                | Privilege::Stem
                | Privilege::StemAdmin
                | Privilege::StemAttrRead
                | Privilege::StemAttrUpdate
        )
    }

    /// Reject a privilege that does not exist on this kind of resource
    pub fn check_applies(&self, resource: &Resource) -> Result<()> {
        let on_folder = matches!(resource, Resource::Folder(_));
        if self.is_folder_privilege() == on_folder {
            Ok(())
        } else {
            Err(BackendError::Schema(format!(
                "Privilege {} does not apply to the {}",
                self.name(),
                resource
            )))
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immediate children of a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCount {
    pub groups: usize,
    pub folders: usize,
}

impl ChildCount {
    pub fn is_empty(&self) -> bool {
        self.groups == 0 && self.folders == 0
    }
}

/// An immediate membership of a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The group the subject belongs to
    pub group: Group,
    /// Who added the subject, when known
    pub creator: Option<Subject>,
}

/// Operations the provisioning engine needs from a group store.
///
/// Every call acts as [`Backend::session_subject`], which the store records
/// as the creator of the resources and memberships it adds.
#[async_trait]
pub trait Backend: Send + Sync {
    fn session_subject(&self) -> &Subject;

    async fn find_folder(&self, path: &str) -> Result<Option<Folder>>;

    async fn find_group(&self, path: &str) -> Result<Option<Group>>;

    /// Fails with [`BackendError::AlreadyExists`] when the name is taken
    async fn create_child_folder(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Folder>;

    /// Fails with [`BackendError::AlreadyExists`] when the name is taken
    async fn create_child_group(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Group>;

    async fn has_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<bool>;

    async fn grant_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<()>;

    /// Immediate membership only
    async fn has_member(&self, group: &Group, subject: &Subject) -> Result<bool>;

    async fn add_member(&self, group: &Group, subject: &Subject) -> Result<()>;

    async fn remove_member(&self, group: &Group, subject: &Subject) -> Result<()>;

    async fn child_count(&self, folder: &Folder) -> Result<ChildCount>;

    /// Number of immediate members
    async fn member_count(&self, group: &Group) -> Result<usize>;

    async fn list_immediate_memberships(&self, subject: &Subject) -> Result<Vec<Membership>>;

    async fn creator_of(&self, resource: &Resource) -> Result<Option<Subject>>;

    /// Delete a group, or an empty folder
    async fn delete(&self, resource: &Resource) -> Result<()>;
}
