use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a definition provisions: a leaf group or a folder that contains others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Group,
    Folder,
}

impl ResourceKind {
    pub fn is_group(&self) -> bool {
        matches!(self, ResourceKind::Group)
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ResourceKind::Folder)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Group => write!(f, "group"),
            ResourceKind::Folder => write!(f, "folder"),
        }
    }
}

/// Rights a definition may require for a privileged group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Right {
    Admin,
    Update,
    Create,
    View,
    Read,
    FolderAdmin,
    FolderAttrRead,
    FolderAttrUpdate,
}

impl Right {
    pub const ALL: [Right; 8] = [
        Right::Admin,
        Right::Update,
        Right::Create,
        Right::View,
        Right::Read,
        Right::FolderAdmin,
        Right::FolderAttrRead,
        Right::FolderAttrUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Right::Admin => "ADMIN",
            Right::Update => "UPDATE",
            Right::Create => "CREATE",
            Right::View => "VIEW",
            Right::Read => "READ",
            Right::FolderAdmin => "FOLDER_ADMIN",
            Right::FolderAttrRead => "FOLDER_ATTR_READ",
            Right::FolderAttrUpdate => "FOLDER_ATTR_UPDATE",
        }
    }

    /// Whether the right may be required on a resource of `kind`.
    ///
    /// `ADMIN` is the only right valid on both kinds.
    pub fn applies_to(&self, kind: ResourceKind) -> bool {
        match self {
            Right::Admin => true,
            Right::Update | Right::View | Right::Read => kind.is_group(),
            Right::Create | Right::FolderAdmin | Right::FolderAttrRead | Right::FolderAttrUpdate => {
                kind.is_folder()
            }
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Right {
    type Err = DefinitionError;

    /// Case insensitive, `-` and `_` are interchangeable
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Right::ALL
            .into_iter()
            .find(|right| right.name() == normalized)
            .ok_or_else(|| DefinitionError::UnknownRight(s.to_string()))
    }
}
