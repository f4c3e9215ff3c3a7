use backend::Privilege;
use definitions::{ResourceKind, Right};

/// Store privileges that make up `right` on a resource of `kind`.
///
/// Rights that do not apply to the kind map to nothing; definitions
/// reject them when they are loaded.
pub fn backend_privileges(right: Right, kind: ResourceKind) -> &'static [Privilege] {
    match (right, kind) {
        (Right::Admin, ResourceKind::Group) => &[Privilege::Admin],
        (Right::Admin, ResourceKind::Folder) => &[Privilege::Create, Privilege::Stem],
        (Right::Update, ResourceKind::Group) => &[Privilege::Update],
        (Right::Read, ResourceKind::Group) => &[Privilege::Read],
        (Right::View, ResourceKind::Group) => &[Privilege::View],
        (Right::Create, ResourceKind::Folder) => &[Privilege::Create],
        (Right::FolderAdmin, ResourceKind::Folder) => &[Privilege::StemAdmin],
        (Right::FolderAttrRead, ResourceKind::Folder) => &[Privilege::StemAttrRead],
        (Right::FolderAttrUpdate, ResourceKind::Folder) => &[Privilege::StemAttrUpdate],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Right::Admin, ResourceKind::Group, &[Privilege::Admin])]
    #[case(Right::Admin, ResourceKind::Folder, &[Privilege::Create, Privilege::Stem])]
    #[case(Right::Read, ResourceKind::Group, &[Privilege::Read])]
    #[case(Right::FolderAttrRead, ResourceKind::Folder, &[Privilege::StemAttrRead])]
    #[case(Right::FolderAttrUpdate, ResourceKind::Folder, &[Privilege::StemAttrUpdate])]
    #[case(Right::Update, ResourceKind::Folder, &[])]
    fn test_mapping(
        #[case] right: Right,
        #[case] kind: ResourceKind,
        #[case] expected: &[Privilege],
    ) {
        assert_eq!(backend_privileges(right, kind), expected);
    }

    #[test]
    fn test_mapped_privileges_fit_the_kind() {
        for right in Right::ALL {
            for kind in [ResourceKind::Group, ResourceKind::Folder] {
                for privilege in backend_privileges(right, kind) {
                    assert_eq!(privilege.is_folder_privilege(), kind.is_folder());
                }
            }
        }
    }
}
