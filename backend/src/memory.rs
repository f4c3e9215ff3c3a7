use crate::{
    child_name, parent_name, Backend, BackendError, ChildCount, Folder, Group, Membership,
    Privilege, Resource, Result, Subject,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Number of calls received per operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    pub find_folder: usize,
    pub find_group: usize,
    pub create_folder: usize,
    pub create_group: usize,
    pub has_privilege: usize,
    pub grant_privilege: usize,
    pub has_member: usize,
    pub add_member: usize,
    pub remove_member: usize,
    pub child_count: usize,
    pub member_count: usize,
    pub list_memberships: usize,
    pub creator_of: usize,
    pub delete: usize,
    /// `add_member` and `remove_member` calls per group name
    pub membership_changes: BTreeMap<String, usize>,
}

impl CallStats {
    pub fn creations(&self) -> usize {
        self.create_folder + self.create_group
    }

    pub fn privilege_calls(&self) -> usize {
        self.has_privilege + self.grant_privilege
    }

    pub fn membership_changes_for(&self, group: &str) -> usize {
        self.membership_changes.get(group).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    resource: T,
    creator: Option<Subject>,
}

#[derive(Debug, Default)]
struct State {
    folders: BTreeMap<String, Entry<Folder>>,
    groups: BTreeMap<String, Entry<Group>>,
    /// group name -> member -> creator of the membership
    members: BTreeMap<String, BTreeMap<Subject, Option<Subject>>>,
    privileges: BTreeSet<(String, Subject, Privilege)>,
    /// Names whose next creation is lost to another actor
    conflicts: HashSet<String>,
    calls: CallStats,
}

impl State {
    fn name_taken(&self, name: &str) -> bool {
        self.folders.contains_key(name) || self.groups.contains_key(name)
    }

    fn ensure_folder_chain(&mut self, name: &str) {
        let mut missing = Vec::new();
        let mut current = Some(name);
        while let Some(path) = current {
            if self.folders.contains_key(path) {
                break;
            }
            missing.push(path.to_string());
            current = parent_name(path);
        }
        for path in missing.into_iter().rev() {
            let folder = new_folder(&path, last(&path), None);
            self.folders.insert(
                path,
                Entry {
                    resource: folder,
                    creator: None,
                },
            );
        }
    }
}

fn last(name: &str) -> &str {
    name.rsplit_once(crate::SEPARATOR).map_or(name, |(_, tail)| tail)
}

fn new_folder(name: &str, extension: &str, display_extension: Option<&str>) -> Folder {
    let display_extension = display_extension.unwrap_or(extension).to_string();
    Folder {
        name: name.to_string(),
        extension: extension.to_string(),
        description: display_extension.clone(),
        display_extension,
    }
}

fn new_group(name: &str, extension: &str, display_extension: &str, description: &str) -> Group {
    Group {
        name: name.to_string(),
        extension: extension.to_string(),
        display_extension: display_extension.to_string(),
        description: description.to_string(),
    }
}

/// In-process store that records every call it receives.
///
/// Used for dry runs and as the fake store of the test suites. Resources
/// seeded with the `seed_*` helpers have no creator, like resources made by
/// somebody else.
#[derive(Debug)]
pub struct MemoryBackend {
    session: Subject,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new(session: Subject) -> Self {
        let mut state = State::default();
        state.folders.insert(
            String::new(),
            Entry {
                resource: Folder::root(),
                creator: None,
            },
        );
        Self {
            session,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an externally owned folder and any missing ancestors
    pub fn seed_folder(&self, name: &str) -> Folder {
        let mut state = self.state();
        state.ensure_folder_chain(name);
        state.folders[name].resource.clone()
    }

    /// Add an externally owned group and any missing ancestor folders
    pub fn seed_group(&self, name: &str) -> Group {
        let mut state = self.state();
        if let Some(parent) = parent_name(name) {
            state.ensure_folder_chain(parent);
        }
        let extension = last(name);
        let group = new_group(name, extension, extension, extension);
        state.groups.entry(name.to_string()).or_insert(Entry {
            resource: group.clone(),
            creator: None,
        });
        group
    }

    /// Add a membership as if `creator` had made it
    pub fn seed_member(&self, group: &str, subject: Subject, creator: Option<Subject>) {
        self.state()
            .members
            .entry(group.to_string())
            .or_default()
            .insert(subject, creator);
    }

    /// The next creation of `name` fails as if another actor created it first
    pub fn lose_next_creation_of(&self, name: &str) {
        self.state().conflicts.insert(name.to_string());
    }

    pub fn calls(&self) -> CallStats {
        self.state().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state().calls = CallStats::default();
    }

    pub fn folder_exists(&self, name: &str) -> bool {
        self.state().folders.contains_key(name)
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.state().groups.contains_key(name)
    }

    pub fn members_of(&self, group: &str) -> Vec<Subject> {
        self.state()
            .members
            .get(group)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn holds(&self, resource: &str, subject: &Subject, privilege: Privilege) -> bool {
        self.state()
            .privileges
            .contains(&(resource.to_string(), subject.clone(), privilege))
    }

    /// Every resource name, folders then groups
    pub fn resource_names(&self) -> Vec<String> {
        let state = self.state();
        state
            .folders
            .keys()
            .chain(state.groups.keys())
            .cloned()
            .collect()
    }

    fn check_creation(
        &self,
        state: &mut State,
        parent: &Folder,
        name: &str,
        folder: bool,
    ) -> Result<()> {
        if !state.folders.contains_key(&parent.name) {
            return Err(BackendError::NotFound(format!("folder {}", parent.name)));
        }
        if state.conflicts.remove(name) {
            debug!("Simulating a concurrent creation of {}", name);
            let extension = last(name);
            let creator = Some(Subject::person("concurrent-actor"));
            if folder {
                let resource = new_folder(name, extension, None);
                state.folders.insert(name.to_string(), Entry { resource, creator });
            } else {
                let resource = new_group(name, extension, extension, extension);
                state.groups.insert(name.to_string(), Entry { resource, creator });
            }
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        if state.name_taken(name) {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn session_subject(&self) -> &Subject {
        &self.session
    }

    async fn find_folder(&self, path: &str) -> Result<Option<Folder>> {
        let mut state = self.state();
        state.calls.find_folder += 1;
        Ok(state.folders.get(path).map(|entry| entry.resource.clone()))
    }

    async fn find_group(&self, path: &str) -> Result<Option<Group>> {
        let mut state = self.state();
        state.calls.find_group += 1;
        Ok(state.groups.get(path).map(|entry| entry.resource.clone()))
    }

    async fn create_child_folder(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Folder> {
        let mut state = self.state();
        state.calls.create_folder += 1;
        let name = child_name(&parent.name, extension);
        self.check_creation(&mut state, parent, &name, true)?;

        let folder = Folder {
            name: name.clone(),
            extension: extension.to_string(),
            display_extension: display_extension.to_string(),
            description: description.to_string(),
        };
        state.folders.insert(
            name,
            Entry {
                resource: folder.clone(),
                creator: Some(self.session.clone()),
            },
        );
        Ok(folder)
    }

    async fn create_child_group(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Group> {
        let mut state = self.state();
        state.calls.create_group += 1;
        let name = child_name(&parent.name, extension);
        self.check_creation(&mut state, parent, &name, false)?;

        let group = new_group(&name, extension, display_extension, description);
        state.groups.insert(
            name,
            Entry {
                resource: group.clone(),
                creator: Some(self.session.clone()),
            },
        );
        Ok(group)
    }

    async fn has_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<bool> {
        let mut state = self.state();
        state.calls.has_privilege += 1;
        Ok(state
            .privileges
            .contains(&(resource.name().to_string(), subject.clone(), privilege)))
    }

    async fn grant_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.grant_privilege += 1;
        privilege.check_applies(resource)?;
        if !state.name_taken(resource.name()) {
            return Err(BackendError::NotFound(resource.to_string()));
        }
        state
            .privileges
            .insert((resource.name().to_string(), subject.clone(), privilege));
        Ok(())
    }

    async fn has_member(&self, group: &Group, subject: &Subject) -> Result<bool> {
        let mut state = self.state();
        state.calls.has_member += 1;
        Ok(state
            .members
            .get(&group.name)
            .is_some_and(|members| members.contains_key(subject)))
    }

    async fn add_member(&self, group: &Group, subject: &Subject) -> Result<()> {
        let mut state = self.state();
        state.calls.add_member += 1;
        *state
            .calls
            .membership_changes
            .entry(group.name.clone())
            .or_default() += 1;
        if !state.groups.contains_key(&group.name) {
            return Err(BackendError::NotFound(format!("group {}", group.name)));
        }
        let creator = Some(self.session.clone());
        state
            .members
            .entry(group.name.clone())
            .or_default()
            .insert(subject.clone(), creator);
        Ok(())
    }

    async fn remove_member(&self, group: &Group, subject: &Subject) -> Result<()> {
        let mut state = self.state();
        state.calls.remove_member += 1;
        *state
            .calls
            .membership_changes
            .entry(group.name.clone())
            .or_default() += 1;
        let removed = state
            .members
            .get_mut(&group.name)
            .and_then(|members| members.remove(subject));
        match removed {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(format!(
                "{} is not a member of {}",
                subject, group.name
            ))),
        }
    }

    async fn child_count(&self, folder: &Folder) -> Result<ChildCount> {
        let mut state = self.state();
        state.calls.child_count += 1;
        let is_child = |name: &String| parent_name(name) == Some(folder.name.as_str());
        let folders = state.folders.keys().filter(|name| is_child(*name)).count();
        let groups = state.groups.keys().filter(|name| is_child(*name)).count();
        Ok(ChildCount { groups, folders })
    }

    async fn member_count(&self, group: &Group) -> Result<usize> {
        let mut state = self.state();
        state.calls.member_count += 1;
        Ok(state.members.get(&group.name).map_or(0, BTreeMap::len))
    }

    async fn list_immediate_memberships(&self, subject: &Subject) -> Result<Vec<Membership>> {
        let mut state = self.state();
        state.calls.list_memberships += 1;
        let memberships = state
            .members
            .iter()
            .filter_map(|(group_name, members)| {
                let creator = members.get(subject)?;
                let group = state.groups.get(group_name)?;
                Some(Membership {
                    group: group.resource.clone(),
                    creator: creator.clone(),
                })
            })
            .collect();
        Ok(memberships)
    }

    async fn creator_of(&self, resource: &Resource) -> Result<Option<Subject>> {
        let mut state = self.state();
        state.calls.creator_of += 1;
        let creator = match resource {
            Resource::Group(group) => state.groups.get(&group.name).map(|e| e.creator.clone()),
            Resource::Folder(folder) => state.folders.get(&folder.name).map(|e| e.creator.clone()),
        };
        creator.ok_or_else(|| BackendError::NotFound(resource.to_string()))
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let mut state = self.state();
        state.calls.delete += 1;
        let name = resource.name().to_string();
        match resource {
            Resource::Group(group) => {
                if state.groups.remove(&group.name).is_none() {
                    return Err(BackendError::NotFound(resource.to_string()));
                }
                state.members.remove(&name);
                let as_subject = group.to_subject();
                for members in state.members.values_mut() {
                    members.remove(&as_subject);
                }
                state
                    .privileges
                    .retain(|(on, holder, _)| on != &name && holder != &as_subject);
            }
            Resource::Folder(folder) => {
                if folder.is_root() {
                    return Err(BackendError::InsufficientPrivilege(
                        "the root folder cannot be deleted".to_string(),
                    ));
                }
                let has_children = state
                    .folders
                    .keys()
                    .chain(state.groups.keys())
                    .any(|child| parent_name(child) == Some(name.as_str()));
                if has_children {
                    return Err(BackendError::Schema(format!("folder {} is not empty", name)));
                }
                if state.folders.remove(&name).is_none() {
                    return Err(BackendError::NotFound(resource.to_string()));
                }
                state.privileges.retain(|(on, _, _)| on != &name);
            }
        }
        debug!("Deleted {}", resource);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(Subject::person("provisioner"))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let backend = backend();
        let root = backend.find_folder("").await.unwrap().unwrap();
        let org = backend
            .create_child_folder(&root, "org", "Org", "Organisation")
            .await
            .unwrap();
        assert_eq!(org.name, "org");

        let group = backend
            .create_child_group(&org, "staff", "Staff", "Staff")
            .await
            .unwrap();
        assert_eq!(group.name, "org:staff");
        assert_eq!(backend.find_group("org:staff").await.unwrap(), Some(group.clone()));
        assert_eq!(
            backend.creator_of(&Resource::Group(group)).await.unwrap(),
            Some(Subject::person("provisioner"))
        );

        let err = backend
            .create_child_group(&org, "staff", "Staff", "Staff")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(backend.calls().create_group, 2);
    }

    #[tokio::test]
    async fn test_lost_creation() {
        let backend = backend();
        let org = backend.seed_folder("org");
        backend.lose_next_creation_of("org:g");

        let err = backend.create_child_group(&org, "g", "g", "g").await.unwrap_err();
        assert!(err.is_conflict());
        let group = backend.find_group("org:g").await.unwrap().unwrap();
        assert_eq!(
            backend.creator_of(&Resource::Group(group)).await.unwrap(),
            Some(Subject::person("concurrent-actor"))
        );
    }

    #[tokio::test]
    async fn test_memberships_and_counts() {
        let backend = backend();
        let group = backend.seed_group("org:root:g");
        let member = Subject::person("jdoe");

        assert_eq!(backend.member_count(&group).await.unwrap(), 0);
        backend.add_member(&group, &member).await.unwrap();
        assert!(backend.has_member(&group, &member).await.unwrap());

        let memberships = backend.list_immediate_memberships(&member).await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].group.name, "org:root:g");
        assert_eq!(memberships[0].creator, Some(Subject::person("provisioner")));

        let root_folder = backend.find_folder("org:root").await.unwrap().unwrap();
        let count = backend.child_count(&root_folder).await.unwrap();
        assert_eq!(count, ChildCount { groups: 1, folders: 0 });

        backend.remove_member(&group, &member).await.unwrap();
        assert!(backend.remove_member(&group, &member).await.is_err());
        assert_eq!(backend.calls().membership_changes_for("org:root:g"), 3);
    }

    #[tokio::test]
    async fn test_privileges_follow_resource_kind() {
        let backend = backend();
        let folder = Resource::Folder(backend.seed_folder("org"));
        let admins = Subject::group("org:admins");

        backend
            .grant_privilege(&folder, &admins, Privilege::Create)
            .await
            .unwrap();
        assert!(backend.holds("org", &admins, Privilege::Create));
        assert!(backend
            .grant_privilege(&folder, &admins, Privilege::Update)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let backend = backend();
        let group = backend.seed_group("org:root:g");
        let container = backend.seed_group("org:all");
        backend.add_member(&container, &group.to_subject()).await.unwrap();

        let root_folder = Resource::Folder(backend.seed_folder("org:root"));
        assert!(matches!(
            backend.delete(&root_folder).await,
            Err(BackendError::Schema(_))
        ));

        backend.delete(&Resource::Group(group)).await.unwrap();
        assert!(backend.members_of("org:all").is_empty());
        backend.delete(&root_folder).await.unwrap();
        assert!(!backend.folder_exists("org:root"));

        let root = Resource::Folder(Folder::root());
        assert!(backend.delete(&root).await.is_err());
    }
}
