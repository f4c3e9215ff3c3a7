use crate::engine::{BoxFuture, Provisioner};
use crate::error::{ProvisioningError, Result};
use backend::{BackendError, Folder, Group, Resource, Subject};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl Provisioner {
    /// Delete `group` when it has no members left, then whatever that empties
    pub async fn handles_empty_group_if_needed(&self, group: &Group) -> Result<()> {
        self.retract_group(group.clone()).await
    }

    /// Delete `folder` when it has no children left, then its emptied ancestors
    pub async fn handles_empty_folder_if_needed(&self, folder: &Folder) -> Result<()> {
        self.retract_folder(folder.clone()).await
    }

    async fn may_delete(&self, resource: &Resource) -> Result<bool> {
        if self.definitions.is_preexisting(resource.name()) {
            debug!("{} is preexisting, keeping it", resource);
            return Ok(false);
        }
        if self.config.require_ownership_for_deletion {
            let creator = self.backend.creator_of(resource).await?;
            if creator.as_ref() != Some(self.session()) {
                debug!("{} was not created by {}, keeping it", resource, self.session());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete, treating a resource that is already gone as deleted
    async fn delete_resource(&self, resource: &Resource) -> Result<bool> {
        match self.backend.delete(resource).await {
            Ok(()) => {
                info!("Deleted empty {}", resource);
                Ok(true)
            }
            Err(BackendError::NotFound(_)) => {
                warn!("{} disappeared before it could be deleted", resource);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn retract_group(&self, group: Group) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.config.delete_empty_groups {
                return Ok(());
            }
            let resource = Resource::Group(group.clone());
            if self.backend.member_count(&group).await? > 0 {
                return Ok(());
            }
            if !self.may_delete(&resource).await? {
                return Ok(());
            }

            let containers = self
                .backend
                .list_immediate_memberships(&group.to_subject())
                .await?;
            if !self.delete_resource(&resource).await? {
                return Ok(());
            }

            if let Some(parent) = group.parent_name() {
                if let Some(folder) = self.backend.find_folder(parent).await? {
                    self.retract_folder(folder).await?;
                }
            }
            for membership in containers {
                self.retract_group(membership.group).await?;
            }
            Ok(())
        })
    }

    fn retract_folder(&self, folder: Folder) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.config.delete_empty_folders || folder.is_root() {
                return Ok(());
            }
            if !self.backend.child_count(&folder).await?.is_empty() {
                return Ok(());
            }
            let resource = Resource::Folder(folder.clone());
            if !self.may_delete(&resource).await? {
                return Ok(());
            }
            if !self.delete_resource(&resource).await? {
                return Ok(());
            }

            if let Some(parent) = backend::parent_name(&folder.name) {
                if let Some(parent) = self.backend.find_folder(parent).await? {
                    self.retract_folder(parent).await?;
                }
            }
            Ok(())
        })
    }

    pub async fn remove_member(&self, group_path: &str, subject_id: &str) -> Result<()> {
        let group = self
            .backend
            .find_group(group_path)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("group {}", group_path)))?;
        let subject = Subject::person(subject_id);
        if !self.backend.has_member(&group, &subject).await? {
            return Err(ProvisioningError::NotAMember {
                subject: subject.to_string(),
                group: group.name,
            });
        }
        self.backend.remove_member(&group, &subject).await?;
        info!("Removed {} from {}", subject, group.name);
        self.handles_empty_group_if_needed(&group).await
    }

    /// Groups `subject_id` belongs to through a membership the engine made
    pub async fn retrieve_managed_groups(&self, subject_id: &str) -> Result<BTreeSet<String>> {
        let memberships = self
            .backend
            .list_immediate_memberships(&Subject::person(subject_id))
            .await?;
        Ok(memberships
            .into_iter()
            .filter(|membership| membership.creator.as_ref() == Some(self.session()))
            .map(|membership| membership.group.name)
            .collect())
    }

    pub async fn remove_from_groups<I, S>(&self, subject_id: &str, group_paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in group_paths {
            match self.remove_member(path.as_ref(), subject_id).await {
                Ok(()) => {}
                Err(ProvisioningError::Backend(BackendError::NotFound(_)))
                | Err(ProvisioningError::NotAMember { .. }) => {
                    warn!(
                        "Skipping {}: {} is no longer a member",
                        path.as_ref(),
                        subject_id
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub async fn remove_from_all_groups(&self, subject_id: &str) -> Result<()> {
        let groups: Vec<String> = self
            .backend
            .list_immediate_memberships(&Subject::person(subject_id))
            .await?
            .into_iter()
            .map(|membership| membership.group.name)
            .collect();
        debug!("Removing {} from {} groups", subject_id, groups.len());
        self.remove_from_groups(subject_id, groups).await
    }

    pub async fn remove_from_managed_groups(&self, subject_id: &str) -> Result<()> {
        let groups = self.retrieve_managed_groups(subject_id).await?;
        debug!("Removing {} from {} managed groups", subject_id, groups.len());
        self.remove_from_groups(subject_id, groups).await
    }
}
