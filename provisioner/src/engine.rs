use crate::config::ProvisionerConfig;
use crate::error::{ProvisioningError, Result};
use crate::locks::PathLocks;
use crate::privileges::backend_privileges;
use backend::{Backend, Folder, Group, Resource, Subject};
use definitions::{Definition, DefinitionsManager, ResourceKind};
use idempotency_cache::IdempotencyCache;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Paths currently being created by one call, outermost first
#[derive(Debug, Clone)]
pub struct ResolutionChain {
    paths: Vec<String>,
    max_depth: usize,
}

impl ResolutionChain {
    pub fn new(max_depth: usize) -> Self {
        Self {
            paths: Vec::new(),
            max_depth,
        }
    }

    /// The chain extended with `path`
    pub fn descend(&self, path: &str) -> Result<Self> {
        if self.paths.iter().any(|p| p == path) {
            let mut chain = self.paths.clone();
            chain.push(path.to_string());
            return Err(ProvisioningError::CycleDetected {
                path: path.to_string(),
                chain: chain.join(" -> "),
            });
        }
        if self.paths.len() >= self.max_depth {
            return Err(ProvisioningError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.max_depth,
            });
        }
        let mut next = self.clone();
        next.paths.push(path.to_string());
        Ok(next)
    }

    pub fn depth(&self) -> usize {
        self.paths.len()
    }
}

/// Makes resources described by definitions exist in a backend.
///
/// Every resource is resolved by looking it up first; only a missing one is
/// created, after its containing folder has been resolved the same way.
/// Privileges and containing-group memberships are applied to what gets
/// created, and gated by the idempotency cache for what already exists.
pub struct Provisioner {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) definitions: Arc<dyn DefinitionsManager>,
    pub(crate) cache: Arc<dyn IdempotencyCache>,
    pub(crate) config: ProvisionerConfig,
    locks: PathLocks,
}

impl Provisioner {
    pub fn new(
        backend: Arc<dyn Backend>,
        definitions: Arc<dyn DefinitionsManager>,
        cache: Arc<dyn IdempotencyCache>,
        config: ProvisionerConfig,
    ) -> Self {
        Self {
            backend,
            definitions,
            cache,
            config,
            locks: PathLocks::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn definitions(&self) -> &Arc<dyn DefinitionsManager> {
        &self.definitions
    }

    pub fn cache(&self) -> &Arc<dyn IdempotencyCache> {
        &self.cache
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub(crate) fn chain(&self) -> ResolutionChain {
        ResolutionChain::new(self.config.max_depth)
    }

    pub(crate) fn session(&self) -> &Subject {
        self.backend.session_subject()
    }

    /// Look the resource up, without creating anything
    pub async fn retrieve(&self, definition: &Definition) -> Result<Option<Resource>> {
        let found = match definition.kind() {
            ResourceKind::Folder => self
                .backend
                .find_folder(definition.path())
                .await?
                .map(Resource::Folder),
            ResourceKind::Group => self
                .backend
                .find_group(definition.path())
                .await?
                .map(Resource::Group),
        };
        Ok(found)
    }

    pub async fn retrieve_or_create(
        &self,
        definition: &Definition,
        values: &[String],
    ) -> Result<Resource> {
        self.resolve(definition, values, self.chain()).await
    }

    pub(crate) fn resolve<'a>(
        &'a self,
        definition: &'a Definition,
        values: &'a [String],
        chain: ResolutionChain,
    ) -> BoxFuture<'a, Result<Resource>> {
        Box::pin(async move {
            if let Some(resource) = self.retrieve(definition).await? {
                debug!("Found {}", resource);
                return Ok(resource);
            }
            if definition.is_preexisting() {
                return Err(ProvisioningError::PreexistingMissing {
                    path: definition.path().to_string(),
                    template: definition.template().to_string(),
                });
            }
            let chain = chain.descend(definition.path())?;
            self.create(definition, values, &chain).await
        })
    }

    async fn create(
        &self,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
    ) -> Result<Resource> {
        let (parent, parent_definition) = self.resolve_parent(definition, values, chain).await?;
        self.folder_privileges(&parent, &parent_definition, values, chain)
            .await?;

        let (resource, fresh) = self.create_resource(&parent, definition).await?;
        match &resource {
            Resource::Folder(folder) => {
                self.folder_privileges(folder, definition, values, chain)
                    .await?;
            }
            Resource::Group(group) => {
                // A group made by this call starts with nothing, whatever the cache says
                let gated = !fresh;
                self.group_privileges(group, definition, values, chain, gated)
                    .await?;
                self.group_memberships(group, definition, values, chain, gated)
                    .await?;
            }
        }
        Ok(resource)
    }

    async fn resolve_parent(
        &self,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
    ) -> Result<(Folder, Definition)> {
        let key = definition.containing_template().ok_or_else(|| {
            ProvisioningError::invalid(format!("{} has no containing folder", definition))
        })?;
        let unresolved = |cause: ProvisioningError| match cause {
            fatal @ (ProvisioningError::CycleDetected { .. }
            | ProvisioningError::DepthExceeded { .. }
            | ProvisioningError::AncestorUnresolved { .. }) => fatal,
            cause => ProvisioningError::AncestorUnresolved {
                path: key.to_string(),
                cause: Box::new(cause),
            },
        };

        let parent_definition = self
            .definitions
            .get_definition(key.as_str(), values)
            .map_err(|e| unresolved(e.into()))?;
        if parent_definition.kind() != ResourceKind::Folder {
            return Err(unresolved(ProvisioningError::invalid(format!(
                "{} is defined as a group",
                parent_definition.path()
            ))));
        }

        let parent = self
            .resolve(&parent_definition, values, chain.clone())
            .await
            .map_err(unresolved)?;
        match parent {
            Resource::Folder(folder) => Ok((folder, parent_definition)),
            other => Err(unresolved(ProvisioningError::invalid(format!(
                "{} is not a folder",
                other
            )))),
        }
    }

    /// Create one resource; the flag tells whether this call created it
    async fn create_resource(
        &self,
        parent: &Folder,
        definition: &Definition,
    ) -> Result<(Resource, bool)> {
        let _guard = self.locks.lock(definition.path()).await;
        if let Some(existing) = self.retrieve(definition).await? {
            debug!("{} was created while waiting for it", existing);
            return Ok((existing, false));
        }

        let created = match definition.kind() {
            ResourceKind::Folder => self
                .backend
                .create_child_folder(
                    parent,
                    definition.extension(),
                    definition.display_extension(),
                    definition.description(),
                )
                .await
                .map(Resource::Folder),
            ResourceKind::Group => self
                .backend
                .create_child_group(
                    parent,
                    definition.extension(),
                    definition.display_extension(),
                    definition.description(),
                )
                .await
                .map(Resource::Group),
        };

        match created {
            Ok(resource) => {
                info!("Created {}", resource);
                Ok((resource, true))
            }
            Err(err) if err.is_conflict() => {
                warn!(
                    "Another actor created {} first, using the existing one",
                    definition.path()
                );
                match self.retrieve(definition).await? {
                    Some(resource) => Ok((resource, false)),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn handle_privileges_for_folder(
        &self,
        folder: &Folder,
        definition: &Definition,
        values: &[String],
    ) -> Result<()> {
        self.folder_privileges(folder, definition, values, &self.chain())
            .await
    }

    pub async fn handle_privileges_for_group(
        &self,
        group: &Group,
        definition: &Definition,
        values: &[String],
    ) -> Result<()> {
        self.group_privileges(group, definition, values, &self.chain(), true)
            .await
    }

    pub async fn handle_memberships_for_group(
        &self,
        group: &Group,
        definition: &Definition,
        values: &[String],
    ) -> Result<()> {
        self.group_memberships(group, definition, values, &self.chain(), true)
            .await
    }

    async fn folder_privileges(
        &self,
        folder: &Folder,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
    ) -> Result<()> {
        if definition.is_preexisting() || definition.privileges().is_empty() {
            return Ok(());
        }
        if !self.config.force_privileges {
            let children = self.backend.child_count(folder).await?;
            if !children.is_empty() {
                debug!(
                    "Folder {} already has content, privileges left unchanged",
                    folder.name
                );
                return Ok(());
            }
        }
        self.grant_required(&Resource::Folder(folder.clone()), definition, values, chain)
            .await
    }

    pub(crate) async fn group_privileges(
        &self,
        group: &Group,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
        gated: bool,
    ) -> Result<()> {
        if definition.is_preexisting() {
            return Ok(());
        }
        if gated && self.cache.has_privileges_handled(&group.name) {
            debug!("Privileges of {} already handled", group.name);
            return Ok(());
        }
        if !definition.privileges().is_empty() {
            let acts = self.config.force_privileges
                || self.backend.member_count(group).await? == 0;
            if acts {
                self.grant_required(&Resource::Group(group.clone()), definition, values, chain)
                    .await?;
            } else {
                debug!("Group {} has members, privileges left unchanged", group.name);
            }
        }
        self.cache.mark_privileges_handled(&group.name);
        Ok(())
    }

    async fn grant_required(
        &self,
        resource: &Resource,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
    ) -> Result<()> {
        for requirement in definition.privileges() {
            let holder_definition = self
                .definitions
                .get_definition(requirement.granted_to.as_str(), values)?;
            let holder = self
                .resolve(&holder_definition, values, chain.clone())
                .await?;
            let holder = match holder.as_group() {
                Some(group) => group.to_subject(),
                None => {
                    return Err(ProvisioningError::invalid(format!(
                        "{} can only be granted to a group, not to {}",
                        requirement.right, holder
                    )))
                }
            };

            for privilege in backend_privileges(requirement.right, definition.kind()) {
                if self
                    .backend
                    .has_privilege(resource, &holder, *privilege)
                    .await?
                {
                    debug!("{} already holds {} on {}", holder, privilege, resource);
                    continue;
                }
                self.backend
                    .grant_privilege(resource, &holder, *privilege)
                    .await?;
                info!("Granted {} on {} to {}", privilege, resource, holder);
            }
        }
        Ok(())
    }

    pub(crate) async fn group_memberships(
        &self,
        group: &Group,
        definition: &Definition,
        values: &[String],
        chain: &ResolutionChain,
        gated: bool,
    ) -> Result<()> {
        if definition.is_preexisting() {
            return Ok(());
        }
        if gated && self.cache.has_memberships_handled(&group.name) {
            debug!("Memberships of {} already handled", group.name);
            return Ok(());
        }
        if !definition.containing_groups().is_empty()
            && self.backend.member_count(group).await? == 0
        {
            let subject = group.to_subject();
            for containing in definition.containing_groups() {
                let container_definition = self
                    .definitions
                    .get_definition(containing.path.as_str(), values)?;
                let container = self
                    .resolve(&container_definition, values, chain.clone())
                    .await?;
                let container = container.as_group().ok_or_else(|| {
                    ProvisioningError::invalid(format!(
                        "Containing group {} is defined as a folder",
                        container_definition.path()
                    ))
                })?;
                if !containing.accepts(&group.extension) {
                    debug!(
                        "{} does not match the condition of {}",
                        group.extension, container.name
                    );
                    continue;
                }
                if self.backend.has_member(container, &subject).await? {
                    debug!("{} already belongs to {}", group.name, container.name);
                    continue;
                }
                self.backend.add_member(container, &subject).await?;
                info!("Added {} to {}", group.name, container.name);
            }
        }
        self.cache.mark_memberships_handled(&group.name);
        Ok(())
    }

    /// Make sure `subject_id` is an immediate member of the group `definition` describes
    pub async fn add_member(
        &self,
        definition: &Definition,
        subject_id: &str,
        values: &[String],
    ) -> Result<Group> {
        let resource = self.retrieve_or_create(definition, values).await?;
        let group = match resource {
            Resource::Group(group) => group,
            other => {
                return Err(ProvisioningError::invalid(format!(
                    "Cannot add members to {}",
                    other
                )))
            }
        };

        let chain = self.chain();
        self.group_privileges(&group, definition, values, &chain, true)
            .await?;
        self.group_memberships(&group, definition, values, &chain, true)
            .await?;

        let subject = Subject::person(subject_id);
        if self.backend.has_member(&group, &subject).await? {
            debug!("{} already belongs to {}", subject, group.name);
        } else {
            self.backend.add_member(&group, &subject).await?;
            info!("Added {} to {}", subject, group.name);
        }
        Ok(group)
    }
}
