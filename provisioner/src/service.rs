use crate::config::ProvisionerConfig;
use crate::engine::Provisioner;
use crate::error::{ProvisioningError, Result};
use crate::reconcile::MembershipDiff;
use crate::result::OperationResult;
use crate::subject::SubjectDescription;
use backend::Backend;
use definitions::{Definition, DefinitionError, DefinitionsManager, PersonType, TemplateError};
use idempotency_cache::{CacheStats, IdempotencyCache};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What startup verified and created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupReport {
    pub verified: Vec<String>,
    /// Templated preexisting paths that can only be checked per subject
    pub unchecked: Vec<String>,
    pub created: Vec<String>,
}

/// Subject-level entry point of the provisioning engine
pub struct ProvisioningService {
    engine: Provisioner,
}

impl ProvisioningService {
    pub fn new(
        backend: Arc<dyn Backend>,
        definitions: Arc<dyn DefinitionsManager>,
        cache: Arc<dyn IdempotencyCache>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: Provisioner::new(backend, definitions, cache, config),
        })
    }

    /// Build the cache from the settings
    pub fn with_config(
        backend: Arc<dyn Backend>,
        definitions: Arc<dyn DefinitionsManager>,
        config: ProvisionerConfig,
    ) -> Result<Self> {
        let cache = config.build_cache();
        Self::new(backend, definitions, cache, config)
    }

    pub fn engine(&self) -> &Provisioner {
        &self.engine
    }

    pub fn config(&self) -> &ProvisionerConfig {
        self.engine.config()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache().stats()
    }

    /// Check that externally managed resources exist, then create the
    /// constant "create even if empty" definitions
    pub async fn startup(&self) -> Result<StartupReport> {
        info!("Verifying preexisting resources");
        let no_values: &[String] = &[];
        let mut report = StartupReport::default();
        let mut missing = Vec::new();

        for template in self.engine.definitions().preexisting_definitions() {
            if !template.path().is_constant() {
                debug!("{} depends on subject values, not checked", template.path());
                report.unchecked.push(template.path().to_string());
                continue;
            }
            let definition = template.evaluate(no_values)?;
            match self.engine.retrieve(&definition).await? {
                Some(_) => report.verified.push(definition.path().to_string()),
                None => missing.push(definition.path().to_string()),
            }
        }
        if !missing.is_empty() {
            error!("Missing preexisting resources: {}", missing.join(", "));
            return Err(ProvisioningError::Startup(format!(
                "preexisting resources are missing: {}",
                missing.join(", ")
            )));
        }

        for template in self.engine.definitions().definitions_to_create() {
            if !template.path().is_constant() {
                continue;
            }
            let definition = template.evaluate(no_values)?;
            self.engine.retrieve_or_create(&definition, no_values).await?;
            self.engine
                .cache()
                .mark_empty_template_created(definition.path());
            report.created.push(definition.path().to_string());
        }

        info!(
            "Startup complete: {} preexisting resources verified, {} resources ensured",
            report.verified.len(),
            report.created.len()
        );
        Ok(report)
    }

    /// Create the templated "create even if empty" definitions for `values`
    pub async fn create_empty_templates(&self, values: &[String]) -> Result<()> {
        for template in self.engine.definitions().definitions_to_create() {
            if template.path().is_constant() {
                continue;
            }
            let definition = match template.evaluate(values) {
                Ok(definition) => definition,
                Err(DefinitionError::Template(TemplateError::MissingValue { element, .. })) => {
                    debug!("No {} value for {}, skipped", element, template.path());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if self
                .engine
                .cache()
                .has_empty_template_created(definition.path())
            {
                continue;
            }
            self.engine.retrieve_or_create(&definition, values).await?;
            self.engine
                .cache()
                .mark_empty_template_created(definition.path());
        }
        Ok(())
    }

    /// Definitions of the groups a subject of `person_type` belongs to
    fn applicable_definitions(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Result<Arc<Vec<Definition>>> {
        let cache = self.engine.cache();
        if let Some(definitions) = cache.cached_memberships(person_type, values) {
            return Ok(definitions);
        }

        let manager = self.engine.definitions();
        let mut definitions = manager.membership_definitions_for(person_type, values)?;
        if !person_type.is_all() {
            definitions.extend(manager.membership_definitions_for(PersonType::All, values)?);
        }
        let mut seen = HashSet::new();
        definitions.retain(|definition| seen.insert(definition.path().to_string()));

        Ok(cache.cache_memberships(person_type, values, definitions))
    }

    async fn try_add_to_groups(&self, subject: &SubjectDescription) -> Result<()> {
        for values in subject.values_sets() {
            self.create_empty_templates(&values).await?;
            let definitions = self
                .applicable_definitions(subject.person_type, &values)?;
            for definition in definitions.iter() {
                self.engine.add_member(definition, &subject.id, &values).await?;
            }
        }
        Ok(())
    }

    async fn try_update_memberships(&self, subject: &SubjectDescription) -> Result<()> {
        let mut desired: BTreeMap<String, (Definition, Vec<String>)> = BTreeMap::new();
        for values in subject.values_sets() {
            self.create_empty_templates(&values).await?;
            let definitions = self
                .applicable_definitions(subject.person_type, &values)?;
            for definition in definitions.iter() {
                desired
                    .entry(definition.path().to_string())
                    .or_insert_with(|| (definition.clone(), values.clone()));
            }
        }

        let previous = self.engine.retrieve_managed_groups(&subject.id).await?;
        let wanted: BTreeSet<String> = desired.keys().cloned().collect();
        let diff = MembershipDiff::compute(&previous, &wanted);
        info!("Reconciling {}: {}", subject.id, diff);

        for (path, (definition, values)) in &desired {
            if diff.to_add.contains(path) {
                self.engine.add_member(definition, &subject.id, values).await?;
            }
        }
        self.engine
            .remove_from_groups(&subject.id, &diff.to_remove)
            .await
    }

    fn report(operation: &str, subject_id: &str, result: Result<()>) -> OperationResult {
        match &result {
            Ok(()) => debug!("{} succeeded for {}", operation, subject_id),
            Err(e) => error!("{} failed for {}: {}", operation, subject_id, e),
        }
        result.into()
    }

    /// Add the subject to every group its definitions call for
    pub async fn add_to_groups(&self, subject: &SubjectDescription) -> OperationResult {
        Self::report(
            "Adding to groups",
            &subject.id,
            self.try_add_to_groups(subject).await,
        )
    }

    /// Bring the subject's managed memberships in line with its definitions
    pub async fn update_memberships(&self, subject: &SubjectDescription) -> OperationResult {
        Self::report(
            "Updating memberships",
            &subject.id,
            self.try_update_memberships(subject).await,
        )
    }

    pub async fn remove_from_all_groups(&self, subject_id: &str) -> OperationResult {
        Self::report(
            "Removing from all groups",
            subject_id,
            self.engine.remove_from_all_groups(subject_id).await,
        )
    }

    pub async fn remove_from_managed_groups(&self, subject_id: &str) -> OperationResult {
        Self::report(
            "Removing from managed groups",
            subject_id,
            self.engine.remove_from_managed_groups(subject_id).await,
        )
    }
}
