use backend::{Backend, MemoryBackend, Privilege, Resource, Subject};
use definitions::{
    DefinitionTemplate, DefinitionsManager, PersonType, Right, TemplateDefinitions,
    TemplateElement,
};
use idempotency_cache::MemoryCache;
use provisioner::{
    BatchRunner, Job, ProvisionerConfig, ProvisioningError, ProvisioningService,
    SubjectDescription,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const CLASS: &str = "org:root:%ETAB%:%CLASSE%";
const ALL_CLASSES: &str = "org:root:%ETAB%:all-classes";

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn school() -> Vec<DefinitionTemplate> {
    vec![
        DefinitionTemplate::folder("org").unwrap().preexisting(),
        DefinitionTemplate::group("org:admins").unwrap().preexisting(),
        DefinitionTemplate::folder("org:root:%ETAB%")
            .unwrap()
            .with_privilege(Right::Admin, "org:admins")
            .unwrap(),
        DefinitionTemplate::group(ALL_CLASSES).unwrap(),
        DefinitionTemplate::group(CLASS)
            .unwrap()
            .with_privilege(Right::Read, "org:admins")
            .unwrap()
            .with_containing_group(ALL_CLASSES, Some("[0-9][A-Z]"))
            .unwrap()
            .with_members(PersonType::Student, None)
            .unwrap()
            .with_members(PersonType::Teacher, Some(TemplateElement::Classe))
            .unwrap(),
    ]
}

struct Fixture {
    backend: Arc<MemoryBackend>,
    definitions: Arc<TemplateDefinitions>,
    service: Arc<ProvisioningService>,
}

impl Fixture {
    fn new(templates: Vec<DefinitionTemplate>, config: ProvisionerConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new(Subject::person("provisioner")));
        let definitions = Arc::new(TemplateDefinitions::new(templates).unwrap());
        let store: Arc<dyn Backend> = backend.clone();
        let manager: Arc<dyn DefinitionsManager> = definitions.clone();
        let service = ProvisioningService::new(
            store,
            manager,
            Arc::new(MemoryCache::new()),
            config,
        )
        .unwrap();
        Self {
            backend,
            definitions,
            service: Arc::new(service),
        }
    }

    /// School definitions with the externally managed resources in place
    fn school() -> Self {
        let fixture = Self::new(school(), ProvisionerConfig::default());
        fixture.backend.seed_folder("org");
        fixture.backend.seed_group("org:admins");
        fixture
    }

    fn definition(&self, key: &str, tuple: &[&str]) -> definitions::Definition {
        self.definitions.get_definition(key, &values(tuple)).unwrap()
    }
}

fn admins() -> Subject {
    Subject::group("org:admins")
}

#[tokio::test]
async fn test_class_group_is_created_with_its_ancestors() {
    let fixture = Fixture::school();
    let definition = fixture.definition(CLASS, &["ETB01", "6A"]);
    let engine = fixture.service.engine();

    let resource = engine
        .retrieve_or_create(&definition, &values(&["ETB01", "6A"]))
        .await
        .unwrap();

    assert_eq!(resource.name(), "org:root:ETB01:6A");
    let backend = &fixture.backend;
    assert!(backend.folder_exists("org:root"));
    assert!(backend.folder_exists("org:root:ETB01"));
    assert!(backend.group_exists("org:root:ETB01:all-classes"));
    assert_eq!(
        backend.members_of("org:root:ETB01:all-classes"),
        vec![Subject::group("org:root:ETB01:6A")]
    );
    assert!(backend.holds("org:root:ETB01", &admins(), Privilege::Create));
    assert!(backend.holds("org:root:ETB01", &admins(), Privilege::Stem));
    assert!(backend.holds("org:root:ETB01:6A", &admins(), Privilege::Read));
}

#[tokio::test]
async fn test_second_resolution_does_no_work() {
    let fixture = Fixture::school();
    let tuple = values(&["ETB01", "6A"]);
    let definition = fixture.definition(CLASS, &["ETB01", "6A"]);
    let engine = fixture.service.engine();

    let first = engine.retrieve_or_create(&definition, &tuple).await.unwrap();
    let calls = fixture.backend.calls();
    assert_eq!(calls.creations(), 4);
    assert_eq!(calls.grant_privilege, 3);
    assert_eq!(calls.membership_changes_for("org:root:ETB01:all-classes"), 1);

    fixture.backend.reset_calls();
    let second = engine.retrieve_or_create(&definition, &tuple).await.unwrap();
    assert_eq!(first, second);

    let calls = fixture.backend.calls();
    assert_eq!(calls.creations(), 0);
    assert_eq!(calls.privilege_calls(), 0);
    assert_eq!(calls.add_member, 0);
    assert_eq!(calls.find_group, 1);
}

#[tokio::test]
async fn test_held_privileges_are_not_granted_again() {
    let config = ProvisionerConfig {
        force_privileges: true,
        ..ProvisionerConfig::default()
    };
    let fixture = Fixture::new(school(), config);
    fixture.backend.seed_group("org:admins");
    let folder = fixture.backend.seed_folder("org:root:ETB01");
    fixture.backend.seed_group("org:root:ETB01:existing");
    fixture
        .backend
        .grant_privilege(&Resource::Folder(folder.clone()), &admins(), Privilege::Create)
        .await
        .unwrap();
    fixture.backend.reset_calls();

    let definition = fixture.definition("org:root:%ETAB%", &["ETB01"]);
    fixture
        .service
        .engine()
        .handle_privileges_for_folder(&folder, &definition, &values(&["ETB01"]))
        .await
        .unwrap();

    let calls = fixture.backend.calls();
    assert_eq!(calls.has_privilege, 2);
    assert_eq!(calls.grant_privilege, 1);
    assert!(fixture.backend.holds("org:root:ETB01", &admins(), Privilege::Stem));
}

#[tokio::test]
async fn test_non_empty_folder_keeps_its_privileges() {
    let fixture = Fixture::school();
    let folder = fixture.backend.seed_folder("org:root:ETB01");
    fixture.backend.seed_group("org:root:ETB01:existing");
    fixture.backend.reset_calls();

    let definition = fixture.definition("org:root:%ETAB%", &["ETB01"]);
    fixture
        .service
        .engine()
        .handle_privileges_for_folder(&folder, &definition, &values(&["ETB01"]))
        .await
        .unwrap();

    assert_eq!(fixture.backend.calls().privilege_calls(), 0);
    assert!(!fixture.backend.holds("org:root:ETB01", &admins(), Privilege::Create));
}

#[tokio::test]
async fn test_handled_privileges_are_skipped() {
    let fixture = Fixture::school();
    let tuple = values(&["ETB01", "6A"]);
    let definition = fixture.definition(CLASS, &["ETB01", "6A"]);
    let engine = fixture.service.engine();

    let group = engine
        .retrieve_or_create(&definition, &tuple)
        .await
        .unwrap()
        .as_group()
        .cloned()
        .unwrap();
    fixture.backend.reset_calls();

    engine
        .handle_privileges_for_group(&group, &definition, &tuple)
        .await
        .unwrap();
    engine
        .handle_memberships_for_group(&group, &definition, &tuple)
        .await
        .unwrap();

    let calls = fixture.backend.calls();
    assert_eq!(calls.privilege_calls(), 0);
    assert_eq!(calls.member_count, 0);
    assert_eq!(calls.has_member, 0);
}

#[tokio::test]
async fn test_containing_group_condition() {
    let fixture = Fixture::school();
    let engine = fixture.service.engine();

    let club = fixture.definition(CLASS, &["ETB01", "CLUB"]);
    engine
        .retrieve_or_create(&club, &values(&["ETB01", "CLUB"]))
        .await
        .unwrap();
    assert!(fixture.backend.group_exists("org:root:ETB01:CLUB"));
    // The container is resolved even when the condition keeps the group out
    assert!(fixture.backend.group_exists("org:root:ETB01:all-classes"));
    assert!(fixture
        .backend
        .members_of("org:root:ETB01:all-classes")
        .is_empty());

    let class = fixture.definition(CLASS, &["ETB01", "5B"]);
    for _ in 0..2 {
        engine
            .retrieve_or_create(&class, &values(&["ETB01", "5B"]))
            .await
            .unwrap();
    }
    assert_eq!(
        fixture.backend.members_of("org:root:ETB01:all-classes"),
        vec![Subject::group("org:root:ETB01:5B")]
    );
    assert_eq!(
        fixture
            .backend
            .calls()
            .membership_changes_for("org:root:ETB01:all-classes"),
        1
    );
}

#[tokio::test]
async fn test_removing_the_last_member_cascades() {
    let fixture = Fixture::school();
    let student = SubjectDescription::new("jdoe", PersonType::Student, values(&["ETB01", "6A"]));
    assert!(fixture.service.add_to_groups(&student).await.is_ok());
    assert_eq!(
        fixture.backend.members_of("org:root:ETB01:6A"),
        vec![Subject::person("jdoe")]
    );

    fixture
        .service
        .engine()
        .remove_member("org:root:ETB01:6A", "jdoe")
        .await
        .unwrap();

    let backend = &fixture.backend;
    assert!(!backend.group_exists("org:root:ETB01:6A"));
    assert!(!backend.group_exists("org:root:ETB01:all-classes"));
    assert!(!backend.folder_exists("org:root:ETB01"));
    assert!(!backend.folder_exists("org:root"));
    assert!(backend.folder_exists("org"));
    assert!(backend.group_exists("org:admins"));
}

#[tokio::test]
async fn test_resources_made_by_others_are_kept() {
    let fixture = Fixture::school();
    fixture.backend.seed_group("org:root:ETB01:legacy");
    fixture
        .backend
        .seed_member("org:root:ETB01:legacy", Subject::person("jdoe"), None);
    fixture
        .backend
        .seed_member("org:admins", Subject::person("boss"), None);
    let engine = fixture.service.engine();

    engine.remove_member("org:root:ETB01:legacy", "jdoe").await.unwrap();
    engine.remove_member("org:admins", "boss").await.unwrap();

    assert!(fixture.backend.group_exists("org:root:ETB01:legacy"));
    assert!(fixture.backend.group_exists("org:admins"));
    assert_eq!(fixture.backend.calls().delete, 0);
}

#[tokio::test]
async fn test_ownership_check_can_be_disabled() {
    let config = ProvisionerConfig {
        require_ownership_for_deletion: false,
        ..ProvisionerConfig::default()
    };
    let fixture = Fixture::new(school(), config);
    fixture.backend.seed_folder("org");
    fixture.backend.seed_group("org:root:ETB01:legacy");
    fixture
        .backend
        .seed_member("org:root:ETB01:legacy", Subject::person("jdoe"), None);

    fixture
        .service
        .engine()
        .remove_member("org:root:ETB01:legacy", "jdoe")
        .await
        .unwrap();

    assert!(!fixture.backend.group_exists("org:root:ETB01:legacy"));
    assert!(!fixture.backend.folder_exists("org:root"));
    assert!(fixture.backend.folder_exists("org"));
}

#[tokio::test]
async fn test_removing_a_non_member_fails() {
    let fixture = Fixture::school();
    let err = fixture
        .service
        .engine()
        .remove_member("org:admins", "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::NotAMember { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_update_applies_a_three_way_diff() {
    let templates = vec![
        DefinitionTemplate::folder("org").unwrap().preexisting(),
        DefinitionTemplate::group("org:teams:A")
            .unwrap()
            .with_members(PersonType::Teacher, None)
            .unwrap(),
        DefinitionTemplate::group("org:teams:B")
            .unwrap()
            .with_members(PersonType::Student, None)
            .unwrap(),
        DefinitionTemplate::group("org:teams:C")
            .unwrap()
            .with_members(PersonType::All, None)
            .unwrap(),
    ];
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    let session = Subject::person("provisioner");
    let jdoe = Subject::person("jdoe");
    fixture.backend.seed_folder("org");
    fixture.backend.seed_group("org:teams:A");
    fixture.backend.seed_group("org:teams:B");
    fixture
        .backend
        .seed_member("org:teams:A", jdoe.clone(), Some(session.clone()));
    fixture
        .backend
        .seed_member("org:teams:B", jdoe.clone(), Some(session));
    fixture.backend.reset_calls();

    let student = SubjectDescription::new("jdoe", PersonType::Student, Vec::new());
    let outcome = fixture.service.update_memberships(&student).await;
    assert!(outcome.is_ok(), "{}", outcome);

    let calls = fixture.backend.calls();
    assert_eq!(calls.membership_changes_for("org:teams:A"), 1);
    assert_eq!(calls.membership_changes_for("org:teams:B"), 0);
    assert_eq!(calls.membership_changes_for("org:teams:C"), 1);
    assert!(!fixture.backend.members_of("org:teams:A").contains(&jdoe));
    assert!(fixture.backend.members_of("org:teams:C").contains(&jdoe));
    assert!(fixture.backend.members_of("org:teams:B").contains(&jdoe));
}

#[tokio::test]
async fn test_update_keeps_every_grouped_value() {
    let fixture = Fixture::school();
    let teacher = SubjectDescription::new("msmith", PersonType::Teacher, values(&["ETB01"]))
        .grouped_by(TemplateElement::Classe, values(&["6A", "5B"]));
    assert!(fixture.service.add_to_groups(&teacher).await.is_ok());
    fixture.backend.reset_calls();

    assert!(fixture.service.update_memberships(&teacher).await.is_ok());
    let calls = fixture.backend.calls();
    assert_eq!(calls.add_member, 0);
    assert_eq!(calls.remove_member, 0);

    let fewer = SubjectDescription::new("msmith", PersonType::Teacher, values(&["ETB01"]))
        .grouped_by(TemplateElement::Classe, values(&["5B"]));
    assert!(fixture.service.update_memberships(&fewer).await.is_ok());
    assert!(!fixture.backend.group_exists("org:root:ETB01:6A"));
    assert_eq!(
        fixture.backend.members_of("org:root:ETB01:5B"),
        vec![Subject::person("msmith")]
    );
    assert_eq!(
        fixture.service.engine().retrieve_managed_groups("msmith").await.unwrap(),
        BTreeSet::from(["org:root:ETB01:5B".to_string()])
    );
}

#[tokio::test]
async fn test_remove_from_managed_groups_leaves_other_memberships() {
    let fixture = Fixture::school();
    let student = SubjectDescription::new("jdoe", PersonType::Student, values(&["ETB01", "6A"]));
    assert!(fixture.service.add_to_groups(&student).await.is_ok());
    fixture
        .backend
        .seed_member("org:admins", Subject::person("jdoe"), None);

    assert!(fixture.service.remove_from_managed_groups("jdoe").await.is_ok());
    assert!(!fixture.backend.group_exists("org:root:ETB01:6A"));
    assert_eq!(
        fixture.backend.members_of("org:admins"),
        vec![Subject::person("jdoe")]
    );

    assert!(fixture.service.remove_from_all_groups("jdoe").await.is_ok());
    assert!(fixture.backend.members_of("org:admins").is_empty());
}

#[tokio::test]
async fn test_lost_creation_race_still_succeeds() {
    let fixture = Fixture::school();
    fixture.backend.lose_next_creation_of("org:root:ETB01:6A");
    let definition = fixture.definition(CLASS, &["ETB01", "6A"]);

    let resource = fixture
        .service
        .engine()
        .retrieve_or_create(&definition, &values(&["ETB01", "6A"]))
        .await
        .unwrap();

    assert_eq!(resource.name(), "org:root:ETB01:6A");
    assert_eq!(fixture.backend.calls().create_group, 2);
    assert!(fixture.backend.holds("org:root:ETB01:6A", &admins(), Privilege::Read));
}

#[tokio::test]
async fn test_self_administered_folder_is_a_cycle() {
    let templates = vec![
        DefinitionTemplate::folder("org").unwrap().preexisting(),
        DefinitionTemplate::folder("org:%ETAB%")
            .unwrap()
            .with_privilege(Right::Admin, "org:%ETAB%:admins")
            .unwrap(),
        DefinitionTemplate::group("org:%ETAB%:admins").unwrap(),
    ];
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org");
    let definition = fixture.definition("org:%ETAB%", &["ETB01"]);

    let err = fixture
        .service
        .engine()
        .retrieve_or_create(&definition, &values(&["ETB01"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::CycleDetected { .. }), "{}", err);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_depth_limit() {
    let config = ProvisionerConfig {
        max_depth: 2,
        ..ProvisionerConfig::default()
    };
    let fixture = Fixture::new(
        vec![DefinitionTemplate::folder("a:b:c:d").unwrap()],
        config,
    );
    let definition = fixture.definition("a:b:c:d", &[]);

    let err = fixture
        .service
        .engine()
        .retrieve_or_create(&definition, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::DepthExceeded { max_depth: 2, .. }));
    assert_eq!(fixture.backend.calls().creations(), 0);
}

#[tokio::test]
async fn test_startup_requires_preexisting_resources() {
    let mut templates = school();
    templates.push(
        DefinitionTemplate::group("org:everyone")
            .unwrap()
            .create_if_empty(),
    );
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org");

    let err = fixture.service.startup().await.unwrap_err();
    assert!(matches!(err, ProvisioningError::Startup(_)));
    assert!(err.to_string().contains("org:admins"));
    assert!(!fixture.backend.group_exists("org:everyone"));

    fixture.backend.seed_group("org:admins");
    let report = fixture.service.startup().await.unwrap();
    assert_eq!(report.verified, vec!["org".to_string(), "org:admins".to_string()]);
    assert_eq!(report.created, vec!["org:everyone".to_string()]);
    assert!(fixture.backend.group_exists("org:everyone"));
}

#[tokio::test]
async fn test_missing_preexisting_group_fails_the_subject() {
    let mut templates = school();
    templates.push(
        DefinitionTemplate::group("org:root:%ETAB%:staff")
            .unwrap()
            .preexisting()
            .with_members(PersonType::Teacher, None)
            .unwrap(),
    );
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org");
    fixture.backend.seed_group("org:admins");

    let teacher =
        SubjectDescription::new("msmith", PersonType::Teacher, values(&["ETB01", "6A"]));
    let result = fixture.service.add_to_groups(&teacher).await;
    assert!(result.is_error());
    assert!(!result.is_fatal());
    match result.error() {
        Some(ProvisioningError::PreexistingMissing { path, template }) => {
            assert_eq!(path, "org:root:ETB01:staff");
            assert_eq!(template, "org:root:%ETAB%:staff");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!fixture.backend.group_exists("org:root:ETB01:staff"));
}

#[tokio::test]
async fn test_extension_override_keeps_creation_idempotent() {
    let templates = vec![
        DefinitionTemplate::folder("org").unwrap().preexisting(),
        DefinitionTemplate::group("org:grp_%ETAB%")
            .unwrap()
            .with_extension("grp_%ETAB%")
            .unwrap(),
        DefinitionTemplate::group("org:%CLASSE%")
            .unwrap()
            .with_extension("grp_%CLASSE%")
            .unwrap(),
    ];
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org");
    let engine = fixture.service.engine();
    let tuple = values(&["E1", "6A"]);

    let definition = fixture.definition("org:grp_%ETAB%", &["E1", "6A"]);
    for _ in 0..2 {
        let group = engine.retrieve_or_create(&definition, &tuple).await.unwrap();
        assert_eq!(group.name(), "org:grp_E1");
    }
    assert_eq!(fixture.backend.calls().create_group, 1);

    // A name the store would put somewhere else is refused up front
    let err = fixture
        .definitions
        .get_definition("org:%CLASSE%", &tuple)
        .unwrap_err();
    assert!(err.to_string().contains("grp_6A"));
    assert_eq!(fixture.backend.calls().create_group, 1);
}

#[tokio::test]
async fn test_separator_in_a_value_creates_nothing() {
    let fixture = Fixture::school();
    let before = fixture.backend.resource_names();

    let student =
        SubjectDescription::new("jdoe", PersonType::Student, values(&["a:b", "6A"]));
    let result = fixture.service.add_to_groups(&student).await;
    assert!(result.is_error());
    assert!(!result.is_fatal());
    assert!(result.to_string().contains("path separator"));

    assert_eq!(fixture.backend.resource_names(), before);
    assert_eq!(fixture.backend.calls().creations(), 0);

    // The next subject in a batch still goes through
    let report = BatchRunner::new(Arc::clone(&fixture.service))
        .with_workers(1)
        .run(vec![
            Job::Add { subject: student },
            Job::Add {
                subject: SubjectDescription::new(
                    "asmith",
                    PersonType::Student,
                    values(&["ETB01", "6A"]),
                ),
            },
        ])
        .await;
    assert!(!report.aborted);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn test_templated_empty_groups_are_created_once() {
    let mut templates = school();
    templates.push(
        DefinitionTemplate::group("org:root:%ETAB%:staff-room")
            .unwrap()
            .create_if_empty(),
    );
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org");
    fixture.backend.seed_group("org:admins");

    for id in ["a", "b"] {
        let student = SubjectDescription::new(id, PersonType::Student, values(&["ETB01", "6A"]));
        assert!(fixture.service.add_to_groups(&student).await.is_ok());
    }

    assert!(fixture.backend.group_exists("org:root:ETB01:staff-room"));
    assert!(fixture.backend.members_of("org:root:ETB01:staff-room").is_empty());
    assert_eq!(fixture.service.cache_stats().empty_templates_created, 1);
}

#[tokio::test]
async fn test_batch_shares_ancestors() {
    let fixture = Fixture::school();
    let jobs: Vec<Job> = ["6A", "6B", "5A", "5B", "4A"]
        .iter()
        .enumerate()
        .map(|(i, class)| Job::Add {
            subject: SubjectDescription::new(
                format!("student{}", i),
                PersonType::Student,
                values(&["ETB01", class]),
            ),
        })
        .collect();

    let report = BatchRunner::new(Arc::clone(&fixture.service))
        .with_workers(3)
        .run(jobs)
        .await;

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);
    assert!(!report.aborted);
    assert_eq!(report.results[0].subject_id, "student0");

    let calls = fixture.backend.calls();
    assert_eq!(calls.create_folder, 2);
    assert_eq!(calls.membership_changes_for("org:root:ETB01:all-classes"), 5);
    assert_eq!(fixture.backend.members_of("org:root:ETB01:all-classes").len(), 5);
}

#[tokio::test]
async fn test_batch_stops_on_fatal_errors() {
    let templates = vec![
        DefinitionTemplate::folder("org").unwrap().preexisting(),
        DefinitionTemplate::folder("org:%ETAB%").unwrap().preexisting(),
        DefinitionTemplate::group("org:%ETAB%:%CLASSE%")
            .unwrap()
            .with_members(PersonType::Student, None)
            .unwrap(),
    ];
    let fixture = Fixture::new(templates, ProvisionerConfig::default());
    fixture.backend.seed_folder("org:ETB01");

    let job = |id: &str, etab: &str| Job::Add {
        subject: SubjectDescription::new(id, PersonType::Student, values(&[etab, "6A"])),
    };
    let jobs = vec![job("lost", "ETB02"), job("a", "ETB01"), job("b", "ETB01")];

    let report = BatchRunner::new(Arc::clone(&fixture.service))
        .with_workers(1)
        .run(jobs)
        .await;

    assert!(report.aborted);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 2);
    assert!(report.results[0].fatal);
    assert!(report.results[0].message.contains("org:%ETAB%"));
    assert!(!fixture.backend.group_exists("org:ETB01:6A"));
}

#[tokio::test]
async fn test_recoverable_errors_do_not_stop_a_batch() {
    let fixture = Fixture::school();
    // A folder already holds the name of the group
    fixture.backend.seed_folder("org:root:ETB01:6A");
    let job = |id: &str, class: &str| Job::Add {
        subject: SubjectDescription::new(id, PersonType::Student, values(&["ETB01", class])),
    };

    let report = BatchRunner::new(Arc::clone(&fixture.service))
        .with_workers(1)
        .run(vec![job("clash", "6A"), job("jdoe", "5B")])
        .await;

    assert!(!report.aborted);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert!(!report.results[0].fatal);
    assert!(report.results[0].message.contains("Already exists"));
    assert_eq!(
        fixture.backend.members_of("org:root:ETB01:5B"),
        vec![Subject::person("jdoe")]
    );
}
