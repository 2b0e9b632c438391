//! Engine tests over the in-memory store

use super::*;
use graphseed_store::{
    CollectionKind, Credentials, FaultPoint, MemoryStore, StoreError, StoreOp,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_key", default)]
    key: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Follow {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_from")]
    from: String,
    #[serde(rename = "_to")]
    to: String,
}

fn user(key: &str, name: &str) -> User {
    User {
        key: key.to_string(),
        name: name.to_string(),
    }
}

fn follow(key: &str, from: &str, to: &str) -> Follow {
    Follow {
        key: key.to_string(),
        from: format!("users/{from}"),
        to: format!("users/{to}"),
    }
}

fn root() -> Credentials {
    Credentials::new("root", "rootpw")
}

fn connection() -> ConnectionConfig {
    ConnectionConfig {
        endpoint: "http://localhost:8529".to_string(),
        database: "app".to_string(),
        user: "app".to_string(),
        password: "apppw".to_string(),
    }
}

/// A manager whose database already exists.
fn manager<S: SeedSet>(server: &MemoryStore, seeds: S) -> SeedManager<MemoryStore, S> {
    let mut manager = SeedManager::new(server.handle(), seeds, connection());
    manager.create(&root()).unwrap();
    manager
}

fn users(records: Vec<User>) -> SeedRegistry {
    SeedRegistry::new().with(CollectionBinding::new("Users", records))
}

/// Seed set with a scalar setting next to its collections.
struct AppSeeds {
    region: String,
    users: CollectionBinding<User>,
    follows: CollectionBinding<Follow>,
}

impl SeedSet for AppSeeds {
    fn collections_mut(&mut self) -> Vec<&mut dyn SeedCollection> {
        vec![
            &mut self.users as &mut dyn SeedCollection,
            &mut self.follows as &mut dyn SeedCollection,
        ]
    }
}

fn app_seeds() -> AppSeeds {
    AppSeeds {
        region: "eu".to_string(),
        users: CollectionBinding::new("Users", vec![user("u1", "Ann"), user("u2", "Ben")]),
        follows: CollectionBinding::new("Follows", vec![follow("f1", "u1", "u2")]),
    }
}

// ============================================================================
// Inspector
// ============================================================================

#[test]
fn test_collection_names_lower_case_first_letter_only() {
    assert_eq!(collection_name("Foo"), "foo");
    assert_eq!(collection_name("FooBar"), "fooBar");
    assert_eq!(collection_name("URLs"), "uRLs");
    assert_eq!(collection_name("users"), "users");
}

proptest! {
    #[test]
    fn prop_collection_name_keeps_tail(field in "[A-Z][A-Za-z0-9_]{0,16}") {
        let name = collection_name(&field);
        prop_assert_eq!(&name[1..], &field[1..]);
        prop_assert_eq!(name.chars().next(), field.chars().next().map(|c| c.to_ascii_lowercase()));
    }
}

#[test]
fn test_kind_is_inferred_from_type_without_records() {
    let follows: CollectionBinding<Follow> = CollectionBinding::new("Follows", Vec::new());
    assert_eq!(follows.kind().unwrap(), CollectionKind::Edge);

    let users: CollectionBinding<User> = CollectionBinding::new("Users", Vec::new());
    assert_eq!(users.kind().unwrap(), CollectionKind::Document);
}

#[test]
fn test_inspect_follows_declaration_order_and_skips_scalars() {
    let mut seeds = app_seeds();
    assert_eq!(seeds.region, "eu");
    let descriptors = inspect(&mut seeds).unwrap();
    let summary: Vec<(&str, CollectionKind)> = descriptors
        .iter()
        .map(|d| (d.name.as_str(), d.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("users", CollectionKind::Document),
            ("follows", CollectionKind::Edge)
        ]
    );
}

#[test]
fn test_inspect_reads_policies() {
    let mut seeds = SeedRegistry::new()
        .with(CollectionBinding::<User>::new("Users", vec![]).key_only())
        .with(CollectionBinding::<Follow>::new("Follows", vec![]).force_update());
    let descriptors = inspect(&mut seeds).unwrap();
    assert_eq!(descriptors[0].match_policy, MatchPolicy::KeyOnly);
    assert_eq!(descriptors[0].write_policy, WritePolicy::InsertIgnore);
    assert_eq!(descriptors[1].match_policy, MatchPolicy::Full);
    assert_eq!(descriptors[1].write_policy, WritePolicy::UpsertReplace);
}

#[test]
fn test_non_struct_records_are_configuration_errors() {
    let mut seeds = SeedRegistry::new().with(CollectionBinding::new("Names", vec!["ann".to_string()]));
    let err = inspect(&mut seeds).unwrap_err();
    assert!(matches!(err, SeedError::Configuration(_)));
    assert!(err.to_string().contains("not a struct"));
}

#[test]
fn test_empty_field_name_is_rejected() {
    let mut seeds = SeedRegistry::new().with(CollectionBinding::<User>::new("", vec![]));
    let err = inspect(&mut seeds).unwrap_err();
    assert!(err.to_string().contains("invalid seed field name"));
}

#[test]
fn test_fields_mapping_to_one_collection_are_rejected() {
    let mut seeds = SeedRegistry::new()
        .with(CollectionBinding::<User>::new("Users", vec![]))
        .with(CollectionBinding::<User>::new("users", vec![]));
    let err = inspect(&mut seeds).unwrap_err();
    assert!(err.to_string().contains("declared twice"));
}

#[test]
fn test_registry_debug_lists_field_names() {
    let seeds = SeedRegistry::new()
        .with(CollectionBinding::<User>::new("Users", vec![]))
        .with(CollectionBinding::<Follow>::new("Follows", vec![]));
    assert_eq!(format!("{seeds:?}"), r#"["Users", "Follows"]"#);
}

// ============================================================================
// Migrate
// ============================================================================

#[test]
fn test_migrate_creates_collections_with_kinds() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());

    let reports = manager.migrate().unwrap();
    assert!(reports.iter().all(|r| r.outcome == Provisioned::Created));
    assert_eq!(
        server.collection_kind("app", "users"),
        Some(CollectionKind::Document)
    );
    assert_eq!(
        server.collection_kind("app", "follows"),
        Some(CollectionKind::Edge)
    );
}

#[test]
fn test_migrate_twice_absorbs_duplicates() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    manager.migrate().unwrap();

    let reports = manager.migrate().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| r.outcome == Provisioned::AlreadyExisted));
}

#[test]
fn test_migrate_failure_names_collection_and_keeps_earlier_ones() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    server.fail_next(
        FaultPoint::CreateCollection("follows".to_string()),
        StoreError::Transport("connection reset".to_string()),
    );

    let err = manager.migrate().unwrap_err();
    assert!(err.to_string().contains("collection `follows`"));
    assert_eq!(
        err.store_error(),
        Some(&StoreError::Transport("connection reset".to_string()))
    );
    assert_eq!(server.collection_names("app"), vec!["users".to_string()]);
}

// ============================================================================
// Sync and load
// ============================================================================

#[test]
fn test_sync_writes_only_keyed_records() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, users(vec![user("u1", "Ann"), user("", "Bob")]));
    manager.migrate().unwrap();

    let summary = manager.sync_seeds().unwrap();
    let stats = summary.get("users").unwrap();
    assert_eq!((stats.declared, stats.eligible, stats.mirrored), (2, 1, 1));

    let stored = server.documents("app", "users").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["_key"], "u1");
    assert_eq!(
        manager.seeds().mirror::<User>("users").unwrap(),
        &[user("u1", "Ann")][..]
    );
}

#[test]
fn test_sync_twice_keeps_record_count() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    manager.migrate().unwrap();

    manager.sync_seeds().unwrap();
    manager.sync_seeds().unwrap();
    assert_eq!(server.documents("app", "users").unwrap().len(), 2);
    assert_eq!(server.documents("app", "follows").unwrap().len(), 1);
    assert_eq!(manager.seeds().follows.mirror(), &[follow("f1", "u1", "u2")][..]);
}

#[test]
fn test_force_update_replaces_changed_record() {
    let server = MemoryStore::new(root());
    let seeds = SeedRegistry::new()
        .with(CollectionBinding::new("Users", vec![user("u1", "Ann")]).force_update());
    let mut manager = manager(&server, seeds);
    manager.migrate().unwrap();
    manager.sync_seeds().unwrap();

    manager
        .seeds_mut()
        .binding_mut::<User>("users")
        .unwrap()
        .local_mut()[0]
        .name = "Anne".to_string();
    manager.sync_seeds().unwrap();

    assert_eq!(
        manager.seeds().mirror::<User>("users").unwrap(),
        &[user("u1", "Anne")][..]
    );
    let stored = server.documents("app", "users").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["name"], "Anne");
}

#[test]
fn test_insert_ignore_keeps_stored_version() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, users(vec![user("u1", "Ann")]));
    manager.migrate().unwrap();
    manager.sync_seeds().unwrap();

    manager
        .seeds_mut()
        .binding_mut::<User>("users")
        .unwrap()
        .local_mut()[0]
        .name = "Anne".to_string();
    let err = manager.sync_seeds().unwrap_err();

    assert!(matches!(
        err,
        SeedError::Shortfall { ref collection, expected: 1, found: 0 } if collection == "users"
    ));
    assert_eq!(server.documents("app", "users").unwrap()[0]["name"], "Ann");
}

#[test]
fn test_key_only_match_ignores_attribute_drift() {
    let server = MemoryStore::new(root());
    let seeds = SeedRegistry::new()
        .with(CollectionBinding::new("Users", vec![user("u1", "Ann")]).key_only());
    let mut manager = manager(&server, seeds);
    manager.migrate().unwrap();
    server
        .insert_document("app", "users", serde_json::json!({"_key": "u1", "name": "Changed"}))
        .unwrap();

    manager.sync_seeds().unwrap();
    assert_eq!(
        manager.seeds().mirror::<User>("users").unwrap(),
        &[user("u1", "Changed")][..]
    );
}

#[test]
fn test_load_without_sync_reports_shortfall() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    manager.migrate().unwrap();

    let err = manager.load_distant_seed().unwrap_err();
    match err {
        SeedError::Shortfall {
            collection,
            expected,
            found,
        } => {
            assert_eq!(collection, "users");
            assert_eq!((expected, found), (2, 0));
        }
        other => panic!("expected shortfall, got {other}"),
    }
}

#[test]
fn test_load_resets_mirrors_before_refreshing() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    manager.migrate().unwrap();
    manager.sync_seeds().unwrap();
    assert_eq!(manager.seeds().follows.mirror().len(), 1);

    server.remove_document("app", "users", "u2");
    assert!(manager.load_distant_seed().is_err());
    // Users failed verification; follows was never reached and stays empty.
    assert_eq!(manager.seeds().users.mirror(), &[user("u1", "Ann")][..]);
    assert!(manager.seeds().follows.mirror().is_empty());
}

#[test]
fn test_empty_collections_are_not_queried() {
    let server = MemoryStore::new(root());
    let seeds = SeedRegistry::new()
        .with(CollectionBinding::<User>::new("Users", vec![]))
        .with(CollectionBinding::new("Follows", vec![follow("f1", "u1", "u2")]));
    let mut manager = manager(&server, seeds);
    manager.migrate().unwrap();
    server.clear_journal();

    let summary = manager.sync_seeds().unwrap();
    assert_eq!(summary.get("users").unwrap().mirrored, 0);
    assert_eq!(summary.total_mirrored(), 1);
    assert!(server.journal().iter().all(|entry| !matches!(
        &entry.op,
        StoreOp::Read(c) | StoreOp::Write(c) if c == "users"
    )));
}

#[test]
fn test_duplicate_local_keys_are_configuration_errors() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, users(vec![user("u1", "Ann"), user("u1", "Ann")]));
    manager.migrate().unwrap();

    let err = manager.sync_seeds().unwrap_err();
    assert!(matches!(err, SeedError::Configuration(_)));
    assert!(err.to_string().contains("duplicate _key `u1`"));
    assert!(server.documents("app", "users").unwrap().is_empty());
}

#[test]
fn test_write_failure_stops_later_collections() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, app_seeds());
    manager.migrate().unwrap();
    server.fail_next(
        FaultPoint::Write("users".to_string()),
        StoreError::Unauthorized,
    );

    let err = manager.sync_seeds().unwrap_err();
    assert!(err.to_string().contains("collection `users`"));
    assert!(server.documents("app", "follows").unwrap().is_empty());
}

#[test]
fn test_invalid_edges_fail_verification() {
    let server = MemoryStore::new(root());
    let seeds = SeedRegistry::new().with(CollectionBinding::new(
        "Follows",
        vec![Follow {
            key: "f1".to_string(),
            from: "u1".to_string(),
            to: "u2".to_string(),
        }],
    ));
    let mut manager = manager(&server, seeds);
    manager.migrate().unwrap();

    // Insert-ignore swallows the rejected edge; verification catches it.
    let err = manager.sync_seeds().unwrap_err();
    assert!(matches!(err, SeedError::Shortfall { .. }));
}

/// Edges listed before the documents they point at.
struct EdgesFirst {
    users: CollectionBinding<User>,
    follows: CollectionBinding<Follow>,
}

impl SeedSet for EdgesFirst {
    fn collections_mut(&mut self) -> Vec<&mut dyn SeedCollection> {
        vec![
            &mut self.follows as &mut dyn SeedCollection,
            &mut self.users as &mut dyn SeedCollection,
        ]
    }
}

#[test]
fn test_declared_order_drives_every_phase() {
    let server = MemoryStore::new(root());
    let seeds = EdgesFirst {
        users: CollectionBinding::new("Users", vec![user("u1", "Ann"), user("u2", "Ben")]),
        follows: CollectionBinding::new("Follows", vec![follow("f1", "u1", "u2")]),
    };
    let mut manager = manager(&server, seeds);

    let created: Vec<String> = manager
        .migrate()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(created, vec!["follows".to_string(), "users".to_string()]);

    match manager.load_distant_seed().unwrap_err() {
        SeedError::Shortfall {
            collection,
            expected,
            ..
        } => assert_eq!((collection.as_str(), expected), ("follows", 1)),
        other => panic!("expected shortfall, got {other}"),
    }

    let summary = manager.sync_seeds().unwrap();
    let order: Vec<&str> = summary.collections.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(order, vec!["follows", "users"]);
    assert_eq!(manager.seeds().follows.mirror(), &[follow("f1", "u1", "u2")][..]);
    assert_eq!(
        manager.seeds().users.mirror(),
        &[user("u1", "Ann"), user("u2", "Ben")][..]
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_create_tolerates_existing_database() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, SeedRegistry::new());
    assert_eq!(
        manager.create(&root()).unwrap(),
        Provisioned::AlreadyExisted
    );
}

#[test]
fn test_create_failure_still_restores_credentials() {
    let server = MemoryStore::new(root());
    let mut manager = SeedManager::new(server.handle(), app_seeds(), connection());
    server.fail_next(
        FaultPoint::CreateDatabase,
        StoreError::Transport("timeout".to_string()),
    );

    assert!(manager.create(&root()).is_err());
    assert_eq!(manager.executor().current_user(), "app");
    assert_eq!(manager.executor().current_database(), "app");

    manager.create(&root()).unwrap();
    server.clear_journal();
    manager.migrate().unwrap();
    for entry in server.journal() {
        assert_eq!((entry.user.as_str(), entry.database.as_str()), ("app", "app"));
        assert!(entry.ok);
    }
}

#[test]
fn test_admin_operations_run_as_admin_on_system() {
    let server = MemoryStore::new(root());
    let mut manager = manager(&server, SeedRegistry::new());
    server.clear_journal();

    manager.drop_database(&root()).unwrap();
    let journal = server.journal();
    assert_eq!(journal[0].op, StoreOp::DropDatabase("app".to_string()));
    assert_eq!(journal[0].user, "root");
    assert_eq!(journal[0].database, "_system");
    assert!(!server.database_exists("app"));
}

#[test]
fn test_drop_missing_database_propagates() {
    let server = MemoryStore::new(root());
    let mut manager = SeedManager::new(server.handle(), SeedRegistry::new(), connection());

    let err = manager.drop_database(&root()).unwrap_err();
    assert!(matches!(
        err.store_error(),
        Some(StoreError::DatabaseNotFound(_))
    ));
    assert!(err.to_string().contains("database `app`"));
    assert_eq!(manager.executor().current_user(), "app");
}

#[test]
fn test_wrong_admin_password_is_reported() {
    let server = MemoryStore::new(root());
    let mut manager = SeedManager::new(server.handle(), SeedRegistry::new(), connection());
    let err = manager
        .create(&Credentials::new("root", "wrong"))
        .unwrap_err();
    assert_eq!(err.store_error(), Some(&StoreError::Unauthorized));
    assert!(!server.database_exists("app"));
}

#[test]
fn test_elevated_scope_restores_on_drop() {
    let server = MemoryStore::new(root());
    let mut session = server.connect(Credentials::new("app", "apppw"), "app");
    {
        let scope = ElevatedScope::enter(
            &mut session,
            root(),
            Credentials::new("app", "apppw"),
            "app",
        );
        assert_eq!(scope.current_user(), "root");
        assert_eq!(scope.current_database(), "_system");
    }
    assert_eq!(session.current_user(), "app");
    assert_eq!(session.current_database(), "app");
}

#[test]
fn test_connection_debug_redacts_password() {
    let shown = format!("{:?}", connection());
    assert!(shown.contains("app"));
    assert!(!shown.contains("apppw"));
}
