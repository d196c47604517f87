#[cfg(test)]
mod tests {
    use crate::fixture::{Call, FakeClient, init_tracing};
    use connectors::table::ColumnType;
    use engine_core::checkpoint::CheckpointStore;
    use engine_runtime::{
        engine::MigrationEngine, error::MigrationError, options::MigrateOptions,
    };
    use model::{
        key::MigrationKey,
        status::MigrationStatus,
        strategy::{FileVersionStrategy, TableStrategy},
    };
    use tempfile::{TempDir, tempdir};

    const TARGET: i64 = 9000;

    fn options(dir: &TempDir) -> MigrateOptions {
        let mut options = MigrateOptions::new(TARGET, dir.path().join("migration.db"));
        // a two-thread pool serializes entity copies, making call order
        // deterministic for the sequence assertions below
        options.thread_count = 2;
        options.batch_size = 8;
        options
    }

    fn open_store(dir: &TempDir) -> CheckpointStore {
        CheckpointStore::open_read_only(dir.path().join("migration.db")).unwrap()
    }

    fn status_of(store: &CheckpointStore, key: &MigrationKey) -> MigrationStatus {
        store
            .scan_outcomes(0, 100)
            .unwrap()
            .into_iter()
            .find(|row| &row.key == key)
            .unwrap_or_else(|| panic!("no checkpoint row for {key}"))
            .status
    }

    #[tokio::test]
    async fn dry_run_indexes_without_remote_mutations() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF", &[("fh-1", 1)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        assert!(options.dry_run, "dry run is the default");

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.indexed_total, 1);
        assert_eq!(result.migrated_total, 0);
        assert_eq!(result.error_total, 0);
        assert_eq!(client.mutation_calls(), 0);

        let store = open_store(&dir);
        assert!(store.has_indexed("synP").unwrap());
        let outcomes = store.scan_outcomes(0, 10).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].key, MigrationKey::file("synF", None));
        assert_eq!(outcomes[0].status, MigrationStatus::Indexed);
        assert_eq!(outcomes[0].from_file_handle_id.as_deref(), Some("fh-1"));
    }

    #[tokio::test]
    async fn new_version_migration_copies_and_stores_once() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF", &[("fh-1", 1)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.migrated_total, 1);
        assert_eq!(result.error_total, 0);
        assert_eq!(client.copies(), vec!["fh-1"]);
        assert_eq!(
            client
                .calls()
                .iter()
                .filter(|call| matches!(call, Call::StoreEntity { .. }))
                .count(),
            1
        );

        let store = open_store(&dir);
        let outcomes = store.scan_outcomes(0, 10).unwrap();
        assert_eq!(outcomes[0].status, MigrationStatus::Migrated);
        assert_eq!(outcomes[0].to_file_handle_id.as_deref(), Some("fh-copy-1"));
    }

    #[tokio::test]
    async fn all_versions_migrate_in_ascending_order() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF", &[("fh-a", 1), ("fh-b", 1), ("fh-c", 2)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::All);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.indexed_total, 3);
        assert_eq!(result.migrated_total, 3);
        assert_eq!(client.copies(), vec!["fh-a", "fh-b", "fh-c"]);
        assert_eq!(
            client.puts(),
            vec![
                "/entity/synF/version/1/filehandle",
                "/entity/synF/version/2/filehandle",
                "/entity/synF/version/3/filehandle",
            ]
        );
    }

    #[tokio::test]
    async fn snapshot_precedes_every_cell_copy_of_its_table() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        for (table, handles) in [("synT1", ["fh-t1a", "fh-t1b"]), ("synT2", ["fh-t2a", "fh-t2b"])]
        {
            client.add_table(
                "synP",
                table,
                &[
                    (10, "attachment", ColumnType::FileHandleId),
                    (99, "label", ColumnType::String),
                ],
            );
            client.add_table_row(table, 1, 1, &[(10, handles[0], 1)]);
            client.add_table_row(table, 2, 1, &[(10, handles[1], 1)]);
        }

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.table_strategy = Some(TableStrategy::Snapshot);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.indexed_total, 4);
        assert_eq!(result.migrated_total, 4);
        assert_eq!(client.snapshots(), vec!["synT1", "synT2"]);

        // snapshot then both cells, one table after the other
        let ordered: Vec<Call> = client
            .calls()
            .into_iter()
            .filter(|call| {
                matches!(call, Call::CreateSnapshot { .. } | Call::MultipartCopy { .. })
            })
            .collect();
        let summary: Vec<String> = ordered
            .iter()
            .map(|call| match call {
                Call::CreateSnapshot { id } => format!("snapshot {id}"),
                Call::MultipartCopy { file_handle_id, .. } => format!("copy {file_handle_id}"),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                "snapshot synT1",
                "copy fh-t1a",
                "copy fh-t1b",
                "snapshot synT2",
                "copy fh-t2a",
                "copy fh-t2b",
            ]
        );
    }

    #[tokio::test]
    async fn nosnapshot_strategy_never_snapshots() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_table("synP", "synT", &[(10, "attachment", ColumnType::FileHandleId)]);
        client.add_table_row("synT", 1, 1, &[(10, "fh-t1", 1)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.table_strategy = Some(TableStrategy::NoSnapshot);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.migrated_total, 1);
        assert!(client.snapshots().is_empty());
    }

    #[tokio::test]
    async fn continue_on_error_records_the_failure_and_keeps_going() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF1", &[("fh-1", 1)]);
        client.add_file("synP", "synF2", &[("fh-2", 1)]);
        client.add_file("synP", "synF3", &[("fh-3", 1)]);
        client.fail_copy("fh-2");

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        options.dry_run = false;
        options.continue_on_error = true;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.migrated_total, 2);
        assert_eq!(result.error_total, 1);

        let store = open_store(&dir);
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF1", None)),
            MigrationStatus::Migrated
        );
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF3", None)),
            MigrationStatus::Migrated
        );
        let errored = store
            .scan_outcomes(0, 10)
            .unwrap()
            .into_iter()
            .find(|row| row.key.id == "synF2")
            .unwrap();
        assert_eq!(errored.status, MigrationStatus::Errored);
        let trace = errored.exception.unwrap();
        assert!(trace.contains("simulated copy failure for fh-2"), "{trace}");
    }

    #[tokio::test]
    async fn first_failure_aborts_when_continue_on_error_is_off() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF1", &[("fh-1", 1)]);
        client.add_file("synP", "synF2", &[("fh-2", 1)]);
        client.add_file("synP", "synF3", &[("fh-3", 1)]);
        client.fail_copy("fh-2");

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let err = engine.run("synP").await.unwrap_err();
        assert!(matches!(err, MigrationError::Client(_)), "{err}");

        // the failing row's outcome is durable, later work was not dispatched
        let store = open_store(&dir);
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF1", None)),
            MigrationStatus::Migrated
        );
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF2", None)),
            MigrationStatus::Errored
        );
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF3", None)),
            MigrationStatus::Indexed
        );
        assert!(!client.copies().contains(&"fh-3".to_string()));
    }

    #[tokio::test]
    async fn payloads_already_at_the_target_are_not_copied() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF1", &[("fh-1", 1)]);
        client.add_file("synP", "synF2", &[("fh-2", TARGET)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        assert_eq!(result.migrated_total, 1);
        assert_eq!(client.copies(), vec!["fh-1"]);

        let store = open_store(&dir);
        assert_eq!(
            status_of(&store, &MigrationKey::file("synF2", None)),
            MigrationStatus::AlreadyMigrated
        );
    }

    #[tokio::test]
    async fn missing_strategies_are_rejected_before_any_checkpoint_write() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");

        let dir = tempdir().unwrap();
        let options = options(&dir);
        let db_path = options.db_path.clone();

        let engine = MigrationEngine::new(client.clone(), options);
        let err = engine.run("synP").await.unwrap_err();

        assert!(matches!(err, MigrationError::Validation(_)), "{err}");
        assert!(client.calls().is_empty());
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn unowned_storage_location_is_rejected_before_any_checkpoint_write() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.deny_storage_location(TARGET);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);
        let db_path = options.db_path.clone();

        let engine = MigrationEngine::new(client.clone(), options);
        let err = engine.run("synP").await.unwrap_err();

        assert!(matches!(err, MigrationError::Validation(_)), "{err}");
        assert_eq!(client.calls(), vec![Call::GetStorageLocation { id: TARGET }]);
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn folders_are_walked_depth_first() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_folder("synP", "synD1");
        client.add_file("synD1", "synF1", &[("fh-1", 1)]);
        client.add_folder("synP", "synD2");
        client.add_file("synD2", "synF2", &[("fh-2", 1)]);

        let dir = tempdir().unwrap();
        let mut options = options(&dir);
        options.file_version_strategy = Some(FileVersionStrategy::New);

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();
        assert_eq!(result.indexed_total, 2);

        let store = open_store(&dir);
        for id in ["synP", "synD1", "synD2"] {
            assert!(store.has_indexed(id).unwrap(), "{id} should be indexed");
        }
    }
}
