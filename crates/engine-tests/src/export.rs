#[cfg(test)]
mod tests {
    use crate::fixture::{FakeClient, init_tracing};
    use connectors::table::ColumnType;
    use engine_runtime::{engine::MigrationEngine, options::MigrateOptions};
    use model::strategy::{FileVersionStrategy, TableStrategy};
    use std::collections::HashMap;
    use tempfile::tempdir;

    const TARGET: i64 = 9000;

    #[tokio::test]
    async fn cursor_streams_outcomes_and_resolves_column_names_once() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_table(
            "synP",
            "synT",
            &[(10, "attachment", ColumnType::FileHandleId)],
        );
        client.add_table_row("synT", 1, 1, &[(10, "fh-t1", 1)]);
        client.add_table_row("synT", 2, 1, &[(10, "fh-t2", 1)]);

        let dir = tempdir().unwrap();
        let mut options = MigrateOptions::new(TARGET, dir.path().join("migration.db"));
        options.table_strategy = Some(TableStrategy::NoSnapshot);
        options.thread_count = 2;
        options.dry_run = false;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();
        assert_eq!(result.migrated_total, 2);

        let mut cursor = result.migrations().unwrap();
        let mut records = Vec::new();
        while let Some(record) = cursor.try_next().await.unwrap() {
            records.push(record);
        }

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.kind, "table");
            assert_eq!(record.col_name.as_deref(), Some("attachment"));
            assert_eq!(record.status, "MIGRATED");
        }
        // memoized: one lookup despite two cells of the same column
        let lookups = client
            .calls()
            .iter()
            .filter(|call| matches!(call, crate::fixture::Call::GetColumn { .. }))
            .count();
        assert_eq!(lookups, 1);
    }

    #[tokio::test]
    async fn csv_export_writes_the_fixed_header_and_empty_missing_fields() {
        init_tracing();
        let client = FakeClient::new();
        client.add_project("synP");
        client.add_file("synP", "synF1", &[("fh-1", 1)]);
        client.add_file("synP", "synF2", &[("fh-2", 1)]);
        client.fail_copy("fh-2");

        let dir = tempdir().unwrap();
        let mut options = MigrateOptions::new(TARGET, dir.path().join("migration.db"));
        options.file_version_strategy = Some(FileVersionStrategy::New);
        options.thread_count = 2;
        options.dry_run = false;
        options.continue_on_error = true;

        let engine = MigrationEngine::new(client.clone(), options);
        let result = engine.run("synP").await.unwrap();

        let report_path = dir.path().join("report.csv");
        result.export_csv(&report_path).await.unwrap();

        let mut reader = csv::Reader::from_path(&report_path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec![
                "id",
                "type",
                "version",
                "row_id",
                "col_name",
                "from_storage_location_id",
                "from_file_handle_id",
                "to_file_handle_id",
                "status",
                "exception",
            ])
        );

        let rows: HashMap<String, csv::StringRecord> = reader
            .records()
            .map(|record| {
                let record = record.unwrap();
                (record[0].to_string(), record)
            })
            .collect();
        assert_eq!(rows.len(), 2);

        let migrated = &rows["synF1"];
        assert_eq!(&migrated[1], "file");
        assert_eq!(&migrated[2], "", "no version for a new-version row");
        assert_eq!(&migrated[4], "", "no column name for a file row");
        assert_eq!(&migrated[8], "MIGRATED");
        assert_eq!(&migrated[9], "");

        let errored = &rows["synF2"];
        assert_eq!(&errored[7], "", "no new handle on a failed copy");
        assert_eq!(&errored[8], "ERRORED");
        assert!(errored[9].contains("simulated copy failure for fh-2"));
    }
}
