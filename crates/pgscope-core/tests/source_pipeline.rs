mod common;

use common::{dataset_urn, job_names, lineage, FakeDatabase, FakeServer};
use pgscope_core::{
    AllowDenyPattern, LineageGate, MetadataRecord, PostgresConfig, PostgresSource, SourceError,
};

fn sales() -> FakeDatabase {
    FakeDatabase::new()
        .schema("public")
        .schema("audit")
        .table("public", "orders", &[("id", "integer"), ("total", "numeric(12,2)")])
        .table("public", "customers", &[("id", "integer"), ("tags", "text[]")])
        .view("public", "order_totals", "SELECT o.id, o.total FROM orders o")
        .view("public", "vip", "SELECT id FROM customers WHERE (((")
        .view("audit", "recent", "SELECT * FROM ONLY LATERAL (((")
        .procedure("public", "refresh_totals")
        .procedure("public", "tmp_cleanup")
        .edge("customers", "public", "vip", "public")
        .edge("orders", "public", "recent", "audit")
        .edge("order_totals", "public", "recent", "audit")
}

fn server() -> FakeServer {
    FakeServer::new("postgres")
        .database("postgres", FakeDatabase::new().schema("public"))
        .database("sales", sales())
}

#[test]
fn test_full_run_over_all_databases() {
    let server = server();
    let mut source = PostgresSource::new(PostgresConfig::default(), server.clone());

    let units: Vec<_> = source
        .workunits()
        .collect::<Result<_, SourceError>>()
        .unwrap();

    assert_eq!(job_names(&units), ["refresh_totals", "tmp_cleanup"]);
    assert_eq!(
        lineage(&units),
        vec![
            (
                dataset_urn("sales.public.order_totals"),
                vec![dataset_urn("sales.public.orders")],
            ),
            (
                dataset_urn("sales.public.vip"),
                vec![dataset_urn("sales.public.customers")],
            ),
            (
                dataset_urn("sales.audit.recent"),
                vec![
                    dataset_urn("sales.public.orders"),
                    dataset_urn("sales.public.order_totals"),
                ],
            ),
        ]
    );

    let report = source.report();
    assert_eq!(report.databases_scanned, 2);
    assert_eq!(report.schemas_scanned, 3);
    assert_eq!(report.procedures_scanned, 2);
    assert_eq!(report.tables_scanned, 2);
    assert_eq!(report.views_scanned, 3);
    assert!(report.warnings.is_empty());
    assert!(!report.has_failures());
    assert_eq!(
        source.unresolved_views().iter().collect::<Vec<_>>(),
        ["sales.audit.recent", "sales.public.vip"]
    );

    // Bootstrap listing, then one connection per database in each pass.
    assert_eq!(server.opened(), 5);
    assert_eq!(server.max_live(), 1);
    assert_eq!(server.live(), 0);
}

#[test]
fn test_lineage_follows_reflection_of_every_database() {
    let server = server();
    let mut source = PostgresSource::new(PostgresConfig::default(), server.clone());

    let units: Vec<_> = source.workunits().map(Result::unwrap).collect();

    let first_fallback = units
        .iter()
        .position(|unit| {
            matches!(&unit.record, MetadataRecord::UpstreamLineage(l)
                if l.dataset == dataset_urn("sales.public.vip"))
        })
        .unwrap();
    let last_dataset = units
        .iter()
        .rposition(|unit| matches!(unit.record, MetadataRecord::Dataset(_)))
        .unwrap();
    assert!(first_fallback > last_dataset);
}

#[test]
fn test_patterns_filter_databases_views_and_procedures() {
    let server = server();
    let config = PostgresConfig {
        database_pattern: AllowDenyPattern::deny(&["postgres"]).unwrap(),
        view_pattern: AllowDenyPattern::deny(&["recent", ".*\\.recent$"]).unwrap(),
        procedure_pattern: AllowDenyPattern::deny(&["sales\\.public\\.tmp_"]).unwrap(),
        ..Default::default()
    };
    let mut source = PostgresSource::new(config, server.clone());

    let units: Vec<_> = source.workunits().map(Result::unwrap).collect();

    assert_eq!(job_names(&units), ["refresh_totals"]);
    assert!(lineage(&units)
        .iter()
        .all(|(dataset, _)| dataset != &dataset_urn("sales.audit.recent")));

    let report = source.report();
    assert_eq!(report.dropped_count("postgres"), 1);
    assert_eq!(report.dropped_count("sales.public.vip"), 0);
    assert_eq!(report.dropped_count("sales.public.tmp_cleanup"), 1);
    assert_eq!(report.dropped_count("sales.audit.recent"), 1);
    assert_eq!(report.databases_scanned, 1);
}

#[test]
fn test_denied_view_is_dropped_once_across_both_passes() {
    // `w` cannot be parsed, so the dependency-graph pass runs and sees `tmp_v` too.
    let server = FakeServer::new("d").database(
        "d",
        FakeDatabase::new()
            .schema("public")
            .table("public", "t", &[("id", "integer")])
            .view("public", "tmp_v", "SELECT id FROM t")
            .view("public", "w", "SELECT FROM WHERE (((")
            .edge("t", "public", "tmp_v", "public")
            .edge("t", "public", "w", "public"),
    );
    let config = PostgresConfig {
        database: Some("d".into()),
        view_pattern: AllowDenyPattern::deny(&["tmp_", ".*\\.tmp_"]).unwrap(),
        ..Default::default()
    };
    let mut source = PostgresSource::new(config, server);

    let units: Vec<_> = source.workunits().map(Result::unwrap).collect();

    assert_eq!(
        lineage(&units),
        vec![(dataset_urn("d.public.w"), vec![dataset_urn("d.public.t")])]
    );
    let report = source.report();
    assert_eq!(report.dropped, ["d.public.tmp_v"]);
    assert_eq!(report.dropped_count("d.public.tmp_v"), 1);
}

#[test]
fn test_broken_schema_does_not_stop_the_run() {
    let server = FakeServer::new("d").database(
        "d",
        FakeDatabase::new()
            .schema("broken")
            .schema("public")
            .broken_procedures("broken")
            .procedure("public", "p"),
    );
    let config = PostgresConfig {
        database: Some("d".to_string()),
        ..Default::default()
    };
    let mut source = PostgresSource::new(config, server);
    let units: Vec<_> = source.workunits().map(Result::unwrap).collect();

    assert_eq!(job_names(&units), ["p"]);
    let report = source.report();
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].context, "d.broken");
    assert_eq!(report.warnings[0].title, "Failed to get procedures for schema");
}

#[test]
fn test_unreachable_database_aborts_run() {
    let server = server().unreachable("archive");
    let mut source = PostgresSource::new(PostgresConfig::default(), server);

    let results: Vec<_> = source.workunits().collect();

    let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        SourceError::Connect { database, .. } if database == "archive"
    ));
    assert!(results.last().is_some_and(|r| r.is_err()));
}

#[test]
fn test_stop_at_first_resolved_gate() {
    let database = FakeDatabase::new()
        .schema("public")
        .view("public", "a_ok", "SELECT 1 FROM t")
        .view("public", "b_broken", "SELECT FROM WHERE (((")
        .edge("t", "public", "a_ok", "public")
        .edge("t", "public", "b_broken", "public");
    let server = FakeServer::new("d").database("d", database);

    let run = |gate| {
        let config = PostgresConfig {
            database: Some("d".to_string()),
            view_lineage_gate: gate,
            ..Default::default()
        };
        let mut source = PostgresSource::new(config, server.clone());
        let units: Vec<_> = source.workunits().map(Result::unwrap).collect();
        lineage(&units)
            .into_iter()
            .map(|(dataset, _)| dataset)
            .collect::<Vec<_>>()
    };

    let parsed = dataset_urn("d.public.a_ok");
    let fallback = dataset_urn("d.public.b_broken");
    assert_eq!(run(LineageGate::SkipResolved), [parsed.clone(), fallback]);
    assert_eq!(run(LineageGate::StopAtFirstResolved), [parsed]);
}

#[test]
fn test_profiled_sizes_reach_datasets() {
    let server = FakeServer::new("d").database(
        "d",
        FakeDatabase::new()
            .schema("public")
            .table("public", "orders", &[("id", "integer")])
            .size("public", "orders", 16384),
    );
    let config = PostgresConfig {
        database: Some("d".to_string()),
        profile_table_sizes: true,
        ..Default::default()
    };
    let mut source = PostgresSource::new(config, server);
    let units: Vec<_> = source.workunits().map(Result::unwrap).collect();

    let sizes: Vec<_> = units
        .iter()
        .filter_map(|unit| match &unit.record {
            MetadataRecord::Dataset(dataset) => Some(dataset.storage_bytes),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, [Some(16384)]);
    assert_eq!(source.profile_metadata().storage_bytes("d.public.orders"), Some(16384));
}
