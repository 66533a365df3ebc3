//! Integration tests: raw rows through normalization and analysis.

use fwaudit::{
    AddressSet, AnalysisConfig, CachedResolver, CancelToken, Error, ErrorKind, FilterCriteria,
    Normalizer, PolicyAnalyzer, RawRule, RedundancyEdge, Rule, ShadowEdge, ShadowKind,
    StaticResolver, Vendor,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn analyze(rows: &[RawRule]) -> (Vec<Rule>, fwaudit::AnalysisReport) {
    let outcome = Normalizer::new(StaticResolver::new()).normalize_batch(rows);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    let report = PolicyAnalyzer::new(AnalysisConfig::default())
        .unwrap()
        .analyze(&outcome.rules)
        .unwrap();
    (outcome.rules, report)
}

fn redundancy(narrower: &str, broader: &str, exact: bool) -> RedundancyEdge {
    RedundancyEdge {
        narrower_id: narrower.to_string(),
        broader_id: broader.to_string(),
        exact,
    }
}

fn shadow(shadowed: &str, shadower: &str, kind: ShadowKind, action_conflict: bool) -> ShadowEdge {
    ShadowEdge {
        shadowed_id: shadowed.to_string(),
        shadower_id: shadower.to_string(),
        kind,
        action_conflict,
    }
}

#[test]
fn test_subset_rule_is_redundant_and_shadowed() {
    let rows = vec![
        RawRule::new("Rule1", 1)
            .action("allow")
            .source(["10.0.0.0/24"])
            .destination(["any"])
            .service(["tcp/80"]),
        RawRule::new("Rule2", 5)
            .action("allow")
            .source(["10.0.0.5/32"])
            .destination(["any"])
            .service(["tcp/80"]),
    ];
    let (_, report) = analyze(&rows);

    assert_eq!(report.redundancy, vec![redundancy("Rule2", "Rule1", false)]);
    assert_eq!(
        report.shadow,
        vec![shadow("Rule2", "Rule1", ShadowKind::Full, false)]
    );
}

#[test]
fn test_conflicting_action_shadow_only() {
    let rows = vec![
        RawRule::new("Rule3", 2)
            .action("deny")
            .source(["10.0.0.0/24"])
            .destination(["any"])
            .service(["tcp/443"]),
        RawRule::new("Rule4", 6)
            .action("allow")
            .source(["10.0.0.128/25"])
            .destination(["any"])
            .service(["tcp/443"]),
    ];
    let (_, report) = analyze(&rows);

    assert!(report.redundancy.is_empty());
    assert_eq!(
        report.shadow,
        vec![shadow("Rule4", "Rule3", ShadowKind::Full, true)]
    );
}

#[test]
fn test_any_rule_and_filter_include_any() {
    let rows = vec![RawRule::new("Rule5", 1)
        .action("allow")
        .source(["any"])
        .destination(["any"])
        .service(["any"])];
    let (rules, _) = analyze(&rows);

    let query = AddressSet::parse_literals(&["192.168.1.100"]).unwrap();
    let criteria = FilterCriteria::new().source(query);
    assert!(fwaudit::filter_ids(&rules, &criteria).is_empty());

    let criteria = criteria.include_any(true);
    assert_eq!(fwaudit::filter_ids(&rules, &criteria), vec!["Rule5"]);
}

#[test]
fn test_identical_rules() {
    let row = |id: &str, order: i64| {
        RawRule::new(id, order)
            .action("allow")
            .source(["172.16.0.0/12"])
            .destination(["10.0.0.1"])
            .service(["udp/53"])
    };
    let (_, report) = analyze(&[row("Rule7", 4), row("Rule6", 3)]);

    assert_eq!(report.redundancy, vec![redundancy("Rule7", "Rule6", true)]);
    assert_eq!(
        report.shadow,
        vec![shadow("Rule7", "Rule6", ShadowKind::Full, false)]
    );
}

#[test]
fn test_disabled_rules_reported_as_skipped() {
    let rows = vec![
        RawRule::new("on", 1).action("allow").source(["10.0.0.0/8"]),
        RawRule::new("off", 2)
            .action("allow")
            .source(["10.0.0.1"])
            .enabled(false),
    ];
    let (_, report) = analyze(&rows);

    assert!(report.redundancy.is_empty());
    assert!(report.shadow.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].rule_id, "off");
}

#[test]
fn test_export_rows_with_objects() {
    let objects = r#"
addresses:
  web-servers: [10.0.1.10, 10.0.1.11]
  dmz: [web-servers, 10.0.2.0/24]
  loop-a: [loop-b]
  loop-b: [loop-a]
services:
  service-http: [tcp/80]
  web: [service-http, tcp/443]
"#;
    let rows = r#"[
        {"Rule Name": "allow-web", "Seq": "1", "Enable": "Y", "Action": "permit",
         "Source": "", "Destination": "dmz", "Service": "web"},
        {"Rule Name": "allow-http", "Seq": "2", "Enable": "Y", "Action": "accept",
         "Source": "any", "Destination": "web-servers", "Service": "service_http"},
        {"Rule Name": "broken", "Seq": "3", "Enable": "Y", "Action": "deny",
         "Source": "loop-a", "Destination": "any", "Service": "any"},
        {"Rule Name": "legacy", "Seq": "4", "Enable": "N", "Action": "deny",
         "Source": "10.9.9.9", "Destination": "any", "Service": "tcp/23"}
    ]"#;

    let rows: Vec<RawRule> = serde_json::from_str(rows).unwrap();
    let resolver = CachedResolver::new(StaticResolver::from_yaml_str(objects).unwrap());
    let outcome = Normalizer::new(&resolver)
        .with_vendor(Vendor::PaloAlto)
        .normalize_batch(&rows);

    assert_eq!(outcome.rules.len(), 3);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].row_index, 2);
    assert_eq!(outcome.diagnostics[0].error_kind, ErrorKind::CyclicReference);

    let report = PolicyAnalyzer::new(AnalysisConfig::default())
        .unwrap()
        .analyze(&outcome.rules)
        .unwrap();
    assert_eq!(
        report.redundancy,
        vec![redundancy("allow-http", "allow-web", false)]
    );
    assert_eq!(
        report.shadow,
        vec![shadow("allow-http", "allow-web", ShadowKind::Full, false)]
    );
    assert_eq!(report.skipped[0].rule_id, "legacy");
}

#[test]
fn test_application_and_user_columns_restrict_matches() {
    let rows = r#"[
        {"Rule Name": "web-app", "Seq": 1, "Enable": "Y", "Action": "allow",
         "Source": "10.0.0.0/24", "Destination": "any", "Service": "tcp/443",
         "Application": "web-browsing", "User": "any"},
        {"Rule Name": "ssl-app", "Seq": 2, "Enable": "Y", "Action": "allow",
         "Source": "10.0.0.5", "Destination": "any", "Service": "tcp/443",
         "Application": "SSL", "User": "any"},
        {"Rule Name": "any-app", "Seq": 3, "Enable": "Y", "Action": "allow",
         "Source": "10.0.0.5", "Destination": "any", "Service": "tcp/443",
         "Application": "any", "User": ""}
    ]"#;
    let rows: Vec<RawRule> = serde_json::from_str(rows).unwrap();
    let (_, report) = analyze(&rows);

    // Without the application column, ssl-app would be a full shadow of web-app.
    assert_eq!(
        report.redundancy,
        vec![redundancy("ssl-app", "any-app", false)]
    );
    assert_eq!(
        report.shadow,
        vec![
            shadow("any-app", "web-app", ShadowKind::Partial, false),
            shadow("any-app", "ssl-app", ShadowKind::Partial, false),
        ]
    );
}

#[test]
fn test_config_and_objects_from_files() {
    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(config_file, "vendor: paloalto\nbatch_size: 1\nthreads: 2").unwrap();
    let config = AnalysisConfig::from_path(config_file.path()).unwrap();

    let mut objects_file = NamedTempFile::new().unwrap();
    writeln!(objects_file, "services:\n  ssh-alt: [tcp/2222]").unwrap();
    let resolver = StaticResolver::from_path(objects_file.path()).unwrap();

    let rows = vec![
        RawRule::new("a", 1).action("deny").service(["tcp"]),
        RawRule::new("b", 2).action("allow").service(["ssh_alt"]),
    ];
    let outcome = Normalizer::from_config(&resolver, &config).normalize_batch(&rows);
    assert!(outcome.diagnostics.is_empty());

    let report = PolicyAnalyzer::new(config)
        .unwrap()
        .analyze(&outcome.rules)
        .unwrap();
    assert_eq!(report.shadow, vec![shadow("b", "a", ShadowKind::Full, true)]);
}

#[test]
fn test_cancelled_analysis_discards_results() {
    let rows: Vec<RawRule> = (0..50)
        .map(|i| {
            RawRule::new(&format!("r{}", i), i)
                .action("allow")
                .source([format!("10.0.{}.0/24", i)])
        })
        .collect();
    let outcome = Normalizer::new(StaticResolver::new()).normalize_batch(&rows);

    let cancel = CancelToken::new();
    let analyzer = PolicyAnalyzer::new(AnalysisConfig::default().with_batch_size(4))
        .unwrap()
        .with_cancel(cancel.clone());
    cancel.cancel();

    assert!(matches!(analyzer.analyze(&outcome.rules), Err(Error::Cancelled)));
}
