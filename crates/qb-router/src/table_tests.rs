// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const FIXTURE: &str = r#"
envelope "INGEST_ONLY" { steps = ["INGEST"] }
envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE", "SYMBOLS", "REFS"] }
envelope "LOCALIZATION" { steps = ["INGEST", "LOCALIZATION"] }

route { pattern = "common/traits/**" envelope = "SCRIPT_FULL" }
route { pattern = "localization/**/*.yml" envelope = "LOCALIZATION" }
route { pattern = "**/*.dds" envelope = "SKIP" }
route { pattern = "**" envelope = "INGEST_ONLY" }
"#;

#[test]
fn routes_by_first_match() {
    let table = RoutingTable::parse(FIXTURE).expect("valid table");
    let outcome = table.route("common/traits/00_traits.txt").expect("matched");
    assert_eq!(
        outcome,
        RouteOutcome::Route {
            envelope: Envelope::ScriptFull,
            steps: Envelope::ScriptFull.steps(),
        }
    );
}

#[test]
fn matching_is_case_and_slash_insensitive() {
    let table = RoutingTable::parse(FIXTURE).expect("valid table");
    let lower = table.route("common/traits/00_traits.txt").expect("matched");
    let upper = table
        .route(r"Common\Traits\00_Traits.txt")
        .expect("matched");
    assert_eq!(lower, upper);
}

#[test]
fn explicit_skip_is_not_an_error() {
    let table = RoutingTable::parse(FIXTURE).expect("valid table");
    let outcome = table.route("gfx/portraits/icon.dds").expect("matched");
    assert_eq!(outcome, RouteOutcome::Skip);
}

#[test]
fn catch_all_wins_when_nothing_specific_matches() {
    let table = RoutingTable::parse(FIXTURE).expect("valid table");
    let outcome = table.route("readme.txt").expect("matched");
    assert_eq!(
        outcome,
        RouteOutcome::Route {
            envelope: Envelope::IngestOnly,
            steps: Envelope::IngestOnly.steps(),
        }
    );
}

#[test]
fn unmatched_path_is_a_hard_error_without_a_catch_all() {
    let narrow = r#"
        envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE", "SYMBOLS", "REFS"] }
        route { pattern = "common/traits/**" envelope = "SCRIPT_FULL" }
    "#;
    let table = RoutingTable::parse(narrow).expect("valid table");
    let err = table.route("events/my_events.txt").unwrap_err();
    assert!(matches!(err, RouterError::Unmatched { .. }));
}

#[test]
fn unknown_envelope_name_fails_at_load_time() {
    let bad = r#"
        envelope "NOT_A_REAL_ENVELOPE" { steps = ["INGEST"] }
        route { pattern = "**" envelope = "NOT_A_REAL_ENVELOPE" }
    "#;
    let err = RoutingTable::parse(bad).unwrap_err();
    assert!(matches!(err, RouterError::UnknownEnvelope { .. }));
}

#[test]
fn mismatched_step_list_fails_at_load_time() {
    let bad = r#"
        envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE"] }
        route { pattern = "**" envelope = "SCRIPT_FULL" }
    "#;
    let err = RoutingTable::parse(bad).unwrap_err();
    assert!(matches!(err, RouterError::StepMismatch { .. }));
}

#[test]
fn route_to_undeclared_envelope_fails_at_load_time() {
    let bad = r#"
        route { pattern = "**" envelope = "SCRIPT_FULL" }
    "#;
    let err = RoutingTable::parse(bad).unwrap_err();
    assert!(matches!(err, RouterError::UndeclaredEnvelope { .. }));
}

#[test]
fn higher_priority_route_overrides_an_earlier_general_entry() {
    let doc = r#"
        envelope "SCRIPT_FULL" { steps = ["INGEST", "PARSE", "SYMBOLS", "REFS"] }
        envelope "INGEST_ONLY" { steps = ["INGEST"] }
        route { pattern = "**" envelope = "INGEST_ONLY" }
        route { pattern = "common/traits/**" envelope = "SCRIPT_FULL" priority = 10 }
    "#;
    let table = RoutingTable::parse(doc).expect("valid table");
    let outcome = table.route("common/traits/00_traits.txt").expect("matched");
    assert_eq!(
        outcome,
        RouteOutcome::Route {
            envelope: Envelope::ScriptFull,
            steps: Envelope::ScriptFull.steps(),
        }
    );
}

#[test]
fn pattern_count_reports_table_size() {
    let table = RoutingTable::parse(FIXTURE).expect("valid table");
    assert_eq!(table.pattern_count(), table.source_patterns().len());
}
