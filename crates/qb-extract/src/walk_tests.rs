// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use qb_core::id::FileId;
use qb_script::parse_text_recovering;

fn parse(source: &str) -> RootNode {
    let (root, diagnostics) = parse_text_recovering("fixture.txt", source);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    root
}

#[test]
fn extracts_a_trait_symbol_with_no_namespace() {
    let root = parse("brave = { trait = yes }");
    let config = ExtractionConfig::default_ck3();
    let (symbols, _refs) = extract(
        &root,
        "common/traits/00_traits.txt",
        FileId::new(1),
        &ContentVersionId::new("vanilla@1.13"),
        &config,
    );

    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].symbol_type, "trait");
    assert_eq!(symbols[0].name, "brave");
    assert_eq!(symbols[0].scope, None);
    assert_eq!(symbols[0].ast_node_path, "/children/0");
}

#[test]
fn ignores_files_outside_any_configured_prefix() {
    let root = parse("brave = { trait = yes }");
    let config = ExtractionConfig::default_ck3();
    let (symbols, refs) = extract(
        &root,
        "gfx/portraits/portrait_offsets.txt",
        FileId::new(1),
        &ContentVersionId::new("vanilla@1.13"),
        &config,
    );
    assert!(symbols.is_empty());
    assert!(refs.is_empty());
}

#[test]
fn namespaced_symbols_split_namespace_from_local_id_and_skip_non_matching_names() {
    let root = parse(
        r#"
        mymod_events.0001 = { title = mymod_events.0001.t }
        not_namespaced = { title = x }
        "#,
    );
    let config = ExtractionConfig::default_ck3();
    let (symbols, _refs) = extract(
        &root,
        "events/mymod_events.txt",
        FileId::new(1),
        &ContentVersionId::new("mod:a@1"),
        &config,
    );

    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "0001");
    assert_eq!(symbols[0].scope.as_deref(), Some("mymod_events"));
}

#[test]
fn refs_are_collected_from_the_symbol_value_subtree_with_nearest_enclosing_context() {
    let root = parse(
        r#"
        brave = {
            trait = yes
            immediate = {
                add_trait = brave
            }
        }
        "#,
    );
    let config = ExtractionConfig::default_ck3();
    let (_symbols, refs) = extract(
        &root,
        "common/traits/00_traits.txt",
        FileId::new(1),
        &ContentVersionId::new("vanilla@1.13"),
        &config,
    );

    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].ref_type, "trait_ref");
    assert_eq!(refs[0].name, "brave");
    assert_eq!(refs[0].context.as_deref(), Some("immediate"));
    assert_eq!(refs[0].resolution_status, ResolutionStatus::Unknown);
}

#[test]
fn ref_lists_emit_one_ref_per_scalar_item() {
    let root = parse(
        r#"
        brave = {
            immediate = {
                add_trait = { brave craven }
            }
        }
        "#,
    );
    let config = ExtractionConfig::default_ck3();
    let (_symbols, refs) = extract(
        &root,
        "common/traits/00_traits.txt",
        FileId::new(1),
        &ContentVersionId::new("vanilla@1.13"),
        &config,
    );

    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|r| r.ref_type == "trait_ref"));
    assert_eq!(refs[0].name, "brave");
    assert_eq!(refs[1].name, "craven");
}

#[test]
fn non_ident_values_on_a_ref_key_are_not_treated_as_refs() {
    let root = parse(
        r#"
        brave = {
            immediate = {
                add_trait = "brave"
            }
        }
        "#,
    );
    let config = ExtractionConfig::default_ck3();
    let (_symbols, refs) = extract(
        &root,
        "common/traits/00_traits.txt",
        FileId::new(1),
        &ContentVersionId::new("vanilla@1.13"),
        &config,
    );
    assert!(refs.is_empty());
}

#[test]
fn symbol_and_ref_ids_are_stable_across_re_extraction_of_the_same_ast() {
    let root = parse("brave = { immediate = { add_trait = brave } }");
    let config = ExtractionConfig::default_ck3();
    let file_id = FileId::new(7);
    let content_version_id = ContentVersionId::new("vanilla@1.13");

    let (symbols_a, refs_a) = extract(&root, "common/traits/00_traits.txt", file_id, &content_version_id, &config);
    let (symbols_b, refs_b) = extract(&root, "common/traits/00_traits.txt", file_id, &content_version_id, &config);

    assert_eq!(symbols_a[0].symbol_id, symbols_b[0].symbol_id);
    assert_eq!(refs_a[0].ref_id, refs_b[0].ref_id);
}
