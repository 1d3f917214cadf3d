//! Query compiler and composition-rule tests.
//!
//! These exercise the backend-agnostic semantics through the SQL filter
//! factory: tokenization, AND-of-ORs assembly, neutral-element normalization
//! and the per-mode token dispatch.

use polystore::backends::sqlite::FILTERS;
use polystore::query::{Constraint, FilterFactory, QueryCompiler, QueryField};
use polystore::schema::Field;

fn name() -> Field {
    Field::named("name")
}

fn description() -> Field {
    Field::named("description")
}

// ============================================================================
// Tokenization and assembly
// ============================================================================

#[test]
fn test_tokens_split_on_any_whitespace() {
    let specs = vec![QueryField::equal(name())];
    let compiler = QueryCompiler::new(&FILTERS, &specs);

    assert_eq!(compiler.compile("red car"), compiler.compile("  red \t car\n"));
}

#[test]
fn test_single_spec_single_token_compiles_without_wrappers() {
    let specs = vec![QueryField::equal(name())];
    let compiled = QueryCompiler::new(&FILTERS, &specs).compile("wrench");

    // or() over one alternative and and() over one token both unwrap.
    assert_eq!(compiled, FILTERS.eq(&name(), "wrench"));
}

#[test]
fn test_every_token_must_match_in_some_field() {
    let specs = vec![QueryField::equal(name()), QueryField::prefix(description())];
    let compiled = QueryCompiler::new(&FILTERS, &specs).compile("red car");

    let expected = FILTERS.and([
        FILTERS.or([
            FILTERS.eq(&name(), "red"),
            FILTERS.prefix(&description(), "red"),
        ]),
        FILTERS.or([
            FILTERS.eq(&name(), "car"),
            FILTERS.prefix(&description(), "car"),
        ]),
    ]);
    assert_eq!(compiled, expected);
}

#[test]
fn test_no_specs_compiles_to_match_none_for_nonempty_query() {
    let compiler = QueryCompiler::new(&FILTERS, &[]);

    // A token that can match in no field excludes everything; the and() over
    // that match-none collapses.
    assert!(compiler.compile("red").is_match_none());
    // But the empty query stays match-all.
    assert!(compiler.compile("").is_match_all());
}

// ============================================================================
// Per-mode token dispatch
// ============================================================================

#[test]
fn test_equal_mode_never_prefix_matches() {
    let specs = vec![QueryField::equal(name())];
    let compiled = QueryCompiler::new(&FILTERS, &specs).compile("wren*");

    // The wildcard is data under Equal mode, not a prefix marker.
    assert_eq!(compiled, FILTERS.eq(&name(), "wren*"));
}

#[test]
fn test_like_mode_is_wildcard_driven() {
    let specs = vec![QueryField::like(name())];
    let compiler = QueryCompiler::new(&FILTERS, &specs);

    assert_eq!(compiler.compile("wrench"), FILTERS.eq(&name(), "wrench"));
    assert_eq!(compiler.compile("wren*"), FILTERS.prefix(&name(), "wren"));
    // Wildcard position does not matter, only its presence.
    assert_eq!(compiler.compile("*wren"), FILTERS.prefix(&name(), "wren"));
}

#[test]
fn test_prefix_mode_always_prefix_matches() {
    let specs = vec![QueryField::prefix(name())];
    let compiler = QueryCompiler::new(&FILTERS, &specs);

    assert_eq!(compiler.compile("wren"), FILTERS.prefix(&name(), "wren"));
    assert_eq!(compiler.compile("wren*"), FILTERS.prefix(&name(), "wren"));
}

// ============================================================================
// Neutral-element normalization
// ============================================================================

#[test]
fn test_neutrals_are_dropped_from_combinations() {
    let real = FILTERS.eq(&name(), "wrench");

    assert_eq!(
        FILTERS.and([FILTERS.match_all(), real.clone(), FILTERS.match_all()]),
        real
    );
    assert_eq!(
        FILTERS.or([FILTERS.match_none(), real.clone(), FILTERS.match_none()]),
        real
    );
}

#[test]
fn test_absorbing_elements_collapse_combinations() {
    let real = FILTERS.eq(&name(), "wrench");

    assert!(FILTERS.and([real.clone(), FILTERS.match_none()]).is_match_none());
    assert!(FILTERS.or([real, FILTERS.match_all()]).is_match_all());
}

#[test]
fn test_empty_combinations_yield_their_identity() {
    assert!(FILTERS.and(Vec::new()).is_match_all());
    assert!(FILTERS.or(Vec::new()).is_match_none());
}

#[test]
fn test_negation_flips_neutrals() {
    assert!(FILTERS.not(FILTERS.match_all()).is_match_none());
    assert!(FILTERS.not(FILTERS.match_none()).is_match_all());
}

#[test]
fn test_optional_filters_vanish_entirely() {
    // The eq_ignore_null neutral survives no and() combination: chaining an
    // unset optional filter leaves the query unchanged.
    let base = FILTERS.prefix(&name(), "wren");
    let optional = FILTERS.eq_ignore_null(&description(), None::<&str>);

    assert_eq!(FILTERS.and([base.clone(), optional]), base);
}
