//! Tests for moving through case files and nodes.

mod common;

use common::{FakeSource, at, engine};
use locfix_core::{EngineError, FileSelection, Phase, Span, Stage, Step};
use tempfile::tempdir;

/// a.pug: 3 tokens, b.pug: 2 tokens, c.pug: 1 token.
fn three_files() -> FakeSource {
    FakeSource::new()
        .case(
            "a.pug",
            "p one\np two\np three",
            &[(1, 1, 1, 6), (2, 1, 2, 6), (3, 1, 3, 8)],
        )
        .case("b.pug", "div\nspan", &[(1, 1, 1, 4), (2, 1, 2, 5)])
        .case("c.pug", "em", &[(1, 1, 1, 3)])
}

fn pos(file: &str, position: usize) -> (String, usize) {
    (file.to_string(), position)
}

// ============================================================================
// Stage and file selection
// ============================================================================

#[test]
fn select_stage_by_name_and_number() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());

    assert_eq!(engine.select_stage("parser").unwrap(), 3);
    assert_eq!(engine.stage(), Some(Stage::Parser));
    assert_eq!(engine.phase(), Phase::StageSelected);

    assert_eq!(engine.select_stage("1").unwrap(), 3);
    assert_eq!(engine.stage(), Some(Stage::Lexer));
}

#[test]
fn unknown_stage_is_an_error() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());

    let result = engine.select_stage("linker");
    assert!(matches!(result, Err(EngineError::UnknownStage(_))));
    assert_eq!(engine.stage(), Some(Stage::Lexer));
}

#[test]
fn select_file_with_or_without_extension() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());

    let selected = engine.select_file("b").unwrap();
    assert_eq!(
        selected,
        FileSelection::Selected {
            index: 1,
            file: "b.pug".to_string()
        }
    );
    assert_eq!(engine.phase(), Phase::FileLoaded);
    assert_eq!(at(&engine), pos("b.pug", 0));

    engine.select_file("c.pug").unwrap();
    assert_eq!(at(&engine), pos("c.pug", 0));
}

#[test]
fn blank_file_name_selects_the_first_file() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());

    engine.select_file("  ").unwrap();
    assert_eq!(at(&engine), pos("a.pug", 0));
    assert_eq!(engine.node_count(), 3);
}

#[test]
fn unknown_file_offers_suggestions() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());

    let selection = engine.select_file("bpug").unwrap();
    let FileSelection::NotFound { query, suggestions } = selection else {
        panic!("expected NotFound, got {selection:?}");
    };
    assert_eq!(query, "bpug");
    assert_eq!(suggestions.first().map(String::as_str), Some("b.pug"));
    assert_eq!(engine.phase(), Phase::StageSelected);
}

#[test]
fn selecting_a_file_needs_a_stage() {
    let dir = tempdir().unwrap();
    let mut engine = locfix_core::LocationEngine::new(
        three_files(),
        locfix_core::FixtureStore::new(dir.path()),
        common::repo(),
    );

    assert_eq!(engine.phase(), Phase::Idle);
    assert!(matches!(engine.select_file("a"), Err(EngineError::NoStage)));
    assert!(matches!(engine.next_token(), Err(EngineError::NoFile)));
}

// ============================================================================
// Token stepping
// ============================================================================

#[test]
fn next_token_walks_across_files() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("").unwrap();

    let mut visited = vec![at(&engine)];
    while engine.next_token().unwrap() == Step::Moved {
        visited.push(at(&engine));
    }

    assert_eq!(
        visited,
        vec![
            pos("a.pug", 0),
            pos("a.pug", 1),
            pos("a.pug", 2),
            pos("b.pug", 0),
            pos("b.pug", 1),
            pos("c.pug", 0),
        ]
    );
    assert!(engine.is_exhausted());
    assert_eq!(engine.phase(), Phase::Exhausted);
    assert!(engine.actual().is_none());
}

#[test]
fn next_then_previous_returns_to_the_same_node() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("a").unwrap();

    for _ in 0..4 {
        let before = at(&engine);
        let actual = engine.actual().cloned();

        assert_eq!(engine.next_token().unwrap(), Step::Moved);
        assert_eq!(engine.previous_token().unwrap(), Step::Moved);

        assert_eq!(at(&engine), before);
        assert_eq!(engine.actual().cloned(), actual);
        engine.next_token().unwrap();
    }
}

#[test]
fn previous_token_at_the_first_node_does_nothing() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("a").unwrap();

    assert_eq!(engine.previous_token().unwrap(), Step::AtStart);
    assert_eq!(at(&engine), pos("a.pug", 0));
    assert_eq!(engine.actual(), Some(&Span::new("a.pug", 1, 1, 1, 6)));
}

#[test]
fn previous_token_crosses_into_the_previous_file() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("b").unwrap();

    assert_eq!(engine.previous_token().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("a.pug", 2));
    assert_eq!(engine.actual(), Some(&Span::new("a.pug", 3, 1, 3, 8)));
}

#[test]
fn exhausted_engine_stays_exhausted_going_forward() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("c").unwrap();

    assert_eq!(engine.next_token().unwrap(), Step::Exhausted);
    assert_eq!(engine.next_token().unwrap(), Step::Exhausted);
    assert_eq!(engine.next_file().unwrap(), Step::Exhausted);
    assert!(engine.is_exhausted());
}

#[test]
fn previous_token_from_exhausted_returns_to_the_last_node() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("c").unwrap();
    engine.next_token().unwrap();

    assert_eq!(engine.previous_token().unwrap(), Step::Moved);
    assert!(!engine.is_exhausted());
    assert_eq!(at(&engine), pos("c.pug", 0));
    assert!(engine.actual().is_some());
}

#[test]
fn empty_files_are_skipped_both_ways() {
    let dir = tempdir().unwrap();
    let source = FakeSource::new()
        .case("a.pug", "p", &[(1, 1, 1, 2)])
        .case("b.pug", "", &[])
        .case("c.pug", "i", &[(1, 1, 1, 2)]);
    let mut engine = engine(source, dir.path());
    engine.select_file("a").unwrap();

    assert_eq!(engine.next_token().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("c.pug", 0));

    assert_eq!(engine.previous_token().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("a.pug", 0));
}

#[test]
fn previous_token_with_only_empty_files_before_stays_put() {
    let dir = tempdir().unwrap();
    let source = FakeSource::new()
        .case("a.pug", "", &[])
        .case("b.pug", "p", &[(1, 1, 1, 2)]);
    let mut engine = engine(source, dir.path());
    engine.select_file("b").unwrap();

    assert_eq!(engine.previous_token().unwrap(), Step::AtStart);
    assert_eq!(at(&engine), pos("b.pug", 0));
    assert!(engine.actual().is_some());
}

#[test]
fn an_empty_file_has_no_current_node() {
    let dir = tempdir().unwrap();
    let source = FakeSource::new().case("empty.pug", "", &[]);
    let mut engine = engine(source, dir.path());
    engine.select_file("empty").unwrap();

    assert_eq!(engine.node_count(), 0);
    assert!(engine.comparison().is_none());
    assert!(matches!(
        engine.save_current_proposed(),
        Err(EngineError::NoNode)
    ));
    assert_eq!(engine.next_token().unwrap(), Step::Exhausted);
}

// ============================================================================
// File stepping
// ============================================================================

#[test]
fn next_and_previous_file() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("a").unwrap();
    engine.next_token().unwrap();

    assert_eq!(engine.next_file().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("b.pug", 0));

    assert_eq!(engine.previous_file().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("a.pug", 0));

    assert_eq!(engine.previous_file().unwrap(), Step::AtStart);
    assert_eq!(at(&engine), pos("a.pug", 0));
}

#[test]
fn next_file_past_the_last_exhausts_and_previous_file_recovers() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.select_file("c").unwrap();

    assert_eq!(engine.next_file().unwrap(), Step::Exhausted);
    assert_eq!(engine.phase(), Phase::Exhausted);

    assert_eq!(engine.previous_file().unwrap(), Step::Moved);
    assert_eq!(at(&engine), pos("c.pug", 0));
}

#[test]
fn parser_stage_walks_the_ast() {
    let dir = tempdir().unwrap();
    let mut engine = engine(three_files(), dir.path());
    engine.enter_stage(Stage::Parser).unwrap();
    engine.select_file("b").unwrap();

    // Block root plus one Text node per token.
    assert_eq!(engine.node_count(), 3);
    assert_eq!(engine.token_label().as_deref(), Some("BLOCK"));
    assert_eq!(engine.actual(), Some(&Span::new("b.pug", 1, 1, 1, 1)));

    engine.next_token().unwrap();
    assert_eq!(engine.token_label().as_deref(), Some("TEXT"));
    assert_eq!(engine.actual(), Some(&Span::new("b.pug", 1, 1, 1, 4)));
}
