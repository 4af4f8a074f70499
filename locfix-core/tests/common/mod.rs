//! Shared test utilities for locfix tests.
//!
//! Provides:
//! - An in-memory [`FakeSource`] standing in for the lexer/parser
//! - Helpers to build an engine over a temporary fixture tree

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use locfix_core::{
    FixtureKey, FixtureStore, LocationDefaults, LocationEngine, Node, RepoIdentity, SourceError,
    Span, Stage, TokenSource,
};
use serde_json::{Value, json};

pub const REPO_URL: &str = "https://github.com/pugjs/pug.git";
pub const BRANCH: &str = "master";

// ============================================================================
// Fake token source
// ============================================================================

struct FakeCase {
    text: String,
    tokens: Value,
}

/// Case files held in memory, each with a canned token list.
///
/// Lexing returns the tokens as-is. Parsing wraps them in a `Block` whose
/// `nodes` are `Text` nodes with the same locations.
#[derive(Default)]
pub struct FakeSource {
    cases: BTreeMap<String, FakeCase>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a case file. Each span is `(start line, start column, end line,
    /// end column)` of one token.
    pub fn case(mut self, name: &str, text: &str, spans: &[(i64, i64, i64, i64)]) -> Self {
        let tokens = spans
            .iter()
            .map(|&(sl, sc, el, ec)| token_json("text", name, sl, sc, el, ec))
            .collect();
        self.cases.insert(
            name.to_string(),
            FakeCase {
                text: text.to_string(),
                tokens: Value::Array(tokens),
            },
        );
        self
    }

    /// Add a case file with a raw token array.
    pub fn raw_case(mut self, name: &str, text: &str, tokens: Value) -> Self {
        self.cases.insert(
            name.to_string(),
            FakeCase {
                text: text.to_string(),
                tokens,
            },
        );
        self
    }

    fn case_named(&self, file: &str) -> Result<&FakeCase, SourceError> {
        self.cases
            .get(file)
            .ok_or_else(|| SourceError::MissingCase(file.to_string()))
    }
}

impl TokenSource for FakeSource {
    fn case_files(&self, _stage: Stage) -> Result<Vec<String>, SourceError> {
        Ok(self.cases.keys().cloned().collect())
    }

    fn read_case(&self, _stage: Stage, file: &str) -> Result<String, SourceError> {
        Ok(self.case_named(file)?.text.clone())
    }

    fn lex(&self, _source: &str, file: &str) -> Result<Vec<Node>, SourceError> {
        LocationDefaults::default().tokens_from_json(&self.case_named(file)?.tokens, file)
    }

    fn parse(&self, _source: &str, file: &str) -> Result<Vec<Node>, SourceError> {
        let children: Vec<Value> = self
            .case_named(file)?
            .tokens
            .as_array()
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|t| {
                        let mut node = t.clone();
                        node["type"] = json!("Text");
                        node
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ast = json!({ "type": "Block", "nodes": children });
        LocationDefaults::default().nodes_from_ast(&ast, file)
    }
}

/// A token object with a complete `loc`.
pub fn token_json(kind: &str, file: &str, sl: i64, sc: i64, el: i64, ec: i64) -> Value {
    json!({
        "type": kind,
        "loc": {
            "filename": file,
            "start": { "line": sl, "column": sc },
            "end": { "line": el, "column": ec }
        }
    })
}

// ============================================================================
// Engine helpers
// ============================================================================

pub fn repo() -> RepoIdentity {
    RepoIdentity::new(REPO_URL, BRANCH)
}

/// Engine over `source`, storing fixtures under `root`, with the lexer stage
/// selected.
pub fn engine(source: FakeSource, root: &Path) -> LocationEngine<FakeSource> {
    let mut engine = LocationEngine::new(source, FixtureStore::new(root), repo());
    engine
        .enter_stage(Stage::Lexer)
        .expect("fake source always lists its cases");
    engine
}

/// Write a lexer fixture for `file` directly, bypassing the engine.
pub fn write_fixture(root: &Path, file: &str, records: &[Option<Span>]) {
    let key = FixtureKey::new(repo(), Stage::Lexer, file);
    FixtureStore::new(root)
        .save(&key, records)
        .expect("fixture should be writable");
}

/// `(file, position)` of the engine's current node.
pub fn at(engine: &LocationEngine<FakeSource>) -> (String, usize) {
    (
        engine.current_file().unwrap_or_default().to_string(),
        engine.position(),
    )
}
