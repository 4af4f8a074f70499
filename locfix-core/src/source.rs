//! The lexer/parser collaborator.
//!
//! A [`TokenSource`] lists the case files of a stage, reads them, and turns
//! their text into an ordered list of [`Node`]s. Lexing and parsing are two
//! separate calls so a caller never pays for a parse it does not need.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ast::Node;
use crate::span::Span;
use crate::walk::flatten;

/// Which producer's output is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lexer,
    Parser,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected 'lexer' or 'parser')")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lexer" | "1" => Ok(Stage::Lexer),
            "parser" | "2" => Ok(Stage::Parser),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Error type for producing nodes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("case file not found: {0}")]
    MissingCase(String),

    #[error("no token command configured")]
    NoCommand,

    #[error("failed to run token command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("token command failed to {phase} '{file}' ({status}): {stderr}")]
    Command {
        phase: &'static str,
        file: String,
        status: String,
        stderr: String,
    },

    #[error("token command produced invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("expected {expected} in '{file}', found {found}")]
    Shape {
        file: String,
        expected: &'static str,
        found: String,
    },
}

/// What a missing or unusable location sub-field resolves to.
///
/// Lines and columns that are absent, non-integer, or below 1 become
/// `line`/`column`; an absent filename becomes the case file name. Both
/// stages share this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationDefaults {
    pub line: i64,
    pub column: i64,
}

impl Default for LocationDefaults {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl LocationDefaults {
    /// Read `loc.{filename, start.{line,column}, end.{line,column}}` from a
    /// token or AST node.
    pub fn span_of(&self, value: &Value, file: &str) -> Span {
        let loc = value.get("loc");
        let field = |path: [&str; 2], default: i64| {
            loc.and_then(|l| l.get(path[0]))
                .and_then(|p| p.get(path[1]))
                .and_then(Value::as_i64)
                .filter(|v| *v >= 1)
                .unwrap_or(default)
        };
        let filename = loc
            .and_then(|l| l.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or(file);

        Span::new(
            filename,
            field(["start", "line"], self.line),
            field(["start", "column"], self.column),
            field(["end", "line"], self.line),
            field(["end", "column"], self.column),
        )
    }

    /// Turn a lexer's JSON token array into nodes.
    pub fn tokens_from_json(&self, value: &Value, file: &str) -> Result<Vec<Node>, SourceError> {
        let tokens = value.as_array().ok_or_else(|| SourceError::Shape {
            file: file.to_string(),
            expected: "an array of tokens",
            found: kind_of(value).to_string(),
        })?;

        Ok(tokens
            .iter()
            .map(|token| {
                let kind = token.get("type").and_then(Value::as_str).map(str::to_string);
                Node::new(kind, self.span_of(token, file), token.clone())
            })
            .collect())
    }

    /// Turn a parser's JSON AST into nodes, in walk order.
    pub fn nodes_from_ast(&self, value: &Value, file: &str) -> Result<Vec<Node>, SourceError> {
        flatten(value, file, self)
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Produces the nodes checked by the location engine.
pub trait TokenSource {
    /// Case file names for `stage`, in stepping order.
    fn case_files(&self, stage: Stage) -> Result<Vec<String>, SourceError>;

    /// Source text of one case file.
    fn read_case(&self, stage: Stage, file: &str) -> Result<String, SourceError>;

    /// Tokens of `source`, as the lexer produces them.
    fn lex(&self, source: &str, file: &str) -> Result<Vec<Node>, SourceError>;

    /// Nodes of the parsed `source`, in walk order.
    fn parse(&self, source: &str, file: &str) -> Result<Vec<Node>, SourceError>;

    fn nodes(&self, stage: Stage, source: &str, file: &str) -> Result<Vec<Node>, SourceError> {
        match stage {
            Stage::Lexer => self.lex(source, file),
            Stage::Parser => self.parse(source, file),
        }
    }
}

/// Runs an external program that dumps tokens or an AST as JSON.
///
/// The program is invoked as `<command...> <lex|parse> <file name>` with the
/// case source on stdin.
#[derive(Debug, Clone)]
pub struct CommandSource {
    cases_dir: PathBuf,
    extension: String,
    command: Vec<String>,
    defaults: LocationDefaults,
}

impl CommandSource {
    /// An empty `command` still lists and reads cases; lexing or parsing
    /// then fails with [`SourceError::NoCommand`].
    pub fn new(
        cases_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        command: &[String],
    ) -> Self {
        Self {
            cases_dir: cases_dir.into(),
            extension: extension.into(),
            command: command.to_vec(),
            defaults: LocationDefaults::default(),
        }
    }

    fn run(&self, phase: &'static str, source: &str, file: &str) -> Result<Value, SourceError> {
        let (program, args) = self.command.split_first().ok_or(SourceError::NoCommand)?;
        log::debug!("running {program} {args:?} {phase} {file}");

        let mut child = Command::new(program)
            .args(args)
            .arg(phase)
            .arg(file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Feed stdin from another thread so a chatty child cannot block on a
        // full stdout pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = source.to_string();
            thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(writer) = writer
            && let Ok(Err(e)) = writer.join()
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(SourceError::Spawn {
                program: program.clone(),
                source: e,
            });
        }

        if !output.status.success() {
            return Err(SourceError::Command {
                phase,
                file: file.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl TokenSource for CommandSource {
    fn case_files(&self, _stage: Stage) -> Result<Vec<String>, SourceError> {
        let entries = fs::read_dir(&self.cases_dir).map_err(|source| SourceError::Io {
            path: self.cases_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: self.cases_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_case(&self, _stage: Stage, file: &str) -> Result<String, SourceError> {
        let path = self.cases_dir.join(file);
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SourceError::MissingCase(file.to_string())
            } else {
                SourceError::Io { path, source }
            }
        })
    }

    fn lex(&self, source: &str, file: &str) -> Result<Vec<Node>, SourceError> {
        let value = self.run("lex", source, file)?;
        self.defaults.tokens_from_json(&value, file)
    }

    fn parse(&self, source: &str, file: &str) -> Result<Vec<Node>, SourceError> {
        let value = self.run("parse", source, file)?;
        self.defaults.nodes_from_ast(&value, file)
    }
}
