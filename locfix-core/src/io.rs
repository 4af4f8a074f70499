//! Fixture I/O module for loading and saving expected locations.
//!
//! A fixture file holds the expected span of every node of one case file:
//!
//! ```text
//! ["https://github.com/pugjs/pug.git","master","lexer","attrs.pug"]
//! attrs.pug,1,1,1,4
//!
//! attrs.pug,2,1,2,9
//! ```
//!
//! The first line is a JSON header naming the repository, branch, stage, and
//! case file. Every following line is one node position, in node order; an
//! empty line means no expectation has been recorded for that position.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::repo::RepoIdentity;
use crate::source::Stage;
use crate::span::Span;

/// Error type for fixture operations.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to access fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fixture {path} belongs to {found}, not {expected}")]
    Corrupt {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("malformed fixture {path} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Identifies the fixture of one case file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureKey {
    pub repo: RepoIdentity,
    pub stage: Stage,
    /// Case file name, with extension.
    pub file: String,
}

impl FixtureKey {
    pub fn new(repo: RepoIdentity, stage: Stage, file: impl Into<String>) -> Self {
        Self {
            repo,
            stage,
            file: file.into(),
        }
    }

    fn header_fields(&self) -> [&str; 4] {
        [
            self.repo.url.as_str(),
            self.repo.branch.as_str(),
            self.stage.as_str(),
            self.file.as_str(),
        ]
    }

    /// The JSON header line written at the top of the fixture.
    pub fn header(&self) -> String {
        // Serializing a slice of strings cannot fail.
        serde_json::to_string(&self.header_fields()).unwrap_or_default()
    }
}

/// Expected spans of one case file, as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub key: FixtureKey,
    pub records: Vec<Option<Span>>,
}

impl Fixture {
    /// Recorded span at `position`, if any.
    pub fn record(&self, position: usize) -> Option<&Span> {
        self.records.get(position).and_then(Option::as_ref)
    }

    /// Recorded span at `position`, or the sentinel.
    pub fn expected_at(&self, position: usize) -> Span {
        self.record(position).cloned().unwrap_or_else(Span::sentinel)
    }
}

// ============================================================================
// Text format
// ============================================================================

/// Serialize a fixture. `None` records become empty lines.
pub fn serialize_fixture(key: &FixtureKey, records: &[Option<Span>]) -> String {
    let mut out = key.header();
    out.push('\n');

    for record in records {
        if let Some(span) = record {
            out.push_str(&format!(
                "{},{},{},{},{}",
                span.filename, span.start.line, span.start.column, span.end.line, span.end.column
            ));
        }
        out.push('\n');
    }

    out
}

/// Parse fixture text, rejecting it unless its header names `key`.
pub fn parse_fixture(
    key: &FixtureKey,
    content: &str,
    path: &Path,
) -> Result<Fixture, FixtureError> {
    let malformed = |line: usize, reason: String| FixtureError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines: Vec<&str> = content
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    if content.ends_with('\n') {
        lines.pop();
    }

    let header = lines
        .first()
        .ok_or_else(|| malformed(1, "missing header".to_string()))?;
    let found: Vec<String> =
        serde_json::from_str(header).map_err(|e| malformed(1, format!("invalid header: {e}")))?;

    if found.iter().map(String::as_str).ne(key.header_fields()) {
        return Err(FixtureError::Corrupt {
            path: path.to_path_buf(),
            expected: key.header(),
            found: header.to_string(),
        });
    }

    let records = lines[1..]
        .iter()
        .enumerate()
        .map(|(i, line)| parse_record(line).map_err(|reason| malformed(i + 2, reason)))
        .collect::<Result<_, _>>()?;

    Ok(Fixture {
        key: key.clone(),
        records,
    })
}

fn parse_record(line: &str) -> Result<Option<Span>, String> {
    if line.is_empty() {
        return Ok(None);
    }

    // Filenames may contain commas; the four numbers never do.
    let mut fields = line.rsplitn(5, ',');
    let mut number = |name: &str| -> Result<i64, String> {
        let field = fields.next().ok_or_else(|| format!("missing {name}"))?;
        field
            .trim()
            .parse()
            .map_err(|_| format!("invalid {name} '{field}'"))
    };

    let end_column = number("end column")?;
    let end_line = number("end line")?;
    let start_column = number("start column")?;
    let start_line = number("start line")?;
    let filename = fields
        .next()
        .ok_or_else(|| "missing filename".to_string())?;

    Ok(Some(Span::new(
        filename,
        start_line,
        start_column,
        end_line,
        end_column,
    )))
}

// ============================================================================
// Store
// ============================================================================

/// Reads and writes fixtures under
/// `<root>/<repo dir>/<branch>/<stage>/<case stem>.expected.txt`.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &FixtureKey) -> PathBuf {
        let stem = Path::new(&key.file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&key.file);

        self.root
            .join(&key.repo.dir)
            .join(&key.repo.branch)
            .join(key.stage.as_str())
            .join(format!("{stem}.expected.txt"))
    }

    /// Load the fixture for `key`. A missing file is `Ok(None)`.
    pub fn load(&self, key: &FixtureKey) -> Result<Option<Fixture>, FixtureError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no fixture at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(FixtureError::Io { path, source }),
        };

        parse_fixture(key, &content, &path).map(Some)
    }

    /// Replace the fixture for `key` with `records`.
    ///
    /// The new content is written next to the target and renamed over it, so
    /// readers see either the old file or the new one.
    pub fn save(
        &self,
        key: &FixtureKey,
        records: &[Option<Span>],
    ) -> Result<PathBuf, FixtureError> {
        let path = self.path_for(key);
        let io_err = |source| FixtureError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, serialize_fixture(key, records)).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        log::info!("saved {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(file: &str) -> FixtureKey {
        FixtureKey::new(
            RepoIdentity::new("https://github.com/pugjs/pug.git", "master"),
            Stage::Lexer,
            file,
        )
    }

    #[test]
    fn serializes_header_and_records() {
        let text = serialize_fixture(
            &key("attrs.pug"),
            &[Some(Span::new("attrs.pug", 1, 1, 1, 4)), None],
        );
        assert_eq!(
            text,
            "[\"https://github.com/pugjs/pug.git\",\"master\",\"lexer\",\"attrs.pug\"]\n\
             attrs.pug,1,1,1,4\n\
             \n"
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        let key = key("attrs.pug");
        let records = vec![
            Some(Span::new("attrs.pug", 1, 1, 1, 4)),
            None,
            Some(Span::new("dir,with,commas/attrs.pug", 2, 3, 4, 5)),
            None,
        ];

        let path = store.save(&key, &records).unwrap();
        assert_eq!(
            path,
            dir.path().join("pugjs-pug/master/lexer/attrs.expected.txt")
        );

        let fixture = store.load(&key).unwrap().unwrap();
        assert_eq!(fixture.records, records);
        assert_eq!(fixture.expected_at(1), Span::sentinel());
        assert_eq!(fixture.expected_at(99), Span::sentinel());
    }

    #[test]
    fn save_overwrites_previous_content() {
        let dir = tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        let key = key("a.pug");

        store
            .save(&key, &vec![Some(Span::new("a.pug", 1, 1, 1, 2)); 3])
            .unwrap();
        store.save(&key, &[None]).unwrap();

        let fixture = store.load(&key).unwrap().unwrap();
        assert_eq!(fixture.records, vec![None]);
    }

    #[test]
    fn missing_fixture_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        assert!(store.load(&key("nope.pug")).unwrap().is_none());
    }

    #[test]
    fn header_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = FixtureStore::new(dir.path());
        let written = key("a.pug");
        store
            .save(&written, &[Some(Span::new("a.pug", 1, 1, 1, 2))])
            .unwrap();

        // Same path, different repository url.
        let mut other = written.clone();
        other.repo.url = "git@github.com:pugjs/pug.git".to_string();
        assert_eq!(store.path_for(&other), store.path_for(&written));

        let result = store.load(&other);
        assert!(matches!(result, Err(FixtureError::Corrupt { .. })));
    }

    #[test]
    fn malformed_records_report_their_line() {
        let key = key("a.pug");
        let content = format!("{}\na.pug,1,1,1,2\na.pug,x,1,1,2\n", key.header());
        let result = parse_fixture(&key, &content, Path::new("a.expected.txt"));
        assert!(matches!(result, Err(FixtureError::Malformed { line: 3, .. })));

        let result = parse_fixture(&key, "not json\n", Path::new("a.expected.txt"));
        assert!(matches!(result, Err(FixtureError::Malformed { line: 1, .. })));
    }

    #[test]
    fn accepts_crlf_line_endings() {
        let key = key("a.pug");
        let content = format!("{}\r\na.pug,1,1,1,2\r\n\r\n", key.header());
        let fixture = parse_fixture(&key, &content, Path::new("a.expected.txt")).unwrap();
        assert_eq!(
            fixture.records,
            vec![Some(Span::new("a.pug", 1, 1, 1, 2)), None]
        );
    }
}
