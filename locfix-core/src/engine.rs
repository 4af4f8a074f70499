//! The location engine.
//!
//! Walks (case file × node) positions one at a time, compares the span each
//! node reports with the span recorded in its fixture, and keeps an editable
//! "proposed" span that can be nudged and saved back to the fixture.
//!
//! The engine moves through four phases:
//!
//! - [`Phase::Idle`]: no stage selected yet
//! - [`Phase::StageSelected`]: case files discovered, none loaded
//! - [`Phase::FileLoaded`]: nodes, source lines, and fixture of one case loaded
//! - [`Phase::Exhausted`]: stepped past the last node of the last case
//!
//! In run mode the engine skips forward over nodes whose span already matches
//! the fixture, stopping at the first mismatch.

use crate::ast::Node;
use crate::io::{Fixture, FixtureError, FixtureKey, FixtureStore};
use crate::repo::RepoIdentity;
use crate::search::suggest_files;
use crate::settings::{DisplayOption, DisplayOptions, SettingsError};
use crate::source::{SourceError, Stage, TokenSource, UnknownStage};
use crate::span::{Endpoint, LineTable, Span};

/// Lowest line a proposed span may start on.
pub const MIN_LINE: i64 = 1;

const MAX_SUGGESTIONS: usize = 5;

/// Error that can occur while driving the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    UnknownStage(#[from] UnknownStage),

    #[error("no stage selected")]
    NoStage,

    #[error("no case file loaded")]
    NoFile,

    #[error("no node at the current position")]
    NoNode,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    StageSelected,
    FileLoaded,
    Exhausted,
}

/// Outcome of resolving a case file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// The file was found and loaded.
    Selected { index: usize, file: String },
    /// Nothing matched; the caller should ask again.
    NotFound {
        query: String,
        suggestions: Vec<String>,
    },
}

/// Outcome of a navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The engine now points at a different position.
    Moved,
    /// The engine stayed where it was.
    Stayed,
    /// Already at the first position; nothing happened.
    AtStart,
    /// There are no more files to process.
    Exhausted,
}

/// Actual, expected, and proposed spans of the current node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Span reported by the lexer/parser.
    pub actual: Span,
    /// Span recorded in the fixture, or the sentinel.
    pub expected: Span,
    /// Editable span that will be written on save.
    pub proposed: Span,
    /// `actual == expected`, field by field.
    pub matches: bool,
}

struct LoadedFile {
    key: FixtureKey,
    lines: LineTable,
    nodes: Vec<Node>,
    fixture: Option<Fixture>,
}

impl LoadedFile {
    fn compare_at(&self, position: usize) -> Option<Comparison> {
        let node = self.nodes.get(position)?;
        let actual = node.span.clone();
        let expected = self
            .fixture
            .as_ref()
            .map(|f| f.expected_at(position))
            .unwrap_or_else(Span::sentinel);
        let matches = actual == expected;

        let reference = if expected.is_resolved() {
            &expected
        } else {
            &actual
        };
        let proposed = self
            .lines
            .fix_endpoints(&actual.filename, reference, MIN_LINE);

        Some(Comparison {
            actual,
            expected,
            proposed,
            matches,
        })
    }
}

/// Steps through case files and nodes, comparing reported locations with
/// the recorded fixtures.
pub struct LocationEngine<S: TokenSource> {
    source: S,
    store: FixtureStore,
    repo: RepoIdentity,
    case_extension: String,
    display: DisplayOptions,

    stage: Option<Stage>,
    files: Vec<String>,
    file_index: usize,
    loaded: Option<LoadedFile>,
    position: usize,
    current: Option<Comparison>,
    exhausted: bool,

    run_mode: bool,
    run_pause: Option<usize>,
}

impl<S: TokenSource> LocationEngine<S> {
    pub fn new(source: S, store: FixtureStore, repo: RepoIdentity) -> Self {
        Self {
            source,
            store,
            repo,
            case_extension: "pug".to_string(),
            display: DisplayOptions::default(),
            stage: None,
            files: Vec::new(),
            file_index: 0,
            loaded: None,
            position: 0,
            current: None,
            exhausted: false,
            run_mode: false,
            run_pause: None,
        }
    }

    /// Extension (without dot) that may be left off when selecting a file.
    pub fn with_case_extension(mut self, extension: impl Into<String>) -> Self {
        self.case_extension = extension.into();
        self
    }

    pub fn with_display(mut self, display: DisplayOptions) -> Self {
        self.display = display;
        self
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Select a stage by name and discover its case files.
    pub fn select_stage(&mut self, name: &str) -> Result<usize, EngineError> {
        let stage = name.parse::<Stage>()?;
        self.enter_stage(stage)
    }

    /// Select `stage` and discover its case files. Returns how many there are.
    pub fn enter_stage(&mut self, stage: Stage) -> Result<usize, EngineError> {
        let files = self.source.case_files(stage)?;
        log::debug!("stage {stage}: {} case files", files.len());

        self.stage = Some(stage);
        self.files = files;
        self.file_index = 0;
        self.loaded = None;
        self.position = 0;
        self.current = None;
        self.exhausted = false;
        self.run_mode = false;
        self.run_pause = None;

        Ok(self.files.len())
    }

    /// Resolve `name` (with or without the case extension) and load it.
    ///
    /// A blank name selects the first file. An unknown name is reported as
    /// [`FileSelection::NotFound`] so the caller can ask again.
    pub fn select_file(&mut self, name: &str) -> Result<FileSelection, EngineError> {
        if self.stage.is_none() {
            return Err(EngineError::NoStage);
        }

        let name = name.trim();
        let with_extension = format!("{name}.{}", self.case_extension);
        let index = if name.is_empty() {
            (!self.files.is_empty()).then_some(0)
        } else {
            self.files
                .iter()
                .position(|f| f == name)
                .or_else(|| self.files.iter().position(|f| *f == with_extension))
        };

        let Some(index) = index else {
            log::warn!("no case file named '{name}'");
            return Ok(FileSelection::NotFound {
                query: name.to_string(),
                suggestions: suggest_files(name, &self.files, MAX_SUGGESTIONS),
            });
        };

        self.file_index = index;
        self.load_current_file()?;
        Ok(FileSelection::Selected {
            index,
            file: self.files[index].clone(),
        })
    }

    /// (Re)load the selected case file: nodes, source lines, and fixture.
    /// Positions the engine on the first node.
    pub fn load_current_file(&mut self) -> Result<(), EngineError> {
        self.load_file_at(self.file_index)?;
        self.recompute_comparison()
    }

    /// Move to the next case file; past the last one the engine is exhausted.
    pub fn next_file(&mut self) -> Result<Step, EngineError> {
        if self.stage.is_none() {
            return Err(EngineError::NoStage);
        }
        if self.exhausted {
            return Ok(Step::Exhausted);
        }
        if self.file_index + 1 >= self.files.len() {
            self.exhaust();
            return Ok(Step::Exhausted);
        }

        self.load_file_at(self.file_index + 1)?;
        self.recompute_comparison()?;
        Ok(self.settled())
    }

    /// Move to the previous case file. A no-op on the first file.
    pub fn previous_file(&mut self) -> Result<Step, EngineError> {
        if self.stage.is_none() {
            return Err(EngineError::NoStage);
        }
        if self.exhausted {
            self.load_file_at(self.file_index)?;
        } else if self.file_index == 0 {
            return Ok(Step::AtStart);
        } else {
            self.load_file_at(self.file_index - 1)?;
        }

        self.recompute_comparison()?;
        Ok(self.settled())
    }

    /// Move to the next node, continuing into the next case file at the end
    /// of the current one.
    pub fn next_token(&mut self) -> Result<Step, EngineError> {
        if self.exhausted {
            return Ok(Step::Exhausted);
        }
        if self.loaded.is_none() {
            return Err(EngineError::NoFile);
        }

        match self.advance()? {
            Step::Moved => {
                self.recompute_comparison()?;
                Ok(self.settled())
            }
            other => Ok(other),
        }
    }

    /// Move to the previous node, continuing at the last node of the previous
    /// case file from the start of the current one.
    pub fn previous_token(&mut self) -> Result<Step, EngineError> {
        if self.loaded.is_none() && !self.exhausted {
            return Err(EngineError::NoFile);
        }

        match self.retreat()? {
            Step::Moved => {
                self.recompute_comparison()?;
                Ok(self.settled())
            }
            other => Ok(other),
        }
    }

    // ========================================================================
    // Comparison and run mode
    // ========================================================================

    /// Compare the current node's span with its fixture and rebuild the
    /// proposed span.
    ///
    /// In run mode a match is skipped (unless it is the pause position) and
    /// the comparison repeats on the next node. The first stop records its
    /// position as the new pause position and leaves run mode.
    pub fn recompute_comparison(&mut self) -> Result<(), EngineError> {
        loop {
            let comparison = match &self.loaded {
                Some(file) if !self.exhausted => file.compare_at(self.position),
                _ => None,
            };

            let Some(comparison) = comparison else {
                self.current = None;
                self.run_mode = false;
                return Ok(());
            };

            if comparison.matches && self.run_mode && self.run_pause != Some(self.position) {
                self.run_pause = None;
                if self.run_advance()? == Step::Exhausted {
                    self.run_mode = false;
                    return Ok(());
                }
                continue;
            }

            if self.run_mode {
                log::debug!(
                    "run stopped at {}@{}",
                    self.current_file().unwrap_or_default(),
                    self.position + 1
                );
                self.run_pause = Some(self.position);
                self.run_mode = false;
            }
            self.current = Some(comparison);
            return Ok(());
        }
    }

    /// Skip forward through matching nodes until a mismatch.
    ///
    /// When the engine is parked on the last run stop (or on an empty case
    /// file), the run starts from the following node; otherwise the current
    /// node is checked first.
    pub fn enter_run_mode(&mut self) -> Result<Step, EngineError> {
        if self.exhausted {
            return Ok(Step::Exhausted);
        }
        if self.loaded.is_none() {
            return Err(EngineError::NoFile);
        }

        let before = (self.file_index, self.position);
        self.run_mode = true;

        let parked = self.current.is_none() || self.run_pause == Some(self.position);
        if parked && self.run_advance()? == Step::Exhausted {
            self.run_mode = false;
            return Ok(Step::Exhausted);
        }
        self.recompute_comparison()?;

        if self.exhausted {
            Ok(Step::Exhausted)
        } else if (self.file_index, self.position) == before {
            Ok(Step::Stayed)
        } else {
            Ok(Step::Moved)
        }
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Nudge one end of the proposed span by `amount` columns.
    pub fn move_endpoint(
        &mut self,
        endpoint: Endpoint,
        amount: i64,
    ) -> Result<&Span, EngineError> {
        let file = self.loaded.as_ref().ok_or(EngineError::NoFile)?;
        let current = self.current.as_mut().ok_or(EngineError::NoNode)?;

        current.proposed = file
            .lines
            .move_endpoint(&current.proposed, endpoint, amount);
        Ok(&current.proposed)
    }

    /// Flip a display option by name, returning its new state.
    pub fn toggle_display_option(&mut self, name: &str) -> Result<bool, EngineError> {
        let option = name.parse::<DisplayOption>()?;
        Ok(self.display.toggle(option))
    }

    /// Record the proposed span as the expectation for the current node and
    /// rewrite the fixture of the current case file.
    pub fn save_current_proposed(&mut self) -> Result<(), EngineError> {
        let file = self.loaded.as_mut().ok_or(EngineError::NoFile)?;
        let current = self.current.as_ref().ok_or(EngineError::NoNode)?;

        let mut records: Vec<Option<Span>> = (0..file.nodes.len())
            .map(|i| file.fixture.as_ref().and_then(|f| f.record(i)).cloned())
            .collect();
        records[self.position] = Some(current.proposed.clone());

        self.store.save(&file.key, &records)?;
        file.fixture = Some(Fixture {
            key: file.key.clone(),
            records,
        });

        self.recompute_comparison()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> Phase {
        if self.exhausted {
            Phase::Exhausted
        } else if self.loaded.is_some() {
            Phase::FileLoaded
        } else if self.stage.is_some() {
            Phase::StageSelected
        } else {
            Phase::Idle
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn current_file(&self) -> Option<&str> {
        self.loaded.as_ref().map(|f| f.key.file.as_str())
    }

    /// Index of the current node within the current case file.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of nodes in the current case file.
    pub fn node_count(&self) -> usize {
        self.loaded.as_ref().map_or(0, |f| f.nodes.len())
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        self.current.as_ref()
    }

    pub fn actual(&self) -> Option<&Span> {
        self.current.as_ref().map(|c| &c.actual)
    }

    pub fn expected(&self) -> Option<&Span> {
        self.current.as_ref().map(|c| &c.expected)
    }

    pub fn proposed(&self) -> Option<&Span> {
        self.current.as_ref().map(|c| &c.proposed)
    }

    pub fn matches(&self) -> Option<bool> {
        self.current.as_ref().map(|c| c.matches)
    }

    pub fn current_node(&self) -> Option<&Node> {
        if self.current.is_none() {
            return None;
        }
        self.loaded.as_ref()?.nodes.get(self.position)
    }

    /// Upper-cased type of the current node.
    pub fn token_label(&self) -> Option<String> {
        self.current_node().map(Node::label)
    }

    pub fn lines(&self) -> Option<&LineTable> {
        self.loaded.as_ref().map(|f| &f.lines)
    }

    pub fn display_options(&self) -> DisplayOptions {
        self.display
    }

    pub fn is_run_mode(&self) -> bool {
        self.run_mode
    }

    pub fn run_pause(&self) -> Option<usize> {
        self.run_pause
    }

    pub fn repo(&self) -> &RepoIdentity {
        &self.repo
    }

    /// Positions in the current case file whose span does not match the
    /// fixture.
    pub fn mismatched_positions(&self) -> Vec<usize> {
        let Some(file) = &self.loaded else {
            return Vec::new();
        };
        (0..file.nodes.len())
            .filter(|&i| file.compare_at(i).is_some_and(|c| !c.matches))
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn load_file_at(&mut self, index: usize) -> Result<(), EngineError> {
        let stage = self.stage.ok_or(EngineError::NoStage)?;
        let name = self.files.get(index).cloned().ok_or(EngineError::NoFile)?;

        let text = self.source.read_case(stage, &name)?;
        let lines = LineTable::from_source(&text);
        let nodes = self.source.nodes(stage, &text, &name)?;
        let key = FixtureKey::new(self.repo.clone(), stage, name.as_str());
        let fixture = self.store.load(&key)?;

        log::debug!(
            "loaded {name}: {} nodes, {}",
            nodes.len(),
            if fixture.is_some() {
                "fixture found"
            } else {
                "no fixture"
            }
        );

        self.file_index = index;
        self.loaded = Some(LoadedFile {
            key,
            lines,
            nodes,
            fixture,
        });
        self.position = 0;
        self.current = None;
        self.exhausted = false;
        self.run_pause = None;
        Ok(())
    }

    fn exhaust(&mut self) {
        log::debug!("no more files to process");
        self.exhausted = true;
        self.current = None;
        self.run_mode = false;
    }

    /// Step one node forward without comparing, loading the next non-empty
    /// case file when the current one runs out.
    fn advance(&mut self) -> Result<Step, EngineError> {
        if self.position + 1 < self.node_count() {
            self.position += 1;
            return Ok(Step::Moved);
        }

        loop {
            if self.file_index + 1 >= self.files.len() {
                self.exhaust();
                return Ok(Step::Exhausted);
            }
            self.load_file_at(self.file_index + 1)?;
            if self.node_count() > 0 {
                return Ok(Step::Moved);
            }
        }
    }

    /// [`advance`](Self::advance) for run mode. A failure leaves run mode
    /// and re-compares wherever the engine ended up, so the current spans
    /// always describe the node at `position`.
    fn run_advance(&mut self) -> Result<Step, EngineError> {
        self.advance().inspect_err(|e| {
            log::warn!("run aborted: {e}");
            self.run_mode = false;
            self.current = match &self.loaded {
                Some(file) if !self.exhausted => file.compare_at(self.position),
                _ => None,
            };
        })
    }

    /// Step one node back without comparing, landing on the last node of the
    /// previous non-empty case file when at the start of the current one.
    fn retreat(&mut self) -> Result<Step, EngineError> {
        if self.exhausted {
            self.load_file_at(self.file_index)?;
            if self.node_count() > 0 {
                self.position = self.node_count() - 1;
                return Ok(Step::Moved);
            }
        } else if self.position > 0 {
            self.position -= 1;
            return Ok(Step::Moved);
        }

        let origin = self.file_index;
        while self.file_index > 0 {
            self.load_file_at(self.file_index - 1)?;
            if self.node_count() > 0 {
                self.position = self.node_count() - 1;
                return Ok(Step::Moved);
            }
        }

        // Every earlier file is empty.
        if self.file_index != origin {
            self.load_file_at(origin)?;
            self.recompute_comparison()?;
        }
        Ok(Step::AtStart)
    }

    fn settled(&self) -> Step {
        if self.exhausted {
            Step::Exhausted
        } else {
            Step::Moved
        }
    }
}
