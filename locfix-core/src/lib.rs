pub mod ast;
pub mod engine;
pub mod io;
pub mod repo;
pub mod search;
pub mod settings;
pub mod source;
pub mod span;
pub mod walk;

// Re-exports for convenience
pub use ast::{Arity, ChildField, Node, NodeKind};

pub use engine::{Comparison, EngineError, FileSelection, LocationEngine, Phase, Step};

pub use io::{Fixture, FixtureError, FixtureKey, FixtureStore, parse_fixture, serialize_fixture};

pub use repo::{RepoError, RepoIdentity, dir_for_url};
pub use search::suggest_files;
pub use settings::{DisplayOption, DisplayOptions, SETTINGS_FILE, Settings, SettingsError};
pub use source::{CommandSource, LocationDefaults, SourceError, Stage, TokenSource, UnknownStage};
pub use span::{Endpoint, LineTable, Pos, SENTINEL_FILENAME, Span, UNSET};
pub use walk::{flatten, walk};
