//! Repository identity used to namespace fixtures.

use std::io;
use std::path::Path;
use std::process::Command;

/// Error type for detecting the current repository.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),

    #[error("`git {command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("repository has no remote.origin.url")]
    NoRemote,
}

/// Remote URL and branch of the repository whose lexer is being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    pub url: String,
    pub branch: String,
    /// Directory name fixtures for this repository are stored under.
    pub dir: String,
}

impl RepoIdentity {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            dir: dir_for_url(&url),
            url,
            branch: branch.into(),
        }
    }

    /// Read the origin URL and checked-out branch of the repository at `cwd`.
    pub fn detect(cwd: &Path) -> Result<Self, RepoError> {
        let url = git(cwd, &["config", "--get", "remote.origin.url"])?;
        if url.is_empty() {
            return Err(RepoError::NoRemote);
        }
        let branch = git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        log::debug!("detected repository {url} on branch {branch}");
        Ok(Self::new(url, branch))
    }
}

fn git(cwd: &Path, args: &[&str]) -> Result<String, RepoError> {
    let output = Command::new("git").args(args).current_dir(cwd).output()?;
    let stdout: String = String::from_utf8_lossy(&output.stdout)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    // `git config --get` exits 1 when the key is unset.
    if !output.status.success() && !(args[0] == "config" && stdout.is_empty()) {
        return Err(RepoError::Git {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

/// Directory name for a remote URL.
///
/// GitHub remotes (https or ssh) become `<owner>-<name>`; anything else is
/// reduced to `[A-Za-z0-9_-]` with runs of `-` collapsed.
pub fn dir_for_url(url: &str) -> String {
    let github = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"));

    if let Some(rest) = github {
        let rest = rest.trim_end_matches('/');
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        if let Some((owner, name)) = rest.split_once('/')
            && !owner.is_empty()
            && !name.is_empty()
            && !name.contains('/')
        {
            return format!("{owner}-{name}");
        }
    }

    let mut slug = String::with_capacity(url.len());
    for c in url.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug.to_string()
    }
}
