//! Backend that drives the `git` command line.

use crate::backend::{PullOutcome, RepoStatus, VcsBackend};
use crate::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::trace;

/// Runs `git` subcommands against one working tree.
#[derive(Debug, Clone)]
pub struct GitBackend {
    work_tree: PathBuf,
    program: PathBuf,
}

impl GitBackend {
    /// Creates a backend for the repository at `work_tree`.
    pub fn new(work_tree: impl Into<PathBuf>) -> Self {
        Self {
            work_tree: work_tree.into(),
            program: PathBuf::from("git"),
        }
    }

    /// Uses a different `git` executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// The working tree root.
    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    fn run(&self, args: &[&str]) -> SyncResult<Output> {
        trace!(?args, "git");
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(&self.work_tree)
            .args(args)
            .output()?;
        Ok(output)
    }

    /// Runs and requires a zero exit status.
    fn run_ok(&self, args: &[&str], retryable: bool) -> SyncResult<Output> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(output);
        }
        let message = format!(
            "git {} failed ({}): {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Err(SyncError::Backend { message, retryable })
    }
}

impl VcsBackend for GitBackend {
    fn status(&self) -> SyncResult<RepoStatus> {
        let output = self.run_ok(&["status", "--porcelain=v1", "-z", "--untracked-files=all"], false)?;
        Ok(parse_porcelain(&output.stdout))
    }

    fn stage(&self, path: &str) -> SyncResult<()> {
        self.run_ok(&["add", "-A", "--", path], false).map(drop)
    }

    fn commit(&self, message: &str) -> SyncResult<()> {
        self.run_ok(&["commit", "-q", "-a", "-m", message], false)
            .map(drop)
    }

    fn pull(&self, remote: &str, branch: &str) -> SyncResult<PullOutcome> {
        // A failed fetch is transport trouble; a failed merge is divergence.
        self.run_ok(&["fetch", "-q", remote, branch], true)?;
        let merge = self.run(&["merge", "--ff-only", "-q", "FETCH_HEAD"])?;
        if merge.status.success() {
            Ok(PullOutcome::Updated)
        } else {
            Ok(PullOutcome::Conflict)
        }
    }

    fn push(&self, remote: &str, branch: &str) -> SyncResult<()> {
        self.run_ok(&["push", "-q", remote, branch], true).map(drop)
    }

    fn remote_url(&self, remote: &str) -> SyncResult<Option<String>> {
        let output = self.run(&["remote", "get-url", remote])?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }
}

/// Parses `git status --porcelain=v1 -z` output.
///
/// Entries are `XY path` separated by NUL; renames and copies carry their
/// source path as the following entry.
pub fn parse_porcelain(raw: &[u8]) -> RepoStatus {
    let mut status = RepoStatus::default();
    let mut entries = raw.split(|b| *b == 0).filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (x, y) = (entry[0], entry[1]);
        let path = String::from_utf8_lossy(&entry[3..]).into_owned();
        if matches!(x, b'R' | b'C') {
            entries.next();
        }

        if x == b'?' || y != b' ' {
            status.unstaged.push(path);
        } else if x != b' ' {
            status.staged.push(path);
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_parsing() {
        let raw = b"M  staged.txt\0 M edited.txt\0?? new dir/file.txt\0R  renamed.txt\0old.txt\0 D gone.txt\0MM both.txt\0";
        let status = parse_porcelain(raw);
        assert_eq!(status.staged, vec!["staged.txt", "renamed.txt"]);
        assert_eq!(
            status.unstaged,
            vec!["edited.txt", "new dir/file.txt", "gone.txt", "both.txt"]
        );
    }

    #[test]
    fn empty_status_is_clean() {
        assert!(!parse_porcelain(b"").has_changes());
    }
}
