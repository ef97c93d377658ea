//! Git mirrors for `git` sources.
//!
//! Commands go through `CommandRunner` so the clone / pull decision can be
//! exercised without a network or a git binary.

use crate::catalog::model::DEFAULT_BRANCH;
use crate::error::GitError;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Captured result of one external command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Run `program` with `args` and wait for it. Spawn failures are the
    /// `io::Error`; a non-zero exit is `success == false`.
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs commands as child processes with captured output.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// `clone [--branch <b>] <url> <local_path>`; the branch flag is omitted for
/// the default branch.
pub fn clone_args(url: &str, branch: &str, local_path: &Path) -> Vec<String> {
    let mut args = vec!["clone".to_string()];
    if !branch.is_empty() && branch != DEFAULT_BRANCH {
        args.push("--branch".to_string());
        args.push(branch.to_string());
    }
    args.push(url.to_string());
    args.push(local_path.display().to_string());
    args
}

pub fn pull_args(local_path: &Path) -> Vec<String> {
    vec![
        "-C".to_string(),
        local_path.display().to_string(),
        "pull".to_string(),
    ]
}

pub struct GitClient<'r> {
    runner: &'r dyn CommandRunner,
}

impl<'r> GitClient<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Clone when `local_path` is missing, pull otherwise.
    pub fn sync(&self, url: &str, branch: &str, local_path: &Path) -> Result<(), GitError> {
        if local_path.exists() {
            self.pull(local_path)
        } else {
            self.clone_repo(url, branch, local_path)
        }
    }

    pub fn clone_repo(&self, url: &str, branch: &str, local_path: &Path) -> Result<(), GitError> {
        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(GitError::Spawn)?;
        }
        info!(url, branch, path = %local_path.display(), "cloning git source");
        self.git("clone", url, &clone_args(url, branch, local_path))
    }

    pub fn pull(&self, local_path: &Path) -> Result<(), GitError> {
        info!(path = %local_path.display(), "pulling git source");
        self.git(
            "pull",
            &local_path.display().to_string(),
            &pull_args(local_path),
        )
    }

    fn git(&self, action: &'static str, target: &str, args: &[String]) -> Result<(), GitError> {
        debug!(?args, "running git");
        let output = self.runner.run("git", args).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                GitError::NotInstalled
            } else {
                GitError::Spawn(err)
            }
        })?;
        if output.success {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                action,
                target: target.to_string(),
                stderr: output.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Scripted {
        calls: RefCell<Vec<Vec<String>>>,
        result: fn() -> io::Result<CommandOutput>,
    }

    impl CommandRunner for Scripted {
        fn run(&self, _program: &str, args: &[String]) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(args.to_vec());
            (self.result)()
        }
    }

    #[test]
    fn branch_flag_only_for_non_default_branch() {
        let path = Path::new("/ws/sources/r");
        assert_eq!(
            clone_args("https://x/r.git", "main", path),
            vec!["clone", "https://x/r.git", "/ws/sources/r"]
        );
        assert_eq!(
            clone_args("https://x/r.git", "dev", path),
            vec!["clone", "--branch", "dev", "https://x/r.git", "/ws/sources/r"]
        );
    }

    #[test]
    fn sync_pulls_existing_mirror() {
        let temp = TempDir::new().unwrap();
        let runner = Scripted {
            calls: RefCell::new(Vec::new()),
            result: || {
                Ok(CommandOutput {
                    success: true,
                    ..CommandOutput::default()
                })
            },
        };
        GitClient::new(&runner)
            .sync("https://x/r.git", "main", temp.path())
            .unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "-C");
        assert_eq!(calls[0][2], "pull");
    }

    #[test]
    fn failures_carry_stderr() {
        let temp = TempDir::new().unwrap();
        let runner = Scripted {
            calls: RefCell::new(Vec::new()),
            result: || {
                Ok(CommandOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: "fatal: repository not found".to_string(),
                })
            },
        };
        let err = GitClient::new(&runner)
            .clone_repo("https://x/r.git", "main", &temp.path().join("a/b/r"))
            .unwrap_err();
        match err {
            GitError::CommandFailed {
                action, stderr, ..
            } => {
                assert_eq!(action, "clone");
                assert!(stderr.contains("repository not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(temp.path().join("a/b").is_dir());
    }

    #[test]
    fn missing_binary_is_not_installed() {
        let temp = TempDir::new().unwrap();
        let runner = Scripted {
            calls: RefCell::new(Vec::new()),
            result: || Err(io::Error::new(io::ErrorKind::NotFound, "no git")),
        };
        let err = GitClient::new(&runner).pull(temp.path()).unwrap_err();
        assert!(matches!(err, GitError::NotInstalled));
    }
}
