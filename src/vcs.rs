//! Git publishing of updated recipes
//!
//! Commits are built against a private temporary index, so the user's HEAD,
//! index and checked-out branch stay as they were. Only `refs/heads/<branch>`
//! is created or reset, and optionally pushed.

use crate::error::VcsError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Default remote to push to
pub const DEFAULT_REMOTE: &str = "origin";

/// What to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Branch to create or reset
    pub branch: String,
    /// Files whose working-tree content goes into the commit
    pub files: Vec<PathBuf>,
    /// Commit message
    pub message: String,
    /// Push the branch after committing
    pub push: bool,
    /// Reset the branch if it already exists
    pub force: bool,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Commit id on the branch
    pub commit: String,
    /// Whether the branch was pushed
    pub pushed: bool,
}

/// Capability that turns changed files into a published branch
#[async_trait]
pub trait VcsPublisher: Send + Sync {
    /// Returns true if `branch` exists locally, or on the remote when `check_remote` is set
    async fn branch_exists(&self, branch: &str, check_remote: bool) -> Result<bool, VcsError>;

    /// Commit the requested files to the branch and optionally push it
    async fn publish(&self, request: &PublishRequest) -> Result<Published, VcsError>;
}

/// Publisher backed by the git command line
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo: PathBuf,
    remote: String,
}

impl GitPublisher {
    /// Create a publisher for the repository containing `repo`
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
        }
    }

    /// Remote branches are pushed to
    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn git(&self, args: &[&str], index: Option<&Path>) -> Result<String, VcsError> {
        let shown = format!("git {}", args.join(" "));
        let mut command = tokio::process::Command::new("git");
        command
            .args(args)
            .current_dir(&self.repo)
            .stdin(std::process::Stdio::null());
        if let Some(index) = index {
            command.env("GIT_INDEX_FILE", index);
        }

        tracing::trace!(command = %shown, "running git");
        let output = command.output().await.map_err(|e| VcsError::Spawn {
            command: shown.clone(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VcsError::command_failed(shown, stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool, VcsError> {
        let output = tokio::process::Command::new("git")
            .args(["show-ref", "--verify", "--quiet", reference])
            .current_dir(&self.repo)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| VcsError::Spawn {
                command: "git show-ref".to_string(),
                source: e,
            })?;
        Ok(output.status.success())
    }

    /// Put `reference` back to `previous`, deleting it if it did not exist
    async fn reset_ref(&self, reference: &str, commit: &str, previous: Option<&str>) {
        let result = match previous {
            Some(previous) => {
                self.git(&["update-ref", reference, previous, commit], None)
                    .await
            }
            None => self.git(&["update-ref", "-d", reference, commit], None).await,
        };
        match result {
            Ok(_) => tracing::debug!(%reference, "reset branch after failed push"),
            Err(e) => tracing::warn!(%reference, error = %e, "failed to reset branch"),
        }
    }

    /// Absolute path of `file`, checked to lie inside the work tree
    async fn worktree_path(&self, file: &Path) -> Result<String, VcsError> {
        let top = PathBuf::from(self.git(&["rev-parse", "--show-toplevel"], None).await?);
        let top = top.canonicalize().unwrap_or(top);
        let absolute = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.repo.join(file)
        };
        let absolute = absolute.canonicalize().unwrap_or(absolute);

        if !absolute.starts_with(&top) {
            return Err(VcsError::OutsideRepository {
                path: file.to_path_buf(),
            });
        }
        Ok(absolute.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl VcsPublisher for GitPublisher {
    async fn branch_exists(&self, branch: &str, check_remote: bool) -> Result<bool, VcsError> {
        if self.ref_exists(&format!("refs/heads/{}", branch)).await? {
            return Ok(true);
        }
        if check_remote {
            return self
                .ref_exists(&format!("refs/remotes/{}/{}", self.remote, branch))
                .await;
        }
        Ok(false)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<Published, VcsError> {
        let index_dir = tempfile::TempDir::new().map_err(|e| VcsError::TempIndex { source: e })?;
        let index = index_dir.path().join("index");

        let parent = self.git(&["rev-parse", "--verify", "HEAD"], None).await?;
        self.git(&["read-tree", "HEAD"], Some(&index)).await?;

        for file in &request.files {
            let path = self.worktree_path(file).await?;
            self.git(&["add", "--", &path], Some(&index)).await?;
        }

        let tree = self.git(&["write-tree"], Some(&index)).await?;
        let commit = self
            .git(
                &["commit-tree", &tree, "-p", &parent, "-m", &request.message],
                Some(&index),
            )
            .await?;

        let reference = format!("refs/heads/{}", request.branch);
        let previous = if self.ref_exists(&reference).await? {
            Some(self.git(&["rev-parse", "--verify", &reference], None).await?)
        } else {
            None
        };
        if request.force {
            self.git(&["update-ref", &reference, &commit], None).await?;
        } else {
            // empty old value: only create, never overwrite
            self.git(&["update-ref", &reference, &commit, ""], None)
                .await?;
        }
        tracing::info!(branch = %request.branch, commit = %commit, "created commit");

        if request.push {
            let mut args = vec!["push"];
            if request.force {
                args.push("-f");
            }
            args.extend(["--set-upstream", self.remote.as_str(), request.branch.as_str()]);
            if let Err(e) = self.git(&args, None).await {
                self.reset_ref(&reference, &commit, previous.as_deref()).await;
                return Err(e);
            }
            tracing::info!(branch = %request.branch, remote = %self.remote, "pushed branch");
        }

        Ok(Published {
            commit,
            pushed: request.push,
        })
    }
}
