//! Git and GitHub operations for the task workflow.
//!
//! Porcelain operations (checkout, branch, pull, push) shell out to `git`,
//! and the PR workflow shells out to `gh`, matching what the agent itself
//! uses inside the repository. Read-only queries — working-tree cleanliness
//! and commit presence — go through `git2` instead of scraping output.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {args}: {output}")]
    Git { args: String, output: String },

    #[error("gh {args}: {output}")]
    Gh { args: String, output: String },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("repository query failed: {0}")]
    Repo(#[from] git2::Error),

    #[error("no default branch: neither main nor master exists")]
    NoDefaultBranch,
}

/// The version-control operations the runner consumes.
#[async_trait]
pub trait Workspace: Send + Sync {
    async fn is_clean(&self) -> Result<bool, GitError>;
    async fn checkout_default(&self) -> Result<(), GitError>;
    async fn pull_ff_only(&self) -> Result<(), GitError>;
    async fn create_branch(&self, name: &str) -> Result<(), GitError>;
    async fn has_new_commits(&self, branch: &str) -> Result<bool, GitError>;
    async fn push(&self, branch: &str) -> Result<(), GitError>;
    async fn create_pr(&self, title: &str, body: &str) -> Result<String, GitError>;
    async fn merge_pr(&self) -> Result<(), GitError>;

    /// Deterministic branch name for a card: `task/<id>-<slug>`, or
    /// `task/<id>` when the name has no sluggable characters.
    fn branch_name(&self, card_id: &str, card_name: &str) -> String {
        branch_name(card_id, card_name)
    }
}

/// Real implementation bound to one working directory.
pub struct GitOps {
    dir: PathBuf,
}

impl GitOps {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.dir)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: program.to_string(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if !output.status.success() {
            let args = args.join(" ");
            return Err(match program {
                "gh" => GitError::Gh {
                    args,
                    output: combined,
                },
                _ => GitError::Git {
                    args,
                    output: combined,
                },
            });
        }
        Ok(combined)
    }

    fn open_repo(&self) -> Result<git2::Repository, GitError> {
        Ok(git2::Repository::open(&self.dir)?)
    }
}

fn default_branch_tip(repo: &git2::Repository) -> Result<git2::Oid, GitError> {
    for name in ["main", "master"] {
        if let Ok(branch) = repo.find_branch(name, git2::BranchType::Local) {
            return Ok(branch.get().peel_to_commit()?.id());
        }
    }
    Err(GitError::NoDefaultBranch)
}

#[async_trait]
impl Workspace for GitOps {
    async fn is_clean(&self) -> Result<bool, GitError> {
        let repo = self.open_repo()?;
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    async fn checkout_default(&self) -> Result<(), GitError> {
        if self.run("git", &["checkout", "main"]).await.is_ok() {
            return Ok(());
        }
        self.run("git", &["checkout", "master"]).await.map(|_| ())
    }

    async fn pull_ff_only(&self) -> Result<(), GitError> {
        self.run("git", &["pull", "--ff-only"]).await.map(|_| ())
    }

    /// Create-or-reset: re-running the same card id lands on a fresh branch.
    async fn create_branch(&self, name: &str) -> Result<(), GitError> {
        self.run("git", &["checkout", "-B", name]).await.map(|_| ())
    }

    async fn has_new_commits(&self, branch: &str) -> Result<bool, GitError> {
        let repo = self.open_repo()?;
        let branch_tip = repo
            .find_branch(branch, git2::BranchType::Local)?
            .get()
            .peel_to_commit()?
            .id();
        let default_tip = default_branch_tip(&repo)?;
        if branch_tip == default_tip {
            return Ok(false);
        }
        let mut walk = repo.revwalk()?;
        walk.push(branch_tip)?;
        walk.hide(default_tip)?;
        Ok(walk.next().is_some())
    }

    async fn push(&self, branch: &str) -> Result<(), GitError> {
        self.run("git", &["push", "-u", "origin", branch])
            .await
            .map(|_| ())
    }

    async fn create_pr(&self, title: &str, body: &str) -> Result<String, GitError> {
        self.run("gh", &["pr", "create", "--title", title, "--body", body])
            .await
    }

    async fn merge_pr(&self) -> Result<(), GitError> {
        self.run("gh", &["pr", "merge", "--squash", "--auto"])
            .await
            .map(|_| ())
    }
}

/// Lowercase and collapse runs of non-`[a-z0-9]` characters to single
/// dashes. Characters outside ASCII contribute nothing, so a pure-CJK name
/// slugs to the empty string.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `task/<id>-<slug>` with the slug capped at 40 characters, or `task/<id>`
/// when nothing sluggable remains.
pub fn branch_name(card_id: &str, card_name: &str) -> String {
    let mut slug = slugify(card_name);
    if slug.len() > 40 {
        slug.truncate(40);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    if slug.is_empty() {
        format!("task/{card_id}")
    } else {
        format!("task/{card_id}-{slug}")
    }
}
